//! Lexical grammar of scalar literals in the textual model form.

use logos::Logos;

/// A scalar literal token.
#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarToken {
    #[regex(r#""[^"]*"|'[^']*'"#)]
    String,

    #[regex(r"-?[0-9]+(\.[0-9]*)?")]
    Number,

    #[regex(r"#[^\n\r]*")]
    Comment,

    #[regex(r"[_a-zA-Z][\w_\-~$#@/\d$]*")]
    Id,
}

/// Classify `text` as a single scalar token.
///
/// Returns `None` unless the entire text is exactly one token.
pub fn classify_scalar(text: &str) -> Option<ScalarToken> {
    let mut lexer = ScalarToken::lexer(text);
    let token = lexer.next()?.ok()?;
    if lexer.span() != (0..text.len()) || lexer.next().is_some() {
        return None;
    }
    Some(token)
}

/// Whether `text` is a valid element identifier.
pub fn is_valid_id(text: &str) -> bool {
    classify_scalar(text) == Some(ScalarToken::Id)
}
