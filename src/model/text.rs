//! Textual form of a model.
//!
//! CrossModel documents use an indentation-based, YAML-compatible layout:
//!
//! ```text
//! entity:
//!   id: Customer
//!   name: Customer
//!   attributes:
//!   - id: email
//!     datatype: Varchar
//! ```
//!
//! The grammar itself lives outside this crate; [`ModelParser`] is the seam
//! through which a different grammar can be plugged into the synchronization
//! engine. [`TextFormat`] is the built-in implementation.

use thiserror::Error;

use super::ast::CrossModelRoot;

/// Errors turning text into a tree or back.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text is not well-formed.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The tree could not be written as text.
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Converts between the textual form and the semantic tree.
pub trait ModelParser: Send + Sync {
    /// Parse a document into its semantic tree.
    fn parse(&self, text: &str) -> Result<CrossModelRoot, ParseError>;

    /// Serialize a tree into its textual form.
    ///
    /// `parse(serialize(tree))` must yield a tree equal to `tree`.
    fn serialize(&self, root: &CrossModelRoot) -> Result<String, ParseError>;
}

/// The built-in YAML-compatible text format.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextFormat;

impl ModelParser for TextFormat {
    fn parse(&self, text: &str) -> Result<CrossModelRoot, ParseError> {
        parse(text)
    }

    fn serialize(&self, root: &CrossModelRoot) -> Result<String, ParseError> {
        serialize(root)
    }
}

/// Parse a document. Documents with no content besides comments parse to an empty root.
pub fn parse(text: &str) -> Result<CrossModelRoot, ParseError> {
    if is_blank(text) {
        return Ok(CrossModelRoot::default());
    }
    serde_yaml::from_str(text).map_err(|e| ParseError::Syntax(e.to_string()))
}

/// Serialize a tree into its textual form.
pub fn serialize(root: &CrossModelRoot) -> Result<String, ParseError> {
    if root.is_empty() {
        return Ok(String::new());
    }
    serde_yaml::to_string(root).map_err(|e| ParseError::Serialize(e.to_string()))
}

fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}
