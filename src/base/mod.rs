//! Foundation types for the CrossModel core.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`ModelFileType`] - Document classification by file suffix or leading keyword
//! - [`ScalarToken`] - Lexical grammar of scalar literals (strings, numbers, ids, comments)
//! - [`Uri`], [`ClientId`] - Shared string identifiers
//!
//! This module has NO dependencies on other crossmodel modules.

mod file_type;
mod token;

pub use file_type::{ModelFileType, model_name};
pub use token::{ScalarToken, classify_scalar, is_valid_id};

use std::sync::Arc;

/// Document / model identifier. Models are addressed by the uri of their document.
pub type Uri = Arc<str>;

/// Identifier of a connected client (a text editor, form editor, diagram server, ...).
pub type ClientId = Arc<str>;

/// Separator between the segments of a qualified name (`Package.Entity.attribute`).
pub const QUALIFIED_NAME_SEPARATOR: char = '.';
