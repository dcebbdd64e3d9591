//! Scope layer tests
//!
//! Tests for reference scopes computed over an indexed workspace:
//! - Package visibility of exported and nested elements
//! - Completion labels
//! - Reference resolution
//! - Scopes of elements that are not saved yet

pub mod tests_resolution;
