//! Shared helpers for the integration suite.

pub mod workspace_helpers;
