//! # crossmodel-core
//!
//! Workspace index, scope resolution and multi-client model synchronization
//! for CrossModel documents.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! rpc       → JSON-RPC gateway, connection pump
//!   ↓
//! sync      → Model synchronization engine, diff/patch, undo/redo
//!   ↓
//! scope     → Package-aware scopes, completion, reference resolution
//! naming    → Collision-free identifiers
//!   ↓
//! index     → Symbol index, packages (systems)
//!   ↓
//! model     → Semantic tree, text format
//!   ↓
//! base      → Primitives (Uri, ClientId, file types, scalar tokens)
//! ```

// ============================================================================
// MODULES (dependency order: base → model → index → scope → sync → rpc)
// ============================================================================

/// Foundation types: Uri, ClientId, file type detection
pub mod base;

/// Semantic tree of CrossModel documents and its textual form
pub mod model;

/// Workspace symbol index and package registry
pub mod index;

/// Unique id generation for new elements
pub mod naming;

/// Scope computation for cross references
pub mod scope;

/// Multi-client model synchronization
pub mod sync;

/// JSON-RPC gateway
pub mod rpc;

/// Server configuration
pub mod config;

// Re-export the service entry points
pub use config::{ConfigError, ServerConfig};
pub use index::WorkspaceIndex;
pub use rpc::Gateway;
pub use scope::ScopeResolver;
pub use sync::ModelSyncEngine;
