//! Workspace symbol index.
//!
//! Symbols are extracted per document into a [`DocumentIndex`] and
//! aggregated, grouped by package, in the [`WorkspaceIndex`].
//!
//! ## Layers
//!
//! ```text
//! CrossModelRoot            ← parsed document (opaque to the index)
//!     │
//!     ▼
//! DocumentIndex::build      ← per-document symbol table (immutable)
//!     │
//!     ▼
//! WorkspaceIndex            ← by uri / qualified name / package / kind
//! ```
//!
//! A document index is never mutated after it is built: reindexing builds a
//! fresh one and swaps it in, so readers see either the old or the new
//! symbols of a document, never a mix.

mod document;
mod package;
mod workspace;

pub use document::{DocumentIndex, Symbol};
pub use package::{DEFAULT_FALLBACK_PACKAGE, PackageId, PackageInfo, PackageRegistry, SystemInfo};
pub use workspace::WorkspaceIndex;
