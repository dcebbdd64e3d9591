//! Scopes: which elements a reference may point to.
//!
//! [`ScopeResolver`] reads symbols from the [`WorkspaceIndex`](crate::index::WorkspaceIndex)
//! and applies package visibility. It never caches beyond the index's own
//! per-kind cache, so a reindex is visible to the next scope computation.

mod context;
mod resolver;

pub use context::{
    CrossReference, CrossReferenceContainer, CrossReferenceContext, ReferenceableElement,
    ResolvedElement, SyntheticElement, containment_child, reference_target,
};
pub use resolver::{Scope, ScopeResolver};
