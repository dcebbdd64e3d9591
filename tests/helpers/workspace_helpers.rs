//! Helpers for building indexed workspaces.

use std::sync::Arc;

use crossmodel::index::{PackageInfo, WorkspaceIndex};
use crossmodel::model::text::parse;

use super::fixtures::{P1_ROOT, P2_ROOT, all_documents};

/// An empty index with the fixture packages registered.
pub fn index_with_packages() -> Arc<WorkspaceIndex> {
    let index = WorkspaceIndex::new();
    index.register_package(PackageInfo::new("p1", "Package One", P1_ROOT));
    index.register_package(PackageInfo::new("p2", "Package Two", P2_ROOT));
    Arc::new(index)
}

/// Index the given documents. Panics when one does not parse.
pub fn index_documents(index: &WorkspaceIndex, documents: &[(&str, &str)]) {
    let batch = documents
        .iter()
        .map(|(uri, text)| {
            let root = parse(text).unwrap_or_else(|e| panic!("Parse error in '{}': {}", uri, e));
            (Arc::from(*uri), Arc::new(root))
        })
        .collect();
    index.index_documents(batch);
}

/// The fixture workspace, fully indexed.
pub fn fixture_workspace() -> Arc<WorkspaceIndex> {
    let index = index_with_packages();
    index_documents(&index, &all_documents());
    index
}
