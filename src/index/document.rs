//! Per-document symbol extraction.

use std::sync::Arc;

use crate::base::{QUALIFIED_NAME_SEPARATOR, Uri};
use crate::model::{AstNode, CrossModelRoot, NodeKind};

use super::package::PackageId;

/// Description of a named element.
///
/// `name` is the package-local path of the element (`Customer`,
/// `Customer.email`); `qualified_name` prefixes it with the package id and
/// is unique across the workspace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: Arc<str>,
    pub qualified_name: Arc<str>,
    pub kind: NodeKind,
    pub uri: Uri,
    pub package_id: PackageId,
    /// Exported symbols are visible from other packages (qualified).
    pub exported: bool,
}

impl Symbol {
    /// The element's own id (last segment of its name).
    pub fn id(&self) -> &str {
        self.name
            .rsplit(QUALIFIED_NAME_SEPARATOR)
            .next()
            .unwrap_or(&self.name)
    }

    /// Segments of the package-local path, outermost first.
    pub fn path(&self) -> Vec<&str> {
        self.name.split(QUALIFIED_NAME_SEPARATOR).collect()
    }
}

/// Symbol table of one parsed document.
#[derive(Clone, Debug)]
pub struct DocumentIndex {
    uri: Uri,
    package_id: PackageId,
    root: Arc<CrossModelRoot>,
    symbols: Vec<Arc<Symbol>>,
}

impl DocumentIndex {
    /// Extract all symbols of `root`.
    ///
    /// The top-level element is exported; nested elements are package-local.
    pub fn build(uri: Uri, package_id: PackageId, root: Arc<CrossModelRoot>) -> Self {
        let mut symbols = Vec::new();
        if let Some(node) = root.root_node() {
            collect(&uri, &package_id, node, None, &mut symbols);
        }
        Self {
            uri,
            package_id,
            root,
            symbols,
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    pub fn root(&self) -> &Arc<CrossModelRoot> {
        &self.root
    }

    /// Kind of the document's top-level element.
    pub fn root_kind(&self) -> Option<NodeKind> {
        self.root.root_node().map(|n| n.kind())
    }

    /// Symbols in document order.
    pub fn symbols(&self) -> &[Arc<Symbol>] {
        &self.symbols
    }

    /// Rebuild the same tree under a different package.
    pub(super) fn with_package(&self, package_id: PackageId) -> Self {
        Self::build(self.uri.clone(), package_id, self.root.clone())
    }
}

fn collect(
    uri: &Uri,
    package_id: &PackageId,
    node: AstNode<'_>,
    parent: Option<&str>,
    out: &mut Vec<Arc<Symbol>>,
) {
    // Unidentifiable nodes have nothing below them that could be named.
    let Some(id) = node.id() else {
        return;
    };
    let name: Arc<str> = match parent {
        Some(parent) => format!("{parent}{QUALIFIED_NAME_SEPARATOR}{id}").into(),
        None => Arc::from(id),
    };
    out.push(Arc::new(Symbol {
        qualified_name: format!("{package_id}{QUALIFIED_NAME_SEPARATOR}{name}").into(),
        name: name.clone(),
        kind: node.kind(),
        uri: uri.clone(),
        package_id: package_id.clone(),
        exported: parent.is_none(),
    }));
    for child in node.children() {
        collect(uri, package_id, child, Some(&name), out);
    }
}
