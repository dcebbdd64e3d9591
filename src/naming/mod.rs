//! Collision-free identifiers.
//!
//! [`find_next_id`] returns `base` when it is free, otherwise `base` followed
//! by the smallest positive number that is free. Gaps are reused: with
//! `{X, X1, X2, X4}` taken the next id for `X` is `X3`.

use rustc_hash::FxHashSet;

use crate::index::{PackageId, WorkspaceIndex};
use crate::model::{AstNode, NodeKind};

/// A naming scope: the set of existing ids new elements must not collide with.
pub trait IdScope {
    /// Existing ids of elements of `kind` in this scope.
    fn ids_of_kind(&self, kind: NodeKind) -> Vec<String>;
}

/// Compute an id for a new element of `kind` that is unique within `scope`.
pub fn find_next_id(kind: NodeKind, base: &str, scope: &impl IdScope) -> String {
    let ids = scope.ids_of_kind(kind);
    next_free_id(base, ids.iter().map(String::as_str))
}

/// Smallest free id for `base` among `existing`.
///
/// Only exact, case-sensitive `base` + decimal-suffix siblings occupy a
/// number. Suffixes with a leading zero (`X01`) are not the canonical
/// spelling of any number and are ignored.
pub fn next_free_id<'a>(base: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let mut base_taken = false;
    let mut taken: FxHashSet<u64> = FxHashSet::default();
    for id in existing {
        let Some(suffix) = id.strip_prefix(base) else {
            continue;
        };
        if suffix.is_empty() {
            base_taken = true;
        } else if suffix.bytes().all(|b| b.is_ascii_digit()) && !suffix.starts_with('0') {
            if let Ok(n) = suffix.parse::<u64>() {
                taken.insert(n);
            }
        }
    }
    if !base_taken {
        return base.to_string();
    }
    // At most `taken.len()` numbers are occupied, so a free one exists in 1..=len+1.
    let n = (1..).find(|n| !taken.contains(n)).unwrap_or(1);
    format!("{base}{n}")
}

/// Children of a container node form a scope: node ids inside a diagram,
/// attribute ids inside an entity.
impl IdScope for AstNode<'_> {
    fn ids_of_kind(&self, kind: NodeKind) -> Vec<String> {
        self.children()
            .iter()
            .filter(|c| c.kind() == kind)
            .filter_map(|c| c.id().map(str::to_string))
            .collect()
    }
}

/// The top-level elements of one package of the workspace.
pub struct PackageScope<'a> {
    index: &'a WorkspaceIndex,
    package_id: PackageId,
}

impl<'a> PackageScope<'a> {
    pub fn new(index: &'a WorkspaceIndex, package_id: impl Into<PackageId>) -> Self {
        Self {
            index,
            package_id: package_id.into(),
        }
    }

    /// Scope of the package containing `uri`.
    pub fn for_uri(index: &'a WorkspaceIndex, uri: &str) -> Self {
        let package_id = index.package_id_of(uri);
        Self { index, package_id }
    }
}

impl IdScope for PackageScope<'_> {
    fn ids_of_kind(&self, kind: NodeKind) -> Vec<String> {
        self.index
            .elements_of_package(&self.package_id)
            .iter()
            .filter(|s| s.kind == kind && s.exported)
            .map(|s| s.id().to_string())
            .collect()
    }
}
