//! Scope computation and reference resolution.
//!
//! A scope is computed in three steps:
//!
//! 1. **Anchor** - the container is resolved to a package and the kind of
//!    the element owning the reference; synthetic elements refine the kind.
//! 2. **Target** - the (kind, property) pair selects the referenced kind.
//! 3. **Visibility** - same-package elements are reachable under their local
//!    name, other packages' exported elements under their qualified name.
//!
//! The user-facing list hides the qualified form of local elements; linking
//! accepts both forms.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::index::{PackageId, Symbol, WorkspaceIndex};
use crate::model::NodeKind;

use super::context::{
    CrossReference, CrossReferenceContainer, CrossReferenceContext, ReferenceableElement,
    ResolvedElement, containment_child, reference_target,
};

/// The set of elements reachable from one reference context.
///
/// Holds a snapshot of the candidate symbols taken when the scope was
/// computed, so iterating it never observes a half-applied reindex and can
/// be restarted any number of times.
#[derive(Clone, Debug)]
pub struct Scope {
    package_id: PackageId,
    target: Option<NodeKind>,
    symbols: Arc<[Arc<Symbol>]>,
}

impl Scope {
    pub fn empty() -> Self {
        Self {
            package_id: PackageId::default(),
            target: None,
            symbols: Arc::from([]),
        }
    }

    /// The referenced kind, `None` when the context refers to nothing.
    pub fn target(&self) -> Option<NodeKind> {
        self.target
    }

    /// Package the scope was computed from.
    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    /// Elements offered to the user, each label at most once.
    pub fn elements(&self) -> impl Iterator<Item = ReferenceableElement> + '_ {
        self.entries(false).map(|(label, symbol)| referenceable(label, symbol))
    }

    /// Every label a reference may use to link, including the qualified
    /// names of local elements.
    pub fn linking_elements(&self) -> impl Iterator<Item = ReferenceableElement> + '_ {
        self.entries(true).map(|(label, symbol)| referenceable(label, symbol))
    }

    /// Find the element a reference text links to.
    pub fn find(&self, label: &str) -> Option<&Arc<Symbol>> {
        self.entries(true)
            .find(|(candidate, _)| *candidate == label)
            .map(|(_, symbol)| symbol)
    }

    fn entries(&self, linking: bool) -> impl Iterator<Item = (&str, &Arc<Symbol>)> + '_ {
        let package_id = &self.package_id;
        let local = self
            .symbols
            .iter()
            .filter(move |s| s.package_id == *package_id)
            .map(|s| (&*s.name, s));
        let external = self
            .symbols
            .iter()
            .filter(move |s| s.package_id != *package_id && s.exported)
            .map(|s| (&*s.qualified_name, s));
        let qualified_local = self
            .symbols
            .iter()
            .filter(move |s| linking && s.package_id == *package_id)
            .map(|s| (&*s.qualified_name, s));

        // Duplicate store: first occurrence of a label wins.
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        local
            .chain(external)
            .chain(qualified_local)
            .filter(move |(label, _)| seen.insert(*label))
    }
}

fn referenceable(label: &str, symbol: &Symbol) -> ReferenceableElement {
    ReferenceableElement {
        uri: symbol.uri.to_string(),
        kind: symbol.kind,
        label: label.to_string(),
    }
}

/// Computes scopes and resolves references against a workspace index.
#[derive(Clone, Debug)]
pub struct ScopeResolver {
    index: Arc<WorkspaceIndex>,
}

impl ScopeResolver {
    pub fn new(index: Arc<WorkspaceIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<WorkspaceIndex> {
        &self.index
    }

    /// Compute the scope of a reference context.
    ///
    /// Contexts that cannot be anchored, or whose property is not a
    /// reference, yield an empty scope.
    pub fn scope(&self, context: &CrossReferenceContext) -> Scope {
        let Some((package_id, mut source)) = self.anchor(&context.container) else {
            tracing::trace!("scope: unresolved container {:?}", context.container);
            return Scope::empty();
        };
        // Each synthetic element must be what its property of the previous
        // element contains.
        for synthetic in &context.synthetic_elements {
            let contained = source.and_then(|parent| containment_child(parent, &synthetic.property));
            let declared = NodeKind::parse(&synthetic.type_name);
            if contained.is_none() || contained != declared {
                tracing::trace!(
                    "scope: {} is not contained in {:?}.{}",
                    synthetic.type_name,
                    source,
                    synthetic.property
                );
                return Scope::empty();
            }
            source = contained;
        }
        let Some(target) = source.and_then(|kind| reference_target(kind, &context.property)) else {
            tracing::trace!("scope: {:?}.{} is not a reference", source, context.property);
            return Scope::empty();
        };

        let symbols = self.index.symbols_of_kind(target);
        tracing::trace!(
            "scope: {} candidates of kind {} from package {}",
            symbols.len(),
            target,
            package_id
        );
        Scope {
            package_id,
            target: Some(target),
            symbols,
        }
    }

    /// The user-facing elements reachable from `context`.
    pub fn complete(&self, context: &CrossReferenceContext) -> Vec<ReferenceableElement> {
        self.scope(context).elements().collect()
    }

    /// Resolve a reference text to the element it links to.
    ///
    /// The linking scope is consulted first; a fully-qualified name of the
    /// target kind resolves regardless of package or export.
    pub fn resolve_reference(&self, reference: &CrossReference) -> Option<ResolvedElement> {
        let scope = self.scope(&reference.context());
        let target = scope.target()?;
        let symbol = scope.find(&reference.value).cloned().or_else(|| {
            self.index
                .lookup(&reference.value)
                .filter(|symbol| symbol.kind == target)
        });
        let Some(symbol) = symbol else {
            tracing::trace!("resolve: no {} named {}", target, reference.value);
            return None;
        };

        let document = self.index.document(&symbol.uri)?;
        let root = document.root();
        let matched = root.find_by_path(&symbol.path()).map(|node| node.to_element());
        Some(ResolvedElement {
            uri: symbol.uri.to_string(),
            model: root.as_ref().clone(),
            matched,
        })
    }

    /// Package and owning kind of a container.
    fn anchor(&self, container: &CrossReferenceContainer) -> Option<(PackageId, Option<NodeKind>)> {
        match container {
            CrossReferenceContainer::SyntheticDocument { uri, type_name } => {
                let kind = NodeKind::parse(type_name).filter(NodeKind::is_root_element);
                Some((self.index.package_id_of(uri), kind))
            }
            CrossReferenceContainer::GlobalElementReference { global_id, type_name } => {
                let symbol = self.index.lookup(global_id)?;
                let kind = type_name
                    .as_deref()
                    .and_then(NodeKind::parse)
                    .unwrap_or(symbol.kind);
                Some((symbol.package_id.clone(), Some(kind)))
            }
            CrossReferenceContainer::RootElementReference { uri } => {
                let kind = self.index.document(uri).and_then(|doc| doc.root_kind());
                Some((self.index.package_id_of(uri), kind))
            }
        }
    }
}
