//! Workspace-wide aggregation of document indices.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::base::Uri;
use crate::model::{CrossModelRoot, NodeKind};

use super::document::{DocumentIndex, Symbol};
use super::package::{PackageId, PackageInfo, PackageRegistry, SystemInfo};

/// Aggregate tables, always mutated together under one write lock.
#[derive(Debug, Default)]
struct IndexState {
    /// Insertion-ordered so that scopes enumerate documents deterministically.
    documents: IndexMap<Uri, Arc<DocumentIndex>>,
    by_qualified_name: FxHashMap<Arc<str>, Arc<Symbol>>,
    by_package: FxHashMap<PackageId, IndexSet<Uri>>,
    /// Symbols whose qualified name was already taken when they were indexed.
    duplicates: Vec<Arc<Symbol>>,
}

/// Index of every known document in the workspace.
///
/// Symbol extraction happens outside the lock; committing a document is a
/// single short critical section. Every commit bumps the generation, which
/// invalidates the per-kind symbol cache that scope computation reads from.
#[derive(Debug, Default)]
pub struct WorkspaceIndex {
    packages: PackageRegistry,
    state: RwLock<IndexState>,
    generation: AtomicU64,
    kind_cache: Mutex<FxHashMap<NodeKind, (u64, Arc<[Arc<Symbol>]>)>>,
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packages(packages: PackageRegistry) -> Self {
        Self {
            packages,
            ..Self::default()
        }
    }

    pub fn packages(&self) -> &PackageRegistry {
        &self.packages
    }

    /// Monotonic counter bumped by every write.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Replace all symbols of `uri` with those extracted from `root`.
    pub fn index_document(&self, uri: Uri, root: Arc<CrossModelRoot>) -> Arc<DocumentIndex> {
        let package_id = self.packages.package_id_of(&uri);
        let document = Arc::new(DocumentIndex::build(uri, package_id, root));
        let mut state = self.state.write();
        commit(&mut state, document.clone());
        self.bump();
        document
    }

    /// Index many documents, extracting in parallel and committing all of
    /// them in one step.
    pub fn index_documents(&self, batch: Vec<(Uri, Arc<CrossModelRoot>)>) {
        let documents: Vec<Arc<DocumentIndex>> = batch
            .into_par_iter()
            .map(|(uri, root)| {
                let package_id = self.packages.package_id_of(&uri);
                Arc::new(DocumentIndex::build(uri, package_id, root))
            })
            .collect();
        let count = documents.len();
        let mut state = self.state.write();
        for document in documents {
            commit(&mut state, document);
        }
        self.bump();
        tracing::debug!("indexed {} documents", count);
    }

    /// Remove a document and all its symbols.
    pub fn remove_document(&self, uri: &str) -> Option<Arc<DocumentIndex>> {
        let mut state = self.state.write();
        let removed = uncommit(&mut state, uri);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Register a package and move documents below its root into it.
    pub fn register_package(&self, package: PackageInfo) {
        self.packages.register(package);
        self.rebind_packages();
    }

    pub fn unregister_package(&self, id: &str) -> Option<PackageInfo> {
        let removed = self.packages.unregister(id);
        if removed.is_some() {
            self.rebind_packages();
        }
        removed
    }

    /// Reindex documents whose package changed.
    fn rebind_packages(&self) {
        let mut state = self.state.write();
        let moved: Vec<Arc<DocumentIndex>> = state
            .documents
            .values()
            .filter_map(|doc| {
                let package_id = self.packages.package_id_of(doc.uri());
                (package_id != *doc.package_id()).then(|| Arc::new(doc.with_package(package_id)))
            })
            .collect();
        if moved.is_empty() {
            return;
        }
        for document in moved {
            commit(&mut state, document);
        }
        self.bump();
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Look up a symbol by qualified name.
    pub fn lookup(&self, qualified_name: &str) -> Option<Arc<Symbol>> {
        self.state.read().by_qualified_name.get(qualified_name).cloned()
    }

    pub fn document(&self, uri: &str) -> Option<Arc<DocumentIndex>> {
        self.state.read().documents.get(uri).cloned()
    }

    pub fn package_id_of(&self, uri: &str) -> PackageId {
        self.state
            .read()
            .documents
            .get(uri)
            .map(|doc| doc.package_id().clone())
            .unwrap_or_else(|| self.packages.package_id_of(uri))
    }

    /// All symbols of a package, in document then declaration order.
    pub fn elements_of_package(&self, package_id: &str) -> Vec<Arc<Symbol>> {
        let state = self.state.read();
        let Some(uris) = state.by_package.get(package_id) else {
            return Vec::new();
        };
        uris.iter()
            .filter_map(|uri| state.documents.get(uri))
            .flat_map(|doc| doc.symbols().iter().cloned())
            .collect()
    }

    /// Uris of the documents belonging to a package.
    pub fn documents_of_package(&self, package_id: &str) -> Vec<Uri> {
        self.state
            .read()
            .by_package
            .get(package_id)
            .map(|uris| uris.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All symbols of one kind across the workspace, in document order.
    ///
    /// Results are cached until the next write to the index.
    pub fn symbols_of_kind(&self, kind: NodeKind) -> Arc<[Arc<Symbol>]> {
        let current = self.generation();
        if let Some((generation, symbols)) = self.kind_cache.lock().get(&kind) {
            if *generation == current {
                return symbols.clone();
            }
        }

        let (generation, symbols) = {
            let state = self.state.read();
            let symbols: Arc<[Arc<Symbol>]> = state
                .documents
                .values()
                .flat_map(|doc| doc.symbols().iter())
                .filter(|s| s.kind == kind)
                .cloned()
                .collect();
            // Read under the lock: writers bump while holding it.
            (self.generation(), symbols)
        };
        tracing::trace!(
            "symbols_of_kind({}): {} symbols at generation {}",
            kind,
            symbols.len(),
            generation
        );
        self.kind_cache
            .lock()
            .insert(kind, (generation, symbols.clone()));
        symbols
    }

    /// Symbols whose qualified name collided with an already indexed one.
    pub fn duplicates(&self) -> Vec<Arc<Symbol>> {
        self.state.read().duplicates.clone()
    }

    pub fn document_count(&self) -> usize {
        self.state.read().documents.len()
    }

    // ========================================================================
    // SYSTEMS
    // ========================================================================

    /// Descriptions of all registered packages with their model files.
    pub fn systems(&self) -> Vec<SystemInfo> {
        self.packages
            .all()
            .iter()
            .map(|package| self.system_info(package))
            .collect()
    }

    /// The system containing `context_uri`, if it lies in a registered package.
    pub fn system(&self, context_uri: &str) -> Option<SystemInfo> {
        let package = self.packages.package_of(context_uri)?;
        Some(self.system_info(&package))
    }

    pub(crate) fn system_info(&self, package: &PackageInfo) -> SystemInfo {
        let files = self
            .documents_of_package(&package.id)
            .iter()
            .map(|uri| uri.to_string())
            .collect();
        SystemInfo::new(package, files)
    }
}

fn commit(state: &mut IndexState, document: Arc<DocumentIndex>) {
    let uri = document.uri().clone();
    uncommit(state, &uri);

    for symbol in document.symbols() {
        if state.by_qualified_name.contains_key(&symbol.qualified_name) {
            tracing::warn!(
                "duplicate qualified name {} in {}",
                symbol.qualified_name,
                symbol.uri
            );
            state.duplicates.push(symbol.clone());
        } else {
            state
                .by_qualified_name
                .insert(symbol.qualified_name.clone(), symbol.clone());
        }
    }
    state
        .by_package
        .entry(document.package_id().clone())
        .or_default()
        .insert(uri.clone());
    state.documents.insert(uri, document);
}

fn uncommit(state: &mut IndexState, uri: &str) -> Option<Arc<DocumentIndex>> {
    let document = state.documents.shift_remove(uri)?;

    state.duplicates.retain(|s| s.uri.as_ref() != uri);
    for symbol in document.symbols() {
        let owned = state
            .by_qualified_name
            .get(&symbol.qualified_name)
            .is_some_and(|current| Arc::ptr_eq(current, symbol));
        if !owned {
            continue;
        }
        state.by_qualified_name.remove(&symbol.qualified_name);
        // Promote the first shadowed duplicate, if any.
        if let Some(pos) = state
            .duplicates
            .iter()
            .position(|d| d.qualified_name == symbol.qualified_name)
        {
            let promoted = state.duplicates.remove(pos);
            state
                .by_qualified_name
                .insert(promoted.qualified_name.clone(), promoted);
        }
    }

    if let Some(uris) = state.by_package.get_mut(document.package_id()) {
        uris.shift_remove(uri);
        if uris.is_empty() {
            state.by_package.remove(document.package_id());
        }
    }
    Some(document)
}
