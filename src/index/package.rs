//! Packages (systems): the default visibility boundary for names.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Package identifier. Prefixes qualified names.
pub type PackageId = SmolStr;

/// Package used for documents outside every registered root.
pub const DEFAULT_FALLBACK_PACKAGE: &str = "unknown";

const PACKAGE_FILE: &str = "package.json";

/// A registered package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageInfo {
    pub id: PackageId,
    pub name: String,
    /// Directory uri; every document below it belongs to this package.
    pub root_uri: String,
}

impl PackageInfo {
    pub fn new(id: impl Into<PackageId>, name: impl Into<String>, root_uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            root_uri: root_uri.into().trim_end_matches('/').to_string(),
        }
    }

    /// Whether `uri` lies inside this package's root directory.
    pub fn contains(&self, uri: &str) -> bool {
        uri.strip_prefix(self.root_uri.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Client-facing description of a package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub id: String,
    pub name: String,
    pub directory: String,
    pub package_file_path: String,
    pub model_file_paths: Vec<String>,
}

impl SystemInfo {
    pub(crate) fn new(package: &PackageInfo, model_file_paths: Vec<String>) -> Self {
        Self {
            id: package.id.to_string(),
            name: package.name.clone(),
            directory: package.root_uri.clone(),
            package_file_path: format!("{}/{PACKAGE_FILE}", package.root_uri),
            model_file_paths,
        }
    }
}

/// Registry mapping document uris to packages.
#[derive(Debug)]
pub struct PackageRegistry {
    packages: RwLock<IndexMap<PackageId, PackageInfo>>,
    fallback: PackageId,
}

impl Default for PackageRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_PACKAGE)
    }
}

impl PackageRegistry {
    pub fn new(fallback: impl Into<PackageId>) -> Self {
        Self {
            packages: RwLock::new(IndexMap::new()),
            fallback: fallback.into(),
        }
    }

    /// Register a package. Returns the package it replaced, if any.
    pub fn register(&self, package: PackageInfo) -> Option<PackageInfo> {
        self.packages.write().insert(package.id.clone(), package)
    }

    pub fn unregister(&self, id: &str) -> Option<PackageInfo> {
        self.packages.write().shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<PackageInfo> {
        self.packages.read().get(id).cloned()
    }

    /// All registered packages in registration order.
    pub fn all(&self) -> Vec<PackageInfo> {
        self.packages.read().values().cloned().collect()
    }

    /// The package a document belongs to: the registered package with the
    /// longest root containing `uri`, else the fallback package.
    pub fn package_id_of(&self, uri: &str) -> PackageId {
        self.package_of(uri)
            .map(|p| p.id)
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// The registered package containing `uri`, if any.
    pub fn package_of(&self, uri: &str) -> Option<PackageInfo> {
        self.packages
            .read()
            .values()
            .filter(|p| p.contains(uri))
            .max_by_key(|p| p.root_uri.len())
            .cloned()
    }

    pub fn fallback(&self) -> &PackageId {
        &self.fallback
    }
}
