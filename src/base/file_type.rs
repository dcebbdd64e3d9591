//! Classification of persisted documents.

use serde::{Deserialize, Serialize};

const GENERIC: &str = ".cm";
const ENTITY: &str = ".entity.cm";
const RELATIONSHIP: &str = ".relationship.cm";
const MAPPING: &str = ".mapping.cm";
const SYSTEM_DIAGRAM: &str = ".system-diagram.cm";
/// Legacy alias of [`SYSTEM_DIAGRAM`].
const DIAGRAM: &str = ".diagram.cm";

/// The kind of model a document contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFileType {
    Generic,
    Entity,
    Relationship,
    Mapping,
    SystemDiagram,
}

impl ModelFileType {
    /// Classify a document by its file suffix.
    ///
    /// Double suffixes are checked before the generic `.cm` suffix.
    /// Returns `None` for files that are not model files at all.
    pub fn from_uri(uri: &str) -> Option<Self> {
        if uri.ends_with(MAPPING) {
            Some(Self::Mapping)
        } else if uri.ends_with(SYSTEM_DIAGRAM) || uri.ends_with(DIAGRAM) {
            Some(Self::SystemDiagram)
        } else if uri.ends_with(RELATIONSHIP) {
            Some(Self::Relationship)
        } else if uri.ends_with(ENTITY) {
            Some(Self::Entity)
        } else if uri.ends_with(GENERIC) {
            Some(Self::Generic)
        } else {
            None
        }
    }

    /// Classify document content by its top-level keyword.
    ///
    /// Blank lines and `#` comments before the first key are skipped. The
    /// key must match exactly.
    pub fn detect(content: &str) -> Option<Self> {
        let line = content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))?;
        let (keyword, _) = line.split_once(':')?;
        match keyword.trim_end() {
            "entity" => Some(Self::Entity),
            "relationship" => Some(Self::Relationship),
            "systemDiagram" | "diagram" => Some(Self::SystemDiagram),
            "mapping" => Some(Self::Mapping),
            _ => None,
        }
    }

    /// Classify by suffix, falling back to the content keyword when the
    /// suffix is the ambiguous generic one.
    pub fn resolve(uri: &str, content: &str) -> Option<Self> {
        match Self::from_uri(uri)? {
            Self::Generic => Some(Self::detect(content).unwrap_or(Self::Generic)),
            specific => Some(specific),
        }
    }

    /// The canonical file suffix for this type.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Generic => GENERIC,
            Self::Entity => ENTITY,
            Self::Relationship => RELATIONSHIP,
            Self::Mapping => MAPPING,
            Self::SystemDiagram => SYSTEM_DIAGRAM,
        }
    }
}

/// Name of a model file without directory and (possibly double) suffix.
pub fn model_name(uri: &str) -> &str {
    let file = uri.rsplit('/').next().unwrap_or(uri);
    for suffix in [ENTITY, RELATIONSHIP, MAPPING, SYSTEM_DIAGRAM, DIAGRAM] {
        if let Some(stripped) = file.strip_suffix(suffix) {
            return stripped;
        }
    }
    match file.rfind('.') {
        Some(dot) => &file[..dot],
        None => file,
    }
}
