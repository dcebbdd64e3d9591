//! Reference contexts: "what can I point to from here".

use serde::{Deserialize, Serialize};

use crate::model::{CrossModelRoot, ModelElement, NodeKind};

/// Where a reference is being made from.
///
/// Untagged on the wire; variants are tried in declaration order, so a
/// `{uri, type}` object is a synthetic document and a bare `{uri}` is a
/// root reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrossReferenceContainer {
    /// A document that does not exist yet, such as one being created in a form.
    SyntheticDocument {
        uri: String,
        #[serde(rename = "type")]
        type_name: String,
    },
    /// An element addressed by its qualified name.
    GlobalElementReference {
        #[serde(rename = "globalId")]
        global_id: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        type_name: Option<String>,
    },
    /// The top-level element of an indexed document.
    RootElementReference { uri: String },
}

/// A not yet persisted element between the container and the property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticElement {
    #[serde(rename = "type")]
    pub type_name: String,
    pub property: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferenceContext {
    pub container: CrossReferenceContainer,
    #[serde(default)]
    pub synthetic_elements: Vec<SyntheticElement>,
    pub property: String,
}

impl CrossReferenceContext {
    pub fn new(container: CrossReferenceContainer, property: impl Into<String>) -> Self {
        Self {
            container,
            synthetic_elements: Vec::new(),
            property: property.into(),
        }
    }

    pub fn with_synthetic(mut self, type_name: impl Into<String>, property: impl Into<String>) -> Self {
        self.synthetic_elements.push(SyntheticElement {
            type_name: type_name.into(),
            property: property.into(),
        });
        self
    }
}

/// A reference to resolve: the context plus the referencing text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    pub container: CrossReferenceContainer,
    pub property: String,
    pub value: String,
}

impl CrossReference {
    pub fn context(&self) -> CrossReferenceContext {
        CrossReferenceContext::new(self.container.clone(), self.property.clone())
    }
}

/// One entry of a scope: an element and the label it is reachable under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceableElement {
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
}

/// The target of a resolved reference together with its document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedElement {
    pub uri: String,
    pub model: CrossModelRoot,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<ModelElement>,
}

/// The element kind a property of `source` refers to.
pub fn reference_target(source: NodeKind, property: &str) -> Option<NodeKind> {
    let target = match (source, property) {
        (NodeKind::Relationship, "parent" | "child") => NodeKind::Entity,
        (NodeKind::RelationshipAttribute, "parent" | "child") => NodeKind::EntityAttribute,
        (NodeKind::EntityNode, "entity") => NodeKind::Entity,
        (NodeKind::RelationshipEdge, "relationship") => NodeKind::Relationship,
        (NodeKind::SourceObject | NodeKind::TargetObject, "entity") => NodeKind::Entity,
        (NodeKind::AttributeMapping, "attribute") => NodeKind::EntityAttribute,
        _ => return None,
    };
    Some(target)
}

/// The kind of element `property` of `parent` contains.
pub fn containment_child(parent: NodeKind, property: &str) -> Option<NodeKind> {
    let child = match (parent, property) {
        (NodeKind::Entity, "attributes") => NodeKind::EntityAttribute,
        (NodeKind::Relationship, "attributes") => NodeKind::RelationshipAttribute,
        (NodeKind::SystemDiagram, "nodes") => NodeKind::EntityNode,
        (NodeKind::SystemDiagram, "edges") => NodeKind::RelationshipEdge,
        (NodeKind::Mapping, "sources") => NodeKind::SourceObject,
        (NodeKind::Mapping, "target") => NodeKind::TargetObject,
        (NodeKind::TargetObject, "mappings") => NodeKind::AttributeMapping,
        _ => return None,
    };
    Some(child)
}
