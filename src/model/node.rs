//! Node kinds and tree traversal.

use serde::{Deserialize, Serialize};

use crate::base::ModelFileType;

use super::ast::{
    AttributeMapping, CrossModelRoot, Entity, EntityAttribute, EntityNode, Mapping, Relationship,
    RelationshipAttribute, RelationshipEdge, SourceObject, SystemDiagram, TargetObject,
};

/// The kind of a node in the semantic tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Entity,
    EntityAttribute,
    Relationship,
    RelationshipAttribute,
    SystemDiagram,
    EntityNode,
    RelationshipEdge,
    Mapping,
    SourceObject,
    TargetObject,
    AttributeMapping,
}

impl NodeKind {
    /// Parse a `$type` name. `Diagram*` names are accepted as legacy aliases.
    pub fn parse(type_name: &str) -> Option<Self> {
        let kind = match type_name {
            "Entity" => Self::Entity,
            "EntityAttribute" => Self::EntityAttribute,
            "Relationship" => Self::Relationship,
            "RelationshipAttribute" => Self::RelationshipAttribute,
            "SystemDiagram" | "Diagram" => Self::SystemDiagram,
            "EntityNode" | "DiagramNode" => Self::EntityNode,
            "RelationshipEdge" | "DiagramEdge" => Self::RelationshipEdge,
            "Mapping" => Self::Mapping,
            "SourceObject" => Self::SourceObject,
            "TargetObject" => Self::TargetObject,
            "AttributeMapping" => Self::AttributeMapping,
            _ => return None,
        };
        Some(kind)
    }

    /// The `$type` name of this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Entity => "Entity",
            Self::EntityAttribute => "EntityAttribute",
            Self::Relationship => "Relationship",
            Self::RelationshipAttribute => "RelationshipAttribute",
            Self::SystemDiagram => "SystemDiagram",
            Self::EntityNode => "EntityNode",
            Self::RelationshipEdge => "RelationshipEdge",
            Self::Mapping => "Mapping",
            Self::SourceObject => "SourceObject",
            Self::TargetObject => "TargetObject",
            Self::AttributeMapping => "AttributeMapping",
        }
    }

    /// The top-level kind a document of `file_type` holds. Generic
    /// documents may hold any.
    pub fn for_file_type(file_type: ModelFileType) -> Option<Self> {
        match file_type {
            ModelFileType::Generic => None,
            ModelFileType::Entity => Some(Self::Entity),
            ModelFileType::Relationship => Some(Self::Relationship),
            ModelFileType::Mapping => Some(Self::Mapping),
            ModelFileType::SystemDiagram => Some(Self::SystemDiagram),
        }
    }

    /// Whether nodes of this kind can be the single top-level element of a document.
    pub fn is_root_element(&self) -> bool {
        matches!(
            self,
            Self::Entity | Self::Relationship | Self::SystemDiagram | Self::Mapping
        )
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

// ============================================================================
// BORROWED VIEW
// ============================================================================

/// A borrowed node of the semantic tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AstNode<'a> {
    Entity(&'a Entity),
    EntityAttribute(&'a EntityAttribute),
    Relationship(&'a Relationship),
    RelationshipAttribute(&'a RelationshipAttribute),
    SystemDiagram(&'a SystemDiagram),
    EntityNode(&'a EntityNode),
    RelationshipEdge(&'a RelationshipEdge),
    Mapping(&'a Mapping),
    SourceObject(&'a SourceObject),
    TargetObject(&'a TargetObject),
    AttributeMapping(&'a AttributeMapping),
}

impl<'a> AstNode<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            AstNode::Entity(_) => NodeKind::Entity,
            AstNode::EntityAttribute(_) => NodeKind::EntityAttribute,
            AstNode::Relationship(_) => NodeKind::Relationship,
            AstNode::RelationshipAttribute(_) => NodeKind::RelationshipAttribute,
            AstNode::SystemDiagram(_) => NodeKind::SystemDiagram,
            AstNode::EntityNode(_) => NodeKind::EntityNode,
            AstNode::RelationshipEdge(_) => NodeKind::RelationshipEdge,
            AstNode::Mapping(_) => NodeKind::Mapping,
            AstNode::SourceObject(_) => NodeKind::SourceObject,
            AstNode::TargetObject(_) => NodeKind::TargetObject,
            AstNode::AttributeMapping(_) => NodeKind::AttributeMapping,
        }
    }

    /// The identifier of this node, if its kind is identifiable.
    pub fn id(&self) -> Option<&'a str> {
        match *self {
            AstNode::Entity(n) => Some(n.id.as_str()),
            AstNode::EntityAttribute(n) => Some(n.id.as_str()),
            AstNode::Relationship(n) => Some(n.id.as_str()),
            AstNode::SystemDiagram(n) => Some(n.id.as_str()),
            AstNode::EntityNode(n) => Some(n.id.as_str()),
            AstNode::RelationshipEdge(n) => Some(n.id.as_str()),
            AstNode::Mapping(n) => Some(n.id.as_str()),
            AstNode::SourceObject(n) => Some(n.id.as_str()),
            AstNode::RelationshipAttribute(_)
            | AstNode::TargetObject(_)
            | AstNode::AttributeMapping(_) => None,
        }
    }

    /// Direct children in document order.
    pub fn children(&self) -> Vec<AstNode<'a>> {
        match *self {
            AstNode::Entity(n) => n.attributes.iter().map(AstNode::EntityAttribute).collect(),
            AstNode::Relationship(n) => n
                .attributes
                .iter()
                .map(AstNode::RelationshipAttribute)
                .collect(),
            AstNode::SystemDiagram(n) => n
                .nodes
                .iter()
                .map(AstNode::EntityNode)
                .chain(n.edges.iter().map(AstNode::RelationshipEdge))
                .collect(),
            AstNode::Mapping(n) => n
                .sources
                .iter()
                .map(AstNode::SourceObject)
                .chain(n.target.iter().map(AstNode::TargetObject))
                .collect(),
            AstNode::TargetObject(n) => n.mappings.iter().map(AstNode::AttributeMapping).collect(),
            AstNode::EntityAttribute(_)
            | AstNode::RelationshipAttribute(_)
            | AstNode::EntityNode(_)
            | AstNode::RelationshipEdge(_)
            | AstNode::SourceObject(_)
            | AstNode::AttributeMapping(_) => Vec::new(),
        }
    }

    /// Find a direct child by kind and id.
    pub fn child(&self, kind: NodeKind, id: &str) -> Option<AstNode<'a>> {
        self.children()
            .into_iter()
            .find(|c| c.kind() == kind && c.id() == Some(id))
    }

    /// Owned copy of this node.
    pub fn to_element(&self) -> ModelElement {
        match *self {
            AstNode::Entity(n) => ModelElement::Entity(n.clone()),
            AstNode::EntityAttribute(n) => ModelElement::EntityAttribute(n.clone()),
            AstNode::Relationship(n) => ModelElement::Relationship(n.clone()),
            AstNode::RelationshipAttribute(n) => ModelElement::RelationshipAttribute(n.clone()),
            AstNode::SystemDiagram(n) => ModelElement::SystemDiagram(n.clone()),
            AstNode::EntityNode(n) => ModelElement::EntityNode(n.clone()),
            AstNode::RelationshipEdge(n) => ModelElement::RelationshipEdge(n.clone()),
            AstNode::Mapping(n) => ModelElement::Mapping(n.clone()),
            AstNode::SourceObject(n) => ModelElement::SourceObject(n.clone()),
            AstNode::TargetObject(n) => ModelElement::TargetObject(n.clone()),
            AstNode::AttributeMapping(n) => ModelElement::AttributeMapping(n.clone()),
        }
    }
}

/// An owned tree node, tagged with its `$type` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ModelElement {
    Entity(Entity),
    EntityAttribute(EntityAttribute),
    Relationship(Relationship),
    RelationshipAttribute(RelationshipAttribute),
    SystemDiagram(SystemDiagram),
    EntityNode(EntityNode),
    RelationshipEdge(RelationshipEdge),
    Mapping(Mapping),
    SourceObject(SourceObject),
    TargetObject(TargetObject),
    AttributeMapping(AttributeMapping),
}

// ============================================================================
// ROOT TRAVERSAL
// ============================================================================

impl CrossModelRoot {
    /// The top-level element of the document, if any.
    pub fn root_node(&self) -> Option<AstNode<'_>> {
        if let Some(entity) = &self.entity {
            return Some(AstNode::Entity(entity));
        }
        if let Some(relationship) = &self.relationship {
            return Some(AstNode::Relationship(relationship));
        }
        if let Some(mapping) = &self.mapping {
            return Some(AstNode::Mapping(mapping));
        }
        self.system_diagram.as_ref().map(AstNode::SystemDiagram)
    }

    /// All nodes in document order (pre-order).
    pub fn walk(&self) -> Vec<AstNode<'_>> {
        let mut out = Vec::new();
        let mut stack: Vec<AstNode<'_>> = self.root_node().into_iter().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children().into_iter().rev());
        }
        out
    }

    /// Find a node by the chain of ids leading to it from the top-level element.
    ///
    /// `["Customer", "email"]` addresses attribute `email` of entity `Customer`.
    pub fn find_by_path(&self, path: &[&str]) -> Option<AstNode<'_>> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root_node().filter(|n| n.id() == Some(*first))?;
        for segment in rest {
            current = current
                .children()
                .into_iter()
                .find(|c| c.id() == Some(*segment))?;
        }
        Some(current)
    }

    pub fn is_empty(&self) -> bool {
        self.root_node().is_none()
    }
}
