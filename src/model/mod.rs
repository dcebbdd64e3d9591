//! Semantic model: the typed tree behind every CrossModel document.
//!
//! The same tree is the canonical state of a model in the synchronization
//! engine, the input of symbol extraction, and (through [`text`]) the source
//! of the textual form shown in text editors.
//!
//! ## Key Types
//!
//! - [`CrossModelRoot`] — document root holding one top-level element
//! - [`NodeKind`] — closed set of node kinds
//! - [`AstNode`] — borrowed, exhaustively matched view of a tree node
//! - [`ModelElement`] — owned, `$type`-tagged copy of a node

mod ast;
mod node;
pub mod text;

pub use ast::{
    AttributeMapping, CrossModelRoot, Entity, EntityAttribute, EntityNode, Mapping, Relationship,
    RelationshipAttribute, RelationshipEdge, SourceObject, SystemDiagram, TargetObject,
};
pub use node::{AstNode, ModelElement, NodeKind};
pub use text::{ModelParser, ParseError, TextFormat};
