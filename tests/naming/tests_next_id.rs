//! Next free id tests.

use crossmodel::model::NodeKind;
use crossmodel::naming::{PackageScope, find_next_id};

use crate::helpers::fixtures::*;
use crate::helpers::workspace_helpers::*;

#[test]
fn test_next_node_id_fills_the_gap() {
    let index = fixture_workspace();
    let document = index.document(DIAGRAM_URI).expect("diagram should be indexed");
    let diagram = document.root().root_node().expect("diagram has a root");

    assert_eq!(find_next_id(NodeKind::EntityNode, "nodeA", &diagram), "nodeA3");
    assert_eq!(find_next_id(NodeKind::EntityNode, "nodeB", &diagram), "nodeB");
}

#[test]
fn test_next_attribute_id_within_entity() {
    let index = fixture_workspace();
    let document = index.document(CUSTOMER_URI).unwrap();
    let entity = document.root().root_node().unwrap();

    assert_eq!(find_next_id(NodeKind::EntityAttribute, "email", &entity), "email1");
    assert_eq!(find_next_id(NodeKind::EntityAttribute, "phone", &entity), "phone");
}

#[test]
fn test_next_entity_id_is_per_package() {
    let index = fixture_workspace();

    let p1 = PackageScope::for_uri(&index, "file:///ws/p1/New.entity.cm");
    assert_eq!(find_next_id(NodeKind::Entity, "Customer", &p1), "Customer1");
    assert_eq!(find_next_id(NodeKind::Entity, "Order", &p1), "Order");

    let p2 = PackageScope::new(&index, "p2");
    assert_eq!(find_next_id(NodeKind::Entity, "Order", &p2), "Order1");
    assert_eq!(find_next_id(NodeKind::Entity, "Customer", &p2), "Customer");
}
