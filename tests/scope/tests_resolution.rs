//! Reference resolution tests.

use crossmodel::model::{ModelElement, NodeKind};
use crossmodel::scope::{CrossReference, CrossReferenceContainer, ScopeResolver};

use crate::helpers::fixtures::*;
use crate::helpers::workspace_helpers::*;

fn reference(uri: &str, property: &str, value: &str) -> CrossReference {
    CrossReference {
        container: CrossReferenceContainer::RootElementReference { uri: uri.to_string() },
        property: property.to_string(),
        value: value.to_string(),
    }
}

#[test]
fn test_resolve_local_name() {
    let resolver = ScopeResolver::new(fixture_workspace());
    let resolved = resolver
        .resolve_reference(&reference(LIVES_AT_URI, "parent", "Customer"))
        .expect("Customer should resolve");

    assert_eq!(resolved.uri, CUSTOMER_URI);
    assert_eq!(resolved.model.entity.as_ref().map(|e| e.id.as_str()), Some("Customer"));
    assert!(matches!(resolved.matched, Some(ModelElement::Entity(ref e)) if e.id == "Customer"));
}

#[test]
fn test_resolve_qualified_name_across_packages() {
    let resolver = ScopeResolver::new(fixture_workspace());
    let resolved = resolver
        .resolve_reference(&reference(PLACES_URI, "parent", "p1.Customer"))
        .expect("p1.Customer should resolve");
    assert_eq!(resolved.uri, CUSTOMER_URI);

    // The unqualified name is not visible from p2.
    assert!(resolver.resolve_reference(&reference(PLACES_URI, "parent", "Customer")).is_none());
}

#[test]
fn test_nested_element_resolves_by_qualified_name_from_anywhere() {
    let resolver = ScopeResolver::new(fixture_workspace());
    let reference = CrossReference {
        container: CrossReferenceContainer::GlobalElementReference {
            global_id: "p2.Places".to_string(),
            type_name: Some(NodeKind::RelationshipAttribute.type_name().to_string()),
        },
        property: "parent".to_string(),
        value: "p1.Customer.email".to_string(),
    };

    let resolved = resolver.resolve_reference(&reference).expect("should resolve");
    assert_eq!(resolved.uri, CUSTOMER_URI);
    assert!(matches!(
        resolved.matched,
        Some(ModelElement::EntityAttribute(ref a)) if a.id == "email"
    ));
}

#[test]
fn test_resolve_rejects_wrong_kind() {
    let resolver = ScopeResolver::new(fixture_workspace());
    // An entity reference cannot link to an attribute, even fully qualified.
    assert!(resolver
        .resolve_reference(&reference(LIVES_AT_URI, "parent", "p1.Customer.email"))
        .is_none());
}

#[test]
fn test_resolution_follows_reindexing() {
    let index = fixture_workspace();
    let resolver = ScopeResolver::new(index.clone());
    assert!(resolver.resolve_reference(&reference(LIVES_AT_URI, "child", "Address")).is_some());

    index.remove_document(ADDRESS_URI);
    assert!(resolver.resolve_reference(&reference(LIVES_AT_URI, "child", "Address")).is_none());
}
