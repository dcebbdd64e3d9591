//! Changes made outside the engine.

use crossmodel::sync::{Notification, UpdateReason};

use crate::helpers::fixtures::*;
use crate::helpers::sync_helpers::*;

#[tokio::test]
async fn test_external_change_reaches_every_subscriber() {
    let (engine, _) = fixture_engine();
    let mut a = connect(&engine, "a");
    let mut b = connect(&engine, "b");
    engine.open(ORDER_URI, "a").await.unwrap();
    engine.open(ORDER_URI, "b").await.unwrap();

    let text = "entity:\n    id: Order\n    name: Purchase order\n";
    assert!(engine.external_change(ORDER_URI, text).await.unwrap());

    for receiver in [&mut a, &mut b] {
        let notifications = drain(receiver);
        let updates = updates(&notifications);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].reason, UpdateReason::Changed);
        assert_eq!(updates[0].source_client_id, "");
    }
    assert!(engine.index().lookup("p2.Order.total").is_none());
}

#[tokio::test]
async fn test_unparsable_external_change_is_skipped() {
    let (engine, _) = fixture_engine();
    let mut a = connect(&engine, "a");
    let before = engine.open(ORDER_URI, "a").await.unwrap();

    assert!(engine.external_change(ORDER_URI, "entity: [unclosed").await.is_err());
    assert_eq!(engine.request(ORDER_URI), before);
    assert!(drain(&mut a).is_empty());

    // The next valid change still applies.
    assert!(engine
        .external_change(ORDER_URI, "entity:\n    id: Order\n")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_external_change_of_unopened_document_only_reindexes() {
    let (engine, _) = fixture_engine();
    let changed = engine
        .external_change(ADDRESS_URI, "entity:\n    id: Residence\n")
        .await
        .unwrap();

    assert!(!changed);
    assert!(engine.open_models().is_empty());
    assert!(engine.index().lookup("p1.Residence").is_some());
}

#[tokio::test]
async fn test_external_delete() {
    let (engine, _) = fixture_engine();
    let mut a = connect(&engine, "a");
    engine.open(LIVES_AT_URI, "a").await.unwrap();
    assert!(engine.index().lookup("p1.LivesAt").is_some());

    assert!(engine.external_delete(LIVES_AT_URI).await);

    let notifications = drain(&mut a);
    assert!(matches!(
        notifications.as_slice(),
        [Notification::Updated(event)] if event.reason == UpdateReason::Deleted
    ));
    assert!(engine.index().lookup("p1.LivesAt").is_none());
    assert!(engine.status(LIVES_AT_URI).is_none());
    assert!(!engine.external_delete(LIVES_AT_URI).await);
}
