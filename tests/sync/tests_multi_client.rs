//! Multi-client update tests.

use std::sync::Arc;

use crossmodel::model::text::{parse, serialize};
use crossmodel::sync::{ModelPayload, Notification, UpdateReason};

use crate::helpers::fixtures::*;
use crate::helpers::sync_helpers::*;

// =============================================================================
// ECHO SUPPRESSION
// =============================================================================

#[tokio::test]
async fn test_update_is_not_echoed_to_its_source() {
    let (engine, _) = fixture_engine();
    let mut text = connect(&engine, "text-editor");
    let mut form = connect(&engine, "form-editor");
    let mut diagram = connect(&engine, "diagram");
    for client in ["text-editor", "form-editor", "diagram"] {
        engine.open(CUSTOMER_URI, client).await.unwrap();
    }

    let mut model = engine.request(CUSTOMER_URI).unwrap();
    model.entity.as_mut().unwrap().description = Some("Buys things".into());
    engine.update(CUSTOMER_URI, "form-editor", model.clone()).await.unwrap();

    assert!(drain(&mut form).is_empty());
    for receiver in [&mut text, &mut diagram] {
        let notifications = drain(receiver);
        let updates = updates(&notifications);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].source_client_id, "form-editor");
        assert_eq!(updates[0].reason, UpdateReason::Updated);
        assert_eq!(updates[0].model, model);
    }
}

#[tokio::test]
async fn test_identical_update_changes_nothing() {
    let (engine, _) = fixture_engine();
    let mut text = connect(&engine, "text-editor");
    connect(&engine, "form-editor");
    engine.open(CUSTOMER_URI, "text-editor").await.unwrap();
    let model = engine.open(CUSTOMER_URI, "form-editor").await.unwrap().unwrap();
    let generation = engine.index().generation();

    let result = engine.update(CUSTOMER_URI, "form-editor", model.clone()).await.unwrap();

    assert_eq!(result, model);
    assert!(drain(&mut text).is_empty());
    assert_eq!(engine.index().generation(), generation);
    // Nothing to undo either.
    assert!(engine.undo(CUSTOMER_URI, "form-editor").await.unwrap().is_none());
}

#[tokio::test]
async fn test_text_payload_is_parsed() {
    let (engine, _) = fixture_engine();
    connect(&engine, "text-editor");
    engine.open(ADDRESS_URI, "text-editor").await.unwrap();

    let text = "entity:\n    id: Address\n    name: Postal address\n";
    let model = engine
        .update(ADDRESS_URI, "text-editor", ModelPayload::Text(text.into()))
        .await
        .unwrap();
    assert_eq!(model.entity.unwrap().name.as_deref(), Some("Postal address"));
}

// =============================================================================
// ORDERING
// =============================================================================

#[tokio::test]
async fn test_sequential_updates_build_on_each_other() {
    let (engine, _) = fixture_engine();
    let mut observer = connect(&engine, "observer");
    connect(&engine, "a");
    connect(&engine, "b");
    for client in ["observer", "a", "b"] {
        engine.open(CUSTOMER_URI, client).await.unwrap();
    }

    let mut first = engine.request(CUSTOMER_URI).unwrap();
    first.entity.as_mut().unwrap().description = Some("first".into());
    engine.update(CUSTOMER_URI, "a", first).await.unwrap();

    // b builds on what a committed.
    let mut second = engine.request(CUSTOMER_URI).unwrap();
    second.entity.as_mut().unwrap().name = Some("Client".into());
    let committed = engine.update(CUSTOMER_URI, "b", second).await.unwrap();

    let entity = committed.entity.unwrap();
    assert_eq!(entity.description.as_deref(), Some("first"));
    assert_eq!(entity.name.as_deref(), Some("Client"));

    let notifications = drain(&mut observer);
    let sources: Vec<&str> = updates(&notifications)
        .iter()
        .map(|u| u.source_client_id.as_str())
        .collect();
    assert_eq!(sources, vec!["a", "b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_are_serialized() {
    let (engine, _) = fixture_engine();
    let mut observer = connect(&engine, "observer");
    engine.open(CUSTOMER_URI, "observer").await.unwrap();

    let mut tasks = Vec::new();
    for n in 0..8 {
        let engine = Arc::clone(&engine);
        let client = format!("client-{n}");
        tasks.push(tokio::spawn(async move {
            let mut model = engine.request(CUSTOMER_URI).unwrap();
            model.entity.as_mut().unwrap().description = Some(client.clone());
            engine.update(CUSTOMER_URI, &client, model).await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // The observer sees every committed state, and the last one is what is
    // committed now.
    let notifications = drain(&mut observer);
    let models: Vec<_> = updates(&notifications).iter().map(|u| u.model.clone()).collect();
    assert_eq!(models.len(), 8);
    assert_eq!(models.last().cloned(), engine.request(CUSTOMER_URI));

    // Each commit was recorded against its predecessor, so undo walks the
    // broadcast states backwards.
    for expected in models.iter().rev().skip(1) {
        let reverted = engine.undo(CUSTOMER_URI, "observer").await.unwrap();
        assert_eq!(reverted.as_ref(), Some(expected));
    }
    let reverted = engine.undo(CUSTOMER_URI, "observer").await.unwrap().unwrap();
    assert_eq!(reverted.entity.unwrap().description, None);
}

// =============================================================================
// ROUND TRIP
// =============================================================================

#[tokio::test]
async fn test_committed_model_survives_text_round_trip() {
    let (engine, _) = fixture_engine();
    connect(&engine, "c");
    for (uri, _) in all_documents() {
        engine.open(uri, "c").await.unwrap();
        let committed = engine.request(uri).unwrap();
        let text = serialize(&committed).unwrap();
        assert_eq!(parse(&text).unwrap(), committed, "round trip of {uri}");
    }
}

// =============================================================================
// UNDO / REDO
// =============================================================================

#[tokio::test]
async fn test_undo_and_redo_notify_other_clients() {
    let (engine, _) = fixture_engine();
    let mut other = connect(&engine, "other");
    connect(&engine, "editor");
    engine.open(ORDER_URI, "other").await.unwrap();
    let original = engine.open(ORDER_URI, "editor").await.unwrap().unwrap();

    let mut changed = original.clone();
    changed.entity.as_mut().unwrap().attributes.clear();
    engine.update(ORDER_URI, "editor", changed.clone()).await.unwrap();

    let undone = engine.undo(ORDER_URI, "editor").await.unwrap();
    assert_eq!(undone.as_ref(), Some(&original));
    let redone = engine.redo(ORDER_URI, "editor").await.unwrap();
    assert_eq!(redone.as_ref(), Some(&changed));
    assert!(engine.redo(ORDER_URI, "editor").await.unwrap().is_none());

    let notifications = drain(&mut other);
    let models: Vec<_> = updates(&notifications).iter().map(|u| u.model.clone()).collect();
    assert_eq!(models, vec![changed.clone(), original, changed]);
    assert!(notifications.iter().all(|n| matches!(n, Notification::Updated(_))));
}
