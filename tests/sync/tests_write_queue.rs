//! Writes queued behind an in-flight write, and closes racing with writes.

use std::sync::Arc;

use crossmodel::sync::{FailOn, ModelStatus, Notification, UpdateReason};

use crate::helpers::fixtures::*;
use crate::helpers::sync_helpers::*;

// =============================================================================
// QUEUEING
// =============================================================================

#[tokio::test]
async fn test_queued_update_applies_on_the_saved_model() {
    let (engine, persistence) = gated_engine();
    let mut observer = connect(&engine, "observer");
    connect(&engine, "a");
    connect(&engine, "b");
    for client in ["observer", "a", "b"] {
        engine.open(CUSTOMER_URI, client).await.unwrap();
    }
    let original = engine.request(CUSTOMER_URI).unwrap();

    let mut saved = original.clone();
    saved.entity.as_mut().unwrap().description = Some("saved".into());
    persistence.hold(FailOn::Save);
    let saving = {
        let engine = Arc::clone(&engine);
        let saved = saved.clone();
        tokio::spawn(async move { engine.save(CUSTOMER_URI, "a", saved).await })
    };
    persistence.blocked().await;

    // b edits what it last saw, before the save lands.
    let mut renamed = original.clone();
    renamed.entity.as_mut().unwrap().name = Some("Client".into());
    let updating = {
        let engine = Arc::clone(&engine);
        let renamed = renamed.clone();
        tokio::spawn(async move { engine.update(CUSTOMER_URI, "b", renamed).await })
    };
    settle().await;
    assert_eq!(engine.status(CUSTOMER_URI), Some(ModelStatus::Updating));
    assert_eq!(engine.request(CUSTOMER_URI), Some(original.clone()));

    persistence.release();
    saving.await.unwrap().unwrap();
    assert_eq!(updating.await.unwrap().unwrap(), renamed);

    // The update was recorded against the saved model: undoing it restores
    // the save, and one more undo restores the original.
    assert_eq!(engine.undo(CUSTOMER_URI, "b").await.unwrap(), Some(saved.clone()));
    assert_eq!(engine.undo(CUSTOMER_URI, "b").await.unwrap(), Some(original));

    let notifications = drain(&mut observer);
    let sequence: Vec<(&str, &str)> = notifications
        .iter()
        .take(3)
        .map(|n| match n {
            Notification::Updated(event) => ("updated", event.source_client_id.as_str()),
            Notification::Saved(event) => ("saved", event.source_client_id.as_str()),
            other => panic!("unexpected notification {other:?}"),
        })
        .collect();
    assert_eq!(sequence, vec![("updated", "a"), ("saved", "a"), ("updated", "b")]);
    let models: Vec<_> = updates(&notifications).iter().map(|u| u.model.clone()).collect();
    assert_eq!(models[..2], [saved, renamed]);
}

#[tokio::test]
async fn test_queued_writes_commit_in_arrival_order() {
    let (engine, persistence) = gated_engine();
    let mut observer = connect(&engine, "observer");
    engine.open(ORDER_URI, "observer").await.unwrap();
    let original = engine.request(ORDER_URI).unwrap();

    persistence.hold(FailOn::Save);
    let saving = {
        let engine = Arc::clone(&engine);
        let model = original.clone();
        tokio::spawn(async move { engine.save(ORDER_URI, "saver", model).await })
    };
    persistence.blocked().await;

    let mut queued = Vec::new();
    for n in 0..4 {
        let engine = Arc::clone(&engine);
        let mut model = original.clone();
        model.entity.as_mut().unwrap().description = Some(format!("edit-{n}"));
        queued.push(tokio::spawn(async move {
            engine.update(ORDER_URI, &format!("client-{n}"), model).await
        }));
        // Each writer is waiting before the next one arrives.
        settle().await;
    }

    persistence.release();
    saving.await.unwrap().unwrap();
    for task in queued {
        task.await.unwrap().unwrap();
    }

    let notifications = drain(&mut observer);
    let sources: Vec<&str> = updates(&notifications)
        .iter()
        .filter(|u| u.reason == UpdateReason::Updated)
        .map(|u| u.source_client_id.as_str())
        .collect();
    assert_eq!(sources, vec!["client-0", "client-1", "client-2", "client-3"]);
    let committed = engine.request(ORDER_URI).unwrap();
    assert_eq!(committed.entity.unwrap().description.as_deref(), Some("edit-3"));
}

// =============================================================================
// CLOSING DURING WRITES
// =============================================================================

#[tokio::test]
async fn test_close_during_save_evicts_once_the_save_lands() {
    let (engine, persistence) = gated_engine();
    let mut model = engine.open(CUSTOMER_URI, "a").await.unwrap().unwrap();
    model.entity.as_mut().unwrap().id = "Client".into();

    persistence.hold(FailOn::Save);
    let saving = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.save(CUSTOMER_URI, "a", model).await })
    };
    persistence.blocked().await;

    engine.close(CUSTOMER_URI, "a").await;
    assert!(engine.subscribers(CUSTOMER_URI).is_empty());
    assert_eq!(engine.open_models(), vec![Arc::<str>::from(CUSTOMER_URI)]);

    persistence.release();
    saving.await.unwrap().unwrap();

    assert!(engine.open_models().is_empty());
    assert!(engine.status(CUSTOMER_URI).is_none());
    assert!(persistence.memory().get(CUSTOMER_URI).unwrap().contains("Client"));
    assert!(engine.index().lookup("p1.Client").is_some());
    assert!(engine.index().lookup("p1.Customer").is_none());
}

#[tokio::test]
async fn test_disconnect_during_queued_update_evicts_afterwards() {
    let (engine, persistence) = gated_engine();
    connect(&engine, "a");
    let model = engine.open(ADDRESS_URI, "a").await.unwrap().unwrap();

    persistence.hold(FailOn::Save);
    let saving = {
        let engine = Arc::clone(&engine);
        let model = model.clone();
        tokio::spawn(async move { engine.save(ADDRESS_URI, "a", model).await })
    };
    persistence.blocked().await;
    let mut renamed = model.clone();
    renamed.entity.as_mut().unwrap().name = Some("Postal address".into());
    let updating = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.update(ADDRESS_URI, "a", renamed).await })
    };
    settle().await;

    engine.disconnect("a").await;
    assert!(!engine.open_models().is_empty());

    persistence.release();
    saving.await.unwrap().unwrap();
    updating.await.unwrap().unwrap();

    // The unsaved rename is gone with the model.
    assert!(engine.open_models().is_empty());
    let document = engine.index().document(ADDRESS_URI).unwrap();
    assert_eq!(document.root().entity.as_ref().unwrap().name, None);
}

#[tokio::test]
async fn test_reopen_during_close_keeps_the_newer_index() {
    let (engine, persistence) = gated_engine();
    engine.open(CUSTOMER_URI, "a").await.unwrap();

    persistence.hold(FailOn::Load);
    let closing = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.close(CUSTOMER_URI, "a").await })
    };
    // Evicted, and reloading the persisted text.
    persistence.blocked().await;
    assert!(engine.open_models().is_empty());

    let mut model = engine.open(CUSTOMER_URI, "b").await.unwrap().unwrap();
    model.entity.as_mut().unwrap().id = "Renamed".into();
    engine.update(CUSTOMER_URI, "b", model).await.unwrap();

    persistence.release();
    closing.await.unwrap();

    assert_eq!(engine.request(CUSTOMER_URI).unwrap().entity.unwrap().id, "Renamed");
    assert!(engine.index().lookup("p1.Renamed").is_some());
    assert!(engine.index().lookup("p1.Customer").is_none());
}
