//! Save and load tests.

use std::sync::Arc;

use crossmodel::sync::{FailOn, ModelStatus, ModelSyncEngine, Notification, SyncError, UpdateReason};

use crate::helpers::fixtures::*;
use crate::helpers::sync_helpers::*;
use crate::helpers::workspace_helpers::index_with_packages;

#[tokio::test]
async fn test_save_persists_and_notifies_everyone() {
    let (engine, persistence) = fixture_engine();
    let mut editor = connect(&engine, "editor");
    let mut viewer = connect(&engine, "viewer");
    engine.open(ADDRESS_URI, "editor").await.unwrap();
    let mut model = engine.open(ADDRESS_URI, "viewer").await.unwrap().unwrap();

    model.entity.as_mut().unwrap().description = Some("Where customers live".into());
    engine.save(ADDRESS_URI, "editor", model.clone()).await.unwrap();

    assert_eq!(persistence.save_count(), 1);
    assert!(persistence.get(ADDRESS_URI).unwrap().contains("Where customers live"));
    assert_eq!(engine.request(ADDRESS_URI), Some(model.clone()));

    // The saving client gets the save event only.
    let saved = drain(&mut editor);
    assert!(matches!(saved.as_slice(), [Notification::Saved(event)] if event.model == model));
    let seen = drain(&mut viewer);
    assert_eq!(seen.len(), 2);
    assert!(matches!(&seen[0], Notification::Updated(e) if e.reason == UpdateReason::Updated));
    assert!(matches!(&seen[1], Notification::Saved(e) if e.source_client_id == "editor"));
}

#[tokio::test]
async fn test_failed_save_leaves_model_untouched() {
    let (engine, persistence) = fixture_engine();
    let mut viewer = connect(&engine, "viewer");
    connect(&engine, "editor");
    engine.open(ADDRESS_URI, "viewer").await.unwrap();
    let original = engine.open(ADDRESS_URI, "editor").await.unwrap().unwrap();

    persistence.fail_on(Some(FailOn::Save));
    let mut model = original.clone();
    model.entity.as_mut().unwrap().name = Some("Location".into());
    let result = engine.save(ADDRESS_URI, "editor", model).await;

    assert!(matches!(result, Err(SyncError::PersistenceFailure(_))));
    assert_eq!(engine.request(ADDRESS_URI), Some(original));
    assert_eq!(persistence.get(ADDRESS_URI).as_deref(), Some(ADDRESS));
    assert!(drain(&mut viewer).is_empty());
    assert_eq!(engine.status(ADDRESS_URI), Some(ModelStatus::Loaded));
}

#[tokio::test]
async fn test_failed_load_reports_error_and_keeps_nothing_open() {
    let (engine, persistence) = fixture_engine();
    persistence.fail_on(Some(FailOn::Load));

    let result = engine.open(CUSTOMER_URI, "c").await;
    assert!(matches!(result, Err(SyncError::PersistenceFailure(_))));
    assert!(engine.open_models().is_empty());
    assert!(engine.status(CUSTOMER_URI).is_none());
}

#[tokio::test]
async fn test_unknown_documents() {
    let engine = ModelSyncEngine::new(index_with_packages(), Arc::new(fixture_persistence()));

    assert!(engine.open("file:///ws/p1/Missing.entity.cm", "c").await.unwrap().is_none());
    assert!(engine.request("file:///ws/p1/Missing.entity.cm").is_none());
    let result = engine
        .update("file:///ws/p1/Missing.entity.cm", "c", crossmodel::model::CrossModelRoot::default())
        .await;
    assert!(matches!(result, Err(SyncError::NotFound(_))));
}

#[tokio::test]
async fn test_last_close_reverts_index_to_persisted_content() {
    let (engine, _) = fixture_engine();
    connect(&engine, "a");
    connect(&engine, "b");
    engine.open(CUSTOMER_URI, "a").await.unwrap();
    let mut model = engine.open(CUSTOMER_URI, "b").await.unwrap().unwrap();
    model.entity.as_mut().unwrap().id = "Client".into();
    engine.update(CUSTOMER_URI, "a", model).await.unwrap();
    assert!(engine.index().lookup("p1.Client").is_some());

    engine.close(CUSTOMER_URI, "a").await;
    assert_eq!(engine.subscribers(CUSTOMER_URI).len(), 1);
    assert!(engine.index().lookup("p1.Client").is_some());

    engine.disconnect("b").await;
    assert!(engine.open_models().is_empty());
    assert!(engine.index().lookup("p1.Client").is_none());
    assert!(engine.index().lookup("p1.Customer").is_some());
}
