//! Notifications pushed to subscribed clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::SystemInfo;
use crate::model::CrossModelRoot;

pub const ON_UPDATED: &str = "server/onUpdated";
pub const ON_SAVE: &str = "server/onSave";
pub const ON_SYSTEMS_UPDATED: &str = "server/onSystemsUpdated";

/// Client id reported for changes that did not come from a client.
pub const EXTERNAL_SOURCE: &str = "";

/// Why a model changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateReason {
    /// Changed outside the engine, e.g. the file was edited on disk.
    Changed,
    /// The underlying document was deleted.
    Deleted,
    /// A client committed an update, undo or redo.
    Updated,
    Saved,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUpdatedEvent {
    pub uri: String,
    pub model: CrossModelRoot,
    pub source_client_id: String,
    pub reason: UpdateReason,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSavedEvent {
    pub uri: String,
    pub model: CrossModelRoot,
    pub source_client_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemUpdateReason {
    Added,
    Removed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemUpdatedEvent {
    pub system: SystemInfo,
    pub reason: SystemUpdateReason,
}

/// A server-to-client notification.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    Updated(ModelUpdatedEvent),
    Saved(ModelSavedEvent),
    SystemUpdated(SystemUpdatedEvent),
}

impl Notification {
    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            Notification::Updated(_) => ON_UPDATED,
            Notification::Saved(_) => ON_SAVE,
            Notification::SystemUpdated(_) => ON_SYSTEMS_UPDATED,
        }
    }

    pub fn params(&self) -> serde_json::Result<Value> {
        match self {
            Notification::Updated(event) => serde_json::to_value(event),
            Notification::Saved(event) => serde_json::to_value(event),
            Notification::SystemUpdated(event) => serde_json::to_value(event),
        }
    }
}
