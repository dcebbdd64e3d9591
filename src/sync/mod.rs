//! Multi-client model synchronization.
//!
//! [`ModelSyncEngine`] owns the committed state of every open model. Changes
//! arrive as whole proposed models, are turned into a [`Patch`] by [`diff()`],
//! executed on the model's [`CommandStack`] and broadcast to the other
//! subscribers as [`Notification`]s.

mod command_stack;
mod diff;
mod engine;
mod error;
mod event;
mod persistence;

pub use command_stack::{CommandStack, DEFAULT_UNDO_LIMIT};
pub use diff::{Operation, Patch, PatchError, apply, diff};
pub use engine::{ModelPayload, ModelStatus, ModelSyncEngine, NotificationSink};
pub use error::{SyncError, SyncResult};
pub use event::{
    EXTERNAL_SOURCE, ModelSavedEvent, ModelUpdatedEvent, Notification, ON_SAVE,
    ON_SYSTEMS_UPDATED, ON_UPDATED, SystemUpdateReason, SystemUpdatedEvent, UpdateReason,
};
pub use persistence::{FailOn, MemoryPersistence, ModelPersistence, PersistenceError};
