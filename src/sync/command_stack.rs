//! Per-model undo/redo history.

use std::collections::VecDeque;

use serde_json::Value;

use super::diff::{Patch, PatchError};

/// Default number of patches kept for undo.
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// History of executed patches.
///
/// Every transition is transactional: the patch is applied to a copy of the
/// state, the caller's `accept` step validates and commits the result, and
/// only then does the history move. A failing `accept` leaves the stack as
/// it was.
#[derive(Debug, Clone)]
pub struct CommandStack {
    undo: VecDeque<Patch>,
    redo: Vec<Patch>,
    limit: usize,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl CommandStack {
    /// A stack keeping at most `limit` patches. `0` disables history.
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Apply `patch` to `state` and record it. Clears the redo history.
    pub fn execute<T, E>(
        &mut self,
        state: &Value,
        patch: Patch,
        accept: impl FnOnce(Value) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<PatchError>,
    {
        let next = patch.apply(state)?;
        let out = accept(next)?;
        self.redo.clear();
        self.undo.push_back(patch);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        Ok(out)
    }

    /// Revert the most recent patch. `Ok(None)` when there is nothing to undo.
    pub fn undo<T, E>(
        &mut self,
        state: &Value,
        accept: impl FnOnce(Value) -> Result<T, E>,
    ) -> Result<Option<T>, E>
    where
        E: From<PatchError>,
    {
        let Some(patch) = self.undo.back() else {
            return Ok(None);
        };
        let previous = patch.inverted().apply(state)?;
        let out = accept(previous)?;
        if let Some(patch) = self.undo.pop_back() {
            self.redo.push(patch);
        }
        Ok(Some(out))
    }

    /// Re-apply the most recently undone patch.
    pub fn redo<T, E>(
        &mut self,
        state: &Value,
        accept: impl FnOnce(Value) -> Result<T, E>,
    ) -> Result<Option<T>, E>
    where
        E: From<PatchError>,
    {
        let Some(patch) = self.redo.last() else {
            return Ok(None);
        };
        let next = patch.apply(state)?;
        let out = accept(next)?;
        if let Some(patch) = self.redo.pop() {
            self.undo.push_back(patch);
        }
        Ok(Some(out))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }
}
