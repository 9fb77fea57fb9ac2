/// Linear undo/redo history of edit snapshots
///
/// The history is the single source of truth for what the renderer shows.
/// Subscribers receive the current snapshot whenever the cursor moves.

use tokio::sync::watch;
use tracing::debug;

use super::edit::EditState;
use crate::color::{Adjustments, FilterId};
use crate::geometry::CropRect;

/// Ordered snapshots plus a cursor. Always holds at least the identity state.
#[derive(Debug)]
pub struct EditHistory {
    states: Vec<EditState>,
    index: usize,
    notifier: watch::Sender<EditState>,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EditHistory {
    /// Start a session at the identity state
    pub fn new() -> Self {
        let initial = EditState::default();
        let (notifier, _) = watch::channel(initial);
        Self {
            states: vec![initial],
            index: 0,
            notifier,
        }
    }

    /// Snapshot at the cursor
    pub fn current(&self) -> EditState {
        self.states[self.index]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.states.len()
    }

    /// Receive the current snapshot on every change
    pub fn subscribe(&self) -> watch::Receiver<EditState> {
        self.notifier.subscribe()
    }

    /// Back to a single identity entry (new image). Subscribers stay attached.
    pub fn reset(&mut self) {
        self.states.clear();
        self.states.push(EditState::default());
        self.index = 0;
        self.notify();
    }

    /// Commit a new crop (natural pixels). Returns false for a no-op.
    pub fn commit_crop(&mut self, crop: Option<CropRect>) -> bool {
        let current = self.current();
        if current.crop == crop {
            return false;
        }
        self.push(current.with_crop(crop));
        true
    }

    /// Commit a new filter. Returns false for a no-op.
    pub fn commit_filter(&mut self, filter: FilterId) -> bool {
        let current = self.current();
        if current.filter == filter {
            return false;
        }
        self.push(current.with_filter(filter));
        true
    }

    /// Commit new tone adjustments. Returns false for a no-op.
    pub fn commit_adjustments(&mut self, adjustments: Adjustments) -> bool {
        let current = self.current();
        if current.adjustments == adjustments {
            return false;
        }
        self.push(current.with_adjustments(adjustments));
        true
    }

    /// Step back. Returns false at the start of history.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.index -= 1;
        self.notify();
        true
    }

    /// Step forward. Returns false at the end of history.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.index += 1;
        self.notify();
        true
    }

    /// Drop the redo branch, then append
    fn push(&mut self, state: EditState) {
        self.states.truncate(self.index + 1);
        self.states.push(state);
        self.index = self.states.len() - 1;
        debug!(index = self.index, len = self.states.len(), "edit committed");
        self.notify();
    }

    fn notify(&self) {
        self.notifier.send_replace(self.current());
    }
}
