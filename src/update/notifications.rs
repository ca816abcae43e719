//! Completion notifications flowing from the update thread back to the
//! event thread.
//!
//! Notifications are keyed by an opaque [`NotifierId`] rather than a live
//! object reference: the event side looks the recipient up by id and
//! silently skips ids whose object was destroyed between notify-request and
//! delivery. The batch for a frame becomes visible only after that frame's
//! update work completes, so the event thread never observes a "finished"
//! signal for state it cannot yet see in committed properties.

use parking_lot::Mutex;

/// Opaque per-object notification key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifierId(pub u32);

/// A completed operation reported to the event thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteNotification {
    AnimationFinished(NotifierId),
    RenderTaskFinished(NotifierId),
}

/// Queue shared between the update thread (producer) and the event thread
/// (consumer). The update thread collects a frame's notifications locally
/// and publishes them in one batch via [`update_completed`].
///
/// [`update_completed`]: NotificationQueue::update_completed
#[derive(Default)]
pub struct NotificationQueue {
    pending: Mutex<Vec<CompleteNotification>>,
}

impl NotificationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a frame's batch. Called once per frame by the update
    /// manager after all update work is done.
    pub fn update_completed(&self, batch: &mut Vec<CompleteNotification>) {
        if batch.is_empty() {
            return;
        }
        self.pending.lock().append(batch);
    }

    /// Drains everything published so far. Called by the event thread.
    #[must_use]
    pub fn take_batch(&self) -> Vec<CompleteNotification> {
        std::mem::take(&mut *self.pending.lock())
    }
}
