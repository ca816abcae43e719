//! Event → Update Message Queue
//!
//! The event thread never touches scene-graph memory directly; it enqueues
//! typed messages that the update thread applies at a defined point of the
//! frame, in FIFO order, before animations and constraints run. A property
//! set through a message is therefore visible to constraints evaluated
//! later in the same frame.
//!
//! Messages are a tagged enum over a bounded channel — deferred typed calls
//! without locks or hand-rolled placement queues.

use glam::{Vec3, Vec4};

use crate::errors::{Result, StageError};
use crate::render::RenderTargetId;
use crate::scene::{ClippingBox, DrawMode, NodeKey};
use crate::update::animators::{Constraint, PropertyAnimator};
use crate::update::render_task::{RenderTaskKey, Viewport};

/// Capacity of the event→update channel. Producers block when the update
/// thread falls this far behind.
const MESSAGE_QUEUE_CAPACITY: usize = 1024;

/// A deferred mutation applied by the update thread.
pub enum Message {
    // === Node properties (baked into the frame's buffer) ===
    BakeNodePosition { node: NodeKey, value: Vec3 },
    BakeNodeSize { node: NodeKey, value: Vec3 },
    BakeNodeColor { node: NodeKey, value: Vec4 },
    SetNodeVisible { node: NodeKey, visible: bool },
    SetSiblingOrder { node: NodeKey, order: u32 },
    SetDrawMode { node: NodeKey, mode: DrawMode },
    RemoveNode { node: NodeKey },

    // === Animators & constraints ===
    AddAnimator(PropertyAnimator),
    AddConstraint(Constraint),

    // === Render task configuration ===
    SetRefreshRate { task: RenderTaskKey, rate: u32 },
    SetSourceNode { task: RenderTaskKey, source: Option<NodeKey> },
    SetCamera { task: RenderTaskKey, camera: Option<NodeKey> },
    SetExclusive { task: RenderTaskKey, exclusive: bool },
    SetClearColor { task: RenderTaskKey, color: Vec4 },
    SetClearEnabled { task: RenderTaskKey, enabled: bool },
    SetCullMode { task: RenderTaskKey, cull: bool },
    SetViewport { task: RenderTaskKey, viewport: Option<Viewport> },
    SetFrameBuffer { task: RenderTaskKey, target: Option<RenderTargetId> },

    // === Layer configuration ===
    SetLayerClipping { node: NodeKey, enabled: bool, clipping_box: ClippingBox },

    // === Structure ===
    RequestDepthTreeRebuild,
}

/// Event-side handle for enqueueing messages. Cheap to clone.
#[derive(Clone)]
pub struct MessageSender {
    tx: flume::Sender<Message>,
}

impl MessageSender {
    /// Enqueues a message, blocking if the queue is full.
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| StageError::UpdateThreadDisconnected)
    }
}

/// Update-side receiver, drained once per frame.
pub struct MessageQueue {
    tx: flume::Sender<Message>,
    rx: flume::Receiver<Message>,
}

impl MessageQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(MESSAGE_QUEUE_CAPACITY);
        Self { tx, rx }
    }

    /// Creates an event-side sender.
    #[must_use]
    pub fn sender(&self) -> MessageSender {
        MessageSender {
            tx: self.tx.clone(),
        }
    }

    /// Drains all queued messages in FIFO order.
    pub fn drain(&self) -> impl Iterator<Item = Message> + '_ {
        self.rx.try_iter()
    }

    /// True if a queued message modifies scene structure and therefore
    /// requires an update even when nothing is animating.
    #[must_use]
    pub fn is_scene_update_required(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = MessageQueue::new();
        let sender = queue.sender();
        sender
            .send(Message::SetNodeVisible {
                node: NodeKey::default(),
                visible: false,
            })
            .unwrap();
        sender.send(Message::RequestDepthTreeRebuild).unwrap();

        let drained: Vec<Message> = queue.drain().collect();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Message::SetNodeVisible { .. }));
        assert!(matches!(drained[1], Message::RequestDepthTreeRebuild));
    }
}
