//! Update-thread machinery: the double-buffered property store, the
//! event→update message queue, animators and constraints, render tasks, and
//! the per-frame orchestration in [`UpdateManager`].

pub mod animators;
pub mod manager;
pub mod messages;
pub mod notifications;
pub mod property;
pub mod render_task;

pub use animators::{AnimatorTarget, Constraint, PropertyAnimator};
pub use manager::{FrameResult, FrameSubmission, UpdateManager};
pub use messages::{Message, MessageQueue, MessageSender};
pub use notifications::{CompleteNotification, NotificationQueue, NotifierId};
pub use property::AnimatableProperty;
pub use render_task::{
    RenderTask, RenderTaskKey, RenderTaskList, RenderTaskState, Viewport, REFRESH_ALWAYS,
    REFRESH_ONCE,
};
