//! Render tasks couple a source subtree, a camera and an optional offscreen
//! target into one render instruction per qualifying frame.
//!
//! A task's lifecycle is a small state machine driven by its refresh rate:
//! continuous tasks fire every N frames; refresh-once tasks fire exactly
//! once and then raise a finished notification. The [`RenderTaskList`] owns
//! ordering (the overlay task is pinned last) and exclusive-source
//! bookkeeping.

use glam::Vec4;
use slotmap::SlotMap;

use crate::render::RenderTargetId;
use crate::scene::NodeKey;
use crate::update::notifications::NotifierId;

slotmap::new_key_type! {
    /// Generation-checked handle to a [`RenderTask`].
    pub struct RenderTaskKey;
}

/// Refresh rate: produce one instruction, then stop.
pub const REFRESH_ONCE: u32 = 0;
/// Refresh rate: produce an instruction every frame.
pub const REFRESH_ALWAYS: u32 = 1;

/// Pixel viewport for a task's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Render task scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTaskState {
    /// `refresh_rate > 0`: render every N frames.
    RenderContinuously,
    /// `refresh_rate == REFRESH_ONCE`, instruction not yet produced.
    RenderOnceWaitingForResources,
    /// Refresh-once task has produced its instruction.
    RenderedOnce,
    /// Refresh-once task rendered and its notification was raised.
    RenderedOnceAndNotified,
}

/// One camera/source/target configuration producing render instructions.
pub struct RenderTask {
    pub(crate) source: Option<NodeKey>,
    pub(crate) camera: Option<NodeKey>,
    pub(crate) target: Option<RenderTargetId>,

    pub(crate) exclusive: bool,
    pub(crate) cull: bool,
    pub(crate) clear_color: Vec4,
    pub(crate) clear_enabled: bool,
    pub(crate) viewport: Option<Viewport>,

    /// Sort key within the task list. The overlay task uses `i32::MAX`.
    pub(crate) order: i32,

    refresh_rate: u32,
    frame_counter: u32,
    state: RenderTaskState,
    waiting_to_render: bool,
    notify_trigger: bool,
    rendered_once_counter: u32,

    pub(crate) notifier: NotifierId,
}

impl RenderTask {
    fn new(source: Option<NodeKey>, camera: Option<NodeKey>, notifier: NotifierId) -> Self {
        Self {
            source,
            camera,
            target: None,
            exclusive: false,
            cull: true,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            clear_enabled: false,
            viewport: None,
            order: 0,
            refresh_rate: REFRESH_ALWAYS,
            frame_counter: 0,
            state: RenderTaskState::RenderContinuously,
            waiting_to_render: false,
            notify_trigger: false,
            rendered_once_counter: 0,
            notifier,
        }
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<NodeKey> {
        self.source
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> Option<NodeKey> {
        self.camera
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> RenderTaskState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    #[inline]
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Number of refresh-once cycles completed and notified.
    #[inline]
    #[must_use]
    pub fn rendered_once_counter(&self) -> u32 {
        self.rendered_once_counter
    }

    pub fn set_refresh_rate(&mut self, refresh_rate: u32) {
        self.refresh_rate = refresh_rate;
        if refresh_rate > REFRESH_ONCE {
            self.state = RenderTaskState::RenderContinuously;
        } else {
            self.state = RenderTaskState::RenderOnceWaitingForResources;
            self.waiting_to_render = true;
            self.notify_trigger = false;
        }
        self.frame_counter = 0;
    }

    /// Whether this frame should produce an instruction for the task.
    #[must_use]
    pub fn is_render_required(&self) -> bool {
        match self.state {
            RenderTaskState::RenderContinuously => self.frame_counter == 0,
            RenderTaskState::RenderOnceWaitingForResources => true,
            _ => false,
        }
    }

    /// A task with no source or camera produces nothing; this is not an
    /// error, the task is simply skipped.
    #[must_use]
    pub fn ready_to_render(&self) -> bool {
        self.source.is_some() && self.camera.is_some()
    }

    /// Advances the state machine. Called every frame, whether or not an
    /// instruction was produced.
    pub fn update_state(&mut self) {
        match self.state {
            RenderTaskState::RenderContinuously => {
                if self.refresh_rate != REFRESH_ALWAYS {
                    self.frame_counter += 1;
                    if self.frame_counter >= self.refresh_rate {
                        self.frame_counter = 0;
                    }
                }
            }
            RenderTaskState::RenderOnceWaitingForResources => {
                self.state = RenderTaskState::RenderedOnce;
            }
            RenderTaskState::RenderedOnce => {
                self.waiting_to_render = false;
                self.notify_trigger = true;
            }
            RenderTaskState::RenderedOnceAndNotified => {}
        }
    }

    /// True when a finished notification should be raised; consumes the
    /// trigger and moves a refresh-once task to its terminal state.
    pub fn has_rendered(&mut self) -> bool {
        if self.notify_trigger {
            self.rendered_once_counter += 1;
            self.state = RenderTaskState::RenderedOnceAndNotified;
            self.notify_trigger = false;
            return true;
        }
        false
    }

    #[inline]
    #[must_use]
    pub fn is_waiting_to_render(&self) -> bool {
        self.waiting_to_render
    }
}

/// Exclusive claim: `task` is the only task allowed to render `node`.
#[derive(Debug, Clone, Copy)]
struct ExclusiveClaim {
    task: RenderTaskKey,
    node: NodeKey,
}

/// Owner of all render tasks, their order and exclusivity bookkeeping.
pub struct RenderTaskList {
    tasks: SlotMap<RenderTaskKey, RenderTask>,
    /// Task keys in draw order (insertion order until a sort is requested).
    order: Vec<RenderTaskKey>,
    sort_requested: bool,
    overlay: Option<RenderTaskKey>,
    exclusive_claims: Vec<ExclusiveClaim>,
    next_notifier: u32,
}

impl RenderTaskList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: SlotMap::with_key(),
            order: Vec::new(),
            sort_requested: false,
            overlay: None,
            exclusive_claims: Vec::new(),
            next_notifier: 1,
        }
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.order.len()
    }

    /// Task keys in current draw order.
    #[must_use]
    pub fn ordered_tasks(&self) -> &[RenderTaskKey] {
        &self.order
    }

    /// Returns the task at `index` in draw order.
    ///
    /// # Panics
    ///
    /// Panics on an out-of-range index — that is a programmer error, not a
    /// runtime condition.
    #[must_use]
    pub fn get_task(&self, index: usize) -> &RenderTask {
        assert!(index < self.order.len(), "render task index out of range");
        &self.tasks[self.order[index]]
    }

    #[must_use]
    pub fn get(&self, key: RenderTaskKey) -> Option<&RenderTask> {
        self.tasks.get(key)
    }

    pub fn get_mut(&mut self, key: RenderTaskKey) -> Option<&mut RenderTask> {
        self.tasks.get_mut(key)
    }

    /// Creates a task rendering `source` through `camera`.
    pub fn create_task(&mut self, source: Option<NodeKey>, camera: Option<NodeKey>) -> RenderTaskKey {
        let notifier = NotifierId(self.next_notifier);
        self.next_notifier += 1;
        let key = self.tasks.insert(RenderTask::new(source, camera, notifier));
        self.order.push(key);
        self.sort_requested = true;
        key
    }

    /// Creates the overlay task, pinned to the maximal order index so it
    /// always sorts last. There is at most one.
    pub fn create_overlay_task(
        &mut self,
        source: Option<NodeKey>,
        camera: Option<NodeKey>,
    ) -> RenderTaskKey {
        debug_assert!(self.overlay.is_none(), "overlay task already exists");
        let key = self.create_task(source, camera);
        self.tasks[key].order = i32::MAX;
        self.overlay = Some(key);
        key
    }

    /// Removes a task, releasing any exclusivity claim it held. Removing an
    /// unknown task is a silent no-op.
    pub fn remove_task(&mut self, key: RenderTaskKey) {
        if self.tasks.remove(key).is_none() {
            log::debug!("remove_task called with an unknown task");
            return;
        }
        self.order.retain(|&k| k != key);
        self.exclusive_claims.retain(|claim| claim.task != key);
        if self.overlay == Some(key) {
            self.overlay = None;
        }
    }

    /// Requests a re-sort on the next [`sort_tasks`](Self::sort_tasks) call.
    pub fn request_sort(&mut self) {
        self.sort_requested = true;
    }

    /// Stable sort by order index; ties keep insertion order. No-op unless
    /// a sort was requested.
    pub fn sort_tasks(&mut self) {
        if !self.sort_requested {
            return;
        }
        self.sort_requested = false;
        let tasks = &self.tasks;
        self.order.sort_by_key(|&key| tasks[key].order);
    }

    /// Records or releases an exclusive claim over the task's source actor.
    ///
    /// One claim is kept per task; enabling exclusivity again for the same
    /// task updates the tracked actor instead of duplicating the entry.
    /// Conflicting claims over one actor resolve last-writer-wins.
    pub fn set_exclusive(&mut self, key: RenderTaskKey, exclusive: bool) {
        let Some(task) = self.tasks.get_mut(key) else {
            log::debug!("set_exclusive called with an unknown task");
            return;
        };
        task.exclusive = exclusive;
        let source = task.source;

        if exclusive {
            let Some(node) = source else {
                return;
            };
            if let Some(claim) = self.exclusive_claims.iter_mut().find(|c| c.task == key) {
                claim.node = node;
            } else {
                self.exclusive_claims.push(ExclusiveClaim { task: key, node });
            }
        } else {
            self.exclusive_claims.retain(|claim| claim.task != key);
        }
    }

    /// The task currently claiming `node` exclusively, if any. The last
    /// registered claim wins.
    #[must_use]
    pub fn exclusive_owner(&self, node: NodeKey) -> Option<RenderTaskKey> {
        self.exclusive_claims
            .iter()
            .rev()
            .find(|claim| claim.node == node)
            .map(|claim| claim.task)
    }
}

impl Default for RenderTaskList {
    fn default() -> Self {
        Self::new()
    }
}
