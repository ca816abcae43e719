//! Update Manager
//!
//! Drives the per-frame sequence on the update thread:
//!
//! 1. reset properties (when the previous frame changed the scene)
//! 2. apply queued event messages, FIFO
//! 3. run animations, then constraints
//! 4. rebuild the depth tree if structure or sibling order changed
//! 5. update world transforms and collect renderables per layer
//! 6. process render tasks into the frame's instruction buffer
//! 7. advance task states and queue finished notifications
//! 8. publish the notification batch, swap the buffer index, and hand the
//!    filled instruction buffer to the render thread
//!
//! This fixed sub-phase order is an invariant: a property set by a message
//! is visible to constraints in the same frame, and the event thread never
//! sees a "finished" notification for state that has not been committed by
//! the buffer swap.
//!
//! The only state shared with the render thread is the frame handshake:
//! filled instruction sets ping-pong across channels together with the
//! buffer index they were built against, so the update thread never writes
//! a buffer the render thread still reads.

use std::sync::Arc;

use crate::common::{BufferIndex, FixedSizePool, SceneGraphBuffers};
use crate::render::instruction::{RenderInstructionContainer, RenderInstructionSet};
use crate::render::manager::{RendererData, RendererUpdate};
use crate::render::processor::RenderInstructionProcessor;
use crate::render::{Renderer, RendererKey};
use crate::scene::depth_tree::{build_depth_tree, flatten_depth_tree, DepthNode, NodeDepths};
use crate::scene::graph::SceneGraph;
use crate::scene::node::Node;
use crate::scene::NodeKey;
use crate::update::animators::{Constraint, PropertyAnimator};
use crate::update::messages::{Message, MessageQueue, MessageSender};
use crate::update::notifications::{CompleteNotification, NotificationQueue, NotifierId};
use crate::update::render_task::{RenderTaskKey, RenderTaskList};

/// Initial capacity of the depth-node pool.
const DEPTH_POOL_CAPACITY: usize = 32;

/// One frame's worth of work handed to the render thread.
pub struct FrameSubmission {
    /// The buffer index this frame was built against; the render thread
    /// reads double-buffered values through it.
    pub buffer_index: BufferIndex,
    pub instructions: RenderInstructionSet,
    /// Renderer registry changes to apply before drawing.
    pub renderer_updates: Vec<RendererUpdate>,
}

/// Result of one update frame.
pub struct FrameResult {
    pub submission: FrameSubmission,
    /// Whether another frame is required (animations running or a task
    /// waiting to render).
    pub keep_updating: bool,
}

/// Owner of the scene graph and the per-frame update sequence.
pub struct UpdateManager {
    scene: SceneGraph,
    buffers: SceneGraphBuffers,
    message_queue: MessageQueue,
    task_list: RenderTaskList,

    animators: Vec<PropertyAnimator>,
    constraints: Vec<Constraint>,

    instructions: RenderInstructionContainer,
    processor: RenderInstructionProcessor,

    depth_pool: FixedSizePool<DepthNode>,
    node_depths: NodeDepths,

    notification_queue: Arc<NotificationQueue>,
    pending_notifications: Vec<CompleteNotification>,
    renderer_updates: Vec<RendererUpdate>,

    previous_update_scene: bool,
    next_notifier: u32,
}

impl UpdateManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scene: SceneGraph::new(),
            buffers: SceneGraphBuffers::new(),
            message_queue: MessageQueue::new(),
            task_list: RenderTaskList::new(),
            animators: Vec::new(),
            constraints: Vec::new(),
            instructions: RenderInstructionContainer::new(),
            processor: RenderInstructionProcessor::new(),
            depth_pool: FixedSizePool::new(DEPTH_POOL_CAPACITY),
            node_depths: NodeDepths::new(),
            notification_queue: Arc::new(NotificationQueue::new()),
            pending_notifications: Vec::new(),
            renderer_updates: Vec::new(),
            previous_update_scene: true,
            next_notifier: 1_000_000,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    #[must_use]
    pub fn task_list(&self) -> &RenderTaskList {
        &self.task_list
    }

    pub fn task_list_mut(&mut self) -> &mut RenderTaskList {
        &mut self.task_list
    }

    /// Event-side message sender.
    #[must_use]
    pub fn message_sender(&self) -> MessageSender {
        self.message_queue.sender()
    }

    /// Queue the event thread drains for finished notifications.
    #[must_use]
    pub fn notification_queue(&self) -> Arc<NotificationQueue> {
        Arc::clone(&self.notification_queue)
    }

    /// Allocates a fresh notifier id for animators created by the caller.
    pub fn create_notifier(&mut self) -> NotifierId {
        let id = NotifierId(self.next_notifier);
        self.next_notifier += 1;
        id
    }

    // ========================================================================
    // Scene construction (update-thread side)
    // ========================================================================

    pub fn add_node(&mut self, node: Node, parent: NodeKey) -> NodeKey {
        self.scene.add_node(node, parent)
    }

    /// Attaches a renderer, mirroring it to the render thread with the
    /// next frame submission.
    pub fn attach_renderer(&mut self, node: NodeKey, renderer: Renderer) -> RendererKey {
        let data = RendererData {
            pipeline_info: renderer.pipeline_info().clone(),
        };
        let key = self.scene.attach_renderer(node, renderer);
        self.renderer_updates.push(RendererUpdate::Add(key, data));
        key
    }

    pub fn detach_renderer(&mut self, node: NodeKey) {
        if let Some(key) = self.scene.get_node(node).and_then(Node::renderer) {
            self.renderer_updates.push(RendererUpdate::Remove(key));
        }
        self.scene.detach_renderer(node);
    }

    /// Removes a subtree, retiring its renderers on the render side.
    pub fn remove_node(&mut self, node: NodeKey) {
        self.collect_renderer_removals(node);
        self.scene.remove_node(node);
    }

    fn collect_renderer_removals(&mut self, node: NodeKey) {
        let Some(n) = self.scene.get_node(node) else {
            return;
        };
        if let Some(renderer) = n.renderer() {
            self.renderer_updates.push(RendererUpdate::Remove(renderer));
        }
        let children = n.children().to_vec();
        for child in children {
            self.collect_renderer_removals(child);
        }
    }

    pub fn add_animator(&mut self, animator: PropertyAnimator) {
        self.animators.push(animator);
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Runs one update frame and returns the submission for the render
    /// thread plus the keep-updating decision.
    pub fn update(&mut self, elapsed_seconds: f32) -> FrameResult {
        let buffer = self.buffers.update_buffer_index();

        let update_scene = self.scene.scene_dirty
            || !self.animators.is_empty()
            || !self.constraints.is_empty()
            || self.message_queue.is_scene_update_required();

        // Even when nothing changes this frame, double-buffered values
        // written last frame still need synchronizing once.
        if update_scene || self.previous_update_scene {
            self.scene.reset_properties(buffer);
        }

        self.process_messages(buffer);
        self.animate(buffer, elapsed_seconds);
        for constraint in &mut self.constraints {
            constraint.apply(&mut self.scene, buffer);
        }

        if self.scene.depth_tree_dirty {
            self.rebuild_depth_tree();
        }

        self.scene.update_world(buffer);

        self.task_list.sort_tasks();
        // Cached render lists may only be replayed after two frames in
        // which nothing changed.
        let try_reuse = !update_scene && !self.previous_update_scene;
        self.process_render_tasks(buffer, try_reuse);
        self.update_task_states();

        let keep_updating = !self.animators.is_empty() || self.any_task_waiting();

        // Publishing after all update work guarantees the event thread
        // sees committed state alongside every notification.
        self.notification_queue
            .update_completed(&mut self.pending_notifications);

        self.scene.scene_dirty = false;
        self.previous_update_scene = update_scene;

        let instructions = self.instructions.take(buffer);
        self.buffers.swap();

        FrameResult {
            submission: FrameSubmission {
                buffer_index: buffer,
                instructions,
                renderer_updates: std::mem::take(&mut self.renderer_updates),
            },
            keep_updating,
        }
    }

    /// Returns a consumed submission's instruction storage for reuse.
    pub fn recycle(&mut self, submission: FrameSubmission) {
        self.instructions
            .restore(submission.buffer_index, submission.instructions);
    }

    // ── Frame phases ─────────────────────────────────────────────────────

    fn process_messages(&mut self, buffer: BufferIndex) {
        let messages: Vec<Message> = self.message_queue.drain().collect();
        for message in messages {
            self.apply_message(buffer, message);
        }
    }

    fn apply_message(&mut self, buffer: BufferIndex, message: Message) {
        match message {
            Message::BakeNodePosition { node, value } => {
                if let Some(n) = self.scene.get_node_mut(node) {
                    n.position.bake(buffer, value);
                }
            }
            Message::BakeNodeSize { node, value } => {
                if let Some(n) = self.scene.get_node_mut(node) {
                    n.size.bake(buffer, value);
                }
            }
            Message::BakeNodeColor { node, value } => {
                if let Some(n) = self.scene.get_node_mut(node) {
                    n.color.bake(buffer, value);
                }
            }
            Message::SetNodeVisible { node, visible } => {
                if let Some(n) = self.scene.get_node_mut(node) {
                    n.visible.bake(buffer, visible);
                }
            }
            Message::SetSiblingOrder { node, order } => {
                self.scene.set_sibling_order(node, order);
            }
            Message::SetDrawMode { node, mode } => {
                if let Some(n) = self.scene.get_node_mut(node) {
                    n.draw_mode = mode;
                }
            }
            Message::RemoveNode { node } => self.remove_node(node),
            Message::AddAnimator(animator) => self.animators.push(animator),
            Message::AddConstraint(constraint) => self.constraints.push(constraint),
            Message::SetRefreshRate { task, rate } => {
                if let Some(t) = self.task_list.get_mut(task) {
                    t.set_refresh_rate(rate);
                }
            }
            Message::SetSourceNode { task, source } => {
                if let Some(t) = self.task_list.get_mut(task) {
                    t.source = source;
                }
            }
            Message::SetCamera { task, camera } => {
                if let Some(t) = self.task_list.get_mut(task) {
                    t.camera = camera;
                }
            }
            Message::SetExclusive { task, exclusive } => {
                self.task_list.set_exclusive(task, exclusive);
            }
            Message::SetClearColor { task, color } => {
                if let Some(t) = self.task_list.get_mut(task) {
                    t.clear_color = color;
                }
            }
            Message::SetClearEnabled { task, enabled } => {
                if let Some(t) = self.task_list.get_mut(task) {
                    t.clear_enabled = enabled;
                }
            }
            Message::SetCullMode { task, cull } => {
                if let Some(t) = self.task_list.get_mut(task) {
                    t.cull = cull;
                }
            }
            Message::SetViewport { task, viewport } => {
                if let Some(t) = self.task_list.get_mut(task) {
                    t.viewport = viewport;
                }
            }
            Message::SetFrameBuffer { task, target } => {
                if let Some(t) = self.task_list.get_mut(task) {
                    t.target = target;
                }
            }
            Message::SetLayerClipping {
                node,
                enabled,
                clipping_box,
            } => {
                if let Some(layer_key) = self.scene.get_node(node).and_then(Node::layer)
                    && let Some(layer) = self.scene.layers.get_mut(layer_key)
                {
                    layer.is_clipping = enabled;
                    layer.clipping_box = clipping_box;
                }
            }
            Message::RequestDepthTreeRebuild => {
                self.scene.depth_tree_dirty = true;
            }
        }
    }

    fn animate(&mut self, buffer: BufferIndex, elapsed_seconds: f32) {
        let scene = &mut self.scene;
        let pending = &mut self.pending_notifications;
        self.animators.retain_mut(|animator| {
            if animator.animate(scene, buffer, elapsed_seconds) {
                pending.push(CompleteNotification::AnimationFinished(animator.notifier));
                false
            } else {
                true
            }
        });
    }

    fn rebuild_depth_tree(&mut self) {
        let root = self.scene.root();
        let root_band = build_depth_tree(&mut self.depth_pool, &self.scene, root);
        flatten_depth_tree(&self.depth_pool, root_band, &mut self.node_depths);
        self.scene.set_depth_indices(&self.node_depths);
        self.scene.depth_tree_dirty = false;
    }

    fn process_render_tasks(&mut self, buffer: BufferIndex, try_reuse: bool) {
        let ordered: Vec<RenderTaskKey> = self.task_list.ordered_tasks().to_vec();
        let set = self.instructions.at(buffer);
        set.reset_and_reserve(ordered.len());

        for task_key in ordered {
            let Some(task) = self.task_list.get(task_key) else {
                continue;
            };
            if !task.is_render_required() || !task.ready_to_render() {
                continue;
            }
            self.processor.prepare(
                buffer,
                &mut self.scene,
                &self.task_list,
                task_key,
                try_reuse,
                set,
            );
        }
    }

    fn update_task_states(&mut self) {
        let ordered: Vec<RenderTaskKey> = self.task_list.ordered_tasks().to_vec();
        for task_key in ordered {
            let Some(task) = self.task_list.get_mut(task_key) else {
                continue;
            };
            // A refresh-once task that could not render (no source/camera)
            // keeps waiting instead of advancing toward its notification.
            if task.state() == crate::update::RenderTaskState::RenderOnceWaitingForResources
                && !task.ready_to_render()
            {
                continue;
            }
            task.update_state();
            if task.has_rendered() {
                self.pending_notifications
                    .push(CompleteNotification::RenderTaskFinished(task.notifier));
            }
        }
    }

    fn any_task_waiting(&self) -> bool {
        self.task_list
            .ordered_tasks()
            .iter()
            .filter_map(|&key| self.task_list.get(key))
            .any(|task| task.is_waiting_to_render() && task.ready_to_render())
    }
}

impl Default for UpdateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Camera;
    use crate::update::render_task::REFRESH_ONCE;
    use glam::Vec3;

    /// Wires a camera and a whole-scene task; returns the task key.
    fn default_task(manager: &mut UpdateManager) -> RenderTaskKey {
        let root = manager.scene().root();
        let camera_node = manager.add_node(Node::new(), root);
        let scene = manager.scene_mut();
        scene.attach_camera(camera_node, Camera::orthographic(800.0, 480.0));
        manager
            .task_list_mut()
            .create_task(Some(root), Some(camera_node))
    }

    fn renderable_node(manager: &mut UpdateManager) -> NodeKey {
        let root = manager.scene().root();
        let node = manager.add_node(Node::new(), root);
        if let Some(n) = manager.scene_mut().get_node_mut(node) {
            n.position.bake(0, Vec3::new(100.0, 100.0, 0.0));
            n.position.bake(1, Vec3::new(100.0, 100.0, 0.0));
            n.size.bake(0, Vec3::new(10.0, 10.0, 0.0));
            n.size.bake(1, Vec3::new(10.0, 10.0, 0.0));
        }
        manager.attach_renderer(node, Renderer::default());
        node
    }

    #[test]
    fn test_frame_produces_instruction() {
        let mut manager = UpdateManager::new();
        default_task(&mut manager);
        renderable_node(&mut manager);

        let result = manager.update(0.016);
        assert_eq!(result.submission.instructions.count(), 1);
        let instruction = result.submission.instructions.get(0);
        assert_eq!(instruction.render_list_count(), 1);
        assert_eq!(instruction.get_render_list(0).count(), 1);

        manager.recycle(result.submission);
    }

    #[test]
    fn test_buffer_index_alternates_per_frame() {
        let mut manager = UpdateManager::new();
        let first = manager.update(0.016);
        let second = manager.update(0.016);
        assert_eq!(first.submission.buffer_index, 0);
        assert_eq!(second.submission.buffer_index, 1);
    }

    #[test]
    fn test_message_visible_to_constraint_same_frame() {
        let mut manager = UpdateManager::new();
        let node = renderable_node(&mut manager);
        let observed = std::sync::Arc::new(parking_lot::Mutex::new(Vec3::ZERO));
        let observed_in = Arc::clone(&observed);
        manager.add_constraint(Constraint::new(move |graph, buffer| {
            if let Some(n) = graph.get_node(node) {
                *observed_in.lock() = n.position.get(buffer);
            }
        }));

        manager
            .message_sender()
            .send(Message::BakeNodePosition {
                node,
                value: Vec3::new(7.0, 0.0, 0.0),
            })
            .unwrap();
        manager.update(0.016);

        assert!((observed.lock().x - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_refresh_once_task_notifies() {
        let mut manager = UpdateManager::new();
        let task = default_task(&mut manager);
        renderable_node(&mut manager);
        manager
            .task_list_mut()
            .get_mut(task)
            .unwrap()
            .set_refresh_rate(REFRESH_ONCE);
        let notifications = manager.notification_queue();

        // Frame 1 renders, frame 2 notifies.
        let first = manager.update(0.016);
        assert_eq!(first.submission.instructions.count(), 1);
        assert!(notifications.take_batch().is_empty());

        let second = manager.update(0.016);
        assert_eq!(second.submission.instructions.count(), 0);
        let batch = notifications.take_batch();
        assert_eq!(batch.len(), 1);
        assert!(matches!(
            batch[0],
            CompleteNotification::RenderTaskFinished(_)
        ));
    }

    #[test]
    fn test_animation_drives_keep_updating() {
        let mut manager = UpdateManager::new();
        let node = renderable_node(&mut manager);
        let notifier = manager.create_notifier();
        manager.add_animator(PropertyAnimator::new(
            node,
            crate::update::AnimatorTarget::Position {
                from: Vec3::ZERO,
                to: Vec3::new(10.0, 0.0, 0.0),
            },
            0.1,
            notifier,
        ));

        let running = manager.update(0.05);
        assert!(running.keep_updating);

        let finished = manager.update(0.1);
        assert!(!finished.keep_updating);
        let batch = manager.notification_queue().take_batch();
        assert!(batch
            .iter()
            .any(|n| matches!(n, CompleteNotification::AnimationFinished(id) if *id == notifier)));
    }

    #[test]
    fn test_depth_tree_rebuilt_on_structure_change() {
        let mut manager = UpdateManager::new();
        default_task(&mut manager);
        let a = renderable_node(&mut manager);
        let b = renderable_node(&mut manager);
        manager.update(0.016);

        let depth_a = manager.scene().get_node(a).unwrap().depth_index();
        let depth_b = manager.scene().get_node(b).unwrap().depth_index();
        assert!(depth_b > depth_a);

        // Raising a's sibling order reorders the flattened depths.
        manager.scene_mut().set_sibling_order(a, 5);
        manager.update(0.016);
        let depth_a = manager.scene().get_node(a).unwrap().depth_index();
        let depth_b = manager.scene().get_node(b).unwrap().depth_index();
        assert!(depth_a > depth_b);
    }

    #[test]
    fn test_exclusive_source_skipped_by_other_tasks() {
        let mut manager = UpdateManager::new();
        let task = default_task(&mut manager);
        let node = renderable_node(&mut manager);

        // A second task claims the node exclusively; the first task's
        // instruction must not contain it.
        let exclusive_task = {
            let root = manager.scene().root();
            let camera_node = manager.add_node(Node::new(), root);
            manager
                .scene_mut()
                .attach_camera(camera_node, Camera::orthographic(800.0, 480.0));
            manager
                .task_list_mut()
                .create_task(Some(node), Some(camera_node))
        };
        manager.task_list_mut().set_exclusive(exclusive_task, true);

        let result = manager.update(0.016);
        let instructions = &result.submission.instructions;
        // Both tasks produce instructions; find the whole-scene one.
        let scene_instruction = (0..instructions.count())
            .map(|i| instructions.get(i))
            .find(|instruction| instruction.task == task);
        assert!(scene_instruction.is_none_or(|i| i.render_list_count() == 0));
    }
}
