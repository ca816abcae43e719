//! End-to-end pipeline tests: an update thread producing frame submissions
//! and a render thread consuming them through the null graphics backend,
//! with the ping-pong instruction buffer handshake in between.

use glam::Vec3;
use stagekit::graphics::{NullGraphicsController, Swapchain, SwapchainId};
use stagekit::render::RenderManager;
use stagekit::scene::{Camera, Node};
use stagekit::update::{AnimatorTarget, FrameSubmission, Message, PropertyAnimator, UpdateManager};

fn build_scene(manager: &mut UpdateManager, renderable_count: usize) -> Vec<stagekit::NodeKey> {
    let root = manager.scene().root();
    let camera_node = manager.add_node(Node::new(), root);
    manager
        .scene_mut()
        .attach_camera(camera_node, Camera::orthographic(800.0, 480.0));
    manager
        .task_list_mut()
        .create_task(Some(root), Some(camera_node));

    (0..renderable_count)
        .map(|i| {
            let node = manager.add_node(Node::new(), root);
            if let Some(n) = manager.scene_mut().get_node_mut(node) {
                for buffer in 0..2 {
                    n.position.bake(buffer, Vec3::new(50.0 + 100.0 * i as f32, 100.0, 0.0));
                    n.size.bake(buffer, Vec3::new(40.0, 40.0, 0.0));
                }
            }
            manager.attach_renderer(node, stagekit::Renderer::default());
            node
        })
        .collect()
}

fn render_manager_with_swapchain() -> RenderManager<NullGraphicsController> {
    let mut render_manager = RenderManager::new(NullGraphicsController::new());
    let swapchain = Swapchain::new(
        render_manager.controller_mut(),
        SwapchainId(1),
        2,
        800,
        480,
    );
    render_manager.set_swapchain(swapchain);
    render_manager
}

#[test]
fn update_and_render_threads_cooperate() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut update_manager = UpdateManager::new();
    build_scene(&mut update_manager, 3);

    let (to_render, submissions) = flume::bounded::<FrameSubmission>(1);
    let (to_update, recycled) = flume::bounded::<FrameSubmission>(1);

    let render_thread = std::thread::spawn(move || {
        let mut render_manager = render_manager_with_swapchain();
        while let Ok(submission) = submissions.recv() {
            let consumed = render_manager.process_frame(submission);
            if to_update.send(consumed).is_err() {
                break;
            }
        }
        render_manager
    });

    const FRAMES: usize = 4;
    for _ in 0..FRAMES {
        let result = update_manager.update(0.016);
        to_render.send(result.submission).unwrap();
        // The handshake: the update thread takes the consumed buffer back
        // before it writes that buffer index again.
        let returned = recycled.recv().unwrap();
        update_manager.recycle(returned);
    }
    drop(to_render);

    let mut render_manager = render_thread.join().unwrap();
    assert!(render_manager.swapchain().unwrap().is_valid());

    // Every frame drew all three items and presented.
    let controller = render_manager.controller_mut();
    assert_eq!(controller.draws, (FRAMES * 3) as u32);
    assert_eq!(controller.presents, FRAMES as u32);
    // One pipeline serves all items; the cache deduplicated creation.
    assert_eq!(controller.pipelines_created, 1);
}

#[test]
fn animated_frames_update_uniforms_only_when_changed() {
    let mut update_manager = UpdateManager::new();
    let nodes = build_scene(&mut update_manager, 1);
    let notifier = update_manager.create_notifier();
    update_manager.add_animator(PropertyAnimator::new(
        nodes[0],
        AnimatorTarget::Position {
            from: Vec3::new(50.0, 100.0, 0.0),
            to: Vec3::new(200.0, 100.0, 0.0),
        },
        1.0,
        notifier,
    ));

    let mut render_manager = render_manager_with_swapchain();

    // Animated frame: the item is marked updated and uniforms are written.
    let result = update_manager.update(0.25);
    let consumed = render_manager.process_frame(result.submission);
    update_manager.recycle(consumed);
    let writes_after_first = render_manager.controller_mut().buffer_writes;
    assert!(writes_after_first > 0);

    let result = update_manager.update(0.25);
    let consumed = render_manager.process_frame(result.submission);
    update_manager.recycle(consumed);
    assert!(render_manager.controller_mut().buffer_writes > writes_after_first);
}

#[test]
fn message_driven_property_reaches_render_thread_next_frame() {
    let mut update_manager = UpdateManager::new();
    let nodes = build_scene(&mut update_manager, 1);
    let sender = update_manager.message_sender();

    // Frame 1: baseline.
    let first = update_manager.update(0.016);
    let first_matrix = first
        .submission
        .instructions
        .get(0)
        .get_render_list(0)
        .get_item(0)
        .model_matrix;
    update_manager.recycle(first.submission);

    // The event thread moves the node; the very next produced frame must
    // carry the new transform.
    sender
        .send(Message::BakeNodePosition {
            node: nodes[0],
            value: Vec3::new(300.0, 100.0, 0.0),
        })
        .unwrap();
    let second = update_manager.update(0.016);
    let second_matrix = second
        .submission
        .instructions
        .get(0)
        .get_render_list(0)
        .get_item(0)
        .model_matrix;

    assert_ne!(first_matrix.w_axis.x, second_matrix.w_axis.x);
    assert!((second_matrix.w_axis.x - 300.0).abs() < 1e-4);
}

#[test]
fn lost_swapchain_drops_frames_until_recreated() {
    let mut update_manager = UpdateManager::new();
    build_scene(&mut update_manager, 1);
    let mut render_manager = render_manager_with_swapchain();

    render_manager.controller_mut().fail_next_acquire =
        Some(stagekit::graphics::SwapchainError::OutOfDate);

    let result = update_manager.update(0.016);
    let consumed = render_manager.process_frame(result.submission);
    update_manager.recycle(consumed);
    assert_eq!(render_manager.controller_mut().presents, 0);
    assert!(!render_manager.swapchain().unwrap().is_valid());

    // Recovery is external: install a fresh swapchain, frames flow again.
    let swapchain = Swapchain::new(
        render_manager.controller_mut(),
        SwapchainId(2),
        2,
        800,
        480,
    );
    render_manager.set_swapchain(swapchain);

    let result = update_manager.update(0.016);
    let consumed = render_manager.process_frame(result.submission);
    update_manager.recycle(consumed);
    assert_eq!(render_manager.controller_mut().presents, 1);
}
