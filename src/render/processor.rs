//! Render Instruction Processor
//!
//! Turns one render task into one ordered [`RenderInstruction`] per frame:
//! resolves the task's camera, walks the sorted layers, culls items against
//! clip space, and sorts each render list for correct compositing.
//!
//! Culling is conservative: a box straddling a frustum boundary is always
//! kept; only boxes entirely outside a single plane are dropped.

use glam::{Mat4, Vec2, Vec4};
use slotmap::Key;

use crate::common::BufferIndex;
use crate::render::instruction::{RenderInstruction, RenderInstructionSet};
use crate::render::item::{RenderItem, RenderList, RenderListFlags};
use crate::render::renderer::OpacityType;
use crate::render::RendererKey;
use crate::scene::graph::SceneGraph;
use crate::scene::layer::{LayerBehavior, Renderable};
use crate::scene::{LayerKey, NodeKey};
use crate::update::render_task::{RenderTaskKey, RenderTaskList};

// ─── Clip-space culling ──────────────────────────────────────────────────────

#[inline]
fn inside_clip_cube(v: Vec4) -> bool {
    -v.w <= v.x && v.x <= v.w && -v.w <= v.y && v.y <= v.w && -v.w <= v.z && v.z <= v.w
}

/// Tests a node's local-space 2D bounding box against clip space.
///
/// Fast-accepts as soon as the box centre or any corner lands inside the
/// clip cube. Otherwise counts, per frustum side plane, how many corners
/// lie inside it: a box is outside only when some plane has *zero* corners
/// inside. A box with every plane partially covered straddles a boundary
/// and is kept.
#[must_use]
pub fn is_2d_box_outside_clip_space(mvp: &Mat4, size: Vec2) -> bool {
    // Centre test first: the translation column is the transformed origin.
    let translation = mvp.w_axis;
    if inside_clip_cube(translation) {
        return false;
    }

    let half = size * 0.5;
    let corners = [
        *mvp * Vec4::new(-half.x, -half.y, 0.0, 1.0),
        *mvp * Vec4::new(half.x, -half.y, 0.0, 1.0),
        *mvp * Vec4::new(-half.x, half.y, 0.0, 1.0),
        *mvp * Vec4::new(half.x, half.y, 0.0, 1.0),
    ];
    for corner in corners {
        if inside_clip_cube(corner) {
            return false;
        }
    }

    let inside_left = corners.iter().filter(|c| -c.w <= c.x).count();
    if inside_left == 0 {
        return true;
    }
    let inside_right = corners.iter().filter(|c| c.x <= c.w).count();
    if inside_right == 0 {
        return true;
    }
    let inside_top = corners.iter().filter(|c| -c.w <= c.y).count();
    if inside_top == 0 {
        return true;
    }
    let inside_bottom = corners.iter().filter(|c| c.y <= c.w).count();
    if inside_bottom == 0 {
        return true;
    }

    // Any bisected side plane means a likely intersection with clip space.
    if inside_left < 4 || inside_right < 4 || inside_top < 4 || inside_bottom < 4 {
        return false;
    }

    // All corners inside every side plane yet none inside the cube: the
    // box lies entirely beyond the near/far planes.
    true
}

// ─── Sorting ─────────────────────────────────────────────────────────────────

/// Per-item sort key, computed once before the stable sort.
#[derive(Clone, Copy, Default)]
struct SortAttributes {
    item_index: usize,
    pipeline_hash: u64,
    renderer: RendererKey,
    depth_index: i32,
    z_value: f32,
    is_opaque: bool,
}

fn compare_partial(lhs: &SortAttributes, rhs: &SortAttributes) -> std::cmp::Ordering {
    lhs.pipeline_hash
        .cmp(&rhs.pipeline_hash)
        .then(lhs.renderer.data().as_ffi().cmp(&rhs.renderer.data().as_ffi()))
}

/// UI lists: depth index dominates, then pipeline grouping.
fn compare_items(lhs: &SortAttributes, rhs: &SortAttributes) -> std::cmp::Ordering {
    lhs.depth_index
        .cmp(&rhs.depth_index)
        .then_with(|| compare_partial(lhs, rhs))
}

/// 3D lists: opaque first grouped by pipeline, then transparent items
/// back-to-front. `z_value` is the distance into the screen, so larger
/// values are farther and must draw first.
fn compare_items_3d(lhs: &SortAttributes, rhs: &SortAttributes) -> std::cmp::Ordering {
    match (lhs.is_opaque, rhs.is_opaque) {
        (true, true) => compare_partial(lhs, rhs),
        (false, false) => rhs
            .z_value
            .partial_cmp(&lhs.z_value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| compare_partial(lhs, rhs)),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
    }
}

// ─── Processor ───────────────────────────────────────────────────────────────

/// Builds render instructions for render tasks, reusing its sorting
/// scratch space across frames.
pub struct RenderInstructionProcessor {
    sorting_helper: Vec<SortAttributes>,
    item_scratch: Vec<RenderItem>,
}

impl RenderInstructionProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sorting_helper: Vec::new(),
            item_scratch: Vec::new(),
        }
    }

    /// Produces the instruction for `task_key`, appending it to `set`.
    ///
    /// `try_reuse` is only passed as true after two frames in which
    /// nothing in the scene changed; render lists may then be replayed
    /// from cache when the view and renderable set also held still.
    ///
    /// Returns false when the task yields nothing this frame — a missing
    /// camera or source is not an error, the task is skipped.
    pub fn prepare(
        &mut self,
        buffer: BufferIndex,
        graph: &mut SceneGraph,
        task_list: &RenderTaskList,
        task_key: RenderTaskKey,
        try_reuse: bool,
        set: &mut RenderInstructionSet,
    ) -> bool {
        let Some(task) = task_list.get(task_key) else {
            return false;
        };
        let Some(source) = task.source() else {
            return false;
        };
        let Some(camera_node) = task.camera() else {
            return false;
        };
        let Some((view, projection, view_updated)) = graph
            .get_node(camera_node)
            .and_then(|node| node.camera())
            .and_then(|key| graph.get_camera(key))
            .map(|camera| (camera.view(buffer), camera.projection(), camera.view_updated()))
        else {
            // Detached or destroyed camera: produce no instruction.
            return false;
        };

        let instruction = set.get_next_free_instruction();
        instruction.prepare(task_key, view, projection);
        instruction.viewport = task.viewport;
        instruction.clear_color = task.clear_enabled.then_some(task.clear_color);
        instruction.target = task.target;

        let sorted_layers = graph.sorted_layers.clone();
        let mut list_added = false;

        for layer_key in sorted_layers {
            let Some(layer) = graph.get_layer(layer_key) else {
                continue;
            };
            // A layer is relevant when it lies inside the task's source
            // subtree, or when the source sits inside the layer (the layer
            // may then hold renderables from the source subtree — the
            // per-renderable filter below sorts those out).
            let layer_node = layer.source_node();
            if !graph.is_descendant_or_self(layer_node, source)
                && !graph.is_descendant_or_self(source, layer_node)
            {
                continue;
            }
            let behavior = layer.behavior;
            let is_clipping = layer.is_clipping;
            let clipping_box = layer.clipping_box;

            for overlay_pass in [false, true] {
                let renderables: Vec<Renderable> = {
                    let layer = graph.get_layer(layer_key).expect("layer checked above");
                    let source_list = if overlay_pass {
                        layer.overlay_renderables()
                    } else {
                        layer.color_renderables()
                    };
                    source_list
                        .iter()
                        .copied()
                        .filter(|r| {
                            Self::task_may_render(task_list, task_key, r.node)
                                && graph.is_descendant_or_self(r.node, source)
                        })
                        .collect()
                };
                if renderables.is_empty() {
                    continue;
                }

                let instruction = set.get_mut_last();
                let reuse_allowed = try_reuse && !view_updated;
                let list = instruction.get_next_free_render_list();
                list.set_clipping(is_clipping, clipping_box);
                list.set_has_color_render_items(!overlay_pass);
                if is_clipping {
                    list.insert_flags(
                        RenderListFlags::STENCIL_BUFFER_ENABLED | RenderListFlags::STENCIL_CLEAR,
                    );
                }

                if reuse_allowed && Self::try_reuse_cached_items(layer_key, list, &renderables) {
                    list_added = true;
                    continue;
                }
                list.set_source_layer(layer_key);

                Self::add_renderers_to_render_list(
                    buffer,
                    graph,
                    list,
                    &renderables,
                    &view,
                    &projection,
                    behavior,
                    task.cull,
                );

                let instruction = set.get_mut_last();
                if instruction.last_render_list().is_empty() {
                    instruction.discard_last_render_list();
                    continue;
                }

                // Overlay items ignore 3D depth sorting; they stack in
                // depth-index order on top of the color items.
                let sort_behavior = if overlay_pass {
                    LayerBehavior::Ui
                } else {
                    behavior
                };
                self.sort_render_items(graph, set.get_mut_last().last_render_list_mut(), sort_behavior);

                let list = set.get_mut_last().last_render_list_mut();
                let checksum = checksum_of(list.items().iter().map(|i| i.renderer));
                list.set_cached_checksum(checksum);
                list_added = true;
            }
        }

        if list_added || task.clear_enabled {
            true
        } else {
            set.discard_last_instruction();
            false
        }
    }

    /// A node claimed exclusively by another task is invisible to this one.
    fn task_may_render(task_list: &RenderTaskList, task: RenderTaskKey, node: NodeKey) -> bool {
        match task_list.exclusive_owner(node) {
            Some(owner) => owner == task,
            None => true,
        }
    }

    /// Reuses the previous frame's items when the view is static and the
    /// renderable set is unchanged (checksum over renderer keys).
    fn try_reuse_cached_items(
        layer: LayerKey,
        list: &mut RenderList,
        renderables: &[Renderable],
    ) -> bool {
        if list.source_layer() == Some(layer) && list.cached_item_count() == renderables.len() {
            let checksum = checksum_of(renderables.iter().map(|r| r.renderer));
            if checksum == list.cached_checksum() {
                list.reuse_cached_items();
                return true;
            }
        }
        false
    }

    fn add_renderers_to_render_list(
        buffer: BufferIndex,
        graph: &mut SceneGraph,
        list: &mut RenderList,
        renderables: &[Renderable],
        view: &Mat4,
        projection: &Mat4,
        behavior: LayerBehavior,
        cull: bool,
    ) {
        let is_layer_3d = behavior == LayerBehavior::Scene3d;
        let SceneGraph {
            ref mut nodes,
            ref renderers,
            ..
        } = *graph;
        for renderable in renderables {
            let Some(node) = nodes.get_mut(renderable.node) else {
                continue;
            };
            let Some(renderer) = renderers.get(renderable.renderer) else {
                continue;
            };

            let world = node.world_matrix.get(buffer);
            let size = node.size.get(buffer);
            let mut inside = true;
            if cull {
                let mvp = *projection * *view * world;
                inside = size.x > f32::EPSILON
                    && size.y > f32::EPSILON
                    && !is_2d_box_outside_clip_space(&mvp, Vec2::new(size.x, size.y));
            }

            if !inside {
                node.culled.set(buffer, true);
                continue;
            }
            node.culled.set(buffer, false);

            let opacity = renderer.opacity_type(node.color.get(buffer).w);
            if opacity == OpacityType::Transparent {
                continue;
            }

            let item = list.get_next_free_item();
            item.is_updated = item.node != renderable.node;
            item.node = renderable.node;

            let previous_opaque = item.is_opaque;
            item.is_opaque = opacity == OpacityType::Opaque;
            item.is_updated |= previous_opaque != item.is_opaque;

            let previous_color = item.color;
            item.color = node.color.get(buffer);
            item.is_updated |= previous_color != item.color;

            let previous_depth = item.depth_index;
            item.depth_index = if is_layer_3d { 0 } else { node.depth_index };
            item.depth_index += renderer.depth_index;
            item.is_updated |= previous_depth != item.depth_index;

            let previous_renderer = item.renderer;
            item.renderer = renderable.renderer;
            item.is_updated |= previous_renderer != item.renderer;
            item.is_updated |= is_layer_3d;

            let previous_model_view = item.model_view_matrix;
            let previous_size = item.size;
            item.model_matrix = world;
            item.model_view_matrix = *view * world;
            item.size = size;
            item.is_updated |=
                previous_size != item.size || previous_model_view != item.model_view_matrix;
        }
    }

    /// Stable sort of a render list via the persistent sorting helper.
    fn sort_render_items(&mut self, graph: &SceneGraph, list: &mut RenderList, behavior: LayerBehavior) {
        let count = list.count();
        let Self {
            sorting_helper,
            item_scratch,
        } = self;
        sorting_helper.clear();
        sorting_helper.reserve(count);

        for index in 0..count {
            let item = list.get_item(index);
            sorting_helper.push(SortAttributes {
                item_index: index,
                pipeline_hash: graph
                    .get_renderer(item.renderer)
                    .map_or(0, crate::render::Renderer::pipeline_hash),
                renderer: item.renderer,
                depth_index: item.depth_index,
                // Distance into the screen, offset by the depth index so
                // explicit ordering still wins between coplanar items.
                z_value: -item.model_view_matrix.w_axis.z - item.depth_index as f32,
                is_opaque: item.is_opaque,
            });
        }

        match behavior {
            LayerBehavior::Ui => sorting_helper.sort_by(compare_items),
            LayerBehavior::Scene3d => sorting_helper.sort_by(compare_items_3d),
        }

        item_scratch.clear();
        item_scratch.extend(sorting_helper.iter().map(|a| *list.get_item(a.item_index)));
        list.items_mut().copy_from_slice(item_scratch);
    }
}

impl Default for RenderInstructionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Order-insensitive checksum over renderer keys, mirroring the pointer
/// checksum used for render-list reuse detection.
fn checksum_of(renderers: impl Iterator<Item = RendererKey>) -> u64 {
    renderers
        .map(|key| key.data().as_ffi())
        .fold(0u64, u64::wrapping_add)
}

// Small private extensions used by prepare(); kept here so the instruction
// type stays a plain container.
impl RenderInstructionSet {
    fn get_mut_last(&mut self) -> &mut RenderInstruction {
        let index = self.count() - 1;
        self.get_mut(index)
    }
}

impl RenderInstruction {
    fn last_render_list(&self) -> &RenderList {
        self.get_render_list(self.render_list_count() - 1)
    }

    fn last_render_list_mut(&mut self) -> &mut RenderList {
        let index = self.render_list_count() - 1;
        self.get_render_list_mut(index)
    }
}
