//! Render Manager
//!
//! The render-thread half of the pipeline: consumes frame submissions from
//! the update thread, replays their render instructions through the
//! graphics controller, and hands the instruction storage back for reuse.
//!
//! Backend resources (pipelines, UBO blocks, command buffers, the
//! swapchain) are owned exclusively here; the pools carry no locks because
//! only this thread touches them.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;

use crate::graphics::{
    CommandPool, GraphicsController, PipelineCache, PipelineCreateInfo, Swapchain, UboAllocation,
    UboPool,
};
use crate::render::RendererKey;
use crate::update::manager::FrameSubmission;

/// Uniform block written per render item.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ItemUniforms {
    model_view_projection: [[f32; 4]; 4],
    color: [f32; 4],
}

/// UBO block stride; padded out to the common minimum dynamic-offset
/// alignment.
const UBO_BLOCK_SIZE: u64 = 256;
/// Blocks per UBO page.
const UBO_BLOCKS_PER_PAGE: u32 = 128;
/// Initial command-buffer slots per level.
const COMMAND_POOL_CAPACITY: usize = 16;

/// Immutable per-renderer state mirrored to the render thread.
#[derive(Clone)]
pub struct RendererData {
    pub pipeline_info: PipelineCreateInfo,
}

/// Renderer registry changes that ride along with a frame submission.
pub enum RendererUpdate {
    Add(RendererKey, RendererData),
    Remove(RendererKey),
}

struct RenderRenderer {
    data: RendererData,
    ubo: UboAllocation,
}

/// Replays render instructions against the graphics backend.
pub struct RenderManager<C: GraphicsController> {
    controller: C,
    swapchain: Option<Swapchain>,
    pipeline_cache: PipelineCache,
    ubo_pool: UboPool,
    command_pool: CommandPool,
    renderers: FxHashMap<RendererKey, RenderRenderer>,
}

impl<C: GraphicsController> RenderManager<C> {
    #[must_use]
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            swapchain: None,
            pipeline_cache: PipelineCache::new(),
            ubo_pool: UboPool::new(UBO_BLOCK_SIZE, UBO_BLOCKS_PER_PAGE),
            command_pool: CommandPool::new(COMMAND_POOL_CAPACITY),
            renderers: FxHashMap::default(),
        }
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    #[must_use]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    /// Installs (or replaces) the swapchain this manager presents to.
    pub fn set_swapchain(&mut self, swapchain: Swapchain) {
        self.swapchain = Some(swapchain);
    }

    #[must_use]
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    /// Secondary command pool for backends recording per-list buffers.
    pub fn command_pool_mut(&mut self) -> (&mut CommandPool, &mut C) {
        (&mut self.command_pool, &mut self.controller)
    }

    /// Processes one frame: applies renderer registry updates, records and
    /// submits every instruction, presents, and returns the submission so
    /// its instruction storage can be recycled by the update thread.
    ///
    /// When the swapchain is missing or invalid the frame is dropped —
    /// the caller observes the swapchain state and recreates it.
    pub fn process_frame(&mut self, mut submission: FrameSubmission) -> FrameSubmission {
        self.apply_renderer_updates(&mut submission);

        let Some(swapchain) = self.swapchain.as_mut() else {
            return submission;
        };
        let Some(framebuffer) = swapchain.acquire_next_framebuffer(&mut self.controller) else {
            return submission;
        };
        let command_buffer = swapchain
            .current_command_buffer()
            .expect("framebuffer acquired above");

        for instruction in submission.instructions.iter() {
            let target = instruction.target.unwrap_or(framebuffer);
            self.controller
                .begin_render_pass(command_buffer, target, instruction.clear_color);

            for list in instruction.render_lists() {
                self.controller.set_scissor(command_buffer, list.clipping_box());

                for item in list.items() {
                    let Some(renderer) = self.renderers.get(&item.renderer) else {
                        log::warn!("render item references an unknown renderer");
                        continue;
                    };
                    let pipeline = self
                        .pipeline_cache
                        .get_or_create(&mut self.controller, &renderer.data.pipeline_info);

                    if item.is_updated {
                        let mvp = instruction.projection_matrix * item.model_view_matrix;
                        let uniforms = ItemUniforms {
                            model_view_projection: mvp.to_cols_array_2d(),
                            color: item.color.to_array(),
                        };
                        self.ubo_pool
                            .write_value(&mut self.controller, renderer.ubo, &uniforms);
                    }

                    self.controller.bind_pipeline(command_buffer, pipeline);
                    self.controller.bind_uniform_buffer(
                        command_buffer,
                        self.ubo_pool.buffer_of(renderer.ubo),
                        renderer.ubo.buffer_offset(),
                        UBO_BLOCK_SIZE,
                    );
                    self.controller.draw(command_buffer, 4, 1);
                }
            }

            self.controller.end_render_pass(command_buffer);
        }

        self.ubo_pool.unmap_all(&mut self.controller);
        swapchain.present(&mut self.controller);

        submission
    }

    fn apply_renderer_updates(&mut self, submission: &mut FrameSubmission) {
        for update in submission.renderer_updates.drain(..) {
            match update {
                RendererUpdate::Add(key, data) => {
                    let ubo = self.ubo_pool.allocate(&mut self.controller);
                    self.renderers.insert(key, RenderRenderer { data, ubo });
                }
                RendererUpdate::Remove(key) => {
                    if let Some(renderer) = self.renderers.remove(&key) {
                        self.ubo_pool.release(renderer.ubo);
                    }
                }
            }
        }
    }
}
