pub mod buffer;
pub mod context;
pub mod descriptors;
pub mod image;
pub mod memory;
pub mod overlay;
pub mod pipeline;
pub mod scene;
pub mod shaders;
pub mod swapchain;
pub mod uniforms;

use anyhow::{Context, Result};
use ash::vk;
use egui_winit::winit::window::Window;
use glam::{Mat4, Vec3};

use self::{
    buffer::GpuBuffer,
    context::VulkanContext,
    overlay::OverlayPainter,
    pipeline::PipelineDesc,
    scene::{SceneAssets, SceneMesh, SceneResources, TextureLayouts},
    shaders::ShaderPair,
    swapchain::SwapchainTargets,
    uniforms::{ObjectConstants, SceneUniforms},
};
use crate::{
    animation,
    config::SceneConfig,
    frame::{frame_phases, FramePhase, OpaqueObject, SlotRecovery, SlotStage},
    geometry::{MeshVertex, PositionVertex, TexturedVertex, VertexLayout, TERRAIN_OFFSET},
    overlay::OverlayFrame,
    state::ProgramState,
    timing::FrameTime,
};

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
struct ScenePipeline {
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

#[derive(Debug, Clone, Copy, Default)]
struct ScenePipelines {
    model: ScenePipeline,
    terrain: ScenePipeline,
    skybox: ScenePipeline,
    pyramid: ScenePipeline,
}

impl ScenePipelines {
    fn iter(&self) -> impl Iterator<Item = &ScenePipeline> {
        [&self.model, &self.terrain, &self.skybox, &self.pyramid].into_iter()
    }
}

/// Per-frame-in-flight synchronization and recording state.
#[derive(Debug, Clone, Copy, Default)]
struct FrameSync {
    command_buffer: vk::CommandBuffer,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

/// Draws the scene and the overlay into the window's swapchain.
pub struct SceneRenderer {
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    render_pass: vk::RenderPass,
    targets: Option<SwapchainTargets>,
    /// Window size the current swapchain was created for.
    target_size: [u32; 2],
    dirty_swapchain: bool,
    descriptor_pool: vk::DescriptorPool,
    scene_layout: vk::DescriptorSetLayout,
    texture_layouts: TextureLayouts,
    pipelines: ScenePipelines,
    resources: Option<SceneResources>,
    uniform_buffers: Vec<GpuBuffer>,
    scene_sets: Vec<vk::DescriptorSet>,
    frames: Vec<FrameSync>,
    current_frame: usize,
    overlay: Option<OverlayPainter>,
    ctx: VulkanContext,
}

impl SceneRenderer {
    pub fn new(window: &Window, config: &SceneConfig, assets: &SceneAssets) -> Result<Self> {
        let ctx = VulkanContext::new(window, config)?;
        let surface_format = swapchain::choose_surface_format(&ctx)?;
        let size = window.inner_size();

        let mut renderer = Self {
            surface_format,
            present_mode: config.present_mode,
            render_pass: vk::RenderPass::null(),
            targets: None,
            target_size: [size.width, size.height],
            dirty_swapchain: true,
            descriptor_pool: vk::DescriptorPool::null(),
            scene_layout: vk::DescriptorSetLayout::null(),
            texture_layouts: TextureLayouts {
                single: vk::DescriptorSetLayout::null(),
                material: vk::DescriptorSetLayout::null(),
                terrain: vk::DescriptorSetLayout::null(),
            },
            pipelines: ScenePipelines::default(),
            resources: None,
            uniform_buffers: vec![],
            scene_sets: vec![],
            frames: vec![],
            current_frame: 0,
            overlay: None,
            ctx,
        };
        // on error, Drop releases whatever was created
        renderer.init(assets)?;
        Ok(renderer)
    }

    fn init(&mut self, assets: &SceneAssets) -> Result<()> {
        let device = &self.ctx.device;
        self.render_pass = swapchain::create_render_pass(device, self.surface_format)?;

        self.scene_layout =
            descriptors::create_set_layout(device, &descriptors::scene_bindings())?;
        self.texture_layouts.single =
            descriptors::create_set_layout(device, &descriptors::texture_bindings(1))?;
        self.texture_layouts.material =
            descriptors::create_set_layout(device, &descriptors::texture_bindings(2))?;
        self.texture_layouts.terrain =
            descriptors::create_set_layout(device, &descriptors::texture_bindings(3))?;
        let frame_count = MAX_FRAMES_IN_FLIGHT as u32;
        let demand = assets.descriptor_demand();
        self.descriptor_pool = descriptors::create_pool(
            device,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: frame_count,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLED_IMAGE,
                    descriptor_count: demand.images,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLER,
                    descriptor_count: demand.samplers,
                },
            ],
            frame_count + demand.sets,
            vk::DescriptorPoolCreateFlags::empty(),
        )?;

        self.pipelines.model = self.create_scene_pipeline(
            "model",
            shaders::MODEL,
            &[self.scene_layout, self.texture_layouts.material],
            &MeshVertex::binding_descriptions(),
            &MeshVertex::attribute_descriptions(),
            FramePhase::DrawOpaque(OpaqueObject::House),
        )?;
        self.pipelines.terrain = self.create_scene_pipeline(
            "terrain",
            shaders::TERRAIN,
            &[self.scene_layout, self.texture_layouts.terrain],
            &TexturedVertex::binding_descriptions(),
            &TexturedVertex::attribute_descriptions(),
            FramePhase::DrawOpaque(OpaqueObject::Terrain),
        )?;
        self.pipelines.skybox = self.create_scene_pipeline(
            "skybox",
            shaders::SKYBOX,
            &[self.scene_layout, self.texture_layouts.single],
            &PositionVertex::binding_descriptions(),
            &PositionVertex::attribute_descriptions(),
            FramePhase::DrawSkybox,
        )?;
        self.pipelines.pyramid = self.create_scene_pipeline(
            "pyramid",
            shaders::PYRAMID,
            &[self.scene_layout],
            &PositionVertex::binding_descriptions(),
            &PositionVertex::attribute_descriptions(),
            FramePhase::DrawTranslucent,
        )?;

        self.resources = Some(SceneResources::new(
            &self.ctx,
            assets,
            self.descriptor_pool,
            self.texture_layouts,
        )?);

        self.scene_sets = descriptors::allocate_sets(
            &self.ctx.device,
            self.descriptor_pool,
            &[self.scene_layout; MAX_FRAMES_IN_FLIGHT],
        )?;
        for &set in &self.scene_sets {
            let buffer = GpuBuffer::host_visible(
                &self.ctx,
                "scene uniforms",
                std::mem::size_of::<SceneUniforms>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?;
            descriptors::write_uniform_set(&self.ctx.device, set, buffer.buffer);
            self.uniform_buffers.push(buffer);
        }

        self.create_frames()?;
        self.overlay = Some(OverlayPainter::new(
            &self.ctx,
            self.render_pass,
            MAX_FRAMES_IN_FLIGHT,
        )?);
        Ok(())
    }

    fn create_scene_pipeline(
        &self,
        name: &str,
        shaders: ShaderPair,
        set_layouts: &[vk::DescriptorSetLayout],
        bindings: &[vk::VertexInputBindingDescription],
        attributes: &[vk::VertexInputAttributeDescription],
        phase: FramePhase,
    ) -> Result<ScenePipeline> {
        let device = &self.ctx.device;
        let layout = pipeline::create_pipeline_layout(
            device,
            set_layouts,
            &[vk::PushConstantRange::builder()
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
                .offset(0)
                .size(std::mem::size_of::<ObjectConstants>() as u32)
                .build()],
        )?;
        let desc = PipelineDesc {
            name,
            shaders,
            bindings,
            attributes,
            phase,
        };
        match pipeline::create_pipeline(device, self.render_pass, layout, &desc) {
            Ok(pipeline) => Ok(ScenePipeline { layout, pipeline }),
            Err(err) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(err)
            }
        }
    }

    fn create_frames(&mut self) -> Result<()> {
        let device = &self.ctx.device;
        let command_buffers = unsafe {
            device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::builder()
                    .command_pool(self.ctx.command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(MAX_FRAMES_IN_FLIGHT as u32),
            )
        }
        .context("Failed to allocate frame command buffers")?;

        for command_buffer in command_buffers {
            // pushed first so Drop frees whatever part got created
            self.frames.push(FrameSync {
                command_buffer,
                ..Default::default()
            });
            let Some(frame) = self.frames.last_mut() else {
                continue;
            };
            unsafe {
                frame.image_available =
                    device.create_semaphore(&vk::SemaphoreCreateInfo::builder(), None)?;
                frame.render_finished =
                    device.create_semaphore(&vk::SemaphoreCreateInfo::builder(), None)?;
                frame.in_flight = device.create_fence(
                    &vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED),
                    None,
                )?;
            }
        }
        Ok(())
    }

    /// Largest texture side the overlay may ask for.
    pub fn max_texture_side(&self) -> usize {
        self.ctx.limits.max_image_dimension2_d as usize
    }

    /// Marks the swapchain for recreation before the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.target_size = [width, height];
        self.dirty_swapchain = true;
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        self.ctx.wait_idle();
        if let Some(mut targets) = self.targets.take() {
            targets.destroy(&self.ctx);
        }
        let [width, height] = self.target_size;
        self.targets = Some(SwapchainTargets::new(
            &self.ctx,
            self.render_pass,
            self.surface_format,
            self.present_mode,
            width,
            height,
        )?);
        self.dirty_swapchain = false;
        Ok(())
    }

    /// Records, submits and presents one frame.
    ///
    /// A zero-sized window skips the frame; an out-of-date swapchain is
    /// rebuilt on the next call.
    pub fn render(
        &mut self,
        state: &ProgramState,
        time: &FrameTime,
        width: u32,
        height: u32,
        overlay: Option<&OverlayFrame>,
    ) -> Result<()> {
        if let (Some(painter), Some(overlay)) = (self.overlay.as_mut(), overlay) {
            painter.update_textures(&self.ctx, &overlay.textures_delta)?;
        }
        if width == 0 || height == 0 {
            return Ok(());
        }
        if self.target_size != [width, height] {
            self.resize(width, height);
        }
        if self.dirty_swapchain || self.targets.is_none() {
            self.recreate_swapchain()?;
        }

        let Some(extent) = self.targets.as_ref().map(|targets| targets.extent) else {
            return Ok(());
        };
        let frame_index = self.current_frame;
        let frame = self.frames[frame_index];
        let Some(image_index) = self.acquire(frame)? else {
            return Ok(());
        };

        let mut stage = SlotStage::Acquired;
        let result = self.draw_frame(frame, image_index, extent, &mut stage, state, time, overlay);
        if let Some(recovery) = stage.recovery() {
            self.recover_slot(frame_index, recovery);
        }
        self.current_frame = (frame_index + 1) % self.frames.len();
        result
    }

    fn draw_frame(
        &mut self,
        frame: FrameSync,
        image_index: u32,
        extent: vk::Extent2D,
        stage: &mut SlotStage,
        state: &ProgramState,
        time: &FrameTime,
        overlay: Option<&OverlayFrame>,
    ) -> Result<()> {
        let aspect = extent.width as f32 / extent.height as f32;
        self.uniform_buffers[self.current_frame].write(
            0,
            &[SceneUniforms::for_frame(state, aspect, time.elapsed)],
        )?;

        for phase in frame_phases(overlay.is_some()) {
            match phase {
                FramePhase::Present => self.submit_and_present(frame, image_index, stage)?,
                phase => self.record_phase(phase, frame, image_index, state, time, overlay)?,
            }
        }
        Ok(())
    }

    /// Waits for the slot's previous work, then acquires an image.
    ///
    /// The fence stays signaled; it is reset right before the submit.
    fn acquire(&mut self, frame: FrameSync) -> Result<Option<u32>> {
        let device = &self.ctx.device;
        let Some(targets) = self.targets.as_ref() else {
            return Ok(None);
        };
        unsafe { device.wait_for_fences(&[frame.in_flight], true, u64::MAX) }
            .context("Failed to wait for the frame fence")?;

        let result = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                targets.swapchain,
                u64::MAX,
                frame.image_available,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => {
                self.dirty_swapchain |= suboptimal;
                Ok(Some(index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.dirty_swapchain = true;
                Ok(None)
            }
            Err(err) => Err(err).context("Failed to acquire swapchain image"),
        }
    }

    /// Settles a slot whose frame was dropped before reaching the queue.
    ///
    /// An empty batch consumes the image semaphore and signals the fence.
    /// The acquired image is never presented, so the swapchain is rebuilt.
    fn recover_slot(&mut self, index: usize, recovery: SlotRecovery) {
        self.dirty_swapchain = true;
        let frame = self.frames[index];
        let device = &self.ctx.device;
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(std::slice::from_ref(&frame.image_available))
            .wait_dst_stage_mask(&wait_stages);
        let released = unsafe {
            let reset = match recovery {
                SlotRecovery::ResetAndRelease => device.reset_fences(&[frame.in_flight]),
                SlotRecovery::Release => Ok(()),
            };
            reset.and_then(|()| {
                device.queue_submit(
                    self.ctx.queue,
                    std::slice::from_ref(&submit_info),
                    frame.in_flight,
                )
            })
        };
        if let Err(err) = released {
            log::warn!("Failed to release frame {index} ({err}), recreating its sync objects");
            if let Err(err) = self.replace_slot_sync(index) {
                log::error!("{err:#}");
            }
        }
    }

    /// Swaps in a fresh signaled fence and image semaphore for a slot.
    fn replace_slot_sync(&mut self, index: usize) -> Result<()> {
        self.ctx.wait_idle();
        let device = &self.ctx.device;
        let image_available = unsafe {
            device.create_semaphore(&vk::SemaphoreCreateInfo::builder(), None)
        }
        .context("Failed to create frame semaphore")?;
        let in_flight = match unsafe {
            device.create_fence(
                &vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED),
                None,
            )
        } {
            Ok(fence) => fence,
            Err(err) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(err).context("Failed to create frame fence");
            }
        };

        let frame = &mut self.frames[index];
        unsafe {
            device.destroy_semaphore(frame.image_available, None);
            device.destroy_fence(frame.in_flight, None);
        }
        frame.image_available = image_available;
        frame.in_flight = in_flight;
        Ok(())
    }

    fn record_phase(
        &mut self,
        phase: FramePhase,
        frame: FrameSync,
        image_index: u32,
        state: &ProgramState,
        time: &FrameTime,
        overlay: Option<&OverlayFrame>,
    ) -> Result<()> {
        let cmd = frame.command_buffer;
        let Some(targets) = self.targets.as_ref() else {
            return Ok(());
        };
        let Some(resources) = self.resources.as_ref() else {
            return Ok(());
        };
        let device = &self.ctx.device;
        let scene_set = self.scene_sets[self.current_frame];

        match phase {
            FramePhase::Idle | FramePhase::Present => {}
            FramePhase::BeginFrame => unsafe {
                device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::RELEASE_RESOURCES)?;
                device.begin_command_buffer(
                    cmd,
                    &vk::CommandBufferBeginInfo::builder()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )?;
            },
            FramePhase::ClearAndSetUp => unsafe {
                let clear_values = clear_values(state.clear_color);
                device.cmd_begin_render_pass(
                    cmd,
                    &vk::RenderPassBeginInfo::builder()
                        .render_pass(self.render_pass)
                        .framebuffer(targets.framebuffers[image_index as usize])
                        .render_area(vk::Rect2D {
                            offset: vk::Offset2D::default(),
                            extent: targets.extent,
                        })
                        .clear_values(&clear_values),
                    vk::SubpassContents::INLINE,
                );
                device.cmd_set_viewport(cmd, 0, &[full_viewport(targets.extent)]);
                device.cmd_set_scissor(
                    cmd,
                    0,
                    &[vk::Rect2D {
                        offset: vk::Offset2D::default(),
                        extent: targets.extent,
                    }],
                );
            },
            FramePhase::DrawOpaque(OpaqueObject::House) => {
                let Some(house) = resources.mesh(SceneMesh::House) else {
                    return Ok(());
                };
                let pipeline = self.pipelines.model;
                unsafe {
                    device.cmd_bind_pipeline(
                        cmd,
                        vk::PipelineBindPoint::GRAPHICS,
                        pipeline.pipeline,
                    );
                }
                push(
                    device,
                    cmd,
                    pipeline,
                    ObjectConstants::model(house_model(state.house_position, state.house_scale)),
                );
                house.bind(device, cmd);
                for (part, material_set) in resources.house_parts() {
                    unsafe {
                        device.cmd_bind_descriptor_sets(
                            cmd,
                            vk::PipelineBindPoint::GRAPHICS,
                            pipeline.layout,
                            0,
                            &[scene_set, material_set],
                            &[],
                        );
                    }
                    house.draw_range(device, cmd, part.first_vertex, part.vertex_count);
                }
            }
            FramePhase::DrawOpaque(OpaqueObject::Terrain) => {
                let Some(terrain) = resources.mesh(SceneMesh::Terrain) else {
                    return Ok(());
                };
                let pipeline = self.pipelines.terrain;
                bind(device, cmd, pipeline, &[scene_set, resources.terrain_set]);
                push(
                    device,
                    cmd,
                    pipeline,
                    ObjectConstants::model(Mat4::from_translation(TERRAIN_OFFSET)),
                );
                terrain.draw(device, cmd);
            }
            FramePhase::DrawSkybox => {
                let Some(skybox) = resources.mesh(SceneMesh::Skybox) else {
                    return Ok(());
                };
                bind(
                    device,
                    cmd,
                    self.pipelines.skybox,
                    &[scene_set, resources.skybox_set],
                );
                skybox.draw(device, cmd);
            }
            FramePhase::DrawTranslucent => {
                let Some(pyramid) = resources.mesh(SceneMesh::Pyramid) else {
                    return Ok(());
                };
                let pipeline = self.pipelines.pyramid;
                let color = animation::point_light_color(state, time.elapsed)
                    .extend(animation::PYRAMID_ALPHA);
                bind(device, cmd, pipeline, &[scene_set]);
                for model in animation::pyramid_transforms(state.pyramid_position, time.elapsed) {
                    push(device, cmd, pipeline, ObjectConstants::new(model, color));
                    pyramid.draw(device, cmd);
                }
            }
            FramePhase::DrawOverlay => {
                let extent = targets.extent;
                if let (Some(painter), Some(overlay)) = (self.overlay.as_mut(), overlay) {
                    painter.record(&self.ctx, cmd, self.current_frame, overlay, extent)?;
                }
            }
        }
        Ok(())
    }

    fn submit_and_present(
        &mut self,
        frame: FrameSync,
        image_index: u32,
        stage: &mut SlotStage,
    ) -> Result<()> {
        let device = &self.ctx.device;
        let Some(targets) = self.targets.as_ref() else {
            return Ok(());
        };
        let cmd = frame.command_buffer;
        unsafe {
            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd)?;
        }

        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(std::slice::from_ref(&cmd))
            .wait_semaphores(std::slice::from_ref(&frame.image_available))
            .wait_dst_stage_mask(&[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT])
            .signal_semaphores(std::slice::from_ref(&frame.render_finished));
        unsafe { device.reset_fences(&[frame.in_flight]) }
            .context("Failed to reset the frame fence")?;
        *stage = stage.fence_reset();
        unsafe {
            device.queue_submit(
                self.ctx.queue,
                std::slice::from_ref(&submit_info),
                frame.in_flight,
            )
        }
        .context("Failed to submit frame")?;
        *stage = SlotStage::Submitted;

        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(std::slice::from_ref(&frame.render_finished))
            .swapchains(std::slice::from_ref(&targets.swapchain))
            .image_indices(&image_indices);
        let result = unsafe {
            self.ctx
                .swapchain_loader
                .queue_present(self.ctx.queue, &present_info)
        };
        match result {
            Ok(false) => {}
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => {
                self.dirty_swapchain = true;
            }
            Err(err) => return Err(err).context("Failed to present"),
        }
        Ok(())
    }
}

impl Drop for SceneRenderer {
    fn drop(&mut self) {
        let ctx = &self.ctx;
        ctx.wait_idle();
        if let Some(mut painter) = self.overlay.take() {
            painter.destroy(ctx);
        }
        unsafe {
            for frame in self.frames.drain(..) {
                ctx.device.destroy_fence(frame.in_flight, None);
                ctx.device.destroy_semaphore(frame.render_finished, None);
                ctx.device.destroy_semaphore(frame.image_available, None);
                ctx.device
                    .free_command_buffers(ctx.command_pool, &[frame.command_buffer]);
            }
        }
        for mut buffer in self.uniform_buffers.drain(..) {
            buffer.destroy(ctx);
        }
        if let Some(mut resources) = self.resources.take() {
            resources.destroy(ctx);
        }
        if let Some(mut targets) = self.targets.take() {
            targets.destroy(ctx);
        }
        unsafe {
            for pipeline in self.pipelines.iter() {
                ctx.device.destroy_pipeline(pipeline.pipeline, None);
                ctx.device.destroy_pipeline_layout(pipeline.layout, None);
            }
            ctx.device.destroy_descriptor_pool(self.descriptor_pool, None);
            ctx.device
                .destroy_descriptor_set_layout(self.texture_layouts.terrain, None);
            ctx.device
                .destroy_descriptor_set_layout(self.texture_layouts.material, None);
            ctx.device
                .destroy_descriptor_set_layout(self.texture_layouts.single, None);
            ctx.device.destroy_descriptor_set_layout(self.scene_layout, None);
            ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

fn bind(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    pipeline: ScenePipeline,
    sets: &[vk::DescriptorSet],
) {
    unsafe {
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline.layout,
            0,
            sets,
            &[],
        );
    }
}

fn push(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    pipeline: ScenePipeline,
    constants: ObjectConstants,
) {
    unsafe {
        device.cmd_push_constants(
            cmd,
            pipeline.layout,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            0,
            bytemuck::bytes_of(&constants),
        );
    }
}

/// Color attachment cleared to the background, depth to the far plane.
pub fn clear_values(clear_color: Vec3) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color.extend(1.0).to_array(),
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Translate then uniformly scale.
pub fn house_model(position: Vec3, scale: f32) -> Mat4 {
    Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn house_scales_about_its_origin() {
        let model = house_model(Vec3::new(50.0, 0.0, 0.0), 2.0);
        assert_eq!(model.transform_point3(Vec3::ZERO), Vec3::new(50.0, 0.0, 0.0));
        assert_eq!(
            model.transform_point3(Vec3::new(1.0, 1.0, 0.0)),
            Vec3::new(52.0, 2.0, 0.0)
        );
    }

    #[test]
    fn clear_uses_background_and_far_depth() {
        let [color, depth] = clear_values(Vec3::new(0.1, 0.2, 0.3));
        unsafe {
            assert_eq!(color.color.float32, [0.1, 0.2, 0.3, 1.0]);
            assert_eq!(depth.depth_stencil.depth, 1.0);
        }
    }

    #[test]
    fn viewport_covers_the_framebuffer() {
        let viewport = full_viewport(vk::Extent2D {
            width: 1280,
            height: 720,
        });
        assert_eq!((viewport.width, viewport.height), (1280.0, 720.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
    }
}
