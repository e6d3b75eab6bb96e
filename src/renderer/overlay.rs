use anyhow::{bail, Context, Result};
use ash::vk;
use std::collections::HashMap;

use super::{
    buffer::GpuBuffer,
    context::VulkanContext,
    descriptors,
    image::{create_sampler, GpuImage, SamplerKind},
    pipeline::{self, PipelineDesc},
    shaders,
};
use crate::{frame::FramePhase, overlay::OverlayFrame};

// per frame in flight
const VERTEX_BUFFER_SIZE: vk::DeviceSize = 1024 * 1024 * 4;
const INDEX_BUFFER_SIZE: vk::DeviceSize = 1024 * 1024 * 4;
const MAX_TEXTURES: u32 = 64;

struct ManagedTexture {
    image: GpuImage,
    set: vk::DescriptorSet,
}

/// Draws egui output on top of the scene inside the main render pass.
pub struct OverlayPainter {
    set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    sampler: vk::Sampler,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    textures: HashMap<egui::TextureId, ManagedTexture>,
    /// Freed by egui last frame; released once the GPU is idle.
    pending_free: Vec<egui::TextureId>,
    vertex_buffers: Vec<GpuBuffer>,
    index_buffers: Vec<GpuBuffer>,
}

impl OverlayPainter {
    pub fn new(
        ctx: &VulkanContext,
        render_pass: vk::RenderPass,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let mut painter = Self {
            set_layout: vk::DescriptorSetLayout::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            sampler: vk::Sampler::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            textures: HashMap::new(),
            pending_free: vec![],
            vertex_buffers: vec![],
            index_buffers: vec![],
        };
        if let Err(err) = painter.init(ctx, render_pass, frames_in_flight) {
            painter.destroy(ctx);
            return Err(err.context("Failed to set up the overlay painter"));
        }
        Ok(painter)
    }

    fn init(
        &mut self,
        ctx: &VulkanContext,
        render_pass: vk::RenderPass,
        frames_in_flight: usize,
    ) -> Result<()> {
        let device = &ctx.device;
        self.set_layout =
            descriptors::create_set_layout(device, &descriptors::texture_bindings(1))?;
        self.descriptor_pool = descriptors::create_pool(
            device,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLED_IMAGE,
                    descriptor_count: MAX_TEXTURES,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLER,
                    descriptor_count: MAX_TEXTURES,
                },
            ],
            MAX_TEXTURES,
            vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
        )?;
        self.sampler = create_sampler(device, SamplerKind::ClampLinear)?;
        self.pipeline_layout = pipeline::create_pipeline_layout(
            device,
            &[self.set_layout],
            &[vk::PushConstantRange::builder()
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .offset(0)
                .size(std::mem::size_of::<[f32; 2]>() as u32)
                .build()],
        )?;
        self.pipeline = pipeline::create_pipeline(
            device,
            render_pass,
            self.pipeline_layout,
            &PipelineDesc {
                name: "overlay",
                shaders: shaders::OVERLAY,
                bindings: &[vk::VertexInputBindingDescription::builder()
                    .binding(0)
                    .stride(std::mem::size_of::<egui::epaint::Vertex>() as u32)
                    .input_rate(vk::VertexInputRate::VERTEX)
                    .build()],
                attributes: &overlay_attributes(),
                phase: FramePhase::DrawOverlay,
            },
        )?;

        for _ in 0..frames_in_flight {
            self.vertex_buffers.push(GpuBuffer::host_visible(
                ctx,
                "overlay vertex buffer",
                VERTEX_BUFFER_SIZE,
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?);
            self.index_buffers.push(GpuBuffer::host_visible(
                ctx,
                "overlay index buffer",
                INDEX_BUFFER_SIZE,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?);
        }
        Ok(())
    }

    /// Applies egui's texture changes. Waits for the device when anything
    /// changes, since frames in flight may still sample the old images.
    pub fn update_textures(&mut self, ctx: &VulkanContext, delta: &egui::TexturesDelta) -> Result<()> {
        if delta.set.is_empty() && delta.free.is_empty() && self.pending_free.is_empty() {
            return Ok(());
        }
        ctx.wait_idle();

        for id in std::mem::take(&mut self.pending_free) {
            if let Some(texture) = self.textures.remove(&id) {
                self.release(ctx, texture);
            }
        }
        for (id, image_delta) in &delta.set {
            self.set_texture(ctx, *id, image_delta)
                .with_context(|| format!("Failed to update overlay texture {id:?}"))?;
        }
        self.pending_free.extend(delta.free.iter().copied());
        Ok(())
    }

    fn set_texture(
        &mut self,
        ctx: &VulkanContext,
        id: egui::TextureId,
        delta: &egui::epaint::ImageDelta,
    ) -> Result<()> {
        let pixels = image_delta_pixels(&delta.image);
        let [width, height] = delta.image.size().map(|side| side as u32);

        if let Some([x, y]) = delta.pos {
            let Some(texture) = self.textures.get(&id) else {
                bail!("Partial update of unknown texture");
            };
            return texture.image.write_region(
                ctx,
                &pixels,
                [x as u32, y as u32],
                [width, height],
                false,
            );
        }

        let mut image =
            GpuImage::overlay_texture(ctx, "overlay texture", vk::Extent2D { width, height })?;
        let sets = image
            .write_region(ctx, &pixels, [0, 0], [width, height], true)
            .and_then(|()| {
                descriptors::allocate_sets(&ctx.device, self.descriptor_pool, &[self.set_layout])
            });
        let set = match sets {
            Ok(sets) if !sets.is_empty() => sets[0],
            Ok(_) => {
                image.destroy(ctx);
                bail!("No descriptor set for a {width}x{height} overlay texture");
            }
            Err(err) => {
                image.destroy(ctx);
                return Err(err);
            }
        };
        descriptors::write_texture_set(&ctx.device, set, &[image.view], self.sampler);

        if let Some(old) = self.textures.insert(id, ManagedTexture { image, set }) {
            self.release(ctx, old);
        }
        Ok(())
    }

    fn release(&self, ctx: &VulkanContext, mut texture: ManagedTexture) {
        if let Err(err) = unsafe {
            ctx.device
                .free_descriptor_sets(self.descriptor_pool, &[texture.set])
        } {
            log::error!("Failed to free overlay descriptor set: {err}");
        }
        texture.image.destroy(ctx);
    }

    /// Records the overlay draws into an active render pass.
    pub fn record(
        &mut self,
        ctx: &VulkanContext,
        cmd: vk::CommandBuffer,
        frame: usize,
        overlay: &OverlayFrame,
        extent: vk::Extent2D,
    ) -> Result<()> {
        let device = &ctx.device;
        let pixels_per_point = overlay.pixels_per_point;
        let vertex_buffer = &mut self.vertex_buffers[frame];
        let index_buffer = &mut self.index_buffers[frame];
        let screen_size = [
            extent.width as f32 / pixels_per_point,
            extent.height as f32 / pixels_per_point,
        ];

        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, index_buffer.buffer, 0, vk::IndexType::UINT32);
            device.cmd_push_constants(
                cmd,
                self.pipeline_layout,
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&screen_size),
            );
        }

        let mut vertex_offset = 0;
        let mut index_offset = 0;
        let mut vertex_base = 0;
        let mut index_base = 0;
        for egui::ClippedPrimitive {
            clip_rect,
            primitive,
        } in &overlay.primitives
        {
            let egui::epaint::Primitive::Mesh(mesh) = primitive else {
                continue;
            };
            if mesh.vertices.is_empty() || mesh.indices.is_empty() {
                continue;
            }
            let Some(texture) = self.textures.get(&mesh.texture_id) else {
                log::warn!("Overlay mesh references unknown texture {:?}", mesh.texture_id);
                continue;
            };
            let Some(scissor) = scissor_rect(*clip_rect, pixels_per_point, extent) else {
                continue;
            };

            let vertex_bytes = std::mem::size_of_val(mesh.vertices.as_slice());
            let index_bytes = std::mem::size_of_val(mesh.indices.as_slice());
            if (vertex_offset + vertex_bytes) as vk::DeviceSize > VERTEX_BUFFER_SIZE
                || (index_offset + index_bytes) as vk::DeviceSize > INDEX_BUFFER_SIZE
            {
                log::warn!("Overlay geometry does not fit its buffers, skipping the rest");
                break;
            }
            vertex_buffer.write(vertex_offset, &mesh.vertices)?;
            index_buffer.write(index_offset, &mesh.indices)?;

            unsafe {
                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline_layout,
                    0,
                    &[texture.set],
                    &[],
                );
                device.cmd_set_scissor(cmd, 0, &[scissor]);
                device.cmd_draw_indexed(
                    cmd,
                    mesh.indices.len() as u32,
                    1,
                    index_base,
                    vertex_base,
                    0,
                );
            }

            vertex_offset += vertex_bytes;
            index_offset += index_bytes;
            vertex_base += mesh.vertices.len() as i32;
            index_base += mesh.indices.len() as u32;
        }
        Ok(())
    }

    pub fn destroy(&mut self, ctx: &VulkanContext) {
        let textures = std::mem::take(&mut self.textures);
        for (_, texture) in textures {
            let mut image = texture.image;
            image.destroy(ctx);
        }
        for mut buffer in self.vertex_buffers.drain(..).chain(self.index_buffers.drain(..)) {
            buffer.destroy(ctx);
        }
        unsafe {
            ctx.device.destroy_pipeline(self.pipeline, None);
            ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            ctx.device.destroy_sampler(self.sampler, None);
            ctx.device.destroy_descriptor_pool(self.descriptor_pool, None);
            ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

fn overlay_attributes() -> [vk::VertexInputAttributeDescription; 3] {
    let attribute = |location, format, offset| {
        vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(location)
            .format(format)
            .offset(offset)
            .build()
    };
    [
        // position
        attribute(0, vk::Format::R32G32_SFLOAT, 0),
        // uv
        attribute(1, vk::Format::R32G32_SFLOAT, 8),
        // premultiplied color
        attribute(2, vk::Format::R8G8B8A8_UNORM, 16),
    ]
}

/// RGBA8 bytes for an egui image; font coverage becomes premultiplied white.
pub fn image_delta_pixels(image: &egui::ImageData) -> Vec<u8> {
    match image {
        egui::ImageData::Color(image) => image
            .pixels
            .iter()
            .flat_map(|color| color.to_array())
            .collect(),
        egui::ImageData::Font(image) => image
            .srgba_pixels(None)
            .flat_map(|color| color.to_array())
            .collect(),
    }
}

/// Converts a clip rectangle in points into a framebuffer scissor, or `None`
/// when nothing of it is on screen.
pub fn scissor_rect(
    clip_rect: egui::Rect,
    pixels_per_point: f32,
    extent: vk::Extent2D,
) -> Option<vk::Rect2D> {
    let (width, height) = (extent.width as f32, extent.height as f32);
    let min_x = (clip_rect.min.x * pixels_per_point).round().clamp(0.0, width);
    let min_y = (clip_rect.min.y * pixels_per_point).round().clamp(0.0, height);
    let max_x = (clip_rect.max.x * pixels_per_point).round().clamp(min_x, width);
    let max_y = (clip_rect.max.y * pixels_per_point).round().clamp(min_y, height);

    let extent = vk::Extent2D {
        width: (max_x - min_x) as u32,
        height: (max_y - min_y) as u32,
    };
    if extent.width == 0 || extent.height == 0 {
        return None;
    }
    Some(vk::Rect2D {
        offset: vk::Offset2D {
            x: min_x as i32,
            y: min_y as i32,
        },
        extent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, Color32, ColorImage, FontImage, ImageData, Rect};

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    #[test]
    fn scissor_scales_points_to_pixels() {
        let rect = Rect::from_min_max(pos2(10.0, 20.0), pos2(110.0, 70.0));
        let scissor = scissor_rect(rect, 2.0, EXTENT).unwrap();
        assert_eq!((scissor.offset.x, scissor.offset.y), (20, 40));
        assert_eq!((scissor.extent.width, scissor.extent.height), (200, 100));
    }

    #[test]
    fn scissor_is_clamped_to_the_framebuffer() {
        let rect = Rect::from_min_max(pos2(-50.0, -50.0), pos2(10_000.0, 10_000.0));
        let scissor = scissor_rect(rect, 1.0, EXTENT).unwrap();
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
        assert_eq!((scissor.extent.width, scissor.extent.height), (800, 600));

        let offscreen = Rect::from_min_max(pos2(900.0, 0.0), pos2(1000.0, 10.0));
        assert!(scissor_rect(offscreen, 1.0, EXTENT).is_none());
    }

    #[test]
    fn color_images_keep_their_bytes() {
        let image = ImageData::Color(ColorImage::new([2, 1], Color32::RED).into());
        assert_eq!(image_delta_pixels(&image), [255, 0, 0, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn full_font_coverage_is_opaque_white() {
        let mut font = FontImage::new([1, 1]);
        font.pixels[0] = 1.0;
        assert_eq!(image_delta_pixels(&ImageData::Font(font)), [255, 255, 255, 255]);
    }

    #[test]
    fn vertex_layout_matches_egui() {
        let attributes = overlay_attributes();
        assert_eq!(std::mem::size_of::<egui::epaint::Vertex>(), 20);
        assert_eq!(attributes[2].offset, 16);
    }
}
