use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::{vulkan::Allocation, MemoryLocation};

use super::context::VulkanContext;

pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Prefers an 8-bit UNORM surface: the scene and the overlay both write
/// colors that are already in display space.
pub fn choose_surface_format(ctx: &VulkanContext) -> Result<vk::SurfaceFormatKHR> {
    let surface_formats = unsafe {
        ctx.surface_loader
            .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
    }
    .context("Failed to query surface formats")?;
    let preferred = surface_formats.iter().find(|surface_format| {
        (surface_format.format == vk::Format::B8G8R8A8_UNORM
            || surface_format.format == vk::Format::R8G8B8A8_UNORM)
            && surface_format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    preferred
        .or(surface_formats.first())
        .copied()
        .context("Surface reports no formats")
}

/// Clamps the window size into what the surface accepts, unless the surface
/// dictates its own extent.
pub fn surface_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

pub fn create_render_pass(
    device: &ash::Device,
    surface_format: vk::SurfaceFormatKHR,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::builder()
            .format(surface_format.format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build(),
        vk::AttachmentDescription::builder()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build(),
    ];
    let color_reference = [vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build()];
    let depth_reference = vk::AttachmentReference::builder()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_reference)
        .depth_stencil_attachment(&depth_reference)
        .build()];
    let dependencies = [vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .build()];

    unsafe {
        device.create_render_pass(
            &vk::RenderPassCreateInfo::builder()
                .attachments(&attachments)
                .subpasses(&subpasses)
                .dependencies(&dependencies),
            None,
        )
    }
    .context("Failed to create render pass")
}

struct DepthTarget {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

/// Swapchain images plus one depth buffer and framebuffer per image.
pub struct SwapchainTargets {
    pub swapchain: vk::SwapchainKHR,
    pub extent: vk::Extent2D,
    color_views: Vec<vk::ImageView>,
    depth_targets: Vec<DepthTarget>,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainTargets {
    pub fn new(
        ctx: &VulkanContext,
        render_pass: vk::RenderPass,
        surface_format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let capabilities = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
        }
        .context("Failed to query surface capabilities")?;
        let present_modes = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
        }
        .context("Failed to query present modes")?;
        let present_mode = if present_modes.contains(&present_mode) {
            present_mode
        } else {
            log::warn!("{present_mode:?} is not supported, falling back to FIFO");
            vk::PresentModeKHR::FIFO
        };
        let extent = surface_extent(&capabilities, width, height);

        let swapchain = unsafe {
            ctx.swapchain_loader.create_swapchain(
                &vk::SwapchainCreateInfoKHR::builder()
                    .surface(ctx.surface)
                    .min_image_count(image_count(&capabilities))
                    .image_format(surface_format.format)
                    .image_color_space(surface_format.color_space)
                    .image_extent(extent)
                    .image_array_layers(1)
                    .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                    .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .pre_transform(capabilities.current_transform)
                    .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                    .present_mode(present_mode)
                    .clipped(true),
                None,
            )
        }
        .context("Failed to create swapchain")?;
        log::debug!(
            "Swapchain {}x{} {:?} {present_mode:?}",
            extent.width,
            extent.height,
            surface_format.format
        );

        let mut targets = Self {
            swapchain,
            extent,
            color_views: vec![],
            depth_targets: vec![],
            framebuffers: vec![],
        };
        if let Err(err) = targets.create_framebuffers(ctx, render_pass, surface_format) {
            targets.destroy(ctx);
            return Err(err);
        }
        Ok(targets)
    }

    fn create_framebuffers(
        &mut self,
        ctx: &VulkanContext,
        render_pass: vk::RenderPass,
        surface_format: vk::SurfaceFormatKHR,
    ) -> Result<()> {
        let images = unsafe { ctx.swapchain_loader.get_swapchain_images(self.swapchain) }
            .context("Failed to get swapchain images")?;

        for image in images {
            let color_view = unsafe {
                ctx.device.create_image_view(
                    &vk::ImageViewCreateInfo::builder()
                        .image(image)
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .format(surface_format.format)
                        .subresource_range(crate::utils::color_subresource_range(0, 1, 1)),
                    None,
                )
            }
            .context("Failed to create swapchain image view")?;
            self.color_views.push(color_view);

            let depth = self.create_depth_target(ctx)?;
            let attachments = [color_view, depth.view];
            self.depth_targets.push(depth);

            let framebuffer = unsafe {
                ctx.device.create_framebuffer(
                    &vk::FramebufferCreateInfo::builder()
                        .render_pass(render_pass)
                        .attachments(&attachments)
                        .width(self.extent.width)
                        .height(self.extent.height)
                        .layers(1),
                    None,
                )
            }
            .context("Failed to create framebuffer")?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    fn create_depth_target(&self, ctx: &VulkanContext) -> Result<DepthTarget> {
        let image = unsafe {
            ctx.device.create_image(
                &vk::ImageCreateInfo::builder()
                    .image_type(vk::ImageType::TYPE_2D)
                    .format(DEPTH_FORMAT)
                    .extent(vk::Extent3D {
                        width: self.extent.width,
                        height: self.extent.height,
                        depth: 1,
                    })
                    .mip_levels(1)
                    .array_layers(1)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
                    .initial_layout(vk::ImageLayout::UNDEFINED),
                None,
            )
        }
        .context("Failed to create depth image")?;
        let mut target = DepthTarget {
            image,
            view: vk::ImageView::null(),
            allocation: None,
        };

        let result = (|| -> Result<()> {
            let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
            let allocation =
                ctx.memory
                    .allocate("depth image", requirements, MemoryLocation::GpuOnly, false)?;
            unsafe {
                ctx.device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
            }?;
            target.allocation = Some(allocation);
            target.view = unsafe {
                ctx.device.create_image_view(
                    &vk::ImageViewCreateInfo::builder()
                        .image(image)
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .format(DEPTH_FORMAT)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::DEPTH,
                            base_mip_level: 0,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        }),
                    None,
                )
            }?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(target),
            Err(err) => {
                Self::destroy_depth_target(ctx, target);
                Err(err.context("Failed to create depth buffer"))
            }
        }
    }

    fn destroy_depth_target(ctx: &VulkanContext, target: DepthTarget) {
        unsafe {
            ctx.device.destroy_image_view(target.view, None);
            ctx.device.destroy_image(target.image, None);
        }
        ctx.memory.release(target.allocation);
    }

    pub fn image_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// The device must be idle.
    pub fn destroy(&mut self, ctx: &VulkanContext) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                ctx.device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.color_views.drain(..) {
                ctx.device.destroy_image_view(view, None);
            }
        }
        for target in self.depth_targets.drain(..) {
            Self::destroy_depth_target(ctx, target);
        }
        unsafe {
            ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn surface_extent_wins_when_fixed() {
        let caps = capabilities((1024, 768), 2, 0);
        assert_eq!(
            surface_extent(&caps, 800, 600),
            vk::Extent2D {
                width: 1024,
                height: 768
            }
        );
    }

    #[test]
    fn window_size_is_clamped_when_surface_is_flexible() {
        let caps = capabilities((u32::MAX, u32::MAX), 2, 0);
        assert_eq!(
            surface_extent(&caps, 800, 600),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
        assert_eq!(surface_extent(&caps, 10_000, 0).width, 4096);
        assert_eq!(surface_extent(&caps, 10_000, 0).height, 1);
    }

    #[test]
    fn one_image_more_than_minimum_within_limit() {
        assert_eq!(image_count(&capabilities((1, 1), 2, 0)), 3);
        assert_eq!(image_count(&capabilities((1, 1), 2, 3)), 3);
        assert_eq!(image_count(&capabilities((1, 1), 3, 3)), 3);
    }
}
