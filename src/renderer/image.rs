use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::{vulkan::Allocation, MemoryLocation};

use super::{buffer::GpuBuffer, context::VulkanContext};
use crate::{
    texture::{CubemapData, TextureData},
    utils::{color_subresource_range, insert_image_memory_barrier, LayoutTransition},
};

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// A sampled image and its view.
pub struct GpuImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
    allocation: Option<Allocation>,
}

struct ImageDesc<'a> {
    name: &'a str,
    extent: vk::Extent2D,
    mip_levels: u32,
    layers: u32,
    flags: vk::ImageCreateFlags,
    view_type: vk::ImageViewType,
}

impl GpuImage {
    fn allocate(ctx: &VulkanContext, desc: &ImageDesc) -> Result<Self> {
        let image = unsafe {
            ctx.device.create_image(
                &vk::ImageCreateInfo::builder()
                    .flags(desc.flags)
                    .image_type(vk::ImageType::TYPE_2D)
                    .format(TEXTURE_FORMAT)
                    .extent(vk::Extent3D {
                        width: desc.extent.width,
                        height: desc.extent.height,
                        depth: 1,
                    })
                    .mip_levels(desc.mip_levels)
                    .array_layers(desc.layers)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .tiling(vk::ImageTiling::OPTIMAL)
                    .usage(
                        vk::ImageUsageFlags::SAMPLED
                            | vk::ImageUsageFlags::TRANSFER_DST
                            | vk::ImageUsageFlags::TRANSFER_SRC,
                    )
                    .sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .initial_layout(vk::ImageLayout::UNDEFINED),
                None,
            )
        }
        .with_context(|| format!("Failed to create image {}", desc.name))?;
        let mut this = Self {
            image,
            view: vk::ImageView::null(),
            extent: desc.extent,
            allocation: None,
        };

        let result = (|| -> Result<()> {
            let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
            let allocation =
                ctx.memory
                    .allocate(desc.name, requirements, MemoryLocation::GpuOnly, false)?;
            let bound = unsafe {
                ctx.device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
            };
            this.allocation = Some(allocation);
            bound?;
            this.view = unsafe {
                ctx.device.create_image_view(
                    &vk::ImageViewCreateInfo::builder()
                        .image(image)
                        .view_type(desc.view_type)
                        .format(TEXTURE_FORMAT)
                        .subresource_range(color_subresource_range(
                            0,
                            desc.mip_levels,
                            desc.layers,
                        )),
                    None,
                )
            }?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(this),
            Err(err) => {
                this.destroy(ctx);
                Err(err.context(format!("Failed to back image {}", desc.name)))
            }
        }
    }

    /// Uploads a 2D texture and fills its mip chain with linear blits.
    ///
    /// Falls back to a single level when the device cannot blit the format
    /// with linear filtering.
    pub fn texture_2d(ctx: &VulkanContext, name: &str, texture: &TextureData) -> Result<Self> {
        let format_properties = unsafe {
            ctx.instance
                .get_physical_device_format_properties(ctx.physical_device, TEXTURE_FORMAT)
        };
        let mip_levels = if supports_linear_blit(format_properties.optimal_tiling_features) {
            texture.mip_levels()
        } else {
            log::warn!("Linear blits unsupported, {name} gets no mipmaps");
            1
        };
        let extent = vk::Extent2D {
            width: texture.width,
            height: texture.height,
        };

        let mut image = Self::allocate(
            ctx,
            &ImageDesc {
                name,
                extent,
                mip_levels,
                layers: 1,
                flags: vk::ImageCreateFlags::empty(),
                view_type: vk::ImageViewType::TYPE_2D,
            },
        )?;
        let uploaded = upload(ctx, &texture.pixels, |device, cmd, staging| {
            let target = image.image;
            insert_image_memory_barrier(
                device,
                cmd,
                target,
                LayoutTransition::UNDEFINED_TO_TRANSFER_DST,
                color_subresource_range(0, mip_levels, 1),
            );
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging,
                    target,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[copy_region(extent, vk::Offset3D::default(), 0, 0)],
                );
            }
            generate_mipmaps(device, cmd, target, extent, mip_levels);
        });
        if let Err(err) = uploaded {
            image.destroy(ctx);
            return Err(err.context(format!("Failed to upload {name}")));
        }
        Ok(image)
    }

    /// Uploads six faces as the array layers of a cube-compatible image.
    pub fn cubemap(ctx: &VulkanContext, name: &str, cubemap: &CubemapData) -> Result<Self> {
        let extent = vk::Extent2D {
            width: cubemap.size,
            height: cubemap.size,
        };
        let mut image = Self::allocate(
            ctx,
            &ImageDesc {
                name,
                extent,
                mip_levels: 1,
                layers: 6,
                flags: vk::ImageCreateFlags::CUBE_COMPATIBLE,
                view_type: vk::ImageViewType::CUBE,
            },
        )?;
        let face_bytes = (cubemap.size * cubemap.size * 4) as vk::DeviceSize;
        let uploaded = upload(ctx, &cubemap.layer_bytes(), |device, cmd, staging| {
            let target = image.image;
            let range = color_subresource_range(0, 1, 6);
            insert_image_memory_barrier(
                device,
                cmd,
                target,
                LayoutTransition::UNDEFINED_TO_TRANSFER_DST,
                range,
            );
            let regions = (0..6u32)
                .map(|layer| {
                    let mut region = copy_region(extent, vk::Offset3D::default(), 0, layer);
                    region.buffer_offset = face_bytes * layer as vk::DeviceSize;
                    region
                })
                .collect::<Vec<_>>();
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging,
                    target,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &regions,
                );
            }
            insert_image_memory_barrier(
                device,
                cmd,
                target,
                LayoutTransition::TRANSFER_DST_TO_SHADER_READ,
                range,
            );
        });
        if let Err(err) = uploaded {
            image.destroy(ctx);
            return Err(err.context(format!("Failed to upload {name}")));
        }
        Ok(image)
    }

    /// Single-level RGBA image for the overlay's texture atlas.
    pub fn overlay_texture(ctx: &VulkanContext, name: &str, extent: vk::Extent2D) -> Result<Self> {
        Self::allocate(
            ctx,
            &ImageDesc {
                name,
                extent,
                mip_levels: 1,
                layers: 1,
                flags: vk::ImageCreateFlags::empty(),
                view_type: vk::ImageViewType::TYPE_2D,
            },
        )
    }

    /// Writes RGBA pixels into a region of level 0. A `fresh` image has no
    /// contents worth keeping yet.
    pub fn write_region(
        &self,
        ctx: &VulkanContext,
        pixels: &[u8],
        offset: [u32; 2],
        size: [u32; 2],
        fresh: bool,
    ) -> Result<()> {
        let target = self.image;
        let extent = vk::Extent2D {
            width: size[0],
            height: size[1],
        };
        let offset = vk::Offset3D {
            x: offset[0] as i32,
            y: offset[1] as i32,
            z: 0,
        };
        upload(ctx, pixels, |device, cmd, staging| {
            let range = color_subresource_range(0, 1, 1);
            let to_transfer = if fresh {
                LayoutTransition::UNDEFINED_TO_TRANSFER_DST
            } else {
                LayoutTransition::SHADER_READ_TO_TRANSFER_DST
            };
            insert_image_memory_barrier(device, cmd, target, to_transfer, range);
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging,
                    target,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[copy_region(extent, offset, 0, 0)],
                );
            }
            insert_image_memory_barrier(
                device,
                cmd,
                target,
                LayoutTransition::TRANSFER_DST_TO_SHADER_READ,
                range,
            );
        })
    }

    pub fn destroy(&mut self, ctx: &VulkanContext) {
        unsafe {
            ctx.device.destroy_image_view(self.view, None);
            ctx.device.destroy_image(self.image, None);
        }
        self.view = vk::ImageView::null();
        self.image = vk::Image::null();
        ctx.memory.release(self.allocation.take());
    }
}

fn copy_region(
    extent: vk::Extent2D,
    offset: vk::Offset3D,
    mip_level: u32,
    layer: u32,
) -> vk::BufferImageCopy {
    vk::BufferImageCopy::builder()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level,
            base_array_layer: layer,
            layer_count: 1,
        })
        .image_offset(offset)
        .image_extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .build()
}

/// Stages `bytes` and runs `record` with the staging buffer as copy source.
fn upload(
    ctx: &VulkanContext,
    bytes: &[u8],
    record: impl FnOnce(&ash::Device, vk::CommandBuffer, vk::Buffer),
) -> Result<()> {
    let mut staging = GpuBuffer::host_visible(
        ctx,
        "image staging buffer",
        bytes.len() as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_SRC,
    )?;
    let staging_buffer = staging.buffer;
    let result = staging
        .write(0, bytes)
        .and_then(|()| ctx.one_time_submit(|device, cmd| record(device, cmd, staging_buffer)));
    staging.destroy(ctx);
    result
}

/// Size of mip `level` along one axis.
pub fn mip_extent(base: u32, level: u32) -> u32 {
    (base >> level).max(1)
}

/// Expects every level in TRANSFER_DST_OPTIMAL with level 0 filled; leaves
/// every level in SHADER_READ_ONLY_OPTIMAL.
fn generate_mipmaps(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    extent: vk::Extent2D,
    mip_levels: u32,
) {
    for level in 1..mip_levels {
        let src = level - 1;
        insert_image_memory_barrier(
            device,
            cmd,
            image,
            LayoutTransition::TRANSFER_DST_TO_SRC,
            color_subresource_range(src, 1, 1),
        );

        let src_corner = vk::Offset3D {
            x: mip_extent(extent.width, src) as i32,
            y: mip_extent(extent.height, src) as i32,
            z: 1,
        };
        let dst_corner = vk::Offset3D {
            x: mip_extent(extent.width, level) as i32,
            y: mip_extent(extent.height, level) as i32,
            z: 1,
        };
        let blit = vk::ImageBlit::builder()
            .src_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: src,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_offsets([vk::Offset3D::default(), src_corner])
            .dst_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: level,
                base_array_layer: 0,
                layer_count: 1,
            })
            .dst_offsets([vk::Offset3D::default(), dst_corner])
            .build();
        unsafe {
            device.cmd_blit_image(
                cmd,
                image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            );
        }

        insert_image_memory_barrier(
            device,
            cmd,
            image,
            LayoutTransition::TRANSFER_SRC_TO_SHADER_READ,
            color_subresource_range(src, 1, 1),
        );
    }

    insert_image_memory_barrier(
        device,
        cmd,
        image,
        LayoutTransition::TRANSFER_DST_TO_SHADER_READ,
        color_subresource_range(mip_levels - 1, 1, 1),
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    /// Tiled, trilinear; scene textures.
    RepeatMipmapped,
    /// Cubemap and overlay.
    ClampLinear,
}

pub fn create_sampler(device: &ash::Device, kind: SamplerKind) -> Result<vk::Sampler> {
    let (address_mode, mipmap_mode, max_lod) = match kind {
        SamplerKind::RepeatMipmapped => (
            vk::SamplerAddressMode::REPEAT,
            vk::SamplerMipmapMode::LINEAR,
            vk::LOD_CLAMP_NONE,
        ),
        SamplerKind::ClampLinear => (
            vk::SamplerAddressMode::CLAMP_TO_EDGE,
            vk::SamplerMipmapMode::NEAREST,
            0.0,
        ),
    };
    unsafe {
        device.create_sampler(
            &vk::SamplerCreateInfo::builder()
                .mag_filter(vk::Filter::LINEAR)
                .min_filter(vk::Filter::LINEAR)
                .mipmap_mode(mipmap_mode)
                .address_mode_u(address_mode)
                .address_mode_v(address_mode)
                .address_mode_w(address_mode)
                .anisotropy_enable(false)
                .min_lod(0.0)
                .max_lod(max_lod),
            None,
        )
    }
    .with_context(|| format!("Failed to create {kind:?} sampler"))
}

/// Mip generation blits from and to the same image with a linear filter.
pub fn supports_linear_blit(features: vk::FormatFeatureFlags) -> bool {
    features.contains(
        vk::FormatFeatureFlags::BLIT_SRC
            | vk::FormatFeatureFlags::BLIT_DST
            | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_extents_halve_down_to_one() {
        let sizes = (0..11).map(|level| mip_extent(1024, level)).collect::<Vec<_>>();
        assert_eq!(sizes[0], 1024);
        assert_eq!(sizes[1], 512);
        assert_eq!(sizes[10], 1);
        assert_eq!(mip_extent(3, 5), 1);
    }

    #[test]
    fn copy_region_targets_one_layer() {
        let region = copy_region(
            vk::Extent2D {
                width: 4,
                height: 2,
            },
            vk::Offset3D { x: 1, y: 2, z: 0 },
            0,
            3,
        );
        assert_eq!(region.image_subresource.base_array_layer, 3);
        assert_eq!(region.image_subresource.layer_count, 1);
        assert_eq!(region.image_offset.x, 1);
        assert_eq!(region.image_extent.depth, 1);
    }

    #[test]
    fn linear_blit_needs_both_blit_directions() {
        let filter = vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR;
        let blit = vk::FormatFeatureFlags::BLIT_SRC | vk::FormatFeatureFlags::BLIT_DST;
        assert!(!supports_linear_blit(filter));
        assert!(!supports_linear_blit(blit));
        assert!(!supports_linear_blit(filter | vk::FormatFeatureFlags::BLIT_SRC));
        assert!(supports_linear_blit(
            filter | blit | vk::FormatFeatureFlags::SAMPLED_IMAGE
        ));
    }
}
