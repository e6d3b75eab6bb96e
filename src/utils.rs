use ash::vk;

/// Source and destination halves of an image layout transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LayoutTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access_mask: vk::AccessFlags,
    pub dst_access_mask: vk::AccessFlags,
    pub src_stage_mask: vk::PipelineStageFlags,
    pub dst_stage_mask: vk::PipelineStageFlags,
}
impl LayoutTransition {
    /// Fresh image about to receive a buffer copy.
    pub const UNDEFINED_TO_TRANSFER_DST: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        src_stage_mask: vk::PipelineStageFlags::TOP_OF_PIPE,
        dst_stage_mask: vk::PipelineStageFlags::TRANSFER,
    };

    /// Uploaded level handed to the fragment shader.
    pub const TRANSFER_DST_TO_SHADER_READ: Self = Self {
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        src_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        dst_access_mask: vk::AccessFlags::SHADER_READ,
        src_stage_mask: vk::PipelineStageFlags::TRANSFER,
        dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
    };

    /// Mip level just written, about to be blitted into the next one.
    pub const TRANSFER_DST_TO_SRC: Self = Self {
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        src_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        dst_access_mask: vk::AccessFlags::TRANSFER_READ,
        src_stage_mask: vk::PipelineStageFlags::TRANSFER,
        dst_stage_mask: vk::PipelineStageFlags::TRANSFER,
    };

    pub const TRANSFER_SRC_TO_SHADER_READ: Self = Self {
        old_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        src_access_mask: vk::AccessFlags::TRANSFER_READ,
        dst_access_mask: vk::AccessFlags::SHADER_READ,
        src_stage_mask: vk::PipelineStageFlags::TRANSFER,
        dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
    };

    /// Sampled image that is about to be partially overwritten; keeps its contents.
    pub const SHADER_READ_TO_TRANSFER_DST: Self = Self {
        old_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_access_mask: vk::AccessFlags::SHADER_READ,
        dst_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        src_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
        dst_stage_mask: vk::PipelineStageFlags::TRANSFER,
    };
}

pub(crate) fn color_subresource_range(
    base_mip_level: u32,
    level_count: u32,
    layer_count: u32,
) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level,
        level_count,
        base_array_layer: 0,
        layer_count,
    }
}

pub(crate) fn insert_image_memory_barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    transition: LayoutTransition,
    subresource_range: vk::ImageSubresourceRange,
) {
    let image_memory_barrier = vk::ImageMemoryBarrier::builder()
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .src_access_mask(transition.src_access_mask)
        .dst_access_mask(transition.dst_access_mask)
        .old_layout(transition.old_layout)
        .new_layout(transition.new_layout)
        .image(image)
        .subresource_range(subresource_range)
        .build();
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            transition.src_stage_mask,
            transition.dst_stage_mask,
            vk::DependencyFlags::BY_REGION,
            &[],
            &[],
            &[image_memory_barrier],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_transitions_connect() {
        let steps = [
            LayoutTransition::UNDEFINED_TO_TRANSFER_DST,
            LayoutTransition::TRANSFER_DST_TO_SRC,
            LayoutTransition::TRANSFER_SRC_TO_SHADER_READ,
            LayoutTransition::SHADER_READ_TO_TRANSFER_DST,
            LayoutTransition::TRANSFER_DST_TO_SHADER_READ,
        ];
        for pair in steps.windows(2) {
            assert_eq!(pair[0].new_layout, pair[1].old_layout);
        }
    }
}
