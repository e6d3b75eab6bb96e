use anyhow::{Context, Result};
use ash::vk;

/// Set 0 of every scene pipeline: the per-frame [`super::uniforms::SceneUniforms`].
pub fn scene_bindings() -> [vk::DescriptorSetLayoutBinding; 1] {
    [vk::DescriptorSetLayoutBinding::builder()
        .binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
        .build()]
}

/// `image_count` sampled images followed by one shared sampler.
pub fn texture_bindings(image_count: u32) -> Vec<vk::DescriptorSetLayoutBinding> {
    let image = |binding| {
        vk::DescriptorSetLayoutBinding::builder()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .build()
    };
    (0..image_count)
        .map(image)
        .chain(std::iter::once(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(image_count)
                .descriptor_type(vk::DescriptorType::SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build(),
        ))
        .collect()
}

pub fn create_set_layout(
    device: &ash::Device,
    bindings: &[vk::DescriptorSetLayoutBinding],
) -> Result<vk::DescriptorSetLayout> {
    unsafe {
        device.create_descriptor_set_layout(
            &vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings),
            None,
        )
    }
    .context("Failed to create descriptor set layout")
}

pub fn create_pool(
    device: &ash::Device,
    pool_sizes: &[vk::DescriptorPoolSize],
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
) -> Result<vk::DescriptorPool> {
    unsafe {
        device.create_descriptor_pool(
            &vk::DescriptorPoolCreateInfo::builder()
                .flags(flags)
                .pool_sizes(pool_sizes)
                .max_sets(max_sets),
            None,
        )
    }
    .context("Failed to create descriptor pool")
}

pub fn allocate_sets(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layouts: &[vk::DescriptorSetLayout],
) -> Result<Vec<vk::DescriptorSet>> {
    unsafe {
        device.allocate_descriptor_sets(
            &vk::DescriptorSetAllocateInfo::builder()
                .descriptor_pool(pool)
                .set_layouts(layouts),
        )
    }
    .context("Failed to allocate descriptor sets")
}

pub fn write_uniform_set(device: &ash::Device, set: vk::DescriptorSet, buffer: vk::Buffer) {
    let buffer_info = vk::DescriptorBufferInfo::builder()
        .buffer(buffer)
        .offset(0)
        .range(vk::WHOLE_SIZE);
    let descriptor_write = vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(std::slice::from_ref(&buffer_info));
    unsafe {
        device.update_descriptor_sets(std::slice::from_ref(&descriptor_write), &[]);
    }
}

/// Fills a set created from [`texture_bindings`] with `views.len()` images.
pub fn write_texture_set(
    device: &ash::Device,
    set: vk::DescriptorSet,
    views: &[vk::ImageView],
    sampler: vk::Sampler,
) {
    let image_infos = views
        .iter()
        .map(|&view| {
            vk::DescriptorImageInfo::builder()
                .image_view(view)
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .build()
        })
        .collect::<Vec<_>>();
    let sampler_info = vk::DescriptorImageInfo::builder().sampler(sampler).build();

    let mut writes = image_infos
        .iter()
        .enumerate()
        .map(|(binding, info)| {
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding as u32)
                .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                .image_info(std::slice::from_ref(info))
                .build()
        })
        .collect::<Vec<_>>();
    writes.push(
        vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(views.len() as u32)
            .descriptor_type(vk::DescriptorType::SAMPLER)
            .image_info(std::slice::from_ref(&sampler_info))
            .build(),
    );
    unsafe {
        device.update_descriptor_sets(&writes, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_follows_the_images() {
        let bindings = texture_bindings(3);
        assert_eq!(bindings.len(), 4);
        for (i, binding) in bindings[..3].iter().enumerate() {
            assert_eq!(binding.binding, i as u32);
            assert_eq!(binding.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
        }
        assert_eq!(bindings[3].binding, 3);
        assert_eq!(bindings[3].descriptor_type, vk::DescriptorType::SAMPLER);
    }

    #[test]
    fn uniforms_are_visible_to_both_stages() {
        let [binding] = scene_bindings();
        assert!(binding
            .stage_flags
            .contains(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT));
    }
}
