use anyhow::{Context, Result};
use ash::vk;
use std::ffi::CStr;

use super::shaders::{create_shader_module, ShaderPair};
use crate::frame::FramePhase;

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
    pub compare: vk::CompareOp,
}

impl DepthState {
    pub const OPAQUE: Self = Self {
        test: true,
        write: true,
        compare: vk::CompareOp::LESS,
    };
    /// The skybox sits exactly on the far plane, which the cleared depth
    /// buffer also holds.
    pub const SKYBOX: Self = Self {
        test: true,
        write: false,
        compare: vk::CompareOp::LESS_OR_EQUAL,
    };
    /// Tested against opaque geometry but never occludes.
    pub const TRANSLUCENT: Self = Self {
        test: true,
        write: false,
        compare: vk::CompareOp::LESS,
    };
    pub const DISABLED: Self = Self {
        test: false,
        write: false,
        compare: vk::CompareOp::ALWAYS,
    };

    fn create_info(self) -> vk::PipelineDepthStencilStateCreateInfo {
        let stencil = vk::StencilOpState {
            compare_op: vk::CompareOp::ALWAYS,
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            ..Default::default()
        };
        vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(self.test)
            .depth_write_enable(self.write)
            .depth_compare_op(self.compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .front(stencil)
            .back(stencil)
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    /// Straight alpha.
    Alpha,
    /// egui output.
    PremultipliedAlpha,
}

impl BlendMode {
    pub fn attachment(self) -> vk::PipelineColorBlendAttachmentState {
        let builder = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        let (src_color, dst_color) = match self {
            Self::Opaque => return builder.blend_enable(false).build(),
            Self::Alpha => (vk::BlendFactor::SRC_ALPHA, vk::BlendFactor::ONE_MINUS_SRC_ALPHA),
            Self::PremultipliedAlpha => (vk::BlendFactor::ONE, vk::BlendFactor::ONE_MINUS_SRC_ALPHA),
        };
        builder
            .blend_enable(true)
            .src_color_blend_factor(src_color)
            .dst_color_blend_factor(dst_color)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build()
    }
}

/// Fixed-function state each drawing phase of a frame runs with.
pub fn phase_state(phase: FramePhase) -> Option<(DepthState, BlendMode)> {
    match phase {
        FramePhase::DrawOpaque(_) => Some((DepthState::OPAQUE, BlendMode::Opaque)),
        FramePhase::DrawSkybox => Some((DepthState::SKYBOX, BlendMode::Opaque)),
        FramePhase::DrawTranslucent => Some((DepthState::TRANSLUCENT, BlendMode::Alpha)),
        FramePhase::DrawOverlay => Some((DepthState::DISABLED, BlendMode::PremultipliedAlpha)),
        FramePhase::Idle | FramePhase::BeginFrame | FramePhase::ClearAndSetUp | FramePhase::Present => {
            None
        }
    }
}

pub struct PipelineDesc<'a> {
    pub name: &'a str,
    pub shaders: ShaderPair,
    pub bindings: &'a [vk::VertexInputBindingDescription],
    pub attributes: &'a [vk::VertexInputAttributeDescription],
    pub phase: FramePhase,
}

pub fn create_pipeline_layout(
    device: &ash::Device,
    set_layouts: &[vk::DescriptorSetLayout],
    push_constants: &[vk::PushConstantRange],
) -> Result<vk::PipelineLayout> {
    unsafe {
        device.create_pipeline_layout(
            &vk::PipelineLayoutCreateInfo::builder()
                .set_layouts(set_layouts)
                .push_constant_ranges(push_constants),
            None,
        )
    }
    .context("Failed to create pipeline layout")
}

/// Triangle-list pipeline with dynamic viewport and scissor; the depth and
/// blend states come from the frame phase it draws in.
pub fn create_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    desc: &PipelineDesc,
) -> Result<vk::Pipeline> {
    let (depth, blend) = phase_state(desc.phase)
        .with_context(|| format!("{:?} does not draw", desc.phase))?;

    let vertex_module = create_shader_module(device, desc.shaders.vertex)?;
    let fragment_module = match create_shader_module(device, desc.shaders.fragment) {
        Ok(module) => module,
        Err(err) => {
            unsafe { device.destroy_shader_module(vertex_module, None) };
            return Err(err);
        }
    };
    let stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(ENTRY_POINT)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_module)
            .name(ENTRY_POINT)
            .build(),
    ];

    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(desc.bindings)
        .vertex_attribute_descriptions(desc.attributes);
    let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
    let viewport_info = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);
    let rasterization_info = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false)
        .line_width(1.0);
    let multisample_info = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);
    let depth_stencil_info = depth.create_info();
    let blend_attachments = [blend.attachment()];
    let color_blend_info =
        vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state_info =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly_info)
        .viewport_state(&viewport_info)
        .rasterization_state(&rasterization_info)
        .multisample_state(&multisample_info)
        .depth_stencil_state(&depth_stencil_info)
        .color_blend_state(&color_blend_info)
        .dynamic_state(&dynamic_state_info)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);
    let result = unsafe {
        device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&pipeline_info),
            None,
        )
    };
    unsafe {
        device.destroy_shader_module(vertex_module, None);
        device.destroy_shader_module(fragment_module, None);
    }

    let pipelines = result
        .map_err(|(_, err)| err)
        .with_context(|| format!("Failed to create {} pipeline", desc.name))?;
    pipelines
        .into_iter()
        .next()
        .with_context(|| format!("No pipeline returned for {}", desc.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{frame_phases, OpaqueObject};

    #[test]
    fn every_draw_phase_has_state() {
        for phase in frame_phases(true) {
            assert_eq!(phase_state(phase).is_some(), phase.is_draw(), "{phase:?}");
        }
    }

    #[test]
    fn opaque_writes_depth_translucent_does_not() {
        let (opaque, blend) =
            phase_state(FramePhase::DrawOpaque(OpaqueObject::Terrain)).unwrap();
        assert_eq!(opaque, DepthState::OPAQUE);
        assert!(opaque.write);
        assert_eq!(blend, BlendMode::Opaque);

        let (translucent, blend) = phase_state(FramePhase::DrawTranslucent).unwrap();
        assert!(translucent.test);
        assert!(!translucent.write);
        assert_eq!(blend, BlendMode::Alpha);
    }

    #[test]
    fn skybox_passes_at_cleared_depth() {
        let (depth, _) = phase_state(FramePhase::DrawSkybox).unwrap();
        assert_eq!(depth.compare, vk::CompareOp::LESS_OR_EQUAL);
        assert!(!depth.write);
    }

    #[test]
    fn overlay_ignores_depth_and_blends_premultiplied() {
        let (depth, blend) = phase_state(FramePhase::DrawOverlay).unwrap();
        assert!(!depth.test);
        let attachment = blend.attachment();
        assert_eq!(attachment.blend_enable, vk::TRUE);
        assert_eq!(attachment.src_color_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(
            attachment.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
    }

    #[test]
    fn straight_alpha_uses_source_alpha() {
        let attachment = BlendMode::Alpha.attachment();
        assert_eq!(attachment.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(BlendMode::Opaque.attachment().blend_enable, vk::FALSE);
    }
}
