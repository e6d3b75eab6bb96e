use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Vertex formats the scene pipelines consume, one interleaved binding each.
pub trait VertexLayout: Pod {
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription>;

    fn binding_descriptions() -> [vk::VertexInputBindingDescription; 1] {
        [vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()]
    }
}

fn attribute(location: u32, format: vk::Format, offset: usize) -> vk::VertexInputAttributeDescription {
    vk::VertexInputAttributeDescription::builder()
        .binding(0)
        .location(location)
        .format(format)
        .offset(offset as u32)
        .build()
}

/// Lit, textured mesh vertex (the house).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}
impl VertexLayout for MeshVertex {
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
            attribute(1, vk::Format::R32G32B32_SFLOAT, 12),
            attribute(2, vk::Format::R32G32_SFLOAT, 24),
        ]
    }
}

/// Unlit textured vertex (the terrain).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: Vec3,
    pub tex_coords: Vec2,
}
impl VertexLayout for TexturedVertex {
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
            attribute(1, vk::Format::R32G32_SFLOAT, 12),
        ]
    }
}

/// Position-only vertex (skybox and pyramid).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: Vec3,
}
impl VertexLayout for PositionVertex {
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![attribute(0, vk::Format::R32G32B32_SFLOAT, 0)]
    }
}

pub const TERRAIN_HALF_EXTENT: f32 = 500.0;
pub const TERRAIN_TEXTURE_REPEAT: f32 = 30.0;
/// Where the terrain quad is placed in the world.
pub const TERRAIN_OFFSET: Vec3 = Vec3::new(-50.0, 0.0, 0.0);

const fn textured(x: f32, z: f32, u: f32, v: f32) -> TexturedVertex {
    TexturedVertex {
        position: Vec3::new(x, 0.0, z),
        tex_coords: Vec2::new(u, v),
    }
}

/// Ground plane at y = 0 as two triangles, texture tiled across it.
pub const TERRAIN_VERTICES: [TexturedVertex; 6] = {
    const E: f32 = TERRAIN_HALF_EXTENT;
    const R: f32 = TERRAIN_TEXTURE_REPEAT;
    [
        textured(E, E, R, 0.0),
        textured(-E, E, 0.0, 0.0),
        textured(-E, -E, 0.0, R),
        textured(E, E, R, 0.0),
        textured(-E, -E, 0.0, R),
        textured(E, -E, R, R),
    ]
};

const fn p(x: f32, y: f32, z: f32) -> PositionVertex {
    PositionVertex {
        position: Vec3::new(x, y, z),
    }
}

/// Unit cube around the origin, sampled by direction in the skybox shader.
pub const SKYBOX_VERTICES: [PositionVertex; 36] = [
    // -Z
    p(-1.0, 1.0, -1.0),
    p(-1.0, -1.0, -1.0),
    p(1.0, -1.0, -1.0),
    p(1.0, -1.0, -1.0),
    p(1.0, 1.0, -1.0),
    p(-1.0, 1.0, -1.0),
    // -X
    p(-1.0, -1.0, 1.0),
    p(-1.0, -1.0, -1.0),
    p(-1.0, 1.0, -1.0),
    p(-1.0, 1.0, -1.0),
    p(-1.0, 1.0, 1.0),
    p(-1.0, -1.0, 1.0),
    // +X
    p(1.0, -1.0, -1.0),
    p(1.0, -1.0, 1.0),
    p(1.0, 1.0, 1.0),
    p(1.0, 1.0, 1.0),
    p(1.0, 1.0, -1.0),
    p(1.0, -1.0, -1.0),
    // +Z
    p(-1.0, -1.0, 1.0),
    p(-1.0, 1.0, 1.0),
    p(1.0, 1.0, 1.0),
    p(1.0, 1.0, 1.0),
    p(1.0, -1.0, 1.0),
    p(-1.0, -1.0, 1.0),
    // +Y
    p(-1.0, 1.0, -1.0),
    p(1.0, 1.0, -1.0),
    p(1.0, 1.0, 1.0),
    p(1.0, 1.0, 1.0),
    p(-1.0, 1.0, 1.0),
    p(-1.0, 1.0, -1.0),
    // -Y
    p(-1.0, -1.0, -1.0),
    p(-1.0, -1.0, 1.0),
    p(1.0, -1.0, -1.0),
    p(1.0, -1.0, -1.0),
    p(-1.0, -1.0, 1.0),
    p(1.0, -1.0, 1.0),
];

/// Square pyramid with its base on y = 0 and apex at (0, 1, 0). The bottom
/// half of the prop reuses it with a negative Y scale.
pub const PYRAMID_VERTICES: [PositionVertex; 18] = [
    // sides
    p(-1.0, 0.0, 1.0),
    p(1.0, 0.0, 1.0),
    p(0.0, 1.0, 0.0),
    p(1.0, 0.0, 1.0),
    p(1.0, 0.0, -1.0),
    p(0.0, 1.0, 0.0),
    p(1.0, 0.0, -1.0),
    p(-1.0, 0.0, -1.0),
    p(0.0, 1.0, 0.0),
    p(-1.0, 0.0, -1.0),
    p(-1.0, 0.0, 1.0),
    p(0.0, 1.0, 0.0),
    // base
    p(-1.0, 0.0, 1.0),
    p(-1.0, 0.0, -1.0),
    p(1.0, 0.0, -1.0),
    p(1.0, 0.0, -1.0),
    p(1.0, 0.0, 1.0),
    p(-1.0, 0.0, 1.0),
];
