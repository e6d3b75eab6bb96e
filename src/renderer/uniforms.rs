use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::{animation, state::ProgramState};

fn point(v: Vec3) -> [f32; 4] {
    v.extend(1.0).to_array()
}

fn direction(v: Vec3) -> [f32; 4] {
    v.extend(0.0).to_array()
}

fn color(v: Vec3) -> [f32; 4] {
    v.extend(1.0).to_array()
}

/// Per-frame scene data, laid out to match the std140 block in
/// `shaders/scene.glsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub skybox_view: [[f32; 4]; 4],
    pub view_position: [f32; 4],
    pub dir_direction: [f32; 4],
    pub dir_ambient: [f32; 4],
    pub dir_diffuse: [f32; 4],
    pub dir_specular: [f32; 4],
    pub point_position: [f32; 4],
    pub point_ambient: [f32; 4],
    pub point_diffuse: [f32; 4],
    pub point_specular: [f32; 4],
    pub point_attenuation: [f32; 4],
    pub spot_position: [f32; 4],
    pub spot_direction: [f32; 4],
    pub spot_ambient: [f32; 4],
    pub spot_diffuse: [f32; 4],
    pub spot_specular: [f32; 4],
    pub spot_attenuation: [f32; 4],
    pub spot_cutoff: [f32; 4],
    pub flags: [i32; 4],
}

impl SceneUniforms {
    /// `point_color` tints the point light's diffuse and specular terms.
    pub fn new(state: &ProgramState, aspect: f32, point_color: Vec3) -> Self {
        let camera = &state.camera;
        let view = camera.view_matrix();
        let (cut_off, outer_cut_off) = state.spot.cutoff_cosines();

        Self {
            view: view.to_cols_array_2d(),
            projection: camera.projection_matrix(aspect).to_cols_array_2d(),
            skybox_view: skybox_view(view).to_cols_array_2d(),
            view_position: point(camera.position),
            dir_direction: direction(state.directional.direction),
            dir_ambient: color(state.directional.ambient),
            dir_diffuse: color(state.directional.diffuse),
            dir_specular: color(state.directional.specular),
            point_position: point(state.point.position),
            point_ambient: color(state.point.ambient),
            point_diffuse: color(state.point.diffuse * point_color),
            point_specular: color(state.point.specular * point_color),
            point_attenuation: state.point.attenuation.to_array(),
            spot_position: point(state.spot.position),
            spot_direction: direction(state.spot.direction),
            spot_ambient: color(state.spot.ambient),
            spot_diffuse: color(state.spot.diffuse),
            spot_specular: color(state.spot.specular),
            spot_attenuation: state.spot.attenuation.to_array(),
            spot_cutoff: [cut_off, outer_cut_off, 0.0, 0.0],
            flags: [state.blinn as i32, state.spot.enabled as i32, 0, 0],
        }
    }

    pub fn for_frame(state: &ProgramState, aspect: f32, elapsed: f32) -> Self {
        Self::new(state, aspect, animation::point_light_color(state, elapsed))
    }
}

/// The camera view with its translation removed, so the skybox stays
/// centered on the viewer.
pub fn skybox_view(view: Mat4) -> Mat4 {
    Mat4::from_mat3(Mat3::from_mat4(view))
}

/// Push constant block shared by the scene pipelines.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl ObjectConstants {
    pub fn new(model: Mat4, color: Vec4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
        }
    }

    pub fn model(model: Mat4) -> Self {
        Self::new(model, Vec4::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_shader_blocks() {
        // 3 mat4 + 17 vec4 + ivec4
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 3 * 64 + 17 * 16 + 16);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 80);
    }

    #[test]
    fn skybox_view_drops_translation() {
        let view = Mat4::from_translation(Vec3::new(3.0, -2.0, 7.0)) * Mat4::from_rotation_y(0.5);
        let sky = skybox_view(view);
        assert_eq!(sky.w_axis, Vec4::W);
        assert!(sky
            .transform_vector3(Vec3::X)
            .abs_diff_eq(view.transform_vector3(Vec3::X), 1e-6));
    }

    #[test]
    fn flags_follow_state() {
        let mut state = ProgramState::default();
        let uniforms = SceneUniforms::new(&state, 4.0 / 3.0, Vec3::ONE);
        assert_eq!(uniforms.flags, [1, 0, 0, 0]);

        state.toggle_blinn();
        state.toggle_spotlight();
        let uniforms = SceneUniforms::new(&state, 4.0 / 3.0, Vec3::ONE);
        assert_eq!(uniforms.flags, [0, 1, 0, 0]);
    }

    #[test]
    fn point_light_is_tinted() {
        let state = ProgramState::default();
        let uniforms = SceneUniforms::new(&state, 1.0, Vec3::new(1.0, 0.0, 0.5));
        assert_eq!(uniforms.point_diffuse, [0.8, 0.0, 0.4, 1.0]);
        assert_eq!(uniforms.point_ambient, [0.05, 0.05, 0.05, 1.0]);
    }

    #[test]
    fn positions_and_directions_use_w() {
        let state = ProgramState::default();
        let uniforms = SceneUniforms::new(&state, 1.0, Vec3::ONE);
        assert_eq!(uniforms.view_position[3], 1.0);
        assert_eq!(uniforms.dir_direction[3], 0.0);
        let (inner, outer) = state.spot.cutoff_cosines();
        assert_eq!(&uniforms.spot_cutoff[..2], &[inner, outer]);
    }
}
