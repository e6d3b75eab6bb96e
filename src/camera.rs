use glam::{Mat4, Vec3};

/// Near clip plane distance.
pub const NEAR_PLANE: f32 = 0.1;
/// Far clip plane distance.
pub const FAR_PLANE: f32 = 100.0;

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 45.0;
pub const PITCH_LIMIT: f32 = 89.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// First-person fly camera.
///
/// Orientation is stored as yaw/pitch in degrees; `front`, `right` and `up`
/// are derived from them and kept in sync by every mutator.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
    /// Vertical field of view in degrees.
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0))
    }
}

impl Camera {
    pub const DEFAULT_YAW: f32 = -90.0;
    pub const DEFAULT_PITCH: f32 = 0.0;
    pub const DEFAULT_SPEED: f32 = 2.5;
    pub const DEFAULT_SENSITIVITY: f32 = 0.1;
    pub const DEFAULT_ZOOM: f32 = 45.0;

    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            world_up: Vec3::Y,
            yaw: Self::DEFAULT_YAW,
            pitch: Self::DEFAULT_PITCH,
            movement_speed: Self::DEFAULT_SPEED,
            mouse_sensitivity: Self::DEFAULT_SENSITIVITY,
            zoom: Self::DEFAULT_ZOOM,
        };
        camera.update_vectors();
        camera
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection for Vulkan clip space (Y down, depth 0..1).
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut projection =
            Mat4::perspective_rh(self.zoom.to_radians(), aspect, NEAR_PLANE, FAR_PLANE);
        projection.y_axis.y *= -1.0;
        projection
    }

    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// Offsets are in pixels; positive `y_offset` looks up.
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;
        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }
        self.update_vectors();
    }

    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Points the camera along `front`, recovering yaw and pitch from it.
    ///
    /// Pitch is held inside the same limit mouse-look uses so the basis
    /// never degenerates. Returns `false` and leaves the orientation alone
    /// when `front` has no usable direction.
    pub fn set_front(&mut self, front: Vec3) -> bool {
        let Some(front) = front.try_normalize() else {
            return false;
        };
        self.pitch = front
            .y
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw = front.z.atan2(front.x).to_degrees();
        self.update_vectors();
        true
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a:?} != {b:?}");
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        assert_vec3_eq(camera.position, Vec3::new(0.0, 0.0, 3.0));
        assert_vec3_eq(camera.front(), Vec3::NEG_Z);
        assert_vec3_eq(camera.right(), Vec3::X);
        assert_vec3_eq(camera.up(), Vec3::Y);
        assert_eq!(camera.zoom, 45.0);
    }

    #[test]
    fn view_matrix_moves_world_in_front_of_camera() {
        let camera = Camera::default();
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert_vec3_eq(origin_in_view, Vec3::new(0.0, 0.0, -3.0));
    }

    #[test]
    fn keyboard_movement_scales_with_delta() {
        let mut camera = Camera::default();
        camera.process_keyboard(CameraMovement::Forward, 2.0);
        assert_vec3_eq(camera.position, Vec3::new(0.0, 0.0, 3.0 - 5.0));
        camera.process_keyboard(CameraMovement::Right, 0.4);
        assert_vec3_eq(camera.position, Vec3::new(1.0, 0.0, -2.0));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(0.0, 10_000.0, true);
        assert_eq!(camera.pitch(), PITCH_LIMIT);
        camera.process_mouse_movement(0.0, -20_000.0, true);
        assert_eq!(camera.pitch(), -PITCH_LIMIT);

        camera.process_mouse_movement(0.0, -1_000.0, false);
        assert!(camera.pitch() < -PITCH_LIMIT);
    }

    #[test]
    fn zoom_stays_in_range() {
        let mut camera = Camera::default();
        camera.process_mouse_scroll(-10.0);
        assert_eq!(camera.zoom, MAX_ZOOM);
        camera.process_mouse_scroll(100.0);
        assert_eq!(camera.zoom, MIN_ZOOM);
        camera.process_mouse_scroll(-4.0);
        assert_eq!(camera.zoom, 5.0);
    }

    #[test]
    fn set_front_recovers_yaw_and_pitch() {
        let mut camera = Camera::default();
        assert!(camera.set_front(Vec3::new(1.0, 0.0, 0.0)));
        assert!(camera.yaw().abs() < 1e-4);
        assert!(camera.pitch().abs() < 1e-4);
        assert_vec3_eq(camera.front(), Vec3::X);

        assert!(camera.set_front(Vec3::new(0.0, 0.0, -2.0)));
        assert!((camera.yaw() - Camera::DEFAULT_YAW).abs() < 1e-4);
        assert_vec3_eq(camera.front(), Vec3::NEG_Z);

        // mouse look continues from the restored orientation
        camera.process_mouse_movement(900.0, 0.0, true);
        assert_vec3_eq(camera.front(), Vec3::X);
    }

    #[test]
    fn set_front_keeps_vertical_look_usable() {
        let mut camera = Camera::default();
        assert!(camera.set_front(Vec3::Y));
        assert_eq!(camera.pitch(), PITCH_LIMIT);
        assert!(camera.right().is_finite());
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn set_front_ignores_zero_vector() {
        let mut camera = Camera::default();
        assert!(!camera.set_front(Vec3::ZERO));
        assert_vec3_eq(camera.front(), Vec3::NEG_Z);
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let camera = Camera::default();
        let projection = camera.projection_matrix(4.0 / 3.0);
        let above = projection.project_point3(Vec3::new(0.0, 1.0, -5.0));
        assert!(above.y < 0.0);
        let near = projection.project_point3(Vec3::new(0.0, 0.0, -NEAR_PLANE));
        assert!(near.z.abs() < 1e-5);
    }
}
