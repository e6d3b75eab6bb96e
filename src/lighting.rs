use glam::Vec3;

/// Inverse-square style falloff `1 / (c + l*d + q*d^2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}
impl Default for Attenuation {
    fn default() -> Self {
        // roughly 50 units of reach
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}
impl Attenuation {
    pub fn factor(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.constant, self.linear, self.quadratic, 0.0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}
impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.2, -1.0, -0.3),
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::splat(0.6),
            specular: Vec3::splat(0.3),
        }
    }
}

/// The point light sits inside the pyramid prop; its position and color are
/// taken from the prop every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub attenuation: Attenuation,
}
impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            ambient: Vec3::splat(0.05),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(1.0),
            attenuation: Attenuation::default(),
        }
    }
}

/// Flashlight attached to the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub attenuation: Attenuation,
    /// Half-angle of the fully lit cone, in degrees.
    pub cut_off: f32,
    /// Half-angle where the light reaches zero, in degrees.
    pub outer_cut_off: f32,
    pub enabled: bool,
}
impl Default for SpotLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            ambient: Vec3::ZERO,
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            attenuation: Attenuation::default(),
            cut_off: 12.5,
            outer_cut_off: 15.0,
            enabled: false,
        }
    }
}
impl SpotLight {
    /// `(cos inner, cos outer)`, the form the fragment shader compares against.
    pub fn cutoff_cosines(&self) -> (f32, f32) {
        (
            self.cut_off.to_radians().cos(),
            self.outer_cut_off.to_radians().cos(),
        )
    }

    /// Soft-edge factor for a fragment whose direction from the light makes
    /// `cos_theta` with the spot axis.
    pub fn intensity(&self, cos_theta: f32) -> f32 {
        let (inner, outer) = self.cutoff_cosines();
        let epsilon = inner - outer;
        if epsilon <= f32::EPSILON {
            return if cos_theta >= inner { 1.0 } else { 0.0 };
        }
        ((cos_theta - outer) / epsilon).clamp(0.0, 1.0)
    }

    pub fn follow(&mut self, position: Vec3, direction: Vec3) {
        self.position = position;
        self.direction = direction;
    }
}
