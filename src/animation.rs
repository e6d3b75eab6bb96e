use glam::{Mat4, Vec3};
use std::f32::consts::{PI, TAU};

use crate::state::ProgramState;

/// Spin rate of the pyramid prop in radians per second.
pub const PYRAMID_ANGULAR_RATE: f32 = 1.0;
/// Distance between each pyramid's base and the prop's center.
pub const PYRAMID_HALF_GAP: f32 = 0.05;
pub const PYRAMID_SCALE: f32 = 0.5;
pub const PYRAMID_ALPHA: f32 = 0.6;

/// Per-channel angular frequency of the color cycle.
pub const COLOR_FREQUENCIES: [f32; 3] = [2.0, 0.7, 1.3];
/// Per-channel phase offset of the color cycle.
pub const COLOR_PHASES: [f32; 3] = [0.0, 2.0 * PI / 3.0, 4.0 * PI / 3.0];

/// `(top, bottom)` rotation angles around Y at `elapsed` seconds.
///
/// Driven by total elapsed time so the spin speed does not depend on frame
/// rate.
pub fn pyramid_angles(elapsed: f32) -> (f32, f32) {
    let top = (elapsed * PYRAMID_ANGULAR_RATE).rem_euclid(TAU);
    (top, -top)
}

/// Model matrices for the two mirrored pyramids around `center`.
pub fn pyramid_transforms(center: Vec3, elapsed: f32) -> [Mat4; 2] {
    let (top_angle, bottom_angle) = pyramid_angles(elapsed);
    let offset = Vec3::new(0.0, PYRAMID_HALF_GAP, 0.0);
    let top = Mat4::from_translation(center + offset)
        * Mat4::from_rotation_y(top_angle)
        * Mat4::from_scale(Vec3::splat(PYRAMID_SCALE));
    let bottom = Mat4::from_translation(center - offset)
        * Mat4::from_rotation_y(bottom_angle)
        * Mat4::from_scale(Vec3::new(PYRAMID_SCALE, -PYRAMID_SCALE, PYRAMID_SCALE));
    [top, bottom]
}

/// Channel `i` is `0.5 + 0.5 * sin(t * f_i + phi_i)`.
pub fn cycling_color(elapsed: f32) -> Vec3 {
    let channel = |i: usize| 0.5 + 0.5 * (elapsed * COLOR_FREQUENCIES[i] + COLOR_PHASES[i]).sin();
    Vec3::new(channel(0), channel(1), channel(2))
}

/// Color of the point light and the pyramid prop this frame.
pub fn point_light_color(state: &ProgramState, elapsed: f32) -> Vec3 {
    if state.random_color {
        cycling_color(elapsed)
    } else {
        state.pyramid_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramids_spin_in_opposite_directions() {
        for t in [0.0_f32, 1.0, 10.0] {
            let (top, bottom) = pyramid_angles(t);
            let expected = (t * PYRAMID_ANGULAR_RATE).rem_euclid(TAU);
            assert!((top - expected).abs() < 1e-5, "t = {t}");
            assert_eq!(bottom, -top, "t = {t}");
        }
        assert_eq!(pyramid_angles(0.0), (0.0, -0.0));
        assert!((pyramid_angles(10.0).0 - (10.0 - TAU)).abs() < 1e-5);
    }

    #[test]
    fn angles_wrap_into_one_turn() {
        let (top, _) = pyramid_angles(1000.0);
        assert!((0.0..TAU).contains(&top));
    }

    #[test]
    fn bottom_pyramid_is_mirrored_below_top() {
        let center = Vec3::new(0.0, 4.0, 0.0);
        let [top, bottom] = pyramid_transforms(center, 0.0);
        let apex = Vec3::Y;

        let top_apex = top.transform_point3(apex);
        let bottom_apex = bottom.transform_point3(apex);
        assert!(top_apex.y > center.y);
        assert!(bottom_apex.y < center.y);
        assert!(((top_apex.y - center.y) - (center.y - bottom_apex.y)).abs() < 1e-5);
    }

    #[test]
    fn cycling_color_matches_sinusoids() {
        for t in [0.0_f32, 0.5, 3.0, 12.25] {
            let color = cycling_color(t);
            let expected = Vec3::new(
                0.5 + 0.5 * (t * 2.0).sin(),
                0.5 + 0.5 * (t * 0.7 + 2.0 * PI / 3.0).sin(),
                0.5 + 0.5 * (t * 1.3 + 4.0 * PI / 3.0).sin(),
            );
            assert!(color.abs_diff_eq(expected, 1e-5), "t = {t}");
            assert!(color.min_element() >= 0.0 && color.max_element() <= 1.0);
        }
    }

    #[test]
    fn point_light_color_follows_toggle() {
        let mut state = ProgramState::default();
        state.pyramid_color = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(point_light_color(&state, 3.0), Vec3::new(1.0, 0.0, 0.0));

        state.toggle_random_color();
        assert_eq!(point_light_color(&state, 3.0), cycling_color(3.0));
    }
}
