use egui_winit::winit::{
    event::{ElementState, MouseScrollDelta},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::{
    camera::{Camera, CameraMovement},
    state::ProgramState,
};

/// Pixel scroll deltas are divided by this to get "lines".
const PIXELS_PER_SCROLL_LINE: f32 = 50.0;

/// One-shot commands bound to key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Quit,
    ToggleOverlay,
    ToggleSpotlight,
    ToggleBlinn,
    ToggleRandomColor,
}
impl InputAction {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Escape => Some(Self::Quit),
            KeyCode::F1 => Some(Self::ToggleOverlay),
            KeyCode::KeyF => Some(Self::ToggleSpotlight),
            KeyCode::Space => Some(Self::ToggleBlinn),
            KeyCode::KeyL => Some(Self::ToggleRandomColor),
            _ => None,
        }
    }
}

/// What the window layer has to do after an action touched the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEffect {
    None,
    Exit,
    /// Grab and hide the cursor when `true`, release it otherwise.
    CaptureCursor(bool),
}

/// Applies a one-shot action to the program state.
pub fn apply_action(action: InputAction, state: &mut ProgramState) -> ActionEffect {
    match action {
        InputAction::Quit => ActionEffect::Exit,
        InputAction::ToggleOverlay => {
            let overlay_enabled = state.toggle_overlay();
            log::debug!("Overlay {}", if overlay_enabled { "opened" } else { "closed" });
            ActionEffect::CaptureCursor(!overlay_enabled)
        }
        InputAction::ToggleSpotlight => {
            let enabled = state.toggle_spotlight();
            log::debug!("Spotlight enabled: {enabled}");
            ActionEffect::None
        }
        InputAction::ToggleBlinn => {
            let blinn = state.toggle_blinn();
            log::debug!("Lighting model: {}", if blinn { "Blinn-Phong" } else { "Phong" });
            ActionEffect::None
        }
        InputAction::ToggleRandomColor => {
            let random = state.toggle_random_color();
            log::debug!("Random light color: {random}");
            ActionEffect::None
        }
    }
}

/// Movement keys currently held down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HeldKeys {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
}

/// Keyboard and mouse state between frames.
///
/// Movement keys are latched from events and polled once per frame; the
/// toggle keys fire once per physical press.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HeldKeys,
}
impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key transition and returns the action it triggers, if any.
    /// OS key repeat never triggers an action.
    pub fn process_key(
        &mut self,
        key: PhysicalKey,
        state: ElementState,
        repeat: bool,
    ) -> Option<InputAction> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        let pressed = state == ElementState::Pressed;
        match code {
            KeyCode::KeyW => self.held.forward = pressed,
            KeyCode::KeyS => self.held.backward = pressed,
            KeyCode::KeyA => self.held.left = pressed,
            KeyCode::KeyD => self.held.right = pressed,
            _ => {}
        }
        if pressed && !repeat {
            InputAction::from_key(code)
        } else {
            None
        }
    }

    /// Forgets held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held = HeldKeys::default();
    }

    /// Moves the camera for every held direction, scaled by the frame delta.
    pub fn apply_movement(&self, camera: &mut Camera, delta_time: f32) {
        let moves = [
            (self.held.forward, CameraMovement::Forward),
            (self.held.backward, CameraMovement::Backward),
            (self.held.left, CameraMovement::Left),
            (self.held.right, CameraMovement::Right),
        ];
        for (held, direction) in moves {
            if held {
                camera.process_keyboard(direction, delta_time);
            }
        }
    }

    /// Raw mouse motion in pixels. Screen Y grows downwards, so it is
    /// inverted before reaching the camera.
    pub fn process_mouse_motion(&self, delta: (f64, f64), state: &mut ProgramState) {
        if !state.camera_mouse_look_enabled {
            return;
        }
        state
            .camera
            .process_mouse_movement(delta.0 as f32, -delta.1 as f32, true);
    }

    pub fn process_scroll(&self, delta: MouseScrollDelta, camera: &mut Camera) {
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_SCROLL_LINE,
        };
        camera.process_mouse_scroll(lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui_winit::winit::dpi::PhysicalPosition;
    use glam::Vec3;

    fn press(input: &mut InputState, code: KeyCode) -> Option<InputAction> {
        input.process_key(PhysicalKey::Code(code), ElementState::Pressed, false)
    }

    #[test]
    fn keys_map_to_actions() {
        let mut input = InputState::new();
        assert_eq!(press(&mut input, KeyCode::Escape), Some(InputAction::Quit));
        assert_eq!(press(&mut input, KeyCode::F1), Some(InputAction::ToggleOverlay));
        assert_eq!(press(&mut input, KeyCode::KeyF), Some(InputAction::ToggleSpotlight));
        assert_eq!(press(&mut input, KeyCode::Space), Some(InputAction::ToggleBlinn));
        assert_eq!(press(&mut input, KeyCode::KeyL), Some(InputAction::ToggleRandomColor));
        assert_eq!(press(&mut input, KeyCode::KeyW), None);
    }

    #[test]
    fn toggles_are_edge_triggered() {
        let mut input = InputState::new();
        let code = PhysicalKey::Code(KeyCode::KeyF);
        assert!(input.process_key(code, ElementState::Pressed, false).is_some());
        assert!(input.process_key(code, ElementState::Pressed, true).is_none());
        assert!(input.process_key(code, ElementState::Released, false).is_none());
    }

    #[test]
    fn held_keys_move_every_frame_until_released() {
        let mut input = InputState::new();
        let mut camera = Camera::default();
        press(&mut input, KeyCode::KeyW);

        input.apply_movement(&mut camera, 0.4);
        input.apply_movement(&mut camera, 0.4);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-5));

        input.process_key(
            PhysicalKey::Code(KeyCode::KeyW),
            ElementState::Released,
            false,
        );
        input.apply_movement(&mut camera, 0.4);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-5));
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut input = InputState::new();
        let mut camera = Camera::default();
        press(&mut input, KeyCode::KeyA);
        press(&mut input, KeyCode::KeyD);
        input.apply_movement(&mut camera, 1.0);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-5));

        input.release_all();
        press(&mut input, KeyCode::KeyD);
        input.apply_movement(&mut camera, 1.0);
        assert!(camera.position.abs_diff_eq(Vec3::new(2.5, 0.0, 3.0), 1e-5));
    }

    #[test]
    fn mouse_look_respects_the_flag() {
        let input = InputState::new();
        let mut state = ProgramState::default();

        input.process_mouse_motion((0.0, -100.0), &mut state);
        assert!((state.camera.pitch() - 10.0).abs() < 1e-4);

        state.camera_mouse_look_enabled = false;
        input.process_mouse_motion((0.0, -100.0), &mut state);
        assert!((state.camera.pitch() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn overlay_toggle_releases_and_recaptures_cursor() {
        let mut state = ProgramState::default();
        assert_eq!(
            apply_action(InputAction::ToggleOverlay, &mut state),
            ActionEffect::CaptureCursor(false)
        );
        assert!(!state.camera_mouse_look_enabled);
        assert_eq!(
            apply_action(InputAction::ToggleOverlay, &mut state),
            ActionEffect::CaptureCursor(true)
        );
        assert!(state.camera_mouse_look_enabled);
        assert_eq!(apply_action(InputAction::Quit, &mut state), ActionEffect::Exit);
    }

    #[test]
    fn scroll_changes_zoom() {
        let input = InputState::new();
        let mut camera = Camera::default();
        input.process_scroll(MouseScrollDelta::LineDelta(0.0, 5.0), &mut camera);
        assert_eq!(camera.zoom, 40.0);
        input.process_scroll(
            MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 100.0)),
            &mut camera,
        );
        assert_eq!(camera.zoom, 38.0);
    }
}
