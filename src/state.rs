use anyhow::{Context, Result};
use glam::Vec3;
use std::{
    fs::File,
    io::{BufWriter, ErrorKind, Write},
    path::Path,
};

use crate::{
    camera::Camera,
    lighting::{DirectionalLight, PointLight, SpotLight},
};

/// Everything the scene, the input handlers and the overlay read or edit.
///
/// Only a handful of fields survive a restart; see [`PersistedField`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramState {
    pub clear_color: Vec3,
    pub overlay_enabled: bool,
    pub camera: Camera,
    pub camera_mouse_look_enabled: bool,
    pub house_position: Vec3,
    pub house_scale: f32,
    pub pyramid_position: Vec3,
    pub pyramid_color: Vec3,
    /// Blinn-Phong when set, Phong otherwise.
    pub blinn: bool,
    /// Cycle the point light color over time instead of using `pyramid_color`.
    pub random_color: bool,
    pub directional: DirectionalLight,
    pub point: PointLight,
    pub spot: SpotLight,
}

impl Default for ProgramState {
    fn default() -> Self {
        Self {
            clear_color: Vec3::ZERO,
            overlay_enabled: false,
            camera: Camera::default(),
            camera_mouse_look_enabled: true,
            house_position: Vec3::new(50.0, 0.0, 0.0),
            house_scale: 1.0,
            pyramid_position: Vec3::new(0.0, 4.0, 0.0),
            pyramid_color: Vec3::ONE,
            blinn: true,
            random_color: false,
            directional: DirectionalLight::default(),
            point: PointLight::default(),
            spot: SpotLight::default(),
        }
    }
}

/// How much of a state file was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file at the path; nothing changed.
    Missing,
    /// Every field was read.
    Complete,
    /// The file ended early or held an unparsable token. Fields from
    /// `fields_read` onwards kept their previous values.
    Partial { fields_read: usize },
}

/// The persisted fields, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistedField {
    ClearColorR,
    ClearColorG,
    ClearColorB,
    OverlayEnabled,
    CameraPositionX,
    CameraPositionY,
    CameraPositionZ,
    CameraFrontX,
    CameraFrontY,
    CameraFrontZ,
    PyramidColorR,
    PyramidColorG,
    PyramidColorB,
}

impl PersistedField {
    pub const ALL: [PersistedField; 13] = [
        Self::ClearColorR,
        Self::ClearColorG,
        Self::ClearColorB,
        Self::OverlayEnabled,
        Self::CameraPositionX,
        Self::CameraPositionY,
        Self::CameraPositionZ,
        Self::CameraFrontX,
        Self::CameraFrontY,
        Self::CameraFrontZ,
        Self::PyramidColorR,
        Self::PyramidColorG,
        Self::PyramidColorB,
    ];

    fn is_flag(self) -> bool {
        self == Self::OverlayEnabled
    }
}

/// A single parsed token.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Float(f32),
    Flag(bool),
}

impl Token {
    fn parse(field: PersistedField, raw: &str) -> Option<Self> {
        if field.is_flag() {
            match raw {
                "0" => Some(Self::Flag(false)),
                "1" => Some(Self::Flag(true)),
                _ => None,
            }
        } else {
            raw.parse::<f32>().ok().map(Self::Float)
        }
    }
}

impl ProgramState {
    pub const PERSISTED_FIELD_COUNT: usize = PersistedField::ALL.len();

    /// Flips the overlay and hands the mouse to whichever side now owns it.
    /// Returns the new overlay state.
    pub fn toggle_overlay(&mut self) -> bool {
        self.overlay_enabled = !self.overlay_enabled;
        self.camera_mouse_look_enabled = !self.overlay_enabled;
        self.overlay_enabled
    }

    pub fn toggle_spotlight(&mut self) -> bool {
        self.spot.enabled = !self.spot.enabled;
        self.spot.enabled
    }

    pub fn toggle_blinn(&mut self) -> bool {
        self.blinn = !self.blinn;
        self.blinn
    }

    pub fn toggle_random_color(&mut self) -> bool {
        self.random_color = !self.random_color;
        self.random_color
    }

    /// Moves the point light onto the pyramid and the spotlight onto the
    /// camera. Called once per frame before drawing.
    pub fn attach_lights(&mut self) {
        self.point.position = self.pyramid_position;
        self.spot.follow(self.camera.position, self.camera.front());
    }

    /// Reads the state file at `path` over the current values.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<LoadOutcome> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(self.load_from_str(&text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(LoadOutcome::Missing),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read state file {path:?}"))
            }
        }
    }

    /// Applies whitespace-separated tokens in field order, stopping at the
    /// first missing or malformed one. Values are not range checked.
    pub fn load_from_str(&mut self, text: &str) -> LoadOutcome {
        let mut tokens = text.split_whitespace();
        let mut front = self.camera.front();
        let mut front_touched = false;
        let mut fields_read = 0;

        for field in PersistedField::ALL {
            let Some(token) = tokens.next().and_then(|raw| Token::parse(field, raw)) else {
                break;
            };
            match (field, token) {
                (PersistedField::ClearColorR, Token::Float(v)) => self.clear_color.x = v,
                (PersistedField::ClearColorG, Token::Float(v)) => self.clear_color.y = v,
                (PersistedField::ClearColorB, Token::Float(v)) => self.clear_color.z = v,
                (PersistedField::OverlayEnabled, Token::Flag(v)) => self.overlay_enabled = v,
                (PersistedField::CameraPositionX, Token::Float(v)) => self.camera.position.x = v,
                (PersistedField::CameraPositionY, Token::Float(v)) => self.camera.position.y = v,
                (PersistedField::CameraPositionZ, Token::Float(v)) => self.camera.position.z = v,
                (PersistedField::CameraFrontX, Token::Float(v)) => {
                    front.x = v;
                    front_touched = true;
                }
                (PersistedField::CameraFrontY, Token::Float(v)) => {
                    front.y = v;
                    front_touched = true;
                }
                (PersistedField::CameraFrontZ, Token::Float(v)) => {
                    front.z = v;
                    front_touched = true;
                }
                (PersistedField::PyramidColorR, Token::Float(v)) => self.pyramid_color.x = v,
                (PersistedField::PyramidColorG, Token::Float(v)) => self.pyramid_color.y = v,
                (PersistedField::PyramidColorB, Token::Float(v)) => self.pyramid_color.z = v,
                _ => unreachable!("token kind is chosen by the field"),
            }
            fields_read += 1;
        }

        if front_touched && !self.camera.set_front(front) {
            log::warn!("Ignoring zero-length camera front {front:?}");
        }
        self.camera_mouse_look_enabled = !self.overlay_enabled;

        if fields_read == Self::PERSISTED_FIELD_COUNT {
            LoadOutcome::Complete
        } else {
            LoadOutcome::Partial { fields_read }
        }
    }

    /// One token per line, in [`PersistedField::ALL`] order.
    pub fn to_persisted_string(&self) -> String {
        let front = self.camera.front();
        let mut out = String::new();
        for field in PersistedField::ALL {
            let token = match field {
                PersistedField::ClearColorR => self.clear_color.x.to_string(),
                PersistedField::ClearColorG => self.clear_color.y.to_string(),
                PersistedField::ClearColorB => self.clear_color.z.to_string(),
                PersistedField::OverlayEnabled => u8::from(self.overlay_enabled).to_string(),
                PersistedField::CameraPositionX => self.camera.position.x.to_string(),
                PersistedField::CameraPositionY => self.camera.position.y.to_string(),
                PersistedField::CameraPositionZ => self.camera.position.z.to_string(),
                PersistedField::CameraFrontX => front.x.to_string(),
                PersistedField::CameraFrontY => front.y.to_string(),
                PersistedField::CameraFrontZ => front.z.to_string(),
                PersistedField::PyramidColorR => self.pyramid_color.x.to_string(),
                PersistedField::PyramidColorG => self.pyramid_color.y.to_string(),
                PersistedField::PyramidColorB => self.pyramid_color.z.to_string(),
            };
            out.push_str(&token);
            out.push('\n');
        }
        out
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent_dir) = path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                std::fs::create_dir_all(parent_dir)
                    .with_context(|| format!("Failed to create directory {parent_dir:?}"))?;
            }
        }

        let file =
            File::create(path).with_context(|| format!("Failed to create file {path:?}"))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(self.to_persisted_string().as_bytes())
            .and_then(|_| writer.flush())
            .with_context(|| format!("Failed to write state file {path:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "house-scene-state-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn assert_close(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a:?} != {b:?}");
    }

    #[test]
    fn round_trip_through_file() {
        let dir = scratch_dir("round-trip");
        let path = dir.join("nested").join("program_state.txt");

        let mut saved = ProgramState::default();
        saved.clear_color = Vec3::new(0.2, 0.4, 0.6);
        saved.overlay_enabled = false;
        saved.camera.position = Vec3::new(1.0, 2.0, 3.0);
        assert!(saved.camera.set_front(Vec3::new(0.0, 0.0, -1.0)));
        saved.pyramid_color = Vec3::new(1.0, 0.0, 0.0);
        saved.save_to_file(&path).unwrap();

        let mut loaded = ProgramState::default();
        loaded.pyramid_color = Vec3::splat(0.5);
        let outcome = loaded.load_from_file(&path).unwrap();

        assert_eq!(outcome, LoadOutcome::Complete);
        assert_close(loaded.clear_color, Vec3::new(0.2, 0.4, 0.6));
        assert!(!loaded.overlay_enabled);
        assert_close(loaded.camera.position, Vec3::new(1.0, 2.0, 3.0));
        assert_close(loaded.camera.front(), Vec3::new(0.0, 0.0, -1.0));
        assert_close(loaded.pyramid_color, Vec3::new(1.0, 0.0, 0.0));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn saved_file_has_one_token_per_line() {
        let mut state = ProgramState::default();
        state.overlay_enabled = true;
        let text = state.to_persisted_string();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), ProgramState::PERSISTED_FIELD_COUNT);
        assert_eq!(lines[3], "1");
        assert_eq!(&lines[4..7], &["0", "0", "3"]);
    }

    #[test]
    fn missing_file_keeps_defaults() {
        let dir = scratch_dir("missing");
        let mut state = ProgramState::default();
        let outcome = state.load_from_file(dir.join("absent.txt")).unwrap();

        assert_eq!(outcome, LoadOutcome::Missing);
        assert_eq!(state, ProgramState::default());
        assert_eq!(state.clear_color, Vec3::ZERO);
        assert!(!state.overlay_enabled);
        assert_eq!(state.camera.position, Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn truncated_file_keeps_trailing_defaults() {
        let mut state = ProgramState::default();
        let outcome = state.load_from_str("0.5\n0.25\n0.125\n1\n7\n");

        assert_eq!(outcome, LoadOutcome::Partial { fields_read: 5 });
        assert_eq!(state.clear_color, Vec3::new(0.5, 0.25, 0.125));
        assert!(state.overlay_enabled);
        assert_eq!(state.camera.position, Vec3::new(7.0, 0.0, 3.0));
        assert_close(state.camera.front(), Vec3::NEG_Z);
        assert_eq!(state.pyramid_color, Vec3::ONE);
    }

    #[test]
    fn loaded_overlay_flag_suspends_mouse_look() {
        let mut state = ProgramState::default();
        state.load_from_str("0 0 0 1");
        assert!(state.overlay_enabled);
        assert!(!state.camera_mouse_look_enabled);
    }

    #[test]
    fn malformed_token_stops_reading() {
        let mut state = ProgramState::default();
        let outcome = state.load_from_str("0.1 0.2 zebra 1 9 9 9");

        assert_eq!(outcome, LoadOutcome::Partial { fields_read: 2 });
        assert_eq!(state.clear_color, Vec3::new(0.1, 0.2, 0.0));
        assert!(!state.overlay_enabled);
        assert_eq!(state.camera.position, Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn overlay_flag_only_accepts_zero_or_one() {
        let mut state = ProgramState::default();
        let outcome = state.load_from_str("0 0 0 true 1 1 1");
        assert_eq!(outcome, LoadOutcome::Partial { fields_read: 3 });
        assert!(!state.overlay_enabled);
    }

    #[test]
    fn out_of_range_values_are_accepted() {
        let mut state = ProgramState::default();
        state.load_from_str("-4 12 1e6 0 0 0 0 1 0 0 9 9 9");
        assert_eq!(state.clear_color, Vec3::new(-4.0, 12.0, 1e6));
        assert_eq!(state.pyramid_color, Vec3::splat(9.0));
    }

    #[test]
    fn spotlight_toggle_is_an_involution() {
        let mut state = ProgramState::default();
        let original = state.spot.enabled;
        for _ in 0..4 {
            state.toggle_spotlight();
        }
        assert_eq!(state.spot.enabled, original);
        state.toggle_spotlight();
        assert_ne!(state.spot.enabled, original);
    }

    #[test]
    fn overlay_toggle_hands_over_the_mouse() {
        let mut state = ProgramState::default();
        assert!(state.toggle_overlay());
        assert!(!state.camera_mouse_look_enabled);
        assert!(!state.toggle_overlay());
        assert!(state.camera_mouse_look_enabled);
    }

    #[test]
    fn lights_follow_pyramid_and_camera() {
        let mut state = ProgramState::default();
        state.pyramid_position = Vec3::new(1.0, 5.0, -2.0);
        state.camera.position = Vec3::new(0.0, 1.0, 7.0);
        state.attach_lights();
        assert_eq!(state.point.position, Vec3::new(1.0, 5.0, -2.0));
        assert_eq!(state.spot.position, Vec3::new(0.0, 1.0, 7.0));
        assert_eq!(state.spot.direction, state.camera.front());
    }
}
