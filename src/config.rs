use ash::vk;
use std::path::{Path, PathBuf};

use crate::texture::CubemapFaces;

/// house-scene run option.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// window title.
    pub title: String,
    /// initial window width in physical pixels.
    pub width: u32,
    /// initial window height in physical pixels.
    pub height: u32,
    /// directory every asset path is resolved against.
    pub resource_dir: PathBuf,
    /// persisted program state, relative to `resource_dir`.
    pub state_file: PathBuf,
    /// vk::PresentModeKHR
    pub present_mode: vk::PresentModeKHR,
    /// request `VK_LAYER_KHRONOS_validation` when it is installed.
    pub enable_validation: bool,
    /// name of the platform data directory holding the overlay layout.
    pub app_id: String,
}
impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            title: String::from("house-scene"),
            width: 800,
            height: 600,
            resource_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("resources"),
            state_file: PathBuf::from("program_state.txt"),
            present_mode: vk::PresentModeKHR::FIFO,
            enable_validation: cfg!(debug_assertions),
            app_id: String::from("house-scene"),
        }
    }
}
impl SceneConfig {
    pub fn resource(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.resource_dir.join(relative)
    }

    pub fn state_path(&self) -> PathBuf {
        self.resource(&self.state_file)
    }

    pub fn assets(&self) -> AssetPaths {
        AssetPaths {
            house_model: self.resource("objects/house/WoodHouse.obj"),
            house_texture: self.resource("objects/house/Diffuse.png"),
            terrain_base: self.resource("textures/terrain/base.jpg"),
            terrain_height: self.resource("textures/terrain/height.png"),
            terrain_roughness: self.resource("textures/terrain/roughness.jpg"),
            skybox: CubemapFaces::from_dir(self.resource("textures/skybox"), "png"),
        }
    }
}

/// Every file the scene reads at startup.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub house_model: PathBuf,
    pub house_texture: PathBuf,
    pub terrain_base: PathBuf,
    pub terrain_height: PathBuf,
    pub terrain_roughness: PathBuf,
    pub skybox: CubemapFaces,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::CubeFace;

    #[test]
    fn default_window_matches_scene_size() {
        let config = SceneConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn paths_resolve_against_resource_dir() {
        let config = SceneConfig {
            resource_dir: PathBuf::from("/data/scene"),
            ..Default::default()
        };
        assert_eq!(
            config.state_path(),
            PathBuf::from("/data/scene/program_state.txt")
        );

        let assets = config.assets();
        assert_eq!(
            assets.house_model,
            PathBuf::from("/data/scene/objects/house/WoodHouse.obj")
        );
        assert_eq!(
            assets.terrain_height,
            PathBuf::from("/data/scene/textures/terrain/height.png")
        );
        assert_eq!(
            assets.skybox.path(CubeFace::PositiveX),
            Path::new("/data/scene/textures/skybox/right.png")
        );
        assert_eq!(
            assets.skybox.path(CubeFace::NegativeZ),
            Path::new("/data/scene/textures/skybox/back.png")
        );
    }
}
