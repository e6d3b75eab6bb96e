mod app;
pub mod animation;
pub mod camera;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod lighting;
pub mod mesh;
pub mod overlay;
pub mod renderer;
pub mod state;
pub mod texture;
pub mod timing;
mod utils;

pub use egui_winit::winit;

pub use app::run;
pub use config::SceneConfig;
pub use state::{LoadOutcome, ProgramState};
