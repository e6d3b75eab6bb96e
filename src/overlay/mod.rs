mod storage;
mod ui;

pub use storage::OverlayStorage;

use egui_winit::{
    winit::{event::WindowEvent, window::Window},
    EventResponse,
};

use crate::{state::ProgramState, timing::FrameTime};

/// Tessellated overlay output handed to the renderer for one frame.
pub struct OverlayFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// egui context plus its winit input translation and layout storage.
pub struct Overlay {
    context: egui::Context,
    state: egui_winit::State,
    storage: Option<OverlayStorage>,
}

impl Overlay {
    pub fn new(window: &Window, storage: Option<OverlayStorage>, max_texture_side: usize) -> Self {
        let context = egui::Context::default();
        if let Some(memory) = storage.as_ref().and_then(OverlayStorage::get_egui_memory) {
            context.memory_mut(|m| *m = memory);
        }
        let state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            Some(max_texture_side),
        );
        Self {
            context,
            state,
            storage,
        }
    }

    /// Feeds a window event to egui. `consumed` tells the caller to keep it
    /// away from camera handling.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> EventResponse {
        self.state.on_window_event(window, event)
    }

    /// Runs the overlay UI against `state` and tessellates the result.
    pub fn run(&mut self, window: &Window, state: &mut ProgramState, time: &FrameTime) -> OverlayFrame {
        let mut raw_input = self.state.take_egui_input(window);
        raw_input.time = Some(f64::from(time.elapsed));

        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = self.context.run(raw_input, |ctx| ui::draw(ctx, state, time));

        self.state
            .handle_platform_output(window, platform_output);

        OverlayFrame {
            primitives: self.context.tessellate(shapes, pixels_per_point),
            textures_delta,
            pixels_per_point,
        }
    }

    /// Writes the overlay layout back to its storage, if it has one.
    pub fn save(&mut self) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        storage.set_egui_memory(&self.context.memory(|m| m.clone()));
        match storage.flush() {
            Ok(()) => log::debug!("Saved overlay layout to {:?}", storage.path()),
            Err(err) => log::error!("Failed to save overlay layout: {err:#}"),
        }
    }
}
