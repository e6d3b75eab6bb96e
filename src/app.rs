use anyhow::{Context, Result};
use egui_winit::winit::{
    dpi::PhysicalSize,
    event::{DeviceEvent, ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowBuilder},
};
use std::process::ExitCode;

use crate::{
    config::SceneConfig,
    input::{apply_action, ActionEffect, InputAction, InputState},
    overlay::{Overlay, OverlayStorage},
    renderer::{scene::SceneAssets, SceneRenderer},
    state::{LoadOutcome, ProgramState},
    timing::FrameClock,
};

/// Opens the window and runs the scene until it is closed.
pub fn run(config: SceneConfig) -> ExitCode {
    match try_run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_run(config: SceneConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .build(&event_loop)
        .context("Failed to create window")?;

    let mut app = SceneApp::new(config, window)?;
    event_loop
        .run(|event, event_loop| app.handle_event(event, event_loop))
        .context("Event loop terminated with an error")
}

fn load_state(path: &std::path::Path) -> ProgramState {
    let mut state = ProgramState::default();
    match state.load_from_file(path) {
        Ok(LoadOutcome::Missing) => log::info!("No state file at {path:?}, using defaults"),
        Ok(LoadOutcome::Complete) => log::info!("Loaded state from {path:?}"),
        Ok(LoadOutcome::Partial { fields_read }) => log::warn!(
            "State file {path:?} stopped after {fields_read} of {} fields",
            ProgramState::PERSISTED_FIELD_COUNT
        ),
        Err(err) => log::error!("{err:#}; using defaults"),
    }
    state
}

struct SceneApp {
    config: SceneConfig,
    state: ProgramState,
    input: InputState,
    clock: FrameClock,
    focused: bool,
    overlay: Overlay,
    renderer: SceneRenderer,
    // dropped after everything that renders into it
    window: Window,
}

impl SceneApp {
    fn new(config: SceneConfig, window: Window) -> Result<Self> {
        let state = load_state(&config.state_path());
        let assets = SceneAssets::load(&config.assets());
        let renderer = SceneRenderer::new(&window, &config, &assets)
            .context("Failed to set up the renderer")?;

        let storage = match OverlayStorage::from_app_id(&config.app_id) {
            Ok(storage) => Some(storage),
            Err(err) => {
                log::warn!("{err:#}; the overlay layout will not be saved");
                None
            }
        };
        let overlay = Overlay::new(&window, storage, renderer.max_texture_side());

        let app = Self {
            config,
            state,
            input: InputState::new(),
            clock: FrameClock::new(),
            focused: true,
            overlay,
            renderer,
            window,
        };
        app.capture_cursor(!app.state.overlay_enabled);
        Ok(app)
    }

    fn handle_event(&mut self, event: Event<()>, event_loop: &EventLoopWindowTarget<()>) {
        event_loop.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { event, window_id } if window_id == self.window.id() => {
                self.handle_window_event(event, event_loop);
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } if self.focused => {
                self.input.process_mouse_motion(delta, &mut self.state);
            }
            Event::AboutToWait => self.window.request_redraw(),
            Event::LoopExiting => self.save(),
            _ => {}
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent, event_loop: &EventLoopWindowTarget<()>) {
        // a hidden overlay would only queue up stale input
        let consumed = (self.state.overlay_enabled
            || matches!(event, WindowEvent::ScaleFactorChanged { .. }))
            && self.overlay.on_window_event(&self.window, &event).consumed;

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => self.renderer.resize(size.width, size.height),
            WindowEvent::Focused(focused) => {
                self.focused = focused;
                if !focused {
                    self.input.release_all();
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key,
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                // releases always land so held movement keys cannot stick
                let always_handled = matches!(
                    physical_key,
                    PhysicalKey::Code(KeyCode::F1 | KeyCode::Escape)
                );
                if consumed && state == ElementState::Pressed && !always_handled {
                    return;
                }
                if let Some(action) = self.input.process_key(physical_key, state, repeat) {
                    self.apply(action, event_loop);
                }
            }
            WindowEvent::MouseWheel { delta, .. } if !consumed => {
                self.input.process_scroll(delta, &mut self.state.camera);
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn apply(&mut self, action: InputAction, event_loop: &EventLoopWindowTarget<()>) {
        match apply_action(action, &mut self.state) {
            ActionEffect::None => {}
            ActionEffect::Exit => event_loop.exit(),
            ActionEffect::CaptureCursor(capture) => self.capture_cursor(capture),
        }
    }

    fn redraw(&mut self) {
        let time = self.clock.tick();
        self.input.apply_movement(&mut self.state.camera, time.delta);
        self.state.attach_lights();

        let overlay = self
            .state
            .overlay_enabled
            .then(|| self.overlay.run(&self.window, &mut self.state, &time));

        let size = self.window.inner_size();
        if let Err(err) =
            self.renderer
                .render(&self.state, &time, size.width, size.height, overlay.as_ref())
        {
            log::error!("Dropped frame: {err:#}");
        }
    }

    fn capture_cursor(&self, capture: bool) {
        let grab = if capture {
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(err) = grab {
            log::warn!("Failed to change cursor grab: {err}");
        }
        self.window.set_cursor_visible(!capture);
    }

    fn save(&mut self) {
        let path = self.config.state_path();
        match self.state.save_to_file(&path) {
            Ok(()) => log::info!("Saved state to {path:?}"),
            Err(err) => log::error!("{err:#}"),
        }
        self.overlay.save();
    }
}
