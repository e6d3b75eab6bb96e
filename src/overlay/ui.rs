use glam::Vec3;

use crate::{
    lighting::{Attenuation, DirectionalLight, PointLight, SpotLight},
    state::ProgramState,
    timing::FrameTime,
};

/// Backs the free-standing slider in the hello window. Not persisted.
fn hello_slider_id() -> egui::Id {
    egui::Id::new("hello_window_slider")
}

/// Builds the overlay windows. Every widget except the hello slider edits
/// `state` directly.
pub fn draw(ctx: &egui::Context, state: &mut ProgramState, time: &FrameTime) {
    egui::Window::new("Hello window")
        .default_pos([10.0, 560.0])
        .default_open(false)
        .show(ctx, |ui| {
            ui.label("Hello text");
            let mut value =
                ui.data_mut(|d| *d.get_temp_mut_or_default::<f32>(hello_slider_id()));
            if ui
                .add(egui::Slider::new(&mut value, 0.0..=1.0).text("Float slider"))
                .changed()
            {
                ui.data_mut(|d| d.insert_temp(hello_slider_id(), value));
            }
            color_edit(ui, "Background color", &mut state.clear_color);
        });

    egui::Window::new("Scene")
        .default_pos([10.0, 10.0])
        .show(ctx, |ui| scene_window(ui, state, time));

    egui::Window::new("Lights")
        .default_pos([10.0, 320.0])
        .default_open(false)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| lights_window(ui, state));
        });

    egui::Window::new("Camera info")
        .default_pos([560.0, 10.0])
        .show(ctx, |ui| camera_window(ui, state));
}

fn scene_window(ui: &mut egui::Ui, state: &mut ProgramState, time: &FrameTime) {
    let fps = if time.delta > 0.0 { 1.0 / time.delta } else { 0.0 };
    ui.label(format!("{fps:.0} fps ({:.2} ms)", time.delta * 1000.0));

    ui.group(|ui| {
        ui.heading("Background");
        color_edit(ui, "Color", &mut state.clear_color);
    });
    ui.group(|ui| {
        ui.heading("House");
        vec3_drag(ui, "Position", &mut state.house_position, 0.1);
        ui.horizontal(|ui| {
            ui.label("Scale");
            ui.add(
                egui::DragValue::new(&mut state.house_scale)
                    .speed(0.01)
                    .clamp_range(0.01..=10.0),
            );
        });
    });
    ui.group(|ui| {
        ui.heading("Pyramid");
        vec3_drag(ui, "Position", &mut state.pyramid_position, 0.05);
        color_edit(ui, "Color", &mut state.pyramid_color);
        ui.checkbox(&mut state.random_color, "Cycle color (L)");
    });
    ui.group(|ui| {
        ui.heading("Shading");
        ui.checkbox(&mut state.blinn, "Blinn-Phong (Space)");
        ui.checkbox(&mut state.spot.enabled, "Spotlight (F)");
    });
}

fn lights_window(ui: &mut egui::Ui, state: &mut ProgramState) {
    ui.style_mut().spacing.item_spacing.y = 6.0;
    ui.group(|ui| {
        ui.heading("Directional");
        directional_light(ui, &mut state.directional);
    });
    ui.group(|ui| {
        ui.heading("Point");
        ui.label("Follows the pyramid.");
        point_light(ui, &mut state.point);
    });
    ui.group(|ui| {
        ui.heading("Spot");
        ui.label("Follows the camera.");
        spot_light(ui, &mut state.spot);
    });
}

fn directional_light(ui: &mut egui::Ui, light: &mut DirectionalLight) {
    vec3_drag(ui, "Direction", &mut light.direction, 0.01);
    color_edit(ui, "Ambient", &mut light.ambient);
    color_edit(ui, "Diffuse", &mut light.diffuse);
    color_edit(ui, "Specular", &mut light.specular);
}

fn point_light(ui: &mut egui::Ui, light: &mut PointLight) {
    color_edit(ui, "Ambient", &mut light.ambient);
    color_edit(ui, "Diffuse", &mut light.diffuse);
    color_edit(ui, "Specular", &mut light.specular);
    attenuation(ui, &mut light.attenuation);
}

fn spot_light(ui: &mut egui::Ui, light: &mut SpotLight) {
    color_edit(ui, "Ambient", &mut light.ambient);
    color_edit(ui, "Diffuse", &mut light.diffuse);
    color_edit(ui, "Specular", &mut light.specular);
    attenuation(ui, &mut light.attenuation);
    ui.label("Cut-off (degrees)");
    ui.add(egui::Slider::new(&mut light.cut_off, 0.0..=90.0).text("inner"));
    ui.add(egui::Slider::new(&mut light.outer_cut_off, 0.0..=90.0).text("outer"));
}

fn attenuation(ui: &mut egui::Ui, attenuation: &mut Attenuation) {
    ui.label("Attenuation");
    ui.horizontal(|ui| {
        ui.label("c");
        ui.add(egui::DragValue::new(&mut attenuation.constant).speed(0.01));
        ui.label("l");
        ui.add(egui::DragValue::new(&mut attenuation.linear).speed(0.001));
        ui.label("q");
        ui.add(egui::DragValue::new(&mut attenuation.quadratic).speed(0.001));
    });
}

fn camera_window(ui: &mut egui::Ui, state: &mut ProgramState) {
    let camera = &state.camera;
    let position = camera.position;
    let front = camera.front();
    ui.label(format!(
        "Camera position: ({:.3}, {:.3}, {:.3})",
        position.x, position.y, position.z
    ));
    ui.label(format!(
        "(Yaw, Pitch): ({:.3}, {:.3})",
        camera.yaw(),
        camera.pitch()
    ));
    ui.label(format!(
        "Camera front: ({:.3}, {:.3}, {:.3})",
        front.x, front.y, front.z
    ));
    ui.label(format!("Zoom: {:.1}", camera.zoom));
    ui.checkbox(&mut state.camera_mouse_look_enabled, "Camera mouse update");
}

fn color_edit(ui: &mut egui::Ui, label: &str, color: &mut Vec3) {
    ui.horizontal(|ui| {
        let mut rgb = color.to_array();
        if ui.color_edit_button_rgb(&mut rgb).changed() {
            *color = Vec3::from_array(rgb);
        }
        ui.label(label);
    });
}

fn vec3_drag(ui: &mut egui::Ui, label: &str, value: &mut Vec3, speed: f64) {
    ui.label(label);
    ui.horizontal(|ui| {
        ui.label("X");
        ui.add(egui::DragValue::new(&mut value.x).speed(speed));
        ui.label("Y");
        ui.add(egui::DragValue::new(&mut value.y).speed(speed));
        ui.label("Z");
        ui.add(egui::DragValue::new(&mut value.z).speed(speed));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_once(state: &mut ProgramState) {
        let ctx = egui::Context::default();
        let time = FrameTime {
            delta: 1.0 / 60.0,
            elapsed: 1.0,
        };
        let _ = ctx.run(egui::RawInput::default(), |ctx| draw(ctx, state, &time));
    }

    #[test]
    fn drawing_without_input_changes_nothing() {
        let mut state = ProgramState::default();
        let before = state.clone();
        run_once(&mut state);
        run_once(&mut state);
        assert_eq!(state, before);
    }

    #[test]
    fn hello_slider_keeps_its_value_in_egui_memory() {
        let ctx = egui::Context::default();
        let time = FrameTime {
            delta: 1.0 / 60.0,
            elapsed: 1.0,
        };
        let mut state = ProgramState::default();
        ctx.data_mut(|d| d.insert_temp(hello_slider_id(), 0.25_f32));
        let _ = ctx.run(egui::RawInput::default(), |ctx| draw(ctx, &mut state, &time));
        assert_eq!(ctx.data(|d| d.get_temp::<f32>(hello_slider_id())), Some(0.25));
        assert_eq!(state, ProgramState::default());
    }
}
