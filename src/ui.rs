// src/ui.rs - Theme and custom widgets for the try-on window
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use image::RgbaImage;

use crate::compositor::OverlayTransform;
use crate::landmarks::{Landmark, HAND_CONNECTIONS, HAND_LANDMARK_COUNT, RING_DIP, RING_MCP, RING_PIP, RING_TIP};

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub accent: Color32,
    pub background: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            accent: Color32::from_rgb(212, 175, 55),
            background: Color32::from_rgb(20, 20, 25),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(244, 67, 54),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

pub fn visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = Color32::from_rgb(70, 130, 240);

    for widget in [
        &mut visuals.widgets.noninteractive,
        &mut visuals.widgets.inactive,
        &mut visuals.widgets.hovered,
        &mut visuals.widgets.active,
    ] {
        widget.rounding = egui::Rounding::same(8.0);
    }
    visuals.window_rounding = egui::Rounding::same(12.0);
    visuals.menu_rounding = egui::Rounding::same(8.0);

    visuals
}

/// Displays the composed frame, letterboxed to keep its aspect ratio.
pub struct FrameView {
    texture: Option<egui::TextureHandle>,
    size: [usize; 2],
}

impl FrameView {
    pub fn new() -> Self {
        Self {
            texture: None,
            size: [0, 0],
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &RgbaImage) {
        let size = [frame.width() as usize, frame.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());

        match &mut self.texture {
            Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("tryon_frame", color_image, egui::TextureOptions::LINEAR))
            }
        }
        self.size = size;
    }

    /// Paints the frame and returns the rect it occupies on screen.
    pub fn show(&self, ui: &mut egui::Ui) -> Rect {
        let available = ui.available_size();
        let aspect = if self.size[1] > 0 {
            self.size[0] as f32 / self.size[1] as f32
        } else {
            4.0 / 3.0
        };
        let width = available.x.min(available.y * aspect).max(1.0);
        let (rect, _response) = ui.allocate_exact_size(Vec2::new(width, width / aspect), egui::Sense::hover());

        match &self.texture {
            Some(texture) => {
                ui.painter().image(
                    texture.id(),
                    rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            None => {
                ui.painter().rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "No Video Signal",
                    egui::FontId::proportional(16.0),
                    Color32::from_rgb(150, 150, 155),
                );
            }
        }
        rect
    }
}

impl Default for FrameView {
    fn default() -> Self {
        Self::new()
    }
}

fn to_screen(rect: Rect, lm: &Landmark) -> Pos2 {
    Pos2::new(
        rect.left() + lm.x as f32 * rect.width(),
        rect.top() + lm.y as f32 * rect.height(),
    )
}

/// Debug overlay of the detected hand; the ring finger joints are highlighted.
pub fn draw_hand_skeleton(painter: &egui::Painter, rect: Rect, landmarks: &[Landmark], theme: &Theme) {
    if landmarks.len() < HAND_LANDMARK_COUNT {
        return;
    }

    for (from, to) in HAND_CONNECTIONS {
        painter.line_segment(
            [to_screen(rect, &landmarks[from]), to_screen(rect, &landmarks[to])],
            Stroke::new(2.0, theme.primary),
        );
    }

    for (i, lm) in landmarks.iter().enumerate().take(HAND_LANDMARK_COUNT) {
        let ring = matches!(i, RING_MCP | RING_PIP | RING_DIP | RING_TIP);
        let color = if ring { theme.accent } else { theme.primary };
        let pos = to_screen(rect, lm);
        painter.circle_filled(pos, if ring { 5.0 } else { 3.5 }, color);
        painter.circle_stroke(pos, if ring { 7.0 } else { 5.0 }, Stroke::new(1.5, theme.text_primary));
    }
}

pub fn draw_recording_indicator(ui: &mut egui::Ui, rect: Rect, pulse_time: f32) {
    let pulse = (pulse_time.sin() + 1.0) * 0.5;
    let color = Color32::from_rgb(244, (67.0 + pulse * 30.0) as u8, 54);
    let pos = Pos2::new(rect.right() - 30.0, rect.top() + 30.0);

    ui.painter().circle_filled(pos, 10.0 + pulse * 3.0, color);
    ui.painter().text(
        Pos2::new(pos.x - 20.0, pos.y),
        egui::Align2::RIGHT_CENTER,
        "REC",
        egui::FontId::proportional(14.0),
        color,
    );
}

pub fn draw_rate_bar(ui: &mut egui::Ui, theme: &Theme, label: &str, value: f32) {
    ui.horizontal(|ui| {
        ui.label(label);

        let bar = Vec2::new(160.0, 18.0);
        let rect = ui.allocate_space(bar).1;
        let painter = ui.painter();
        painter.rect_filled(rect, egui::Rounding::same(4.0), theme.surface);

        let value = value.clamp(0.0, 1.0);
        let color = if value > 0.7 {
            theme.success
        } else if value > 0.4 {
            theme.warning
        } else {
            theme.error
        };
        painter.rect_filled(
            Rect::from_min_size(rect.min, Vec2::new(bar.x * value, bar.y)),
            egui::Rounding::same(4.0),
            color,
        );
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            format!("{:.0}%", value * 100.0),
            egui::FontId::proportional(12.0),
            theme.text_primary,
        );
    });
}

pub fn transform_readout(ui: &mut egui::Ui, theme: &Theme, transform: Option<&OverlayTransform>) {
    let Some(t) = transform else {
        ui.colored_label(Color32::GRAY, "No hand detected");
        return;
    };

    egui::Grid::new("transform_readout").num_columns(2).show(ui, |ui| {
        ui.label("Anchor");
        ui.label(format!("({:.1}, {:.1}) px", t.anchor.x, t.anchor.y));
        ui.end_row();

        ui.label("Raw anchor");
        ui.colored_label(
            theme.text_secondary,
            format!("({:.1}, {:.1}) px", t.geometry.raw_anchor.x, t.geometry.raw_anchor.y),
        );
        ui.end_row();

        ui.label("Angle");
        ui.label(format!("{:.1}°", t.angle.to_degrees()));
        ui.end_row();

        ui.label("Ring size");
        ui.label(format!("{:.1} px", t.size));
        ui.end_row();

        ui.label("Finger length");
        ui.colored_label(theme.text_secondary, format!("{:.1} px", t.geometry.finger_length));
        ui.end_row();
    });
}
