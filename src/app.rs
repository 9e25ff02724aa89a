// src/app.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use eframe::egui;
use image::RgbaImage;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::compositor::{compose_frame, OverlayCompositor, OverlayTransform};
use crate::config::TryOnConfig;
use crate::landmarks::Landmark;
use crate::loader::OverlayLoader;
use crate::session::SessionRecorder;
use crate::tracking::{source_from_config, HandTracker, LandmarkSource, SimulatedHand};
use crate::ui::{draw_hand_skeleton, draw_rate_bar, draw_recording_indicator, transform_readout, FrameView, Theme};
use crate::video::VideoSource;

pub struct TryOnApp {
    config: TryOnConfig,

    // Core components
    video_source: Option<VideoSource>,
    tracker: HandTracker,
    loader: OverlayLoader,
    compositor: OverlayCompositor,
    session: SessionRecorder,

    // Per-frame state
    landmarks: Vec<Landmark>,
    transform: Option<OverlayTransform>,
    composed: Option<RgbaImage>,

    // UI state
    theme: Theme,
    frame_view: FrameView,
    product_input: String,
    show_skeleton: bool,
    show_settings: bool,
    show_about: bool,
    status: Option<String>,

    // Recording state
    is_recording: bool,
    recording_start: Option<DateTime<Local>>,
}

impl TryOnApp {
    /// Opens the video and landmark sources and starts loading the configured product.
    /// A missing camera is reported in the window rather than failing startup.
    pub fn new(config: TryOnConfig, runtime: Handle) -> Result<Self> {
        let mut status = None;

        let video_source = match VideoSource::from_config(&config.camera) {
            Ok(source) => {
                info!("Video source: {}", source.label());
                Some(source)
            }
            Err(e) => {
                error!("No video source: {:#}", e);
                status = Some(format!("No video source: {e:#}"));
                None
            }
        };

        let source = source_from_config(&config.tracking).unwrap_or_else(|e| -> Box<dyn LandmarkSource> {
            warn!("Falling back to simulated hand: {:#}", e);
            Box::new(SimulatedHand::new())
        });

        let compositor = OverlayCompositor::with_style(
            config.camera.width.max(1),
            config.camera.height.max(1),
            config.overlay,
            config.smoothing.window,
        )
        .context("Failed to create overlay canvas")?;

        let mut app = Self {
            video_source,
            tracker: HandTracker::new(source),
            loader: OverlayLoader::new(runtime, config.background),
            compositor,
            session: SessionRecorder::new(&config.output.directory, None),
            landmarks: Vec::new(),
            transform: None,
            composed: None,
            theme: Theme::default(),
            frame_view: FrameView::new(),
            product_input: config.product.image.clone().unwrap_or_default(),
            show_skeleton: false,
            show_settings: false,
            show_about: false,
            status,
            is_recording: false,
            recording_start: None,
            config,
        };

        if !app.product_input.is_empty() {
            let source = app.product_input.clone();
            app.request_product(&source);
        }
        Ok(app)
    }

    fn request_product(&mut self, source: &str) {
        if source.trim().is_empty() {
            self.loader.clear();
            self.compositor.set_overlay(None);
            return;
        }
        if self.loader.request(source) {
            self.compositor.set_overlay(None);
        }
    }

    fn process_frame(&mut self, ctx: &egui::Context) {
        if self.loader.poll() {
            self.compositor.set_overlay(self.loader.current());
        }

        let Some(video) = self.video_source.as_mut() else {
            return;
        };
        let frame = match video.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame capture failed: {:#}", e);
                return;
            }
        };

        self.landmarks = self.tracker.process_frame(&frame);

        if let Err(e) = self.compositor.resize(frame.width(), frame.height()) {
            warn!("Cannot size overlay canvas: {}", e);
            return;
        }
        self.transform = self.compositor.render(&self.landmarks);

        match compose_frame(&frame, self.compositor.canvas()) {
            Ok(composed) => {
                self.frame_view.update_frame(ctx, &composed);
                self.composed = Some(composed);
            }
            Err(e) => warn!("Compositing failed: {}", e),
        }

        if self.is_recording {
            let elapsed = self
                .recording_start
                .map(|start| (Local::now() - start).num_milliseconds() as f64 / 1000.0)
                .unwrap_or_default();
            self.session.add_frame(elapsed, &self.landmarks, self.transform.as_ref());
        }
    }

    fn toggle_recording(&mut self) {
        self.is_recording = !self.is_recording;

        if self.is_recording {
            self.session = SessionRecorder::new(&self.config.output.directory, None);
            self.recording_start = Some(Local::now());
            info!("Recording session {}", self.session.session_name());
        } else {
            self.recording_start = None;
            self.save_session();
        }
    }

    fn save_session(&mut self) {
        let result = self
            .session
            .export_csv()
            .and_then(|csv| self.session.export_landmarks().map(|_| csv));
        self.status = Some(match result {
            Ok(csv) => format!(
                "Saved {} frames ({} with a hand) to {}",
                self.session.frame_count(),
                self.session.detection_count(),
                csv.display()
            ),
            Err(e) => {
                error!("Failed to save session: {:#}", e);
                format!("Failed to save session: {e:#}")
            }
        });
    }

    fn take_snapshot(&mut self) {
        let Some(image) = self.composed.as_ref() else {
            return;
        };
        self.status = Some(match self.session.save_snapshot(image) {
            Ok(path) => format!("Snapshot saved to {}", path.display()),
            Err(e) => {
                error!("Snapshot failed: {:#}", e);
                format!("Snapshot failed: {e:#}")
            }
        });
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(10.0);
            egui::menu::bar(ui, |ui| {
                ui.heading("Ring Try-On");
                ui.separator();

                ui.label("Product image:");
                let edit = ui.add(egui::TextEdit::singleline(&mut self.product_input).desired_width(320.0));
                if edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    let source = self.product_input.clone();
                    self.request_product(&source);
                }
                if ui.button("📁 Browse...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Images", &["png", "jpg", "jpeg", "svg"])
                        .pick_file()
                    {
                        self.product_input = path.display().to_string();
                        let source = self.product_input.clone();
                        self.request_product(&source);
                    }
                }
                if self.loader.is_pending() {
                    ui.spinner();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("⚙ Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                    if ui.button("ℹ About").clicked() {
                        self.show_about = !self.show_about;
                    }
                });
            });
            ui.add_space(10.0);
        });
    }

    fn render_side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("details").min_width(280.0).show(ctx, |ui| {
            ui.heading("Ring Placement");
            transform_readout(ui, &self.theme, self.transform.as_ref());

            ui.add_space(20.0);
            ui.heading("Tracking");
            ui.label(format!("Source: {}", self.tracker.source_name()));
            let metrics = self.tracker.metrics();
            draw_rate_bar(ui, &self.theme, "Detection", metrics.detection_rate);
            ui.label(format!("Tracking: {:.1} ms", metrics.avg_processing_time * 1000.0));

            ui.add_space(20.0);
            ui.heading("Overlay");
            match self.compositor.overlay() {
                Some(overlay) => {
                    ui.label(format!("{} x {} px", overlay.width(), overlay.height()));
                }
                None if self.loader.is_pending() => {
                    ui.label("Loading...");
                }
                None => {
                    ui.colored_label(egui::Color32::GRAY, "No product image");
                }
            }
            ui.checkbox(&mut self.show_skeleton, "Show hand landmarks");
        });
    }

    fn render_control_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(10.0);
            ui.horizontal(|ui| {
                let record_btn = if self.is_recording {
                    ui.add_sized(
                        [140.0, 40.0],
                        egui::Button::new("⏹ Stop Recording").fill(self.theme.error),
                    )
                } else {
                    ui.add_sized([140.0, 40.0], egui::Button::new("⏺ Record").fill(self.theme.success))
                };
                if record_btn.clicked() {
                    self.toggle_recording();
                }

                if ui.add_sized([120.0, 40.0], egui::Button::new("📷 Snapshot")).clicked() {
                    self.take_snapshot();
                }

                ui.separator();
                if let Some(status) = &self.status {
                    ui.label(status.as_str());
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(start) = self.recording_start {
                        let secs = (Local::now() - start).num_seconds().max(0);
                        ui.label(
                            egui::RichText::new(format!("Recording: {:02}:{:02}", secs / 60, secs % 60))
                                .color(self.theme.error),
                        );
                    }
                });
            });
            ui.add_space(10.0);
        });
    }

    fn render_main_content(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                let rect = self.frame_view.show(ui);
                if self.show_skeleton {
                    draw_hand_skeleton(ui.painter(), rect, &self.landmarks, &self.theme);
                }
                if self.is_recording {
                    let t = ui.input(|i| i.time) as f32 * 4.0;
                    draw_recording_indicator(ui, rect, t);
                }
            });
        });
    }

    fn render_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut style = *self.compositor.style();
        let mut window = self.compositor.smoother().capacity();
        let mut pick_output = false;

        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(true)
            .default_size([400.0, 500.0])
            .show(ctx, |ui| {
                ui.heading("Placement");
                ui.add(egui::Slider::new(&mut style.anchor_fraction, 0.0..=0.5).text("Anchor along finger"));
                ui.add(egui::Slider::new(&mut style.finger_length_scale, 0.1..=1.0).text("Size from finger length"));
                ui.add(egui::Slider::new(&mut style.base_to_mid_scale, 0.1..=1.0).text("Size from base to mid"));
                ui.add(egui::Slider::new(&mut window, 1..=15).text("Smoothing frames"));

                ui.separator();
                ui.heading("Appearance");
                ui.add(egui::Slider::new(&mut style.opacity, 0.0..=1.0).text("Opacity"));
                ui.add(egui::Slider::new(&mut style.shadow.blur, 0.0..=20.0).text("Shadow blur"));
                ui.add(egui::Slider::new(&mut style.highlight.opacity, 0.0..=1.0).text("Highlight"));

                ui.separator();
                ui.heading("Output");
                ui.label(self.config.output.directory.display().to_string());
                if ui.button("Browse...").clicked() {
                    pick_output = true;
                }
            });

        self.show_settings = open;
        if style != *self.compositor.style() {
            self.compositor.set_style(style);
        }
        self.compositor.set_smoothing_window(window);
        if pick_output {
            if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                self.set_output_directory(dir);
            }
        }
    }

    fn set_output_directory(&mut self, dir: PathBuf) {
        info!("Output directory set to {}", dir.display());
        self.config.output.directory = dir;
        if !self.is_recording {
            self.session = SessionRecorder::new(&self.config.output.directory, None);
        }
    }

    fn render_about_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("About")
            .open(&mut self.show_about)
            .resizable(false)
            .default_size([400.0, 300.0])
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("Ring Try-On");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.add_space(20.0);
                    ui.label("Places a product ring on the ring finger");
                    ui.label("of a tracked hand in live video.");
                });
            });
    }
}

impl eframe::App for TryOnApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_frame(ctx);

        self.render_header(ctx);
        self.render_control_panel(ctx);
        self.render_side_panel(ctx);

        if self.show_settings {
            self.render_settings_window(ctx);
        }
        if self.show_about {
            self.render_about_window(ctx);
        }

        self.render_main_content(ctx);

        ctx.request_repaint();
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if self.is_recording {
            self.is_recording = false;
            self.save_session();
        }
    }
}
