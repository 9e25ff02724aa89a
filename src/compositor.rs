// src/compositor.rs - Per-frame ring placement and canvas rendering
use std::sync::Arc;

use image::{DynamicImage, RgbaImage};
use nalgebra::{distance, Point2, Vector2};
use resvg::tiny_skia::{BlendMode, Color, FilterQuality, Pixmap, PixmapPaint, Transform};
use serde::Deserialize;
use tracing::debug;

use crate::effects::{anchored_transform, draw_highlight, shadow_layer, HighlightStyle, ShadowStyle};
use crate::error::OverlayError;
use crate::landmarks::{Landmark, RingFinger};
use crate::overlay_image::{pixmap_from_rgba, rgba_from_pixmap, PreprocessedOverlay};
use crate::smoothing::{SmoothingFilter, DEFAULT_WINDOW};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// How far along MCP -> PIP the ring band sits.
    pub anchor_fraction: f64,
    pub finger_length_scale: f64,
    pub base_to_mid_scale: f64,
    pub opacity: f32,
    pub shadow: ShadowStyle,
    pub highlight: HighlightStyle,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            anchor_fraction: 0.1,
            finger_length_scale: 0.35,
            base_to_mid_scale: 0.4,
            opacity: 0.98,
            shadow: ShadowStyle::default(),
            highlight: HighlightStyle::default(),
        }
    }
}

/// Ring finger measurements for a single frame, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerGeometry {
    pub mcp: Point2<f64>,
    pub pip: Point2<f64>,
    pub dip: Point2<f64>,
    pub tip: Point2<f64>,
    pub raw_anchor: Point2<f64>,
    pub finger_length: f64,
    pub base_to_mid_length: f64,
    pub size: f64,
    pub angle: f64,
}

impl FingerGeometry {
    pub fn measure(finger: &RingFinger, width: f64, height: f64, style: &OverlayStyle) -> Self {
        let mcp = finger.mcp.to_canvas(width, height);
        let pip = finger.pip.to_canvas(width, height);
        let dip = finger.dip.to_canvas(width, height);
        let tip = finger.tip.to_canvas(width, height);

        let direction: Vector2<f64> = pip - mcp;
        let raw_anchor = mcp + direction * style.anchor_fraction;

        let finger_length = distance(&mcp, &pip);
        let base_to_mid_length = distance(&mcp, &dip);

        // Take the smaller estimate; an undersized ring reads better than one
        // spilling over neighbouring fingers.
        let size = (finger_length * style.finger_length_scale)
            .min(base_to_mid_length * style.base_to_mid_scale);

        // A zero-length finger gives atan2(0, 0) = 0: unrotated and zero-sized.
        let angle = direction.y.atan2(direction.x);

        Self {
            mcp,
            pip,
            dip,
            tip,
            raw_anchor,
            finger_length,
            base_to_mid_length,
            size,
            angle,
        }
    }
}

/// Where and how the overlay was drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayTransform {
    /// Smoothed anchor in canvas pixels.
    pub anchor: Point2<f64>,
    pub angle: f64,
    pub size: f64,
    pub geometry: FingerGeometry,
}

pub struct OverlayCompositor {
    canvas: Pixmap,
    smoother: SmoothingFilter,
    overlay: Option<Arc<PreprocessedOverlay>>,
    style: OverlayStyle,
}

impl OverlayCompositor {
    pub fn new(width: u32, height: u32) -> Result<Self, OverlayError> {
        Self::with_style(width, height, OverlayStyle::default(), DEFAULT_WINDOW)
    }

    pub fn with_style(
        width: u32,
        height: u32,
        style: OverlayStyle,
        smoothing_window: usize,
    ) -> Result<Self, OverlayError> {
        Ok(Self {
            canvas: blank_canvas(width, height)?,
            smoother: SmoothingFilter::new(smoothing_window),
            overlay: None,
            style,
        })
    }

    /// Matches the canvas to the video frame. A size change starts from a clear canvas.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), OverlayError> {
        if self.canvas.width() != width || self.canvas.height() != height {
            debug!("Resizing overlay canvas to {}x{}", width, height);
            self.canvas = blank_canvas(width, height)?;
        }
        Ok(())
    }

    pub fn set_overlay(&mut self, overlay: Option<Arc<PreprocessedOverlay>>) {
        self.overlay = overlay;
    }

    pub fn overlay(&self) -> Option<&Arc<PreprocessedOverlay>> {
        self.overlay.as_ref()
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn set_style(&mut self, style: OverlayStyle) {
        self.style = style;
    }

    pub fn smoother(&self) -> &SmoothingFilter {
        &self.smoother
    }

    /// Replaces the smoothing filter; history starts empty.
    pub fn set_smoothing_window(&mut self, window: usize) {
        if window != self.smoother.capacity() {
            self.smoother = SmoothingFilter::new(window);
        }
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Draws this frame's overlay, replacing whatever the previous frame drew.
    ///
    /// Without a ring finger or a loaded overlay image the canvas is cleared and
    /// the smoothing history dropped, so re-acquisition starts without lag.
    pub fn render(&mut self, landmarks: &[Landmark]) -> Option<OverlayTransform> {
        let (finger, overlay) = match (RingFinger::from_landmarks(landmarks), self.overlay.clone()) {
            (Some(finger), Some(overlay)) => (finger, overlay),
            _ => {
                self.clear();
                self.smoother.reset();
                return None;
            }
        };

        let width = self.canvas.width() as f64;
        let height = self.canvas.height() as f64;
        let geometry = FingerGeometry::measure(&finger, width, height, &self.style);

        let (x, y) = self.smoother.smooth(geometry.raw_anchor.x, geometry.raw_anchor.y);
        let transform = OverlayTransform {
            anchor: Point2::new(x, y),
            angle: geometry.angle,
            size: geometry.size,
            geometry,
        };

        self.draw(&overlay, &transform);
        Some(transform)
    }

    pub fn clear(&mut self) {
        self.canvas.fill(Color::TRANSPARENT);
    }

    fn draw(&mut self, overlay: &PreprocessedOverlay, transform: &OverlayTransform) {
        self.clear();

        let size = transform.size as f32;
        if !(size.is_finite() && size > 0.0) {
            return;
        }
        let half = size / 2.0;
        let style = self.style;

        if let Some(shadow) = shadow_layer(overlay, size, &style.shadow) {
            let shifted = Point2::new(
                transform.anchor.x + style.shadow.offset_x as f64,
                transform.anchor.y + style.shadow.offset_y as f64,
            );
            let origin = -half - shadow.pad * shadow.scale;
            let scale = (shadow.scale, shadow.scale);
            let placed = anchored_transform(shifted, transform.angle, scale, (origin, origin));
            let paint = PixmapPaint {
                opacity: style.opacity,
                blend_mode: BlendMode::SourceOver,
                quality: FilterQuality::Bilinear,
            };
            self.canvas
                .draw_pixmap(0, 0, shadow.pixmap.as_ref(), &paint, placed, None);
        }

        let scale = (size / overlay.width() as f32, size / overlay.height() as f32);
        let placed = anchored_transform(transform.anchor, transform.angle, scale, (-half, -half));
        self.canvas.draw_pixmap(
            0,
            0,
            overlay.sprite().as_ref(),
            &overlay.paint(style.opacity),
            placed,
            None,
        );

        let local = anchored_transform(transform.anchor, transform.angle, (1.0, 1.0), (0.0, 0.0));
        draw_highlight(&mut self.canvas, size, &style.highlight, local);
    }
}

fn blank_canvas(width: u32, height: u32) -> Result<Pixmap, OverlayError> {
    Pixmap::new(width, height).ok_or(OverlayError::EmptyImage { width, height })
}

/// Blends the transparent overlay canvas over a video frame.
pub fn compose_frame(frame: &DynamicImage, canvas: &Pixmap) -> Result<RgbaImage, OverlayError> {
    let mut base = pixmap_from_rgba(&frame.to_rgba8())?;
    base.draw_pixmap(
        0,
        0,
        canvas.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(rgba_from_pixmap(&base))
}
