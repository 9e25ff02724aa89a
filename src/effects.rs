// src/effects.rs - Drop shadow and specular highlight for the ring overlay
use nalgebra::Point2;
use resvg::tiny_skia::{
    Color, ColorU8, FillRule, GradientStop, Paint, PathBuilder, Pixmap, Point, RadialGradient,
    SpreadMode, Transform,
};
use serde::Deserialize;

use crate::overlay_image::PreprocessedOverlay;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShadowStyle {
    /// Offset in canvas pixels, independent of the overlay rotation.
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur: f32,
    pub color: [u8; 4],
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            offset_x: 2.0,
            offset_y: 4.0,
            blur: 8.0,
            color: [0, 0, 0, 77],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HighlightStyle {
    pub opacity: f32,
    /// Distance of the highlight center from the overlay center toward its
    /// top-left corner, as a fraction of the overlay size.
    pub center_offset: f32,
    pub radius: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            opacity: 0.3,
            center_offset: 0.25,
            radius: 0.35,
        }
    }
}

/// Maps overlay-local coordinates to the canvas: local scale and offset first,
/// then rotation by `angle` (radians) about the anchor.
pub fn anchored_transform(
    anchor: Point2<f64>,
    angle: f64,
    scale: (f32, f32),
    offset: (f32, f32),
) -> Transform {
    let (sin, cos) = (angle.sin() as f32, angle.cos() as f32);
    let (sx, sy) = scale;
    let (tx, ty) = offset;
    Transform::from_row(
        cos * sx,
        sin * sx,
        -sin * sy,
        cos * sy,
        cos * tx - sin * ty + anchor.x as f32,
        sin * tx + cos * ty + anchor.y as f32,
    )
}

/// Largest shadow layer side in pixels. Bigger shadows are rendered at a
/// reduced resolution and scaled up when placed.
pub const MAX_SHADOW_SIDE: u32 = 1024;

/// A blurred silhouette of the sprite. `pad` is the margin around the
/// silhouette left for the blur, in layer pixels; `scale` maps layer pixels
/// to canvas pixels.
pub struct ShadowLayer {
    pub pixmap: Pixmap,
    pub pad: f32,
    pub scale: f32,
}

pub fn shadow_layer(overlay: &PreprocessedOverlay, size: f32, style: &ShadowStyle) -> Option<ShadowLayer> {
    if !(size.is_finite() && size > 0.0) || style.color[3] == 0 {
        return None;
    }

    let blur = style.blur.max(0.0);
    let full_side = size + 2.0 * (blur + 1.0);
    let resolution = (MAX_SHADOW_SIDE as f32 / full_side).min(1.0);

    let radius = (blur * resolution / 2.0).ceil() as usize;
    let pad = (radius * 2 + 1) as f32;
    let inner = (size * resolution).ceil() as u32;
    let side = inner.checked_add(2 * pad as u32)?;
    let mut layer = Pixmap::new(side, side)?;

    let to_layer = Transform::from_row(
        size * resolution / overlay.width() as f32,
        0.0,
        0.0,
        size * resolution / overlay.height() as f32,
        pad,
        pad,
    );
    layer.draw_pixmap(0, 0, overlay.sprite().as_ref(), &overlay.paint(1.0), to_layer, None);

    let mut alpha: Vec<f32> = layer
        .pixels()
        .iter()
        .map(|p| p.alpha() as f32 / 255.0)
        .collect();
    // Two box passes approximate a gaussian closely enough for a soft shadow.
    for _ in 0..2 {
        box_blur(&mut alpha, side as usize, side as usize, radius);
    }

    let [r, g, b, a] = style.color;
    for (px, coverage) in layer.pixels_mut().iter_mut().zip(alpha) {
        let alpha = (coverage * a as f32).round().clamp(0.0, 255.0) as u8;
        *px = ColorU8::from_rgba(r, g, b, alpha).premultiply();
    }

    Some(ShadowLayer {
        pixmap: layer,
        pad,
        scale: 1.0 / resolution,
    })
}

/// Separable box blur over a single channel; samples outside the buffer count as zero.
pub fn box_blur(values: &mut [f32], width: usize, height: usize, radius: usize) {
    if radius == 0 || width == 0 || height == 0 {
        return;
    }
    let window = (2 * radius + 1) as f32;
    let mut tmp = vec![0.0f32; values.len()];

    // Horizontal pass
    for y in 0..height {
        let row = &values[y * width..(y + 1) * width];
        for x in 0..width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(width - 1);
            tmp[y * width + x] = row[lo..=hi].iter().sum::<f32>() / window;
        }
    }

    // Vertical pass
    for x in 0..width {
        for y in 0..height {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(height - 1);
            let sum: f32 = (lo..=hi).map(|yy| tmp[yy * width + x]).sum();
            values[y * width + x] = sum / window;
        }
    }
}

/// Soft white radial glow toward the overlay's top-left, drawn in overlay-local
/// space through `transform`.
pub fn draw_highlight(canvas: &mut Pixmap, size: f32, style: &HighlightStyle, transform: Transform) {
    let opacity = style.opacity.clamp(0.0, 1.0);
    let radius = size * style.radius;
    if !(radius > 0.0) || opacity == 0.0 {
        return;
    }

    let center = -size * style.center_offset;
    let (Some(inner), Some(outer)) = (
        Color::from_rgba(1.0, 1.0, 1.0, opacity),
        Color::from_rgba(1.0, 1.0, 1.0, 0.0),
    ) else {
        return;
    };

    let Some(shader) = RadialGradient::new(
        Point::from_xy(center, center),
        Point::from_xy(center, center),
        radius,
        vec![GradientStop::new(0.0, inner), GradientStop::new(1.0, outer)],
        SpreadMode::Pad,
        Transform::identity(),
    ) else {
        return;
    };
    let Some(circle) = PathBuilder::from_circle(center, center, radius) else {
        return;
    };

    let paint = Paint {
        shader,
        anti_alias: true,
        ..Paint::default()
    };
    canvas.fill_path(&circle, &paint, FillRule::Winding, transform, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundKey;
    use image::{Rgba, RgbaImage};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn solid_overlay() -> PreprocessedOverlay {
        let img = RgbaImage::from_pixel(32, 32, Rgba([180, 140, 30, 255]));
        PreprocessedOverlay::from_image("solid", img, &BackgroundKey::default()).unwrap()
    }

    #[test]
    fn test_anchored_transform_rotates_about_anchor() {
        let t = anchored_transform(Point2::new(10.0, 20.0), std::f64::consts::FRAC_PI_2, (1.0, 1.0), (0.0, 0.0));
        let mut pts = [Point::from_xy(1.0, 0.0)];
        t.map_points(&mut pts);
        assert!(approx(pts[0].x, 10.0) && approx(pts[0].y, 21.0), "{:?}", pts[0]);
    }

    #[test]
    fn test_anchored_transform_applies_local_scale_then_offset() {
        let t = anchored_transform(Point2::new(5.0, 5.0), 0.0, (0.5, 2.0), (-1.0, -3.0));
        let mut pts = [Point::from_xy(4.0, 1.0)];
        t.map_points(&mut pts);
        assert!(approx(pts[0].x, 6.0) && approx(pts[0].y, 4.0), "{:?}", pts[0]);
    }

    #[test]
    fn test_box_blur_spreads_single_pixel() {
        let mut v = vec![0.0; 25];
        v[12] = 9.0;
        box_blur(&mut v, 5, 5, 1);
        assert!(approx(v[12], 1.0));
        assert!(approx(v[6], 1.0));
        assert!(approx(v[0], 0.0));
        assert!(approx(v.iter().sum::<f32>(), 9.0));
    }

    #[test]
    fn test_box_blur_radius_zero_is_identity() {
        let mut v = vec![0.0, 1.0, 0.5, 0.25];
        box_blur(&mut v, 2, 2, 0);
        assert_eq!(v, vec![0.0, 1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_shadow_layer_uses_shadow_color() {
        let style = ShadowStyle::default();
        let layer = shadow_layer(&solid_overlay(), 20.0, &style).unwrap();
        assert_eq!(layer.pad, 9.0);
        assert_eq!(layer.scale, 1.0);
        assert_eq!(layer.pixmap.width(), 20 + 18);

        let center = layer.pixmap.pixel(19, 19).unwrap();
        let alpha = center.alpha();
        assert!((75..=77).contains(&alpha), "center alpha {alpha}");
        assert_eq!(center.red(), 0);
        // Corners stay clear.
        assert_eq!(layer.pixmap.pixel(0, 0).unwrap().alpha(), 0);
    }

    #[test]
    fn test_shadow_layer_skipped_for_empty_size() {
        assert!(shadow_layer(&solid_overlay(), 0.0, &ShadowStyle::default()).is_none());
        assert!(shadow_layer(&solid_overlay(), f32::NAN, &ShadowStyle::default()).is_none());
        assert!(shadow_layer(&solid_overlay(), f32::INFINITY, &ShadowStyle::default()).is_none());
    }

    #[test]
    fn test_large_shadow_is_rendered_at_bounded_resolution() {
        let layer = shadow_layer(&solid_overlay(), 9000.0, &ShadowStyle::default()).unwrap();
        assert!(layer.pixmap.width() <= MAX_SHADOW_SIDE + 2 * layer.pad as u32);
        assert!(layer.scale > 1.0);
        // Placed back at canvas scale the layer still spans the overlay.
        assert!(layer.pixmap.width() as f32 * layer.scale >= 9000.0);
    }

    #[test]
    fn test_highlight_brightens_toward_top_left() {
        let mut canvas = Pixmap::new(100, 100).unwrap();
        let t = anchored_transform(Point2::new(50.0, 50.0), 0.0, (1.0, 1.0), (0.0, 0.0));
        draw_highlight(&mut canvas, 40.0, &HighlightStyle::default(), t);

        let near = canvas.pixel(40, 40).unwrap().alpha();
        let far = canvas.pixel(70, 70).unwrap().alpha();
        assert!(near > 0, "highlight center should be visible");
        assert!(near <= 77, "highlight must stay subtle, got {near}");
        assert_eq!(far, 0);
    }
}
