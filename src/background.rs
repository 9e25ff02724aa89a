// src/background.rs - Light-background removal for product photos
use image::{Rgba, RgbaImage};
use serde::Deserialize;

/// Thresholds for keying out a near-white studio background.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackgroundKey {
    /// Pixels brighter than this with low saturation become fully transparent.
    pub brightness_threshold: f64,
    pub saturation_threshold: f64,
    /// Pixels brighter than this fade out linearly, reaching zero at pure white.
    pub fade_threshold: f64,
    pub fade_gain: f64,
}

impl Default for BackgroundKey {
    fn default() -> Self {
        Self {
            brightness_threshold: 200.0,
            saturation_threshold: 0.2,
            fade_threshold: 220.0,
            fade_gain: 3.0,
        }
    }
}

pub fn brightness(r: u8, g: u8, b: u8) -> f64 {
    (r as f64 + g as f64 + b as f64) / 3.0
}

pub fn saturation(r: u8, g: u8, b: u8) -> f64 {
    let max = r.max(g).max(b);
    if max == 0 {
        return 0.0;
    }
    let min = r.min(g).min(b);
    (max - min) as f64 / max as f64
}

impl BackgroundKey {
    /// Alpha for one pixel. Never raises the incoming alpha, so already
    /// transparent regions of a PNG stay transparent. For opaque input the
    /// fade band gives exactly `(255 - brightness) * fade_gain`, rounded.
    ///
    /// The fade band is tested first: above `fade_threshold` the ramp already
    /// reaches zero at white, and below it the flat low-saturation cut applies.
    pub fn key_pixel(&self, pixel: Rgba<u8>) -> u8 {
        let [r, g, b, a] = pixel.0;
        let brightness = brightness(r, g, b);

        if brightness > self.fade_threshold {
            let faded = ((255.0 - brightness) * self.fade_gain).round().clamp(0.0, 255.0) as u8;
            faded.min(a)
        } else if brightness > self.brightness_threshold
            && saturation(r, g, b) < self.saturation_threshold
        {
            0
        } else {
            a
        }
    }

    pub fn apply(&self, image: &mut RgbaImage) {
        for pixel in image.pixels_mut() {
            pixel.0[3] = self.key_pixel(*pixel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_of(r: u8, g: u8, b: u8) -> u8 {
        BackgroundKey::default().key_pixel(Rgba([r, g, b, 255]))
    }

    #[test]
    fn test_white_is_removed() {
        assert_eq!(alpha_of(255, 255, 255), 0);
    }

    #[test]
    fn test_light_gray_is_removed() {
        assert_eq!(alpha_of(205, 205, 200), 0);
    }

    #[test]
    fn test_vivid_red_is_kept() {
        assert_eq!(alpha_of(250, 0, 0), 255);
    }

    #[test]
    fn test_dark_pixels_untouched() {
        assert_eq!(alpha_of(0, 0, 0), 255);
        assert_eq!(alpha_of(120, 90, 40), 255);
    }

    #[test]
    fn test_bright_pixels_fade() {
        assert_eq!(alpha_of(230, 230, 230), 75);
        assert_eq!(alpha_of(255, 250, 185), 75);
        // (255 - 221.33) * 3 = 101.0
        assert_eq!(alpha_of(222, 221, 221), 101);
    }

    #[test]
    fn test_opaque_fade_band_follows_ramp() {
        for v in 221..=255u8 {
            assert_eq!(alpha_of(v, v, v), (255 - v) * 3, "gray {v}");
        }
    }

    #[test]
    fn test_saturated_pixels_below_fade_band_kept() {
        // brightness ~213, saturation 0.5
        assert_eq!(alpha_of(255, 255, 128), 255);
    }

    #[test]
    fn test_custom_fade_gain() {
        let key = BackgroundKey {
            fade_gain: 10.0,
            ..BackgroundKey::default()
        };
        assert_eq!(key.key_pixel(Rgba([230, 230, 230, 255])), 250);
    }

    #[test]
    fn test_saturation_of_black_is_zero() {
        assert_eq!(saturation(0, 0, 0), 0.0);
        assert_eq!(saturation(200, 100, 0), 1.0);
    }

    #[test]
    fn test_existing_transparency_preserved() {
        let key = BackgroundKey::default();
        assert_eq!(key.key_pixel(Rgba([10, 200, 30, 40])), 40);
        assert_eq!(key.key_pixel(Rgba([255, 250, 185, 20])), 20);
    }

    #[test]
    fn test_apply_touches_every_pixel() {
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 1, Rgba([200, 20, 20, 255]));
        BackgroundKey::default().apply(&mut img);
        for (x, y, p) in img.enumerate_pixels() {
            let expected = if (x, y) == (1, 1) { 255 } else { 0 };
            assert_eq!(p.0[3], expected, "pixel ({x},{y})");
        }
    }
}
