// src/overlay_image.rs - Product image loading and background-removed sprites
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;
use resvg::tiny_skia::{BlendMode, ColorU8, FilterQuality, Pixmap, PixmapPaint, Transform};
use usvg::TreeParsing;

use crate::background::BackgroundKey;
use crate::error::OverlayError;

/// Where a product image comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlaySource {
    Path(PathBuf),
    DataUri { media_type: String, payload: Vec<u8> },
}

impl OverlaySource {
    /// Accepts a filesystem path, a `file://` URL or a `data:` URI.
    pub fn parse(input: &str) -> Result<Self, OverlayError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(OverlayError::UnsupportedSource(String::from("<empty>")));
        }

        if let Some(rest) = input.strip_prefix("data:") {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| OverlayError::DataUri(String::from("missing ',' separator")))?;

            let mut params = header.split(';');
            let media_type = match params.next() {
                Some(mt) if !mt.is_empty() => mt.to_ascii_lowercase(),
                _ => String::from("text/plain"),
            };
            let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

            let payload = if is_base64 {
                let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                STANDARD.decode(compact)?
            } else {
                data.as_bytes().to_vec()
            };

            return Ok(OverlaySource::DataUri { media_type, payload });
        }

        if let Some(path) = input.strip_prefix("file://") {
            return Ok(OverlaySource::Path(PathBuf::from(path)));
        }

        if input.contains("://") {
            return Err(OverlayError::UnsupportedSource(input.to_string()));
        }

        Ok(OverlaySource::Path(PathBuf::from(input)))
    }

    fn bytes(&self) -> Result<Cow<'_, [u8]>, OverlayError> {
        match self {
            OverlaySource::Path(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| OverlayError::Io {
                    path: path.clone(),
                    source,
                }),
            OverlaySource::DataUri { payload, .. } => Ok(Cow::Borrowed(payload)),
        }
    }

    fn is_svg(&self, bytes: &[u8]) -> bool {
        let declared = match self {
            OverlaySource::Path(path) => has_svg_extension(path),
            OverlaySource::DataUri { media_type, .. } => media_type.contains("svg"),
        };
        declared || looks_like_svg(bytes)
    }

    /// Decodes the image at its full, original resolution.
    pub fn decode(&self) -> Result<RgbaImage, OverlayError> {
        let bytes = self.bytes()?;
        if self.is_svg(&bytes) {
            rasterize_svg(&bytes)
        } else {
            Ok(image::load_from_memory(&bytes)?.to_rgba8())
        }
    }
}

fn has_svg_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

fn rasterize_svg(bytes: &[u8]) -> Result<RgbaImage, OverlayError> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opt)?;

    let size = tree.size.to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or(OverlayError::EmptyImage {
        width: size.width(),
        height: size.height(),
    })?;

    resvg::Tree::from_usvg(&tree).render(Transform::default(), &mut pixmap.as_mut());

    Ok(rgba_from_pixmap(&pixmap))
}

/// Straight-alpha RGBA into tiny-skia's premultiplied storage.
pub fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap, OverlayError> {
    let (width, height) = image.dimensions();
    let mut pixmap = Pixmap::new(width, height).ok_or(OverlayError::EmptyImage { width, height })?;

    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }

    Ok(pixmap)
}

pub fn rgba_from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    out
}

/// A product image with its background keyed out, ready to be drawn at any
/// scale. Immutable once built.
pub struct PreprocessedOverlay {
    source: String,
    sprite: Pixmap,
}

impl PreprocessedOverlay {
    pub fn load(source: &str, key: &BackgroundKey) -> Result<Self, OverlayError> {
        let image = OverlaySource::parse(source)?.decode()?;
        Self::from_image(source, image, key)
    }

    pub fn from_image(
        source: impl Into<String>,
        mut image: RgbaImage,
        key: &BackgroundKey,
    ) -> Result<Self, OverlayError> {
        key.apply(&mut image);
        Ok(Self {
            source: source.into(),
            sprite: pixmap_from_rgba(&image)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn sprite(&self) -> &Pixmap {
        &self.sprite
    }

    pub fn width(&self) -> u32 {
        self.sprite.width()
    }

    pub fn height(&self) -> u32 {
        self.sprite.height()
    }

    /// Bicubic sampling keeps the ring crisp when drawn far below its native size.
    pub fn paint(&self, opacity: f32) -> PixmapPaint {
        PixmapPaint {
            opacity,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Bicubic,
        }
    }
}

impl fmt::Debug for PreprocessedOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreprocessedOverlay")
            .field("source", &self.source)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgba};
    use std::io::Cursor;

    const RED_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="3"><rect width="4" height="3" fill="red"/></svg>"#;

    fn png_bytes(image: RgbaImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn product_photo() -> RgbaImage {
        // White studio backdrop with a gold 2x2 band in the middle.
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            img.put_pixel(x, y, Rgba([212, 160, 40, 255]));
        }
        img
    }

    #[test]
    fn test_parse_paths_and_file_urls() {
        assert_eq!(
            OverlaySource::parse("rings/gold.png").unwrap(),
            OverlaySource::Path(PathBuf::from("rings/gold.png"))
        );
        assert_eq!(
            OverlaySource::parse("file:///tmp/gold.png").unwrap(),
            OverlaySource::Path(PathBuf::from("/tmp/gold.png"))
        );
    }

    #[test]
    fn test_parse_rejects_remote_and_empty_sources() {
        assert!(matches!(
            OverlaySource::parse("https://cdn.example.com/ring.png"),
            Err(OverlayError::UnsupportedSource(_))
        ));
        assert!(matches!(
            OverlaySource::parse("   "),
            Err(OverlayError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_parse_malformed_data_uri() {
        assert!(matches!(
            OverlaySource::parse("data:image/png;base64"),
            Err(OverlayError::DataUri(_))
        ));
        assert!(matches!(
            OverlaySource::parse("data:image/png;base64,@@@"),
            Err(OverlayError::Base64(_))
        ));
    }

    #[test]
    fn test_base64_png_is_keyed() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(product_photo())));
        let overlay = PreprocessedOverlay::load(&uri, &BackgroundKey::default()).unwrap();

        assert_eq!((overlay.width(), overlay.height()), (4, 4));
        let sprite = overlay.sprite();
        let alpha_at = |x: u32, y: u32| sprite.pixel(x, y).unwrap().alpha();
        assert_eq!(alpha_at(0, 0), 0);
        assert_eq!(alpha_at(3, 3), 0);
        assert_eq!(alpha_at(1, 1), 255);
        assert_eq!(alpha_at(2, 2), 255);
    }

    #[test]
    fn test_inline_svg_rasterized_at_intrinsic_size() {
        let uri = format!("data:image/svg+xml,{RED_SVG}");
        let image = OverlaySource::parse(&uri).unwrap().decode().unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(1, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_missing_file_reports_io_error() {
        let path = std::env::temp_dir().join(format!("missing_{}.png", uuid::Uuid::new_v4()));
        let result = PreprocessedOverlay::load(path.to_str().unwrap(), &BackgroundKey::default());
        assert!(matches!(result, Err(OverlayError::Io { .. })));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(b"not an image"));
        let result = PreprocessedOverlay::load(&uri, &BackgroundKey::default());
        assert!(matches!(result, Err(OverlayError::Decode(_))));
    }

    #[test]
    fn test_premultiply_roundtrip_keeps_opaque_pixels() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let back = rgba_from_pixmap(&pixmap_from_rgba(&img).unwrap());
        assert_eq!(back, img);
    }

    #[test]
    fn test_zero_sized_image_rejected() {
        assert!(matches!(
            pixmap_from_rgba(&RgbaImage::new(0, 5)),
            Err(OverlayError::EmptyImage { width: 0, height: 5 })
        ));
    }
}
