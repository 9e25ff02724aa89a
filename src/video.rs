// src/video.rs - Camera capture and still-frame sequences
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageBuffer};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;

pub enum VideoSource {
    Camera { camera: Arc<Mutex<Camera>>, mirror: bool },
    Frames(FrameSequence),
}

/// Image files from a directory, played back in file-name order and looped.
pub struct FrameSequence {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    current: usize,
    mirror: bool,
}

impl FrameSequence {
    pub fn open(dir: impl AsRef<Path>, mirror: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
            .with_context(|| format!("Cannot read frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(anyhow!("No image frames found in {}", dir.display()));
        }

        info!("Replaying {} frames from {}", paths.len(), dir.display());
        Ok(Self {
            dir,
            paths,
            current: 0,
            mirror,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn next_frame(&mut self) -> Result<DynamicImage> {
        let path = &self.paths[self.current];
        self.current = (self.current + 1) % self.paths.len();

        let frame = image::open(path).with_context(|| format!("Failed to load frame {}", path.display()))?;
        Ok(if self.mirror { frame.fliph() } else { frame })
    }
}

fn is_frame_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref(),
        Some("png" | "jpg" | "jpeg")
    )
}

impl VideoSource {
    pub fn from_config(config: &CameraConfig) -> Result<Self> {
        match &config.frames_dir {
            Some(dir) => Ok(VideoSource::Frames(FrameSequence::open(dir, config.mirror)?)),
            None => Self::new_camera(config),
        }
    }

    pub fn new_camera(config: &CameraConfig) -> Result<Self> {
        debug!("Opening camera index {}", config.index);

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(format));

        let camera = Camera::new(CameraIndex::Index(config.index), requested)
            .map_err(|e| anyhow!("Failed to open camera {}: {}", config.index, e))?;

        info!("Camera {} opened", config.index);
        Ok(VideoSource::Camera {
            camera: Arc::new(Mutex::new(camera)),
            mirror: config.mirror,
        })
    }

    pub fn read_frame(&mut self) -> Result<DynamicImage> {
        match self {
            VideoSource::Camera { camera, mirror } => {
                let mut cam = camera.lock().map_err(|_| anyhow!("Camera lock poisoned"))?;

                if !cam.is_stream_open() {
                    cam.open_stream()
                        .map_err(|e| anyhow!("Failed to open camera stream: {}", e))?;
                }

                let frame = cam.frame().map_err(|e| anyhow!("Failed to capture frame: {}", e))?;
                let decoded = frame
                    .decode_image::<RgbFormat>()
                    .map_err(|e| anyhow!("Failed to decode frame: {}", e))?;

                let (width, height) = (decoded.width(), decoded.height());
                let rgb = ImageBuffer::from_raw(width, height, decoded.into_vec())
                    .ok_or_else(|| anyhow!("Camera frame buffer has the wrong size"))?;
                let frame = DynamicImage::ImageRgb8(rgb);

                Ok(if *mirror { frame.fliph() } else { frame })
            }
            VideoSource::Frames(frames) => frames.next_frame(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            VideoSource::Camera { camera, .. } => match camera.lock() {
                Ok(cam) => {
                    let res = cam.resolution();
                    format!("Camera {}x{} @ {} fps", res.width(), res.height(), cam.frame_rate())
                }
                Err(_) => String::from("Camera"),
            },
            VideoSource::Frames(frames) => {
                format!("{} ({} frames)", frames.dir().display(), frames.len())
            }
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let VideoSource::Camera { camera, .. } = self {
            if let Ok(mut cam) = camera.lock() {
                if let Err(e) = cam.stop_stream() {
                    warn!("Failed to stop camera stream: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("frames_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        for (i, shade) in [10u8, 20, 30].iter().enumerate() {
            let mut img = RgbImage::from_pixel(4, 2, Rgb([*shade, *shade, *shade]));
            img.put_pixel(0, 0, Rgb([255, 0, 0]));
            img.save(dir.join(format!("frame_{:04}.png", i))).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();
        dir
    }

    #[test]
    fn test_sequence_plays_in_order_and_loops() {
        let dir = frame_dir();
        let mut seq = FrameSequence::open(&dir, false).unwrap();
        assert_eq!(seq.len(), 3);

        let shades: Vec<u8> = (0..4)
            .map(|_| seq.next_frame().unwrap().to_rgb8().get_pixel(2, 1).0[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 30, 10]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_sequence_mirrors_frames() {
        let dir = frame_dir();
        let mut seq = FrameSequence::open(&dir, true).unwrap();
        let frame = seq.next_frame().unwrap().to_rgb8();
        assert_eq!(frame.get_pixel(3, 0).0, [255, 0, 0]);
        assert_eq!(frame.get_pixel(0, 0).0, [10, 10, 10]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = std::env::temp_dir().join(format!("frames_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(FrameSequence::open(&dir, false).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
