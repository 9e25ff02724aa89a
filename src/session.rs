// src/session.rs - Per-frame try-on records, CSV export and snapshots
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use image::RgbaImage;
use serde::Serialize;
use tracing::info;

use crate::compositor::OverlayTransform;
use crate::landmarks::{Landmark, LandmarkFrame};

#[derive(Debug, Serialize)]
struct FrameRecord {
    frame: u64,
    timestamp: f64,
    detected: bool,
    raw_anchor_x: Option<f64>,
    raw_anchor_y: Option<f64>,
    anchor_x: Option<f64>,
    anchor_y: Option<f64>,
    angle_deg: Option<f64>,
    size: Option<f64>,
    finger_length: Option<f64>,
    base_to_mid_length: Option<f64>,
}

impl FrameRecord {
    fn new(frame: u64, timestamp: f64, transform: Option<&OverlayTransform>) -> Self {
        let g = transform.map(|t| &t.geometry);
        Self {
            frame,
            timestamp,
            detected: transform.is_some(),
            raw_anchor_x: g.map(|g| g.raw_anchor.x),
            raw_anchor_y: g.map(|g| g.raw_anchor.y),
            anchor_x: transform.map(|t| t.anchor.x),
            anchor_y: transform.map(|t| t.anchor.y),
            angle_deg: transform.map(|t| t.angle.to_degrees()),
            size: transform.map(|t| t.size),
            finger_length: g.map(|g| g.finger_length),
            base_to_mid_length: g.map(|g| g.base_to_mid_length),
        }
    }
}

/// Collects what the overlay did on each frame of a try-on session.
pub struct SessionRecorder {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<FrameRecord>,
    landmarks: Vec<LandmarkFrame>,
    snapshots: u32,
}

impl SessionRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("tryon_{}_{}", Local::now().format("%Y%m%d_%H%M%S"), &id[..8])
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            records: Vec::new(),
            landmarks: Vec::new(),
            snapshots: 0,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn frame_count(&self) -> usize {
        self.records.len()
    }

    pub fn detection_count(&self) -> usize {
        self.records.iter().filter(|r| r.detected).count()
    }

    pub fn add_frame(&mut self, timestamp: f64, landmarks: &[Landmark], transform: Option<&OverlayTransform>) {
        let frame = self.records.len() as u64;
        self.records.push(FrameRecord::new(frame, timestamp, transform));
        self.landmarks.push(LandmarkFrame {
            frame,
            landmarks: landmarks.to_vec(),
        });
    }

    fn ensure_dir(&self) -> Result<PathBuf> {
        let dir = self.session_dir();
        fs::create_dir_all(&dir).with_context(|| format!("Cannot create {}", dir.display()))?;
        Ok(dir)
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.ensure_dir()?.join("overlay_data.csv");

        let mut writer = Writer::from_writer(File::create(&csv_path)?);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!("Exported {} frames to {}", self.records.len(), csv_path.display());
        Ok(csv_path)
    }

    /// Writes the raw landmarks as JSON lines, readable by `RecordedLandmarks`.
    pub fn export_landmarks(&self) -> Result<PathBuf> {
        let path = self.ensure_dir()?.join("landmarks.jsonl");

        let mut out = BufWriter::new(File::create(&path)?);
        for frame in &self.landmarks {
            serde_json::to_writer(&mut out, frame)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        Ok(path)
    }

    pub fn save_snapshot(&mut self, image: &RgbaImage) -> Result<PathBuf> {
        self.snapshots += 1;
        let path = self
            .ensure_dir()?
            .join(format!("snapshot_{:03}.png", self.snapshots));
        image
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!("Saved snapshot {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::FingerGeometry;
    use crate::tracking::{LandmarkSource, RecordedLandmarks};
    use image::{DynamicImage, Rgba};
    use nalgebra::Point2;

    fn temp_output() -> PathBuf {
        std::env::temp_dir().join(format!("sessions_{}", uuid::Uuid::new_v4()))
    }

    fn transform() -> OverlayTransform {
        let p = Point2::new(10.0, 20.0);
        OverlayTransform {
            anchor: Point2::new(11.0, 21.0),
            angle: std::f64::consts::FRAC_PI_2,
            size: 3.5,
            geometry: FingerGeometry {
                mcp: p,
                pip: p,
                dip: p,
                tip: p,
                raw_anchor: p,
                finger_length: 10.0,
                base_to_mid_length: 5.0,
                size: 3.5,
                angle: std::f64::consts::FRAC_PI_2,
            },
        }
    }

    #[test]
    fn test_default_session_name() {
        let rec = SessionRecorder::new(temp_output(), None);
        assert!(rec.session_name().starts_with("tryon_"));
        let named = SessionRecorder::new(temp_output(), Some("demo".into()));
        assert_eq!(named.session_name(), "demo");
    }

    #[test]
    fn test_export_csv_rows() {
        let out = temp_output();
        let mut rec = SessionRecorder::new(&out, Some("csv".into()));
        rec.add_frame(0.0, &[], None);
        rec.add_frame(0.033, &[Landmark::new(0.5, 0.5)], Some(&transform()));
        assert_eq!(rec.frame_count(), 2);
        assert_eq!(rec.detection_count(), 1);

        let path = rec.export_csv().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("frame,timestamp,detected,raw_anchor_x"));
        assert_eq!(lines[1], "0,0.0,false,,,,,,,,");
        assert!(lines[2].starts_with("1,0.033,true,10.0,20.0,11.0,21.0,"));
        assert!(lines[2].ends_with(",3.5,10.0,5.0"));
        let _ = fs::remove_dir_all(out);
    }

    #[test]
    fn test_landmarks_export_replays() {
        let out = temp_output();
        let mut rec = SessionRecorder::new(&out, Some("replay".into()));
        rec.add_frame(0.0, &[Landmark::new(0.25, 0.75)], None);
        rec.add_frame(0.1, &[], None);

        let path = rec.export_landmarks().unwrap();
        let mut replay = RecordedLandmarks::open(&path, false).unwrap();
        let blank = DynamicImage::new_rgb8(1, 1);
        assert_eq!(replay.next_landmarks(&blank).unwrap(), vec![Landmark::new(0.25, 0.75)]);
        assert!(replay.next_landmarks(&blank).unwrap().is_empty());
        let _ = fs::remove_dir_all(out);
    }

    #[test]
    fn test_snapshots_are_numbered() {
        let out = temp_output();
        let mut rec = SessionRecorder::new(&out, Some("snaps".into()));
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let first = rec.save_snapshot(&img).unwrap();
        let second = rec.save_snapshot(&img).unwrap();
        assert!(first.ends_with("snapshot_001.png"));
        assert!(second.ends_with("snapshot_002.png"));
        assert_eq!(image::open(second).unwrap().to_rgba8(), img);
        let _ = fs::remove_dir_all(out);
    }
}
