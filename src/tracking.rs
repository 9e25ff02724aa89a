// src/tracking.rs - Hand landmark sources
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use image::DynamicImage;
use nalgebra::{Point2, Rotation2, Vector2};
use tracing::{debug, info};

use crate::config::TrackingConfig;
use crate::landmarks::{Landmark, LandmarkFrame, RingFinger, HAND_LANDMARK_COUNT};

/// Anything that can report the 21 hand landmarks for a video frame.
///
/// An empty vector means no hand in this frame. Errors are treated the same
/// way by callers.
pub trait LandmarkSource: Send {
    fn next_landmarks(&mut self, frame: &DynamicImage) -> Result<Vec<Landmark>>;

    fn name(&self) -> &str;
}

pub fn source_from_config(config: &TrackingConfig) -> Result<Box<dyn LandmarkSource>> {
    match config {
        TrackingConfig::Simulated => Ok(Box::new(SimulatedHand::new())),
        TrackingConfig::Recorded { path } => Ok(Box::new(RecordedLandmarks::open(path, true)?)),
    }
}

#[derive(Clone)]
pub struct TrackingMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    pub detection_rate: f32,
    frame_times: VecDeque<f32>,
    detections: VecDeque<bool>,
}

impl TrackingMetrics {
    const WINDOW: usize = 30;

    pub fn new() -> Self {
        Self {
            avg_fps: 0.0,
            avg_processing_time: 0.0,
            detection_rate: 0.0,
            frame_times: VecDeque::with_capacity(Self::WINDOW),
            detections: VecDeque::with_capacity(Self::WINDOW),
        }
    }

    pub fn record(&mut self, elapsed: f32, detected: bool) {
        self.frame_times.push_front(elapsed);
        self.detections.push_front(detected);
        if self.frame_times.len() > Self::WINDOW {
            self.frame_times.pop_back();
            self.detections.pop_back();
        }

        self.avg_processing_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
        self.detection_rate =
            self.detections.iter().filter(|d| **d).count() as f32 / self.detections.len() as f32;
    }
}

impl Default for TrackingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Times a landmark source and keeps rolling metrics.
pub struct HandTracker {
    source: Box<dyn LandmarkSource>,
    metrics: TrackingMetrics,
}

impl HandTracker {
    pub fn new(source: Box<dyn LandmarkSource>) -> Self {
        info!("Hand tracking via {}", source.name());
        Self {
            source,
            metrics: TrackingMetrics::new(),
        }
    }

    /// Landmarks for `frame`; a failing source counts as "no hand".
    pub fn process_frame(&mut self, frame: &DynamicImage) -> Vec<Landmark> {
        let start = Instant::now();
        let landmarks = match self.source.next_landmarks(frame) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                debug!("Landmark source error: {:#}", e);
                Vec::new()
            }
        };
        // Detected means the compositor can place a ring this frame.
        let detected = RingFinger::from_landmarks(&landmarks).is_some();
        self.metrics.record(start.elapsed().as_secs_f32(), detected);
        landmarks
    }

    pub fn metrics(&self) -> &TrackingMetrics {
        &self.metrics
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }
}

// Upright open hand, wrist at the origin, normalized image units.
// Each finger: MCP x/y, then segment lengths MCP->PIP, PIP->DIP, DIP->TIP.
const FINGERS: [(f64, f64, [f64; 3]); 5] = [
    (-0.09, -0.08, [0.06, 0.05, 0.04]), // thumb, leaning out
    (-0.05, -0.20, [0.08, 0.05, 0.04]),
    (-0.01, -0.21, [0.09, 0.06, 0.04]),
    (0.03, -0.20, [0.08, 0.05, 0.04]),  // ring
    (0.07, -0.18, [0.06, 0.04, 0.035]),
];

/// Synthetic hand that sways and rotates slowly, dropping out for a few
/// frames every cycle so hand-lost handling gets exercised.
pub struct SimulatedHand {
    frame: u64,
    cycle: u64,
    gap: u64,
    wrist: (f64, f64),
}

impl SimulatedHand {
    pub fn new() -> Self {
        Self {
            frame: 0,
            cycle: 240,
            gap: 20,
            wrist: (0.5, 0.85),
        }
    }

    /// Hand visible every frame.
    pub fn without_gaps() -> Self {
        Self {
            gap: 0,
            ..Self::new()
        }
    }

    pub fn landmarks_at(&self, frame: u64) -> Vec<Landmark> {
        if self.gap > 0 && frame % self.cycle >= self.cycle - self.gap {
            return Vec::new();
        }

        let t = frame as f64 / 30.0;
        let tilt = Rotation2::new(0.25 * (t * 0.7).sin());
        let wrist = Point2::new(
            self.wrist.0 + 0.05 * (t * 0.5).sin(),
            self.wrist.1 + 0.03 * (t * 0.9).cos(),
        );

        let mut out = Vec::with_capacity(HAND_LANDMARK_COUNT);
        out.push(Landmark::new(wrist.x, wrist.y));

        for (i, (mx, my, segments)) in FINGERS.iter().enumerate() {
            // Thumb points up and outward, other fingers straight up.
            let dir = if i == 0 {
                Vector2::new(-0.6, -0.8)
            } else {
                Vector2::new(0.0, -1.0)
            };
            let mut joint = Vector2::new(*mx, *my);
            out.push(Self::place(wrist, &tilt, joint));
            for len in segments {
                joint += dir * *len;
                out.push(Self::place(wrist, &tilt, joint));
            }
        }
        out
    }

    fn place(wrist: Point2<f64>, tilt: &Rotation2<f64>, local: Vector2<f64>) -> Landmark {
        let p = wrist + tilt * local;
        Landmark::new(p.x, p.y)
    }
}

impl Default for SimulatedHand {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkSource for SimulatedHand {
    fn next_landmarks(&mut self, _frame: &DynamicImage) -> Result<Vec<Landmark>> {
        let landmarks = self.landmarks_at(self.frame);
        self.frame += 1;
        Ok(landmarks)
    }

    fn name(&self) -> &str {
        "simulated hand"
    }
}

/// Replays landmarks saved as JSON lines, one `LandmarkFrame` per line.
pub struct RecordedLandmarks {
    name: String,
    frames: Vec<LandmarkFrame>,
    cursor: usize,
    looping: bool,
}

impl RecordedLandmarks {
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Cannot open landmarks {}", path.display()))?;
        let mut recorded = Self::from_reader(BufReader::new(file), looping)
            .with_context(|| format!("Invalid landmarks file {}", path.display()))?;
        recorded.name = path.display().to_string();
        info!("Loaded {} landmark frames from {}", recorded.len(), path.display());
        Ok(recorded)
    }

    pub fn from_reader<R: BufRead>(reader: R, looping: bool) -> Result<Self> {
        let mut frames = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: LandmarkFrame =
                serde_json::from_str(&line).with_context(|| format!("line {}", i + 1))?;
            frames.push(frame);
        }
        Ok(Self {
            name: String::from("recorded landmarks"),
            frames,
            cursor: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        !self.looping && self.cursor >= self.frames.len()
    }
}

impl LandmarkSource for RecordedLandmarks {
    fn next_landmarks(&mut self, _frame: &DynamicImage) -> Result<Vec<Landmark>> {
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return Ok(Vec::new());
            }
            self.cursor = 0;
        }
        let landmarks = self.frames[self.cursor].landmarks.clone();
        self.cursor += 1;
        Ok(landmarks)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
