// src/landmarks.rs - Hand landmark records and ring finger extraction
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

pub const HAND_LANDMARK_COUNT: usize = 21;

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Bone connections, used for the debug skeleton drawn over the video.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (WRIST, THUMB_CMC), (THUMB_CMC, THUMB_MCP), (THUMB_MCP, THUMB_IP), (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP), (INDEX_MCP, INDEX_PIP), (INDEX_PIP, INDEX_DIP), (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP), (MIDDLE_MCP, MIDDLE_PIP), (MIDDLE_PIP, MIDDLE_DIP), (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP), (RING_MCP, RING_PIP), (RING_PIP, RING_DIP), (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP), (PINKY_MCP, PINKY_PIP), (PINKY_PIP, PINKY_DIP), (PINKY_DIP, PINKY_TIP),
    (WRIST, PINKY_MCP),
];

/// One tracked joint in normalized frame coordinates. `z` is carried through
/// from the tracker but never used for placement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn to_canvas(&self, width: f64, height: f64) -> Point2<f64> {
        Point2::new(self.x * width, self.y * height)
    }
}

/// The four ring finger joints the overlay is placed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingFinger {
    pub mcp: Landmark,
    pub pip: Landmark,
    pub dip: Landmark,
    pub tip: Landmark,
}

impl RingFinger {
    /// Returns `None` when the tracker produced too few joints for the ring finger.
    pub fn from_landmarks(landmarks: &[Landmark]) -> Option<Self> {
        Some(Self {
            mcp: *landmarks.get(RING_MCP)?,
            pip: *landmarks.get(RING_PIP)?,
            dip: *landmarks.get(RING_DIP)?,
            tip: *landmarks.get(RING_TIP)?,
        })
    }
}

/// One line of a landmark replay file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub frame: u64,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}
