// src/lib.rs
pub mod app;
pub mod background;
pub mod compositor;
pub mod config;
pub mod effects;
pub mod error;
pub mod landmarks;
pub mod loader;
pub mod overlay_image;
pub mod session;
pub mod smoothing;
pub mod tracking;
pub mod ui;
pub mod video;

pub use compositor::{compose_frame, FingerGeometry, OverlayCompositor, OverlayTransform};
pub use config::TryOnConfig;
pub use error::OverlayError;
pub use landmarks::{Landmark, LandmarkFrame, RingFinger};
pub use loader::OverlayLoader;
pub use overlay_image::{OverlaySource, PreprocessedOverlay};
pub use smoothing::SmoothingFilter;
