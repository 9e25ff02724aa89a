//! Renders a recorded hand session with a product ring, without a window.
//!
//! Usage: render_overlay <landmarks.jsonl> <product-image> <output-dir> [--frames <dir>] [--config <file>]
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use ring_tryon::compositor::{compose_frame, OverlayCompositor};
use ring_tryon::config::TryOnConfig;
use ring_tryon::session::SessionRecorder;
use ring_tryon::tracking::{LandmarkSource, RecordedLandmarks};
use ring_tryon::video::FrameSequence;
use ring_tryon::PreprocessedOverlay;
use tracing::{info, warn};

struct Args {
    landmarks: PathBuf,
    product: String,
    output: PathBuf,
    frames: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut frames = None;
    let mut config = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => frames = Some(PathBuf::from(args.next().ok_or_else(|| anyhow!("--frames needs a directory"))?)),
            "--config" => config = Some(PathBuf::from(args.next().ok_or_else(|| anyhow!("--config needs a file"))?)),
            _ => positional.push(arg),
        }
    }

    let [landmarks, product, output]: [String; 3] = positional.try_into().map_err(|_| {
        anyhow!("usage: render_overlay <landmarks.jsonl> <product-image> <output-dir> [--frames <dir>] [--config <file>]")
    })?;

    Ok(Args {
        landmarks: PathBuf::from(landmarks),
        product,
        output: PathBuf::from(output),
        frames,
        config,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = parse_args()?;
    let config = TryOnConfig::load_or_default(args.config.as_deref())?;

    let overlay = PreprocessedOverlay::load(&args.product, &config.background)
        .with_context(|| format!("Cannot use product image {}", args.product))?;
    info!("Product image {}x{}", overlay.width(), overlay.height());

    let mut landmarks = RecordedLandmarks::open(&args.landmarks, false)?;
    if landmarks.is_empty() {
        bail!("{} has no frames", args.landmarks.display());
    }

    let mut frames = match &args.frames {
        Some(dir) => Some(FrameSequence::open(dir, false)?),
        None => None,
    };
    let backdrop = DynamicImage::ImageRgb8(RgbImage::from_pixel(
        config.camera.width.max(1),
        config.camera.height.max(1),
        Rgb([96, 96, 96]),
    ));

    let mut compositor = OverlayCompositor::with_style(
        backdrop.width(),
        backdrop.height(),
        config.overlay,
        config.smoothing.window,
    )?;
    compositor.set_overlay(Some(Arc::new(overlay)));

    let mut session = SessionRecorder::new(&args.output, Some(String::from("render")));
    let frames_dir = session.session_dir().join("frames");
    std::fs::create_dir_all(&frames_dir)
        .with_context(|| format!("Cannot create {}", frames_dir.display()))?;

    let frame_interval = 1.0 / config.camera.fps.max(1) as f64;
    let mut index = 0usize;
    while !landmarks.is_finished() {
        let frame = match frames.as_mut() {
            Some(seq) => seq.next_frame()?,
            None => backdrop.clone(),
        };
        let hand = landmarks.next_landmarks(&frame)?;

        compositor.resize(frame.width(), frame.height())?;
        let transform = compositor.render(&hand);
        if transform.is_none() && !hand.is_empty() {
            warn!("Frame {}: incomplete hand ({} landmarks)", index, hand.len());
        }

        let composed = compose_frame(&frame, compositor.canvas())?;
        let path = frames_dir.join(format!("frame_{:05}.png", index));
        composed
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        session.add_frame(index as f64 * frame_interval, &hand, transform.as_ref());
        index += 1;
    }

    let csv = session.export_csv()?;
    info!(
        "Rendered {} frames ({} with a ring) to {}",
        session.frame_count(),
        session.detection_count(),
        frames_dir.display()
    );
    info!("Placement data: {}", csv.display());
    Ok(())
}
