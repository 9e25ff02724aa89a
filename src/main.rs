// src/main.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use eframe::egui;
use ring_tryon::app::TryOnApp;
use ring_tryon::config::TryOnConfig;
use ring_tryon::ui;
use tracing::{error, info, warn};

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

fn log_cameras() {
    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(cameras) => {
            info!("Found {} camera(s)", cameras.len());
            for (i, camera) in cameras.iter().enumerate() {
                info!("  [{}] {}", i, camera.human_name());
            }
        }
        Err(e) => warn!("Failed to query cameras: {}", e),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = TryOnConfig::load_or_default(config_path_from_args().as_deref())?;
    if config.camera.frames_dir.is_none() {
        log_cameras();
    }

    // Product images are decoded on this runtime's blocking pool.
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let app = TryOnApp::new(config, runtime.handle().clone())?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([960.0, 640.0]),
        centered: true,
        ..Default::default()
    };

    let result = eframe::run_native(
        "Ring Try-On",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(ui::visuals());
            Box::new(app)
        }),
    );

    if let Err(e) = result {
        error!("Error running application: {:?}", e);
        anyhow::bail!("eframe exited with an error: {e}");
    }
    Ok(())
}
