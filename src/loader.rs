// src/loader.rs - Background preprocessing of product images
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::background::BackgroundKey;
use crate::error::OverlayError;
use crate::overlay_image::PreprocessedOverlay;

struct LoadOutcome {
    generation: u64,
    source: String,
    result: Result<PreprocessedOverlay, OverlayError>,
}

/// Decodes and keys product images off the frame loop.
///
/// One load runs per distinct source. Until it succeeds `current()` is `None`;
/// a failed load is logged and leaves it `None` until another source is requested.
pub struct OverlayLoader {
    handle: Handle,
    key: BackgroundKey,
    requested: Option<String>,
    generation: u64,
    pending: bool,
    current: Option<Arc<PreprocessedOverlay>>,
    tx: UnboundedSender<LoadOutcome>,
    rx: UnboundedReceiver<LoadOutcome>,
}

impl OverlayLoader {
    pub fn new(handle: Handle, key: BackgroundKey) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            handle,
            key,
            requested: None,
            generation: 0,
            pending: false,
            current: None,
            tx,
            rx,
        }
    }

    /// Starts loading `source` unless it is already the requested one.
    /// Returns whether a new load was started.
    pub fn request(&mut self, source: &str) -> bool {
        let source = source.trim();
        if self.requested.as_deref() == Some(source) {
            return false;
        }

        self.generation += 1;
        self.requested = Some(source.to_string());
        self.current = None;
        self.pending = true;

        let generation = self.generation;
        let source = source.to_string();
        let key = self.key;
        let tx = self.tx.clone();
        self.handle.spawn_blocking(move || {
            let result = PreprocessedOverlay::load(&source, &key);
            // The receiver only disappears with the loader itself.
            let _ = tx.send(LoadOutcome {
                generation,
                source,
                result,
            });
        });

        true
    }

    /// Drops the current overlay and forgets the requested source.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.requested = None;
        self.current = None;
        self.pending = false;
    }

    /// Collects finished loads. Returns true when `current()` changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.rx.try_recv() {
            if outcome.generation != self.generation {
                continue;
            }
            self.pending = false;
            match outcome.result {
                Ok(overlay) => {
                    info!(
                        "Overlay ready: {} ({}x{})",
                        short(&outcome.source),
                        overlay.width(),
                        overlay.height()
                    );
                    self.current = Some(Arc::new(overlay));
                    changed = true;
                }
                Err(e) => {
                    warn!("Overlay image {} unavailable: {}", short(&outcome.source), e);
                }
            }
        }
        changed
    }

    pub fn current(&self) -> Option<Arc<PreprocessedOverlay>> {
        self.current.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

// data: URIs can be megabytes long; keep log lines readable.
fn short(source: &str) -> String {
    const MAX: usize = 64;
    if source.chars().count() <= MAX {
        source.to_string()
    } else {
        let head: String = source.chars().take(MAX).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use tokio::runtime::Runtime;

    fn temp_png(color: [u8; 4]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ring_{}.png", uuid::Uuid::new_v4()));
        RgbaImage::from_pixel(8, 8, Rgba(color)).save(&path).unwrap();
        path
    }

    fn wait_until_settled(loader: &mut OverlayLoader) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut changed = false;
        while loader.is_pending() && Instant::now() < deadline {
            changed |= loader.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        changed
    }

    #[test]
    fn test_loads_and_keys_image() {
        let rt = Runtime::new().unwrap();
        let mut loader = OverlayLoader::new(rt.handle().clone(), BackgroundKey::default());
        let path = temp_png([200, 150, 30, 255]);

        assert!(loader.request(path.to_str().unwrap()));
        assert!(loader.current().is_none());
        assert!(wait_until_settled(&mut loader));

        let overlay = loader.current().unwrap();
        assert_eq!((overlay.width(), overlay.height()), (8, 8));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_same_source_is_not_reloaded() {
        let rt = Runtime::new().unwrap();
        let mut loader = OverlayLoader::new(rt.handle().clone(), BackgroundKey::default());
        let path = temp_png([10, 10, 10, 255]);
        let source = path.to_str().unwrap();

        assert!(loader.request(source));
        wait_until_settled(&mut loader);
        assert!(!loader.request(source));
        assert!(loader.current().is_some());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_failed_load_leaves_no_overlay() {
        let rt = Runtime::new().unwrap();
        let mut loader = OverlayLoader::new(rt.handle().clone(), BackgroundKey::default());

        assert!(loader.request("https://example.com/ring.png"));
        assert!(!wait_until_settled(&mut loader));
        assert!(loader.current().is_none());
        assert!(!loader.is_pending());
    }

    #[test]
    fn test_superseded_load_is_discarded() {
        let rt = Runtime::new().unwrap();
        let mut loader = OverlayLoader::new(rt.handle().clone(), BackgroundKey::default());
        let first = temp_png([255, 0, 0, 255]);
        let second = temp_png([0, 0, 255, 255]);

        loader.request(first.to_str().unwrap());
        loader.request(second.to_str().unwrap());
        wait_until_settled(&mut loader);
        // A late result for the first request must not replace the second.
        std::thread::sleep(Duration::from_millis(50));
        loader.poll();

        let overlay = loader.current().unwrap();
        assert_eq!(overlay.source(), second.to_str().unwrap());
        let _ = std::fs::remove_file(first);
        let _ = std::fs::remove_file(second);
    }

    #[test]
    fn test_switching_source_drops_previous_overlay() {
        let rt = Runtime::new().unwrap();
        let mut loader = OverlayLoader::new(rt.handle().clone(), BackgroundKey::default());
        let path = temp_png([90, 60, 20, 255]);

        loader.request(path.to_str().unwrap());
        wait_until_settled(&mut loader);
        assert!(loader.current().is_some());

        loader.request("/definitely/not/here.png");
        assert!(loader.current().is_none());
        wait_until_settled(&mut loader);
        assert!(loader.current().is_none());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_short_truncates_long_sources() {
        let long = "x".repeat(100);
        assert_eq!(short(&long).len(), 67);
        assert_eq!(short("ring.png"), "ring.png");
    }
}
