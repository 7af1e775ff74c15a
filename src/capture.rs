//! Screen-capture frame sampling: a live capture track is sampled on a fixed
//! interval into a single-slot store of the most recent encoded frame, which
//! every outgoing query attaches while screen sharing is active.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mentor_realtime_types::{Base64EncodedImage, RawFrame};
use mentor_realtime_utils::frame;

/// Interval between sampled frames.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(200);

/// A live screen-capture track. `next_frame` returning `None` means the user
/// stopped sharing and the track has ended.
///
/// Opening the track is the platform layer's job; a refused capture prompt
/// surfaces there as [`crate::error::MediaError::PermissionDenied`] before a
/// source ever exists.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<RawFrame>;
}

/// Holds the most recently sampled frame. At most one frame is buffered;
/// each sample replaces the previous one, nothing is ever queued.
#[derive(Debug, Clone, Default)]
pub struct FrameStore(Arc<Mutex<Option<Base64EncodedImage>>>);

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, encoded: Base64EncodedImage) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(encoded);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = None;
        }
    }

    /// The frame to attach to the next outgoing query, if sharing is active.
    pub fn current(&self) -> Option<Base64EncodedImage> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn is_active(&self) -> bool {
        self.0.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

/// The sampling loop. Self-terminating: when the source reports the track
/// has ended, the store is cleared, `stopped_tx` fires once, and the task
/// exits without external cancellation.
pub struct FrameSampler {
    handle: JoinHandle<()>,
}

impl FrameSampler {
    pub fn start(
        mut source: Box<dyn FrameSource>,
        store: FrameStore,
        interval: Duration,
        stopped_tx: mpsc::Sender<()>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(raw) = source.next_frame().await else {
                    tracing::info!("screen-capture track ended; clearing current frame");
                    store.clear();
                    let _ = stopped_tx.send(()).await;
                    break;
                };
                match frame::encode_rgba(raw.width, raw.height, raw.rgba) {
                    Ok(encoded) => store.put(encoded),
                    Err(e) => tracing::warn!("dropping unencodable frame: {}", e),
                }
            }
        });
        Self { handle }
    }

    /// Stops sampling immediately. Used when the user closes the canvas, as
    /// opposed to the track ending on its own.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame() -> RawFrame {
        RawFrame::new(8, 8, vec![0x7Fu8; 8 * 8 * 4])
    }

    #[tokio::test(start_paused = true)]
    async fn sampled_frames_land_in_the_store() {
        let mut source = MockFrameSource::new();
        source
            .expect_next_frame()
            .returning(|| Box::pin(async { Some(gray_frame()) }));

        let store = FrameStore::new();
        let (stopped_tx, _stopped_rx) = mpsc::channel(1);
        let sampler = FrameSampler::start(
            Box::new(source),
            store.clone(),
            FRAME_INTERVAL,
            stopped_tx,
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert!(store.is_active());
        let current = store.current().unwrap();
        assert!(!current.is_empty());
        sampler.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn track_end_clears_the_store_and_notifies() {
        let mut source = MockFrameSource::new();
        let mut remaining = 2;
        source.expect_next_frame().returning(move || {
            if remaining > 0 {
                remaining -= 1;
                Box::pin(async { Some(gray_frame()) })
            } else {
                Box::pin(async { None })
            }
        });

        let store = FrameStore::new();
        let (stopped_tx, mut stopped_rx) = mpsc::channel(1);
        let _sampler = FrameSampler::start(
            Box::new(source),
            store.clone(),
            FRAME_INTERVAL,
            stopped_tx,
        );

        tokio::time::timeout(Duration::from_secs(5), stopped_rx.recv())
            .await
            .expect("sampler never reported the track end");
        assert!(!store.is_active());
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn cleared_store_attaches_nothing() {
        let store = FrameStore::new();
        assert_eq!(store.current(), None);
        store.put("ZnJhbWU=".to_string());
        assert_eq!(store.current().as_deref(), Some("ZnJhbWU="));
        store.clear();
        assert_eq!(store.current(), None);
    }
}
