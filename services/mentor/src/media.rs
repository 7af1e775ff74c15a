//! Terminal-backed implementations of the platform media traits. Real
//! deployments plug in an actual speech recognizer, audio device, and screen
//! capture track; the CLI substitutes the terminal for all three.

use async_trait::async_trait;
use tokio::sync::mpsc;

use mentor_realtime::error::MediaError;
use mentor_realtime::speech::{AudioSink, PlaybackEvent, Recognizer, RecognizerEvent};
use mentor_realtime::capture::FrameSource;
use mentor_realtime::types::RawFrame;
use mentor_realtime::types::response::AudioPayload;

/// "Recognizes" speech by accepting typed lines as final transcripts. The
/// line router in `main` decides when a line is a transcript.
pub struct TerminalRecognizer {
    events: Option<mpsc::Receiver<RecognizerEvent>>,
}

impl TerminalRecognizer {
    pub fn new() -> (Self, mpsc::Sender<RecognizerEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (Self { events: Some(rx) }, tx)
    }
}

#[async_trait]
impl Recognizer for TerminalRecognizer {
    async fn start(&mut self) -> Result<(), MediaError> {
        tracing::debug!("terminal recognizer listening");
        Ok(())
    }

    async fn stop(&mut self) {
        tracing::debug!("terminal recognizer stopped");
    }

    async fn events(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, MediaError> {
        self.events.take().ok_or(MediaError::SpeechUnsupported)
    }
}

pub async fn send_transcript(tx: &mpsc::Sender<RecognizerEvent>, line: &str) {
    if tx
        .send(RecognizerEvent::Transcript(line.to_string()))
        .await
        .is_err()
    {
        tracing::warn!("recognizer channel closed; dropping transcript");
    }
}

/// Logs playback instead of producing sound, reporting completion after a
/// short simulated playback window.
pub struct ConsoleSink {
    events: Option<mpsc::Receiver<PlaybackEvent>>,
    done_tx: mpsc::Sender<PlaybackEvent>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        let (done_tx, done_rx) = mpsc::channel(4);
        Self {
            events: Some(done_rx),
            done_tx,
        }
    }
}

#[async_trait]
impl AudioSink for ConsoleSink {
    async fn play(&mut self, audio: AudioPayload) -> Result<(), MediaError> {
        tracing::info!("playing {} bytes of {}", audio.len(), audio.mime());
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            let _ = done_tx.send(PlaybackEvent::Ended).await;
        });
        Ok(())
    }

    async fn stop(&mut self) {
        tracing::debug!("playback stopped");
    }

    async fn events(&mut self) -> Result<mpsc::Receiver<PlaybackEvent>, MediaError> {
        self.events.take().ok_or(MediaError::Playback(
            "playback events already taken".to_string(),
        ))
    }
}

/// Stands in for a real capture track by rendering a drifting gradient.
pub struct SyntheticFrameSource {
    tick: u8,
}

impl SyntheticFrameSource {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn next_frame(&mut self) -> Option<RawFrame> {
        self.tick = self.tick.wrapping_add(7);
        let (width, height) = (64u32, 48u32);
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&[x as u8 ^ self.tick, y as u8, self.tick, 0xFF]);
            }
        }
        Some(RawFrame::new(width, height, rgba))
    }
}
