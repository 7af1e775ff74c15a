//! Speech I/O bridge: one explicit state machine coordinating the platform
//! speech recognizer and audio sink so the microphone is never capturing
//! while synthesized audio is playing.
//!
//! The machine itself is a pure transition function from [`SpeechEvent`]s to
//! [`SpeechCommand`]s; the [`SpeechBridge`] executor performs the commands
//! against the `Recognizer`/`AudioSink` trait objects and owns the watchdog
//! and retry timers.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use mentor_realtime_types::response::AudioPayload;

use crate::error::MediaError;

/// Recognition resumes even if the sink never reports that playback ended.
pub const PLAYBACK_WATCHDOG: Duration = Duration::from_millis(10_000);

/// Delay before retrying recognition after an error.
pub const RECOGNITION_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Consecutive recognition errors tolerated before the fault is surfaced.
pub const MAX_RECOGNITION_RETRIES: u32 = 1;

const BRIDGE_CHANNEL_CAPACITY: usize = 32;

/// The bridge is in exactly one phase at a time; `Listening` and `Speaking`
/// can never hold simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechPhase {
    Idle,
    Listening,
    /// A transcript was sent; the remote response is pending.
    Processing,
    Speaking,
}

/// Inputs to the bridge state machine.
#[derive(Debug)]
pub enum SpeechEvent {
    VoiceModeEnabled,
    VoiceModeDisabled,
    /// The recognizer produced a final transcript; capture has ended.
    TranscriptFinal(String),
    RecognitionError(String),
    /// Fired after [`RECOGNITION_RETRY_DELAY`] to restart listening.
    RetryListen,
    /// A voice-mode response with an audio payload arrived.
    ResponseAudio(AudioPayload),
    /// A response arrived with no audio while a voice query was in flight.
    ResponseWithoutAudio,
    PlaybackEnded,
    PlaybackError(String),
    WatchdogFired,
}

/// Side effects the executor performs on behalf of the machine.
#[derive(Debug, PartialEq)]
pub enum SpeechCommand {
    StartRecognition,
    StopRecognition,
    Play(AudioPayload),
    StopPlayback,
    ArmWatchdog(Duration),
    DisarmWatchdog,
    ScheduleRetry(Duration),
    CancelRetry,
    SendVoiceQuery(String),
    Surface(MediaError),
}

/// Events emitted by a platform speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A final transcript; the capture cycle has ended.
    Transcript(String),
    Error(String),
}

/// Events emitted by a platform audio sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Ended,
    Error(String),
}

/// Platform speech-to-text behind a trait so runtimes and tests can supply
/// their own.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait Recognizer: Send {
    /// Begins a continuous listen cycle.
    ///
    /// Fails with [`MediaError::SpeechUnsupported`] when the platform has no
    /// speech APIs, or [`MediaError::PermissionDenied`] when the user refuses
    /// microphone access; either way voice mode is not entered.
    async fn start(&mut self) -> Result<(), MediaError>;
    /// Stops capture; pending partial results are discarded.
    async fn stop(&mut self);
    /// The stream of transcripts and recognition errors. Called once.
    async fn events(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, MediaError>;
}

/// Platform audio playback behind a trait.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait AudioSink: Send {
    /// Starts playback of a decoded audio payload.
    async fn play(&mut self, audio: AudioPayload) -> Result<(), MediaError>;
    /// Pauses and releases any playing audio.
    async fn stop(&mut self);
    /// The stream of playback completion events. Called once.
    async fn events(&mut self) -> Result<mpsc::Receiver<PlaybackEvent>, MediaError>;
}

/// Outputs from the bridge that the session routes onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutput {
    /// A transcript to send as a voice query.
    VoiceQuery(String),
    /// A fault the UI should surface.
    Fault(MediaError),
}

/// The pure transition function. Mutates phase/flags and returns the side
/// effects to perform, in order.
#[derive(Debug)]
pub struct SpeechMachine {
    phase: SpeechPhase,
    voice_mode: bool,
    retries: u32,
}

impl SpeechMachine {
    pub fn new() -> Self {
        Self {
            phase: SpeechPhase::Idle,
            voice_mode: false,
            retries: 0,
        }
    }

    pub fn phase(&self) -> SpeechPhase {
        self.phase
    }

    pub fn voice_mode(&self) -> bool {
        self.voice_mode
    }

    pub fn handle(&mut self, event: SpeechEvent) -> Vec<SpeechCommand> {
        match event {
            SpeechEvent::VoiceModeEnabled => {
                if self.voice_mode {
                    return vec![];
                }
                self.voice_mode = true;
                self.retries = 0;
                self.phase = SpeechPhase::Listening;
                vec![SpeechCommand::StartRecognition]
            }
            SpeechEvent::VoiceModeDisabled => {
                self.voice_mode = false;
                self.retries = 0;
                self.phase = SpeechPhase::Idle;
                // teardown must leave no timer able to resurrect the bridge
                vec![
                    SpeechCommand::StopRecognition,
                    SpeechCommand::StopPlayback,
                    SpeechCommand::DisarmWatchdog,
                    SpeechCommand::CancelRetry,
                ]
            }
            SpeechEvent::TranscriptFinal(text) => {
                if self.phase != SpeechPhase::Listening {
                    return vec![];
                }
                self.retries = 0;
                self.phase = SpeechPhase::Processing;
                vec![SpeechCommand::SendVoiceQuery(text)]
            }
            SpeechEvent::RecognitionError(detail) => {
                if !self.voice_mode || self.phase != SpeechPhase::Listening {
                    return vec![];
                }
                if self.retries < MAX_RECOGNITION_RETRIES {
                    self.retries += 1;
                    vec![SpeechCommand::ScheduleRetry(RECOGNITION_RETRY_DELAY)]
                } else {
                    self.phase = SpeechPhase::Idle;
                    vec![
                        SpeechCommand::StopRecognition,
                        SpeechCommand::Surface(MediaError::Recognition(detail)),
                    ]
                }
            }
            SpeechEvent::RetryListen => {
                if !self.voice_mode || self.phase != SpeechPhase::Listening {
                    return vec![];
                }
                vec![SpeechCommand::StartRecognition]
            }
            SpeechEvent::ResponseAudio(audio) => {
                if !self.voice_mode {
                    return vec![];
                }
                // recognition stops before playback starts
                self.phase = SpeechPhase::Speaking;
                vec![
                    SpeechCommand::StopRecognition,
                    SpeechCommand::Play(audio),
                    SpeechCommand::ArmWatchdog(PLAYBACK_WATCHDOG),
                ]
            }
            SpeechEvent::ResponseWithoutAudio => {
                if !self.voice_mode || self.phase != SpeechPhase::Processing {
                    return vec![];
                }
                self.phase = SpeechPhase::Listening;
                vec![SpeechCommand::StartRecognition]
            }
            SpeechEvent::PlaybackEnded => self.finish_playback(vec![SpeechCommand::DisarmWatchdog]),
            SpeechEvent::PlaybackError(detail) => {
                // swallowed: recognition resumes regardless
                tracing::warn!("audio playback failed: {}", detail);
                self.finish_playback(vec![SpeechCommand::DisarmWatchdog])
            }
            SpeechEvent::WatchdogFired => {
                tracing::warn!("playback watchdog fired; resuming recognition");
                self.finish_playback(vec![SpeechCommand::StopPlayback])
            }
        }
    }

    fn finish_playback(&mut self, mut commands: Vec<SpeechCommand>) -> Vec<SpeechCommand> {
        if self.phase != SpeechPhase::Speaking {
            return vec![];
        }
        if self.voice_mode {
            self.phase = SpeechPhase::Listening;
            commands.push(SpeechCommand::StartRecognition);
        } else {
            self.phase = SpeechPhase::Idle;
        }
        commands
    }
}

impl Default for SpeechMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Executor for the speech machine. Owns the recognizer and sink, forwards
/// their events into the machine, and performs the commands it returns.
pub struct SpeechBridge {
    machine: SpeechMachine,
    recognizer: Box<dyn Recognizer>,
    sink: Box<dyn AudioSink>,
    event_rx: mpsc::Receiver<SpeechEvent>,
    // weak so that the timers keep the event channel from closing only
    // while the caller still holds a sender
    event_tx: mpsc::WeakSender<SpeechEvent>,
    output_tx: mpsc::Sender<BridgeOutput>,
    phase_tx: watch::Sender<SpeechPhase>,
    watchdog: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl SpeechBridge {
    #[allow(clippy::type_complexity)]
    pub fn new(
        recognizer: Box<dyn Recognizer>,
        sink: Box<dyn AudioSink>,
    ) -> (
        Self,
        mpsc::Sender<SpeechEvent>,
        mpsc::Receiver<BridgeOutput>,
        watch::Receiver<SpeechPhase>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(BRIDGE_CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel(BRIDGE_CHANNEL_CAPACITY);
        let (phase_tx, phase_rx) = watch::channel(SpeechPhase::Idle);
        let bridge = Self {
            machine: SpeechMachine::new(),
            recognizer,
            sink,
            event_rx,
            event_tx: event_tx.downgrade(),
            output_tx,
            phase_tx,
            watchdog: None,
            retry: None,
        };
        (bridge, event_tx, output_rx, phase_rx)
    }

    /// Runs until every `SpeechEvent` sender is dropped, then stops capture
    /// and playback and clears all timers.
    pub async fn run(mut self) {
        let mut recognizer_events = match self.recognizer.events().await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!("recognizer unavailable: {}", e);
                let _ = self.output_tx.send(BridgeOutput::Fault(e)).await;
                return;
            }
        };
        let mut playback_events = match self.sink.events().await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!("audio sink unavailable: {}", e);
                let _ = self.output_tx.send(BridgeOutput::Fault(e)).await;
                return;
            }
        };
        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    let Some(event) = event else { break };
                    self.dispatch(event).await;
                }
                Some(event) = recognizer_events.recv() => {
                    let event = match event {
                        RecognizerEvent::Transcript(text) => SpeechEvent::TranscriptFinal(text),
                        RecognizerEvent::Error(detail) => SpeechEvent::RecognitionError(detail),
                    };
                    self.dispatch(event).await;
                }
                Some(event) = playback_events.recv() => {
                    let event = match event {
                        PlaybackEvent::Ended => SpeechEvent::PlaybackEnded,
                        PlaybackEvent::Error(detail) => SpeechEvent::PlaybackError(detail),
                    };
                    self.dispatch(event).await;
                }
            }
        }
        self.dispatch(SpeechEvent::VoiceModeDisabled).await;
    }

    async fn dispatch(&mut self, event: SpeechEvent) {
        for command in self.machine.handle(event) {
            self.execute(command).await;
        }
        let _ = self.phase_tx.send(self.machine.phase());
    }

    async fn execute(&mut self, command: SpeechCommand) {
        match command {
            SpeechCommand::StartRecognition => {
                if let Err(e) = self.recognizer.start().await {
                    tracing::error!("failed to start recognition: {}", e);
                    let _ = self.output_tx.send(BridgeOutput::Fault(e)).await;
                    // voice mode cannot be entered (or stay on) without a
                    // recognizer; unwind to idle and stop everything
                    self.machine.handle(SpeechEvent::VoiceModeDisabled);
                    self.sink.stop().await;
                    self.disarm_watchdog();
                    self.cancel_retry();
                }
            }
            SpeechCommand::StopRecognition => self.recognizer.stop().await,
            SpeechCommand::Play(audio) => {
                if let Err(e) = self.sink.play(audio).await {
                    tracing::error!("failed to start playback: {}", e);
                    let report = SpeechEvent::PlaybackError(e.to_string());
                    if let Some(tx) = self.event_tx.upgrade() {
                        if tx.try_send(report).is_err() {
                            tracing::warn!("speech event channel full; dropping playback error");
                        }
                    }
                }
            }
            SpeechCommand::StopPlayback => self.sink.stop().await,
            SpeechCommand::ArmWatchdog(timeout) => {
                self.disarm_watchdog();
                let tx = self.event_tx.clone();
                self.watchdog = Some(tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(SpeechEvent::WatchdogFired).await;
                    }
                }));
            }
            SpeechCommand::DisarmWatchdog => self.disarm_watchdog(),
            SpeechCommand::ScheduleRetry(delay) => {
                self.cancel_retry();
                let tx = self.event_tx.clone();
                self.retry = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(SpeechEvent::RetryListen).await;
                    }
                }));
            }
            SpeechCommand::CancelRetry => self.cancel_retry(),
            SpeechCommand::SendVoiceQuery(text) => {
                let _ = self.output_tx.send(BridgeOutput::VoiceQuery(text)).await;
            }
            SpeechCommand::Surface(fault) => {
                let _ = self.output_tx.send(BridgeOutput::Fault(fault)).await;
            }
        }
    }

    fn disarm_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }

    fn cancel_retry(&mut self) {
        if let Some(handle) = self.retry.take() {
            handle.abort();
        }
    }
}
