//! One `Session` per open tutoring conversation. The session exclusively
//! owns the connection, the speech bridge, the frame store, and the reveal
//! renderer; tearing it down stops all of them and leaves no timer or
//! callback behind.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use mentor_realtime_types::response::DeliveryMode;
use mentor_realtime_types::OutgoingQuery;

use crate::capture::{FrameSampler, FrameSource, FrameStore, FRAME_INTERVAL};
use crate::client::config::Config;
use crate::client::{Client, ConnectionState, EventRx, EventTx, QueryTx, SessionEvent};
use crate::error::SessionError;
use crate::reveal::Renderer;
use crate::speech::{AudioSink, BridgeOutput, Recognizer, SpeechBridge, SpeechEvent, SpeechPhase};

/// A live tutoring conversation.
pub struct Session {
    client: Client,
    speech_tx: mpsc::Sender<SpeechEvent>,
    frame_store: FrameStore,
    sampler: Option<FrameSampler>,
    capture_stopped_tx: mpsc::Sender<()>,
    surface_rx: watch::Receiver<String>,
    phase_rx: watch::Receiver<SpeechPhase>,
    loop_stop_tx: watch::Sender<bool>,
    loop_handle: JoinHandle<()>,
    bridge_handle: JoinHandle<()>,
}

impl Session {
    /// Connects and wires the components together. The connection opens in
    /// the background; observe [`Session::connection_state`] for progress.
    pub fn start(
        config: Config,
        recognizer: Box<dyn Recognizer>,
        sink: Box<dyn AudioSink>,
    ) -> Result<Self, SessionError> {
        let mut client = Client::new(config.clone());
        client.connect()?;
        let events = client.server_events()?;
        let event_tx = client
            .event_sender()
            .ok_or(SessionError::NotConnected)?;

        let (bridge, speech_tx, output_rx, phase_rx) = SpeechBridge::new(recognizer, sink);
        let bridge_handle = tokio::spawn(bridge.run());

        let (renderer, surface_rx) = Renderer::new(config.reveal_cadence());
        let frame_store = FrameStore::new();
        let (capture_stopped_tx, capture_stopped_rx) = mpsc::channel(1);
        let (loop_stop_tx, loop_stop_rx) = watch::channel(false);

        let event_loop = SessionLoop {
            events,
            output_rx,
            capture_stopped_rx,
            stop_rx: loop_stop_rx,
            renderer,
            speech_tx: speech_tx.clone(),
            frame_store: frame_store.clone(),
            event_tx,
            q_tx: client.query_sender().ok_or(SessionError::NotConnected)?,
            state_rx: client.connection_state(),
        };
        let loop_handle = tokio::spawn(event_loop.run());

        Ok(Self {
            client,
            speech_tx,
            frame_store,
            sampler: None,
            capture_stopped_tx,
            surface_rx,
            phase_rx,
            loop_stop_tx,
            loop_handle,
            bridge_handle,
        })
    }

    /// Sends a typed question, attaching the current screen frame when one
    /// is buffered.
    pub async fn ask(&self, question: &str) -> Result<(), SessionError> {
        self.client
            .send(OutgoingQuery::text(question, self.frame_store.current()))
            .await
    }

    pub async fn enable_voice_mode(&self) {
        let _ = self.speech_tx.send(SpeechEvent::VoiceModeEnabled).await;
    }

    pub async fn disable_voice_mode(&self) {
        let _ = self.speech_tx.send(SpeechEvent::VoiceModeDisabled).await;
    }

    /// Begins sampling the given capture track into the frame store. A track
    /// already being sampled is dropped first; there is never more than one.
    pub fn start_screen_share(&mut self, source: Box<dyn FrameSource>) {
        self.stop_sampler();
        self.sampler = Some(FrameSampler::start(
            source,
            self.frame_store.clone(),
            FRAME_INTERVAL,
            self.capture_stopped_tx.clone(),
        ));
    }

    /// Stops sampling and detaches frames from subsequent queries.
    pub fn stop_screen_share(&mut self) {
        self.stop_sampler();
        self.frame_store.clear();
    }

    pub fn screen_share_active(&self) -> bool {
        self.frame_store.is_active()
    }

    /// Session events in receipt order; each call gets an independent stream.
    pub fn events(&self) -> Result<EventRx, SessionError> {
        self.client.server_events()
    }

    /// The revealed text surface (transcript plus in-progress reveal).
    pub fn surface(&self) -> watch::Receiver<String> {
        self.surface_rx.clone()
    }

    pub fn speech_phase(&self) -> watch::Receiver<SpeechPhase> {
        self.phase_rx.clone()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.client.connection_state()
    }

    /// Tears the session down: recognition stopped, playback paused, timers
    /// cleared, connection closed. Nothing can fire after this returns.
    pub async fn shutdown(mut self) {
        let _ = self.speech_tx.send(SpeechEvent::VoiceModeDisabled).await;
        self.stop_sampler();
        self.frame_store.clear();
        self.client.close().await;
        let _ = self.loop_stop_tx.send(true);

        let Session {
            speech_tx,
            loop_handle,
            bridge_handle,
            ..
        } = self;
        drop(speech_tx);
        if loop_handle.await.is_err() {
            tracing::error!("session event loop panicked during shutdown");
        }
        if bridge_handle.await.is_err() {
            tracing::error!("speech bridge panicked during shutdown");
        }
    }

    fn stop_sampler(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }
    }
}

/// Routes client events, bridge outputs, and capture notifications between
/// the components, preserving receipt order within each stream.
struct SessionLoop {
    events: EventRx,
    output_rx: mpsc::Receiver<BridgeOutput>,
    capture_stopped_rx: mpsc::Receiver<()>,
    stop_rx: watch::Receiver<bool>,
    renderer: Renderer,
    speech_tx: mpsc::Sender<SpeechEvent>,
    frame_store: FrameStore,
    event_tx: EventTx,
    q_tx: QueryTx,
    state_rx: watch::Receiver<ConnectionState>,
}

impl SessionLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.stop_rx.changed() => break,
                event = self.events.recv() => {
                    use tokio::sync::broadcast::error::RecvError;
                    match event {
                        Ok(SessionEvent::Response(response)) => self.on_response(response).await,
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "session event loop lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                Some(output) = self.output_rx.recv() => match output {
                    BridgeOutput::VoiceQuery(text) => self.send_voice_query(text).await,
                    BridgeOutput::Fault(fault) => {
                        let _ = self.event_tx.send(SessionEvent::MediaFault(fault));
                    }
                },
                Some(()) = self.capture_stopped_rx.recv() => {
                    // the user stopped sharing from outside the app; voice
                    // tutoring without the shared screen makes no sense
                    let _ = self.speech_tx.send(SpeechEvent::VoiceModeDisabled).await;
                    let _ = self.event_tx.send(SessionEvent::ScreenShareEnded);
                }
            }
        }
        self.renderer.cancel();
    }

    async fn on_response(&mut self, response: mentor_realtime_types::IncomingResponse) {
        // memorize responses bypass the reveal surface entirely
        if *response.mode() != DeliveryMode::Memorize {
            self.renderer.present(response.text().to_string());
        }
        let speech_event = match (response.mode(), response.audio()) {
            (DeliveryMode::Voice, Some(audio)) if !audio.is_empty() => {
                SpeechEvent::ResponseAudio(audio.clone())
            }
            _ => SpeechEvent::ResponseWithoutAudio,
        };
        let _ = self.speech_tx.send(speech_event).await;
    }

    async fn send_voice_query(&self, text: String) {
        if *self.state_rx.borrow() != ConnectionState::Open {
            tracing::warn!("dropping voice query; connection is not open");
            return;
        }
        let query = OutgoingQuery::voice(&text, self.frame_store.current());
        if self.q_tx.send(query).await.is_err() {
            tracing::warn!("dropping voice query; connection is shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    use crate::speech::{MockAudioSink, MockRecognizer, PlaybackEvent, RecognizerEvent};
    use mentor_realtime_utils::audio;

    fn test_config(endpoint: &str) -> Config {
        Config::builder()
            .with_endpoint(endpoint)
            .with_reconnect_delay(Duration::from_millis(10))
            .with_reveal_cadence(Duration::from_millis(1))
            .build()
    }

    fn scripted_recognizer(events: mpsc::Receiver<RecognizerEvent>) -> Box<MockRecognizer> {
        let mut recognizer = MockRecognizer::new();
        let mut events = Some(events);
        recognizer
            .expect_events()
            .return_once(move || Box::pin(async move { Ok(events.take().unwrap()) }));
        recognizer
            .expect_start()
            .returning(|| Box::pin(async { Ok(()) }));
        recognizer.expect_stop().returning(|| Box::pin(async {}));
        Box::new(recognizer)
    }

    fn observing_sink(
        events: mpsc::Receiver<PlaybackEvent>,
        played_tx: mpsc::Sender<usize>,
    ) -> Box<MockAudioSink> {
        let mut sink = MockAudioSink::new();
        let mut events = Some(events);
        sink.expect_events()
            .return_once(move || Box::pin(async move { Ok(events.take().unwrap()) }));
        sink.expect_play().returning(move |audio| {
            let played_tx = played_tx.clone();
            Box::pin(async move {
                let _ = played_tx.send(audio.len()).await;
                Ok(())
            })
        });
        sink.expect_stop().returning(|| Box::pin(async {}));
        Box::new(sink)
    }

    async fn wait_for_open(session: &Session) {
        let mut state = session.connection_state();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ConnectionState::Open),
        )
        .await
        .expect("connection never opened")
        .unwrap();
    }

    #[tokio::test]
    async fn voice_round_trip_plays_audio_and_resumes_listening() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}/ws", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
                    assert_eq!(json["type"], "voice_query");
                    assert_eq!(json["question"], "what is dns");
                }
                other => panic!("expected the voice query, got {:?}", other),
            }
            let reply = format!(
                r#"{{"text":"DNS maps names to addresses.","mode":"voice","audio":"{}"}}"#,
                audio::encode(b"fake-mp3")
            );
            ws.send(Message::Text(reply)).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (rec_tx, rec_rx) = mpsc::channel(4);
        let (play_tx, play_rx) = mpsc::channel(4);
        let (played_tx, mut played_rx) = mpsc::channel(4);
        let session = Session::start(
            test_config(&endpoint),
            scripted_recognizer(rec_rx),
            observing_sink(play_rx, played_tx),
        )
        .unwrap();
        wait_for_open(&session).await;

        session.enable_voice_mode().await;
        let mut phase = session.speech_phase();
        phase
            .wait_for(|p| *p == SpeechPhase::Listening)
            .await
            .unwrap();

        rec_tx
            .send(RecognizerEvent::Transcript("what is dns".into()))
            .await
            .unwrap();

        // the decoded audio reaches the sink
        let played = tokio::time::timeout(Duration::from_secs(5), played_rx.recv())
            .await
            .expect("audio never played");
        assert_eq!(played, Some(b"fake-mp3".len()));
        phase
            .wait_for(|p| *p == SpeechPhase::Speaking)
            .await
            .unwrap();

        // playback ends; the microphone comes back
        play_tx.send(PlaybackEvent::Ended).await.unwrap();
        phase
            .wait_for(|p| *p == SpeechPhase::Listening)
            .await
            .unwrap();

        session.shutdown().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn memorize_responses_bypass_the_reveal_surface() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}/ws", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"text":"secret drill text","mode":"memorize"}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"text":"shown text","mode":"text"}"#.into(),
            ))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (_rec_tx, rec_rx) = mpsc::channel(4);
        let (_play_tx, play_rx) = mpsc::channel(4);
        let (played_tx, _played_rx) = mpsc::channel(4);
        let session = Session::start(
            test_config(&endpoint),
            scripted_recognizer(rec_rx),
            observing_sink(play_rx, played_tx),
        )
        .unwrap();
        wait_for_open(&session).await;

        let mut surface = session.surface();
        tokio::time::timeout(
            Duration::from_secs(5),
            surface.wait_for(|s| s.as_str() == "shown text"),
        )
        .await
        .expect("reveal never completed")
        .unwrap();
        assert!(!surface.borrow().contains("secret drill text"));

        session.shutdown().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn queries_attach_the_sampled_frame_while_sharing() {
        use crate::capture::MockFrameSource;
        use mentor_realtime_types::RawFrame;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}/ws", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
                    assert_eq!(json["type"], "text_query");
                    assert!(json["frame"].is_string(), "expected an attached frame");
                }
                other => panic!("expected a text query, got {:?}", other),
            }
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
                    assert!(json["frame"].is_null(), "expected no frame after stop");
                }
                other => panic!("expected a second query, got {:?}", other),
            }
            ws.send(Message::Text(r#"{"text":"done","mode":"text"}"#.into()))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (_rec_tx, rec_rx) = mpsc::channel(4);
        let (_play_tx, play_rx) = mpsc::channel(4);
        let (played_tx, _played_rx) = mpsc::channel(4);
        let mut session = Session::start(
            test_config(&endpoint),
            scripted_recognizer(rec_rx),
            observing_sink(play_rx, played_tx),
        )
        .unwrap();
        wait_for_open(&session).await;

        let mut source = MockFrameSource::new();
        source
            .expect_next_frame()
            .returning(|| Box::pin(async { Some(RawFrame::new(8, 8, vec![0x30u8; 8 * 8 * 4])) }));
        session.start_screen_share(Box::new(source));

        // wait until the sampler has buffered a frame
        tokio::time::timeout(Duration::from_secs(5), async {
            while !session.screen_share_active() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("no frame was ever sampled");

        session.ask("what is on my screen").await.unwrap();

        session.stop_screen_share();
        assert!(!session.screen_share_active());

        let mut events = session.events().unwrap();
        session.ask("and now without the screen").await.unwrap();
        // the server acknowledges only after both queries checked out
        loop {
            match tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("server never acknowledged")
                .expect("event stream closed")
            {
                SessionEvent::Response(response) if response.text() == "done" => break,
                _ => {}
            }
        }

        session.shutdown().await;
        server.await.unwrap();
    }
}
