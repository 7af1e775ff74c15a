//! Typed-response rendering: a complete response string is revealed one
//! character at a time at a fixed cadence, on top of a running transcript.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default per-character reveal cadence.
pub const DEFAULT_REVEAL_CADENCE: Duration = Duration::from_millis(10);

/// A target string and how much of it is currently revealed. Revealing a
/// string of length L is terminal after exactly L ticks.
#[derive(Debug, Clone)]
pub struct RevealState {
    chars: Vec<char>,
    revealed: usize,
}

impl RevealState {
    pub fn new(target: &str) -> Self {
        Self {
            chars: target.chars().collect(),
            revealed: 0,
        }
    }

    /// Advances by one character. Returns false once the reveal is terminal.
    pub fn tick(&mut self) -> bool {
        if self.revealed < self.chars.len() {
            self.revealed += 1;
            true
        } else {
            false
        }
    }

    pub fn is_done(&self) -> bool {
        self.revealed == self.chars.len()
    }

    pub fn revealed(&self) -> String {
        self.chars[..self.revealed].iter().collect()
    }
}

/// Streams response text into the display surface.
///
/// A `present` call while a reveal is still running abandons that reveal
/// outright; there is no merging and no queue of pending reveals. Completed
/// reveals are committed to a transcript that later reveals append to. The
/// surface (transcript plus current reveal prefix) is published through a
/// watch channel.
pub struct Renderer {
    cadence: Duration,
    committed: String,
    current: Option<(String, JoinHandle<()>)>,
    surface_tx: watch::Sender<String>,
}

impl Renderer {
    pub fn new(cadence: Duration) -> (Self, watch::Receiver<String>) {
        let (surface_tx, surface_rx) = watch::channel(String::new());
        (
            Self {
                cadence,
                committed: String::new(),
                current: None,
                surface_tx,
            },
            surface_rx,
        )
    }

    /// Begins revealing `text`, preempting an unfinished reveal.
    pub fn present(&mut self, text: String) {
        self.retire_current();
        let cadence = self.cadence;
        let committed = self.committed.clone();
        let surface_tx = self.surface_tx.clone();
        let target = text.clone();
        let handle = tokio::spawn(async move {
            let mut state = RevealState::new(&target);
            let mut ticker = tokio::time::interval(cadence);
            // overwrite any abandoned partial reveal right away
            let _ = surface_tx.send(committed.clone());
            loop {
                ticker.tick().await;
                if !state.tick() {
                    break;
                }
                let _ = surface_tx.send(format!("{committed}{}", state.revealed()));
            }
        });
        self.current = Some((text, handle));
    }

    /// Abandons any reveal in progress without starting a new one.
    pub fn cancel(&mut self) {
        self.retire_current();
        let _ = self.surface_tx.send(self.committed.clone());
    }

    pub fn transcript(&self) -> &str {
        &self.committed
    }

    /// Commits a finished reveal to the transcript, or aborts an unfinished
    /// one. The abandoned text is never merged into later reveals.
    fn retire_current(&mut self) {
        if let Some((text, handle)) = self.current.take() {
            if handle.is_finished() {
                self.committed.push_str(&text);
            } else {
                handle.abort();
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.current.take() {
            handle.abort();
        }
    }
}
