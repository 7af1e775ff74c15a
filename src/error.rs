use mentor_realtime_utils::audio::AudioError;

/// Errors surfaced by the session client.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection is not open; the query was dropped, not queued.
    #[error("not connected")]
    NotConnected,
    #[error("connection error: {0}")]
    Connection(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Codec failures. Both variants are dropped-and-logged by the connection
/// loop; neither ever tears down the session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("audio payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },
}

impl From<AudioError> for ProtocolError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::PayloadTooLarge { size, max } => {
                ProtocolError::PayloadTooLarge { size, max }
            }
            AudioError::InvalidEncoding(e) => ProtocolError::MalformedResponse(e.to_string()),
        }
    }
}

/// Faults from the platform speech and capture devices. These travel in
/// session events, so they are cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("speech recognition is not supported on this platform")]
    SpeechUnsupported,
    #[error("permission denied for {device} access")]
    PermissionDenied { device: String },
    #[error("speech recognition failed: {0}")]
    Recognition(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
    #[error("audio playback did not finish within the watchdog window")]
    PlaybackTimeout,
}
