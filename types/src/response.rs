/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

/// The wire record received from the tutoring endpoint.
///
/// `text` and `mode` are required; a record missing either is malformed and
/// must be dropped by the decoder.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseFrame {
    text: String,
    mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<Base64EncodedAudioBytes>,
}

impl ResponseFrame {
    pub fn new(text: &str, mode: &str) -> Self {
        Self {
            text: text.to_string(),
            mode: mode.to_string(),
            audio: None,
        }
    }

    pub fn with_audio(mut self, audio: Base64EncodedAudioBytes) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn audio(&self) -> Option<&str> {
        self.audio.as_deref()
    }
}

/// How a response asks to be delivered.
///
/// Unrecognized tags are preserved rather than rejected so that new server
/// modes degrade to plain text display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    Text,
    Voice,
    /// Suppresses the reveal surface; the response is delivered to
    /// subscribers only.
    Memorize,
    Other(String),
}

impl DeliveryMode {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "text" => DeliveryMode::Text,
            "voice" => DeliveryMode::Voice,
            "memorize" => DeliveryMode::Memorize,
            other => DeliveryMode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeliveryMode::Text => "text",
            DeliveryMode::Voice => "voice",
            DeliveryMode::Memorize => "memorize",
            DeliveryMode::Other(tag) => tag,
        }
    }
}

/// A decoded audio payload embedded in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    bytes: Vec<u8>,
    mime: String,
}

impl AudioPayload {
    /// The endpoint only ever embeds MP3 audio.
    pub fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "audio/mp3".to_string(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A fully decoded response, ready for the reveal surface and, when audio is
/// present, the speech bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingResponse {
    text: String,
    mode: DeliveryMode,
    audio: Option<AudioPayload>,
}

impl IncomingResponse {
    pub fn new(text: String, mode: DeliveryMode, audio: Option<AudioPayload>) -> Self {
        Self { text, mode, audio }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> &DeliveryMode {
        &self.mode
    }

    pub fn audio(&self) -> Option<&AudioPayload> {
        self.audio.as_ref()
    }

    pub fn take_audio(&mut self) -> Option<AudioPayload> {
        self.audio.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_frame_requires_mode() {
        let result = serde_json::from_str::<ResponseFrame>(r#"{"text":"hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn response_frame_audio_is_optional() {
        let frame: ResponseFrame =
            serde_json::from_str(r#"{"text":"hello","mode":"text"}"#).unwrap();
        assert_eq!(frame.text(), "hello");
        assert_eq!(frame.mode(), "text");
        assert!(frame.audio().is_none());
    }

    #[test]
    fn delivery_mode_maps_known_tags() {
        assert_eq!(DeliveryMode::parse("text"), DeliveryMode::Text);
        assert_eq!(DeliveryMode::parse("voice"), DeliveryMode::Voice);
        assert_eq!(DeliveryMode::parse("memorize"), DeliveryMode::Memorize);
        assert_eq!(
            DeliveryMode::parse("flashcard"),
            DeliveryMode::Other("flashcard".to_string())
        );
    }
}
