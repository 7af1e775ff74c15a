//! Wire codec for the tutoring endpoint: JSON on both directions, with the
//! embedded audio payload decoded and size-checked on the way in.

use mentor_realtime_types::response::{AudioPayload, DeliveryMode, ResponseFrame};
use mentor_realtime_types::{IncomingResponse, OutgoingQuery};
use mentor_realtime_utils::audio;

use crate::error::ProtocolError;

/// Serializes an outgoing query to its wire form.
pub fn encode_query(query: &OutgoingQuery) -> Result<String, serde_json::Error> {
    serde_json::to_string(query)
}

/// Decodes one incoming wire record into an [`IncomingResponse`].
///
/// Missing required fields or a bad audio encoding produce
/// [`ProtocolError::MalformedResponse`]; an audio payload larger than
/// `max_audio_bytes` produces [`ProtocolError::PayloadTooLarge`].
pub fn decode_response(
    text: &str,
    max_audio_bytes: usize,
) -> Result<IncomingResponse, ProtocolError> {
    let frame: ResponseFrame =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;
    let mode = DeliveryMode::parse(frame.mode());
    let payload = match frame.audio() {
        Some(fragment) => Some(AudioPayload::mp3(audio::decode(fragment, max_audio_bytes)?)),
        None => None,
    };
    Ok(IncomingResponse::new(
        frame.text().to_string(),
        mode,
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_realtime_utils::audio::DEFAULT_MAX_AUDIO_BYTES;

    #[test]
    fn encodes_text_query_without_frame() {
        let encoded = encode_query(&OutgoingQuery::text("Explain AI", None)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(json["type"], "text_query");
        assert_eq!(json["question"], "Explain AI");
        assert!(json["frame"].is_null());
    }

    #[test]
    fn decodes_voice_response_with_audio() {
        let body = format!(
            r#"{{"text":"hello","mode":"voice","audio":"{}"}}"#,
            audio::encode(b"mp3-bytes")
        );
        let response = decode_response(&body, DEFAULT_MAX_AUDIO_BYTES).unwrap();
        assert_eq!(response.text(), "hello");
        assert_eq!(*response.mode(), DeliveryMode::Voice);
        assert_eq!(response.audio().unwrap().bytes(), b"mp3-bytes");
        assert_eq!(response.audio().unwrap().mime(), "audio/mp3");
    }

    #[test]
    fn missing_mode_is_malformed() {
        let err = decode_response(r#"{"text":"hi"}"#, DEFAULT_MAX_AUDIO_BYTES).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedResponse(_)));
    }

    #[test]
    fn oversized_audio_is_rejected() {
        let body = format!(
            r#"{{"text":"hi","mode":"voice","audio":"{}"}}"#,
            audio::encode(&vec![0u8; 256])
        );
        let err = decode_response(&body, 64).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge { max: 64, .. }));
    }

    #[test]
    fn unknown_mode_is_preserved() {
        let response =
            decode_response(r#"{"text":"hi","mode":"quiz"}"#, DEFAULT_MAX_AUDIO_BYTES).unwrap();
        assert_eq!(*response.mode(), DeliveryMode::Other("quiz".to_string()));
    }
}
