use base64::Engine;

/// MIME type implied for audio payloads embedded in responses.
pub const AUDIO_MIME: &str = "audio/mp3";

/// Upper bound on a decoded audio payload unless the caller overrides it.
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("invalid base64 audio payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

/// Decodes a base64 audio fragment, enforcing `max_bytes` on the decoded
/// size. Oversized fragments are rejected before any allocation happens.
pub fn decode(fragment: &str, max_bytes: usize) -> Result<Vec<u8>, AudioError> {
    // 4 base64 chars decode to at most 3 bytes
    let upper_bound = fragment.len() / 4 * 3;
    if upper_bound > max_bytes {
        return Err(AudioError::PayloadTooLarge {
            size: upper_bound,
            max: max_bytes,
        });
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(fragment)?;
    if bytes.len() > max_bytes {
        return Err(AudioError::PayloadTooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }
    Ok(bytes)
}

pub fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let bytes = vec![0x49, 0x44, 0x33, 0x04, 0x00];
        let encoded = encode(&bytes);
        assert_eq!(decode(&encoded, DEFAULT_MAX_AUDIO_BYTES).unwrap(), bytes);
    }

    #[test]
    fn oversized_payload_rejected_before_decoding() {
        let encoded = encode(&vec![0u8; 64]);
        let err = decode(&encoded, 16).unwrap_err();
        assert!(matches!(err, AudioError::PayloadTooLarge { max: 16, .. }));
    }

    #[test]
    fn invalid_base64_rejected() {
        let err = decode("not base64!!!", DEFAULT_MAX_AUDIO_BYTES).unwrap_err();
        assert!(matches!(err, AudioError::InvalidEncoding(_)));
    }
}
