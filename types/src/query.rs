use crate::frame::Base64EncodedImage;

/// A query sent to the tutoring endpoint.
///
/// Serializes to the wire form `{"type": "text_query" | "voice_query",
/// "question": ..., "frame": ...}` with `frame` explicitly `null` when no
/// screen share is active.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum OutgoingQuery {
    #[serde(rename = "text_query")]
    Text(QueryBody),
    #[serde(rename = "voice_query")]
    Voice(QueryBody),
}

impl OutgoingQuery {
    /// A typed question from the chat input.
    pub fn text(question: &str, frame: Option<Base64EncodedImage>) -> Self {
        OutgoingQuery::Text(QueryBody::new(question, frame))
    }

    /// A transcribed question from the speech recognizer.
    pub fn voice(question: &str, frame: Option<Base64EncodedImage>) -> Self {
        OutgoingQuery::Voice(QueryBody::new(question, frame))
    }

    pub fn question(&self) -> &str {
        self.body().question()
    }

    pub fn frame(&self) -> Option<&Base64EncodedImage> {
        self.body().frame()
    }

    pub fn is_voice(&self) -> bool {
        matches!(self, OutgoingQuery::Voice(_))
    }

    fn body(&self) -> &QueryBody {
        match self {
            OutgoingQuery::Text(body) | OutgoingQuery::Voice(body) => body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueryBody {
    question: String,
    frame: Option<Base64EncodedImage>,
}

impl QueryBody {
    pub fn new(question: &str, frame: Option<Base64EncodedImage>) -> Self {
        Self {
            question: question.to_string(),
            frame,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn frame(&self) -> Option<&Base64EncodedImage> {
        self.frame.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_query_serializes_with_null_frame() {
        let query = OutgoingQuery::text("Explain AI", None);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&query).unwrap()).unwrap();
        assert_eq!(json["type"], "text_query");
        assert_eq!(json["question"], "Explain AI");
        assert!(json["frame"].is_null());
    }

    #[test]
    fn voice_query_carries_frame() {
        let query = OutgoingQuery::voice("What is this chart?", Some("aGVsbG8=".to_string()));
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&query).unwrap()).unwrap();
        assert_eq!(json["type"], "voice_query");
        assert_eq!(json["frame"], "aGVsbG8=");
    }
}
