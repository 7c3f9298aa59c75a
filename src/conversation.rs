//! Append-only chat log plus the single "request outstanding" flag.
//!
//! Every mutation goes through [`Conversation::begin`] and
//! [`Conversation::finish`], so the UI only ever reads from here.

use tracing::{info, warn};

use crate::error::{AdapterError, ValidationError};
use crate::message::{ChatMessage, MessageId, SendRequest};

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    next_id: u64,
    outstanding: bool,
    revision: u64,
}

/// Transcript text shown in place of an answer when generation fails
pub fn failure_text(err: &AdapterError) -> String {
    format!("Error: Failed to get a response. Please try again. ({})", err)
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the user's entry and mark a request as outstanding.
    ///
    /// Nothing is appended if a request is already in flight.
    pub fn begin(&mut self, request: &SendRequest) -> Result<MessageId, ValidationError> {
        if self.outstanding {
            return Err(ValidationError::RequestOutstanding);
        }

        let id = self.allocate_id();
        self.messages
            .push(ChatMessage::user(id, &request.prompt, request.image.clone()));
        self.outstanding = true;
        self.revision += 1;

        info!(
            id = id.0,
            has_image = request.image.is_some(),
            thinking_mode = request.thinking_mode,
            "submitted question"
        );
        Ok(id)
    }

    /// Append the answer (or the failure as an AI entry) and clear the flag
    pub fn finish(&mut self, outcome: Result<String, AdapterError>) -> MessageId {
        let id = self.allocate_id();
        let message = match outcome {
            Ok(text) => ChatMessage::ai(id, text),
            Err(err) => {
                warn!(reason = ?err.reason(), "showing failure in transcript: {}", err);
                ChatMessage::ai(id, failure_text(&err))
            }
        };

        if !self.outstanding {
            warn!(id = id.0, "completion arrived with no request outstanding");
        }

        self.messages.push(message);
        self.outstanding = false;
        self.revision += 1;
        id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    /// Bumped on every change to the log or the flag
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::message::{ContentKind, ImageRef, Sender};

    fn text_request(prompt: &str) -> SendRequest {
        SendRequest {
            prompt: prompt.to_string(),
            image: None,
            thinking_mode: false,
        }
    }

    #[test]
    fn success_appends_user_then_ai() {
        let mut conv = Conversation::new();
        conv.begin(&text_request("Summarize photosynthesis")).unwrap();
        assert!(conv.is_outstanding());
        assert_eq!(conv.len(), 1);

        conv.finish(Ok("Plants turn light into sugar.".to_string()));
        assert!(!conv.is_outstanding());

        let msgs = conv.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].sender(), Sender::User);
        assert_eq!(msgs[0].kind(), ContentKind::Text);
        assert_eq!(msgs[0].text(), Some("Summarize photosynthesis"));
        assert_eq!(msgs[1].sender(), Sender::Ai);
        assert_eq!(msgs[1].text(), Some("Plants turn light into sugar."));
    }

    #[test]
    fn failure_appends_error_as_ai_entry() {
        let mut conv = Conversation::new();
        conv.begin(&text_request("hi")).unwrap();
        conv.finish(Err(AdapterError::MissingCredential));

        assert_eq!(conv.len(), 2);
        assert!(!conv.is_outstanding());
        let last = &conv.messages()[1];
        assert_eq!(last.sender(), Sender::Ai);
        let text = last.text().unwrap();
        assert!(text.contains("Failed to get a response"));
        assert!(text.contains("API key is not defined"));
    }

    #[test]
    fn transport_failure_text_embeds_cause() {
        let err = AdapterError::Transport {
            stage: Stage::TextGeneration,
            message: "connection refused".into(),
        };
        assert_eq!(
            failure_text(&err),
            "Error: Failed to get a response. Please try again. (Failed to generate text: connection refused)"
        );
    }

    #[test]
    fn second_begin_while_outstanding_is_rejected() {
        let mut conv = Conversation::new();
        conv.begin(&text_request("one")).unwrap();
        let err = conv.begin(&text_request("two")).unwrap_err();

        assert_eq!(err, ValidationError::RequestOutstanding);
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn ids_are_monotonic_per_conversation() {
        let mut conv = Conversation::new();
        let a = conv.begin(&text_request("a")).unwrap();
        let b = conv.finish(Ok("b".into()));
        let c = conv.begin(&text_request("c")).unwrap();
        assert!(a < b && b < c);

        let mut other = Conversation::new();
        assert_eq!(other.begin(&text_request("x")).unwrap(), MessageId(0));
    }

    #[test]
    fn image_submission_keeps_reference() {
        let mut conv = Conversation::new();
        let image = ImageRef::file("/tmp/cell.jpg", "image/jpeg");
        conv.begin(&SendRequest {
            prompt: "What is this?".into(),
            image: Some(image.clone()),
            thinking_mode: true,
        })
        .unwrap();

        let msg = &conv.messages()[0];
        assert_eq!(msg.kind(), ContentKind::Image);
        assert_eq!(msg.image(), Some(&image));
    }

    #[test]
    fn revision_tracks_log_and_flag() {
        let mut conv = Conversation::new();
        let r0 = conv.revision();
        conv.begin(&text_request("q")).unwrap();
        let r1 = conv.revision();
        conv.finish(Ok("a".into()));
        assert!(r0 < r1 && r1 < conv.revision());
    }
}
