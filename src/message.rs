//! Chat transcript entries
//!
//! A `ChatMessage` is created by the conversation and never changes afterwards,
//! so its fields are private and only exposed through getters.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// What a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
}

/// Where an attached image lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    File(PathBuf),
    /// A pasted `data:<mime>;base64,<payload>` URL
    DataUrl(String),
}

/// Local reference to an image the user attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub source: ImageSource,
    pub mime_type: String,
}

impl ImageRef {
    pub fn file(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            source: ImageSource::File(path.into()),
            mime_type: mime_type.into(),
        }
    }

    /// Short label for chips and transcript entries
    pub fn display_name(&self) -> String {
        match &self.source {
            ImageSource::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            ImageSource::DataUrl(_) => "pasted image".to_string(),
        }
    }
}

/// One outbound question, built by the input bar and consumed by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub prompt: String,
    pub image: Option<ImageRef>,
    pub thinking_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    id: MessageId,
    sender: Sender,
    kind: ContentKind,
    text: Option<String>,
    image: Option<ImageRef>,
    timestamp: DateTime<Local>,
}

impl ChatMessage {
    /// User entry; becomes an image entry when `image` is set
    pub fn user(id: MessageId, text: &str, image: Option<ImageRef>) -> Self {
        Self {
            id,
            sender: Sender::User,
            kind: if image.is_some() {
                ContentKind::Image
            } else {
                ContentKind::Text
            },
            text: Some(text.to_string()),
            image,
            timestamp: Local::now(),
        }
    }

    pub fn ai(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Ai,
            kind: ContentKind::Text,
            text: Some(text.into()),
            image: None,
            timestamp: Local::now(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn display_time(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}
