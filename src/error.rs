use std::path::PathBuf;

use thiserror::Error;

/// Which leg of a generation call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ImageAnalysis,
    TextGeneration,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::ImageAnalysis => "Failed to analyze image",
            Stage::TextGeneration => "Failed to generate text",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category of an adapter failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    Configuration,
    Transport,
    Input,
    Busy,
}

/// Failure returned by the Gemini client.
///
/// Stays typed until the conversation turns it into a transcript entry.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("API key is not defined in the environment (set GEMINI_API_KEY or API_KEY)")]
    MissingCredential,

    #[error("{stage}: {message}")]
    Transport { stage: Stage, message: String },

    #[error("Failed to read image {}: {source}", .path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("{stage}: response was blocked ({reason})")]
    Blocked { stage: Stage, reason: String },

    #[error("A request is already in progress")]
    Busy,
}

impl AdapterError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            AdapterError::MissingCredential => ErrorReason::Configuration,
            AdapterError::Transport { .. } | AdapterError::Blocked { .. } => ErrorReason::Transport,
            AdapterError::ImageRead { .. } | AdapterError::InvalidImage(_) => ErrorReason::Input,
            AdapterError::Busy => ErrorReason::Busy,
        }
    }

    pub(crate) fn transport(stage: Stage, err: impl std::fmt::Display) -> Self {
        AdapterError::Transport {
            stage,
            message: err.to_string(),
        }
    }
}

/// Rejected submissions; handled by the input surface, never sent anywhere
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a message or select an image.")]
    Empty,

    #[error("Please wait for the current answer to finish.")]
    RequestOutstanding,

    #[error("File not found: {0}")]
    MissingFile(String),

    #[error("Not an image file: {0}")]
    NotAnImage(String),
}
