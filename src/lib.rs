//! Terminal study helper backed by the Gemini API.
//!
//! The interesting pieces are UI-agnostic: [`conversation::Conversation`]
//! owns the transcript, [`input::InputState`] builds requests and
//! [`gemini::GeminiClient`] picks the model and talks to the API.

pub mod app;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod handler;
pub mod input;
pub mod markdown;
pub mod message;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use config::Config;
pub use conversation::Conversation;
pub use error::{AdapterError, ValidationError};
pub use gemini::{GeminiClient, ModelSettings};
pub use input::InputState;
pub use message::{ChatMessage, ContentKind, ImageRef, ImageSource, MessageId, SendRequest, Sender};
