use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::config::Config;
use crate::conversation::Conversation;
use crate::error::{AdapterError, ValidationError};
use crate::gemini::GeminiClient;
use crate::input::InputState;
use crate::message::SendRequest;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    /// Typing or pasting an image path into the attach popup
    Attaching,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    pub conversation: Conversation,
    pub input: InputState,
    pub client: GeminiClient,

    /// Blocking notice shown as a popup until dismissed
    pub notice: Option<String>,

    // Attach popup
    pub attach_input: String,

    // Transcript scrolling
    pub transcript_scroll: u16,
    pub transcript_height: u16,
    pub transcript_width: u16,
    pub max_scroll: u16,
    /// Last conversation revision the view was scrolled for
    pub seen_revision: u64,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub transcript_area: Option<Rect>,

    pub key_source: Option<&'static str>,
    persist_settings: bool,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: &Config, events: UnboundedSender<AppEvent>) -> Self {
        let client = GeminiClient::from_config(config);
        if !client.has_credential() {
            warn!("no API key found; every question will fail until GEMINI_API_KEY or API_KEY is set");
        }

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            conversation: Conversation::new(),
            input: InputState::new(config.default_thinking_mode),
            client,

            notice: None,
            attach_input: String::new(),

            transcript_scroll: 0,
            transcript_height: 0,
            transcript_width: 0,
            max_scroll: 0,
            seen_revision: 0,

            animation_frame: 0,
            transcript_area: None,

            key_source: config.key_source(),
            persist_settings: true,
            events,
        }
    }

    /// Keep toggles out of the user's config file (tests)
    pub fn without_persistence(mut self) -> Self {
        self.persist_settings = false;
        self
    }

    pub fn is_loading(&self) -> bool {
        self.conversation.is_outstanding()
    }

    /// Validate the pending input and start one generation request
    pub fn submit(&mut self) {
        let request = match self.input.submit(self.is_loading()) {
            Ok(request) => request,
            Err(ValidationError::RequestOutstanding) => {
                debug!("submit ignored while a request is outstanding");
                return;
            }
            Err(err) => {
                self.notice = Some(err.to_string());
                return;
            }
        };

        match self.conversation.begin(&request) {
            Ok(_) => self.spawn_generation(request),
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    fn spawn_generation(&self, request: SendRequest) {
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let outcome = client.generate(request).await;
            // Receiver is gone only when the app is shutting down
            let _ = tx.send(AppEvent::Generation(outcome));
        });
    }

    pub fn on_generation(&mut self, outcome: Result<String, AdapterError>) {
        self.conversation.finish(outcome);
        self.animation_frame = 0;
    }

    pub fn toggle_thinking(&mut self) {
        if self.is_loading() {
            return;
        }
        let enabled = self.input.toggle_thinking(false);
        debug!(enabled, "thinking mode toggled");
        if self.persist_settings {
            if let Err(e) = Config::save_thinking_mode(enabled) {
                warn!("could not save thinking mode: {}", e);
            }
        }
    }

    pub fn open_attach_prompt(&mut self) {
        if self.is_loading() {
            return;
        }
        self.attach_input.clear();
        self.input_mode = InputMode::Attaching;
    }

    /// Attach whatever was typed into the attach popup
    pub fn confirm_attach(&mut self) {
        let raw = std::mem::take(&mut self.attach_input);
        self.input_mode = InputMode::Editing;
        if raw.trim().is_empty() {
            return;
        }
        if let Err(err) = self.input.attach(&raw) {
            self.notice = Some(err.to_string());
        }
    }

    pub fn clear_image(&mut self) {
        if !self.is_loading() {
            self.input.clear_image();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines).min(self.max_scroll);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
    }

    pub fn scroll_to_top(&mut self) {
        self.transcript_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.transcript_scroll = self.max_scroll;
    }

    /// Called by the renderer once it knows how tall the transcript is.
    /// Jumps to the newest entry whenever the log or the loading flag changed.
    pub fn update_transcript_extent(&mut self, total_lines: u16) {
        self.max_scroll = total_lines.saturating_sub(self.transcript_height);
        let revision = self.conversation.revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.transcript_scroll = self.max_scroll;
        } else {
            self.transcript_scroll = self.transcript_scroll.min(self.max_scroll);
        }
    }
}
