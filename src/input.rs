use std::path::PathBuf;

use tracing::debug;

use crate::error::ValidationError;
use crate::message::{ImageRef, ImageSource, SendRequest};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Pending prompt text, at most one pending image, and the thinking-mode toggle
#[derive(Debug, Default)]
pub struct InputState {
    text: String,
    cursor: usize, // in chars
    image: Option<ImageRef>,
    thinking_mode: bool,
}

impl InputState {
    pub fn new(thinking_mode: bool) -> Self {
        Self {
            thinking_mode,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn thinking_mode(&self) -> bool {
        self.thinking_mode
    }

    // Line editing

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars().filter(|c| !c.is_control()) {
            self.insert(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    // Attachments and flags

    /// Attach an image from a file path or a pasted `data:image/...` URL,
    /// replacing any pending one
    pub fn attach(&mut self, raw: &str) -> Result<&ImageRef, ValidationError> {
        let image = parse_attachment(raw)?;
        debug!(name = %image.display_name(), mime = %image.mime_type, "attached image");
        Ok(self.image.insert(image))
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Flip thinking mode; refused while a request is outstanding
    pub fn toggle_thinking(&mut self, outstanding: bool) -> bool {
        if !outstanding {
            self.thinking_mode = !self.thinking_mode;
        }
        self.thinking_mode
    }

    /// Turn the pending input into a request and reset text and image.
    ///
    /// Blank text is only accepted together with an image.
    pub fn submit(&mut self, outstanding: bool) -> Result<SendRequest, ValidationError> {
        if outstanding {
            return Err(ValidationError::RequestOutstanding);
        }
        if self.text.trim().is_empty() && self.image.is_none() {
            return Err(ValidationError::Empty);
        }

        let request = SendRequest {
            prompt: std::mem::take(&mut self.text),
            image: self.image.take(),
            thinking_mode: self.thinking_mode,
        };
        self.cursor = 0;
        Ok(request)
    }
}

fn parse_attachment(raw: &str) -> Result<ImageRef, ValidationError> {
    let raw = raw.trim();

    if let Some(rest) = raw.strip_prefix("data:") {
        let mime = rest
            .split([';', ','])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !mime.starts_with("image/") {
            return Err(ValidationError::NotAnImage("pasted data".to_string()));
        }
        return Ok(ImageRef {
            source: ImageSource::DataUrl(raw.to_string()),
            mime_type: mime,
        });
    }

    let path = expand_path(raw);
    if !path.is_file() {
        return Err(ValidationError::MissingFile(path.display().to_string()));
    }

    match mime_guess::from_path(&path).first() {
        Some(mime) if mime.type_() == mime_guess::mime::IMAGE => Ok(ImageRef {
            source: ImageSource::File(path),
            mime_type: mime.essence_str().to_string(),
        }),
        _ => Err(ValidationError::NotAnImage(path.display().to_string())),
    }
}

/// Strip drag-and-drop quotes and expand a leading `~/`
fn expand_path(raw: &str) -> PathBuf {
    let unquoted = raw.trim_matches(|c| c == '\'' || c == '"');
    if let Some(rest) = unquoted.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(unquoted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(s: &str) -> InputState {
        let mut input = InputState::default();
        input.insert_str(s);
        input
    }

    #[test]
    fn blank_without_image_is_rejected_and_kept() {
        let mut input = typed("   ");
        assert_eq!(input.submit(false), Err(ValidationError::Empty));
        assert_eq!(input.text(), "   ");

        let mut empty = InputState::default();
        assert_eq!(empty.submit(false), Err(ValidationError::Empty));
    }

    #[test]
    fn submit_clears_text_and_image_but_keeps_thinking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.png");
        std::fs::write(&path, b"png").unwrap();

        let mut input = InputState::new(true);
        input.insert_str("Explain this graph");
        input.attach(path.to_str().unwrap()).unwrap();

        let request = input.submit(false).unwrap();
        assert_eq!(request.prompt, "Explain this graph");
        assert!(request.thinking_mode);
        let image = request.image.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.source, ImageSource::File(path));

        assert_eq!(input.text(), "");
        assert_eq!(input.cursor(), 0);
        assert!(input.image().is_none());
        assert!(input.thinking_mode());
    }

    #[test]
    fn image_alone_is_enough() {
        let mut input = InputState::default();
        input.attach("data:image/jpeg;base64,/9j/4AAQ").unwrap();
        let request = input.submit(false).unwrap();
        assert_eq!(request.prompt, "");
        assert_eq!(request.image.unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn submit_while_outstanding_is_rejected() {
        let mut input = typed("Next question");
        assert_eq!(input.submit(true), Err(ValidationError::RequestOutstanding));
        assert_eq!(input.text(), "Next question");
    }

    #[test]
    fn attach_rejects_non_images_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "hello").unwrap();

        let mut input = InputState::default();
        assert!(matches!(input.attach(notes.to_str().unwrap()), Err(ValidationError::NotAnImage(_))));
        assert!(matches!(input.attach("/no/such/photo.jpg"), Err(ValidationError::MissingFile(_))));
        assert!(matches!(input.attach("data:text/plain;base64,aGk="), Err(ValidationError::NotAnImage(_))));
        assert!(input.image().is_none());
    }

    #[test]
    fn attach_accepts_quoted_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my diagram.webp");
        std::fs::write(&path, b"riff").unwrap();

        let mut input = InputState::default();
        let quoted = format!("'{}'", path.display());
        assert_eq!(input.attach(&quoted).unwrap().mime_type, "image/webp");
    }

    #[test]
    fn thinking_toggle_is_locked_while_outstanding() {
        let mut input = InputState::default();
        assert!(input.toggle_thinking(false));
        assert!(input.toggle_thinking(true));
        assert!(!input.toggle_thinking(false));
    }

    #[test]
    fn editing_is_char_indexed() {
        let mut input = typed("héllo");
        input.move_left();
        input.move_left();
        input.backspace();
        assert_eq!(input.text(), "hélo");
        input.move_home();
        input.delete();
        assert_eq!(input.text(), "élo");
        input.move_end();
        input.insert('!');
        assert_eq!(input.text(), "élo!");
        assert_eq!(input.cursor(), 4);
    }
}
