//! Free-form notes kept for the length of a session.

/// Text the panel opens with: the ship measurement template.
pub const DEFAULT_NOTES: &str =
    "Ship Height (Back Right): 30.5 (colored)\n\n\n\n\n\n\n\n\n\nLength: 189";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notes {
    text: String,
}

impl Notes {
    pub fn new() -> Self {
        Self::with_text(DEFAULT_NOTES)
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn append_line(&mut self, line: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl Default for Notes {
    fn default() -> Self {
        Self::new()
    }
}
