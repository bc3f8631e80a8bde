use std::collections::VecDeque;
use std::path::PathBuf;

/// Blocking questions the drawing tools ask the user
pub trait Prompt {
    /// Ask for a line of text. `None` or an empty answer cancels.
    fn text(&mut self, message: &str) -> Option<String>;

    /// Ask a yes/no question
    fn confirm(&mut self, message: &str) -> bool;

    /// Ask for an image file
    fn pick_image(&mut self) -> Option<PathBuf>;
}

/// Prompt that answers from pre-queued replies and declines when empty
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompt {
    texts: VecDeque<String>,
    confirms: VecDeque<bool>,
    images: VecDeque<PathBuf>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_text(mut self, text: impl Into<String>) -> Self {
        self.texts.push_back(text.into());
        self
    }

    pub fn answer_confirm(mut self, yes: bool) -> Self {
        self.confirms.push_back(yes);
        self
    }

    pub fn answer_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.images.push_back(path.into());
        self
    }
}

impl Prompt for ScriptedPrompt {
    fn text(&mut self, message: &str) -> Option<String> {
        tracing::debug!("prompt: {}", message);
        self.texts.pop_front()
    }

    fn confirm(&mut self, message: &str) -> bool {
        tracing::debug!("confirm: {}", message);
        self.confirms.pop_front().unwrap_or(false)
    }

    fn pick_image(&mut self) -> Option<PathBuf> {
        self.images.pop_front()
    }
}
