//! Scripted generator for deterministic tests.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use super::{AiError, GenerationParams, TextGenerator};

pub enum Reply {
    Text(String),
    Status(u16),
}

/// Replays queued replies in order; once the queue is empty every call
/// answers with HTTP 500.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Text(text.into()));
        self
    }

    pub fn with_status(self, status: u16) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Status(status));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn next(&self, prompt: &str) -> Result<String, AiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Status(status)) => Err(AiError::Status {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Err(AiError::Status {
                status: 500,
                message: "no scripted reply".to_string(),
            }),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _params: GenerationParams) -> Result<String, AiError> {
        self.next(prompt)
    }

    async fn describe_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        instruction: &str,
    ) -> Result<String, AiError> {
        self.next(instruction)
    }
}
