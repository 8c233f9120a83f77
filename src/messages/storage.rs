use super::types::Message;
use crate::speech::client::BotReply;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// In-memory conversation history, shared between the controller and readers
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn add(&self, message: Message) {
        self.messages.write().push(message);
    }

    /// Append the user and assistant entries for one completed turn
    pub fn record_turn(&self, reply: &BotReply) {
        let user = Message::user(reply.transcription.clone());
        let assistant =
            Message::assistant(reply.response_text.clone()).with_audio_url(reply.audio_url.clone());

        let mut messages = self.messages.write();
        messages.push(user);
        messages.push(assistant);
        debug!("Conversation now has {} messages", messages.len());
    }

    pub fn get_all(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
