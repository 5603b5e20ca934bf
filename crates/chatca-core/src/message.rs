//! Inbound message model shared by every channel implementation

use serde::{Deserialize, Serialize};

/// Identifier of a message within a conversation
pub type MessageId = u64;

/// Authenticated identity of the user who sent a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Username, verified by the messaging service
    pub username: String,
    /// Name of the device the message was sent from
    pub device_name: String,
}

/// Body of an inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text body
    Text { body: String },
    /// Emoji reaction attached to another message
    Reaction { emoji: String, target: MessageId },
}

/// A message read from the channel subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message id
    pub id: MessageId,
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// Team name
    pub team: String,
    /// Channel (topic) name; empty for the team's default conversation
    pub channel: String,
    /// Authenticated sender
    pub sender: Sender,
    /// Text or reaction
    pub content: MessageContent,
}

impl InboundMessage {
    /// The text body, if this is a text message
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { body } => Some(body),
            MessageContent::Reaction { .. } => None,
        }
    }

    /// Channel name as an optional destination for replies
    pub fn channel_opt(&self) -> Option<&str> {
        if self.channel.is_empty() {
            None
        } else {
            Some(&self.channel)
        }
    }
}

/// Reference to a message that was just sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Id assigned to the sent message
    pub id: MessageId,
}
