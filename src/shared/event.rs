//! Typed notifications emitted to the frontend layer.
//!
//! The core never talks to a UI directly: every state change the interface
//! cares about is pushed over an unbounded channel as a [`UiEvent`].

use crate::{Conversation, Message};

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// A message was appended to the resident thread.
    MessageNew {
        conversation_id: String,
        message: Message,
    },
    /// An existing entry changed identity or status (pending to confirmed).
    MessageUpdate {
        conversation_id: String,
        old_id: String,
        message: Message,
    },
    /// A send failed and its pending entry was removed. `content` is the
    /// exact text to restore to the composer.
    MessageFailed {
        conversation_id: String,
        old_id: String,
        content: String,
    },
    /// A conversation's preview, ordering or unread count changed.
    ConversationUpdate { conversation: Conversation },
    /// Total unread across all conversations, for badge counts.
    UnreadCount { total: u32 },
}
