//! Message types and data structures.

use serde::{Deserialize, Serialize};

/// What a message carries.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

/// Delivery status as reported by the durable store.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    /// Durable id assigned on commit; a `pending-*` id while optimistic.
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    /// Text body; `None` for image and file messages.
    pub content: Option<String>,
    pub kind: MessageKind,
    pub status: DeliveryStatus,
    /// Creation time, Unix milliseconds.
    pub at: u64,
    pub pending: bool,
    pub failed: bool,
    pub mine: bool,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            id: String::new(),
            conversation_id: String::new(),
            sender: String::new(),
            content: None,
            kind: MessageKind::Text,
            status: DeliveryStatus::Sent,
            at: 0,
            pending: false,
            failed: false,
            mine: false,
        }
    }
}

impl Message {
    /// Whether this entry still carries a locally-generated temporary id.
    pub fn has_temp_id(&self) -> bool {
        self.id.starts_with("pending-")
    }

    /// Text used for conversation previews.
    pub fn preview_text(&self) -> &str {
        match self.kind {
            MessageKind::Text => self.content.as_deref().unwrap_or(""),
            MessageKind::Image => "Sent an image",
            MessageKind::File => "Sent a file",
        }
    }
}
