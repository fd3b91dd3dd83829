use serde::{Deserialize, Serialize};

use crate::util::truncate_preview;
use crate::Message;

/// A conversation member together with their conversation-level read marker.
///
/// Read receipts are tracked here rather than per-message to avoid write
/// amplification: a message counts as read once the reader's marker passes it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Participant {
    pub user_id: String,
    /// Unix ms of the newest point this participant has read up to.
    pub last_read_at: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<Participant>,
    /// Truncated text of the newest message.
    pub last_message: Option<String>,
    pub last_message_at: u64,
    /// Unread count for the signed-in viewer.
    pub unread_count: u32,
    pub created_at: u64,
}

impl Conversation {
    /// Create a direct conversation between the viewer and one other user.
    pub fn new_direct(id: String, viewer_id: &str, other_id: &str) -> Self {
        Self {
            id,
            participants: vec![
                Participant {
                    user_id: viewer_id.to_string(),
                    last_read_at: 0,
                },
                Participant {
                    user_id: other_id.to_string(),
                    last_read_at: 0,
                },
            ],
            last_message: None,
            last_message_at: 0,
            unread_count: 0,
            created_at: crate::util::now_ms(),
        }
    }

    /// Get the other participant's id for direct conversations.
    pub fn other_participant(&self, viewer_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.user_id != viewer_id)
            .map(|p| p.user_id.as_str())
    }

    pub fn participant_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    /// Update the preview from a newly arrived message.
    pub(crate) fn apply_preview(&mut self, message: &Message, max_chars: usize) {
        self.last_message = Some(truncate_preview(message.preview_text(), max_chars));
        if message.at > self.last_message_at {
            self.last_message_at = message.at;
        }
    }

    /// Zero the viewer's unread count and advance their read marker to `now`.
    pub(crate) fn mark_read_local(&mut self, viewer_id: &str, now: u64) {
        self.unread_count = 0;
        if let Some(participant) = self.participant_mut(viewer_id) {
            if now > participant.last_read_at {
                participant.last_read_at = now;
            }
        }
    }
}

/// The single resident message thread.
///
/// Only one conversation's messages are held in memory at a time; switching
/// conversations replaces the whole thread. Rendered order is creation-time
/// order, enforced on insert, never trusted from network arrival order.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Thread {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

impl Thread {
    /// Build a thread from a freshly fetched history, sorting and deduping
    /// whatever order the collaborator returned.
    pub fn new(conversation_id: String, messages: Vec<Message>) -> Self {
        let mut thread = Self {
            conversation_id,
            messages: Vec::with_capacity(messages.len()),
        };
        for message in messages {
            thread.internal_add_message(message);
        }
        thread
    }

    pub fn get_message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Add a message to this thread, keeping ascending timestamp order.
    ///
    /// This method internally checks for and avoids duplicate messages.
    pub fn internal_add_message(&mut self, message: Message) -> bool {
        // Make sure we don't add the same message twice
        if self.messages.iter().any(|m| m.id == message.id) {
            // Message is already known by the state
            return false;
        }

        // Fast path for common cases: newest or oldest messages
        if self.messages.is_empty() {
            // First message
            self.messages.push(message);
        } else if message.at >= self.messages.last().unwrap().at {
            // Common case 1: Latest message (append to end)
            self.messages.push(message);
        } else if message.at <= self.messages.first().unwrap().at {
            // Common case 2: Oldest message (insert at beginning)
            self.messages.insert(0, message);
        } else {
            // Less common case: Message belongs somewhere in the middle
            self.messages.insert(
                self.messages
                    .binary_search_by(|m| m.at.cmp(&message.at))
                    .unwrap_or_else(|idx| idx),
                message,
            );
        }
        true
    }

    /// Remove an optimistic entry by its temporary id.
    pub fn remove_pending(&mut self, temp_id: &str) -> Option<Message> {
        self.messages
            .iter()
            .position(|m| m.id == temp_id && m.pending)
            .map(|idx| self.messages.remove(idx))
    }

    /// Swap a pending entry for its confirmed record, preserving order.
    ///
    /// If the realtime echo already delivered the confirmed id, the pending
    /// entry is dropped instead of replaced, so the thread never renders both.
    pub(crate) fn confirm_pending(&mut self, temp_id: &str, confirmed: Message) -> Message {
        if self.messages.iter().any(|m| m.id == confirmed.id) {
            // Echo won the race
            self.remove_pending(temp_id);
            return self
                .get_message(&confirmed.id)
                .cloned()
                .unwrap_or(confirmed);
        }
        self.remove_pending(temp_id);
        self.internal_add_message(confirmed.clone());
        confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{DeliveryStatus, MessageKind};

    fn msg(id: &str, at: u64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "conv-1".to_string(),
            sender: "u-other".to_string(),
            content: Some(format!("message {}", id)),
            kind: MessageKind::Text,
            status: DeliveryStatus::Sent,
            at,
            pending: false,
            failed: false,
            mine: false,
        }
    }

    #[test]
    fn test_thread_orders_by_timestamp_regardless_of_arrival() {
        let mut thread = Thread::new("conv-1".to_string(), Vec::new());
        thread.internal_add_message(msg("c", 300));
        thread.internal_add_message(msg("a", 100));
        thread.internal_add_message(msg("b", 200));

        let order: Vec<&str> = thread.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_thread_new_sorts_and_dedups_fetched_history() {
        let thread = Thread::new(
            "conv-1".to_string(),
            vec![msg("b", 200), msg("a", 100), msg("b", 200)],
        );
        let order: Vec<&str> = thread.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_id_inserted_once() {
        let mut thread = Thread::new("conv-1".to_string(), Vec::new());
        assert!(thread.internal_add_message(msg("a", 100)));
        assert!(!thread.internal_add_message(msg("a", 100)));
        assert_eq!(thread.messages.len(), 1);
    }

    #[test]
    fn test_remove_pending_only_removes_pending_entries() {
        let mut thread = Thread::new("conv-1".to_string(), vec![msg("a", 100)]);
        let mut pending = msg("pending-1", 200);
        pending.pending = true;
        thread.internal_add_message(pending);

        // A confirmed id is never removed through the rollback path
        assert!(thread.remove_pending("a").is_none());
        assert!(thread.remove_pending("pending-1").is_some());
        assert_eq!(thread.messages.len(), 1);
    }

    #[test]
    fn test_confirm_pending_replaces_in_place() {
        let mut thread = Thread::new("conv-1".to_string(), Vec::new());
        let mut pending = msg("pending-1", 200);
        pending.pending = true;
        pending.mine = true;
        thread.internal_add_message(pending);

        let mut confirmed = msg("msg-9", 201);
        confirmed.mine = true;
        thread.confirm_pending("pending-1", confirmed);

        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].id, "msg-9");
        assert!(!thread.messages[0].pending);
    }

    #[test]
    fn test_confirm_pending_when_echo_arrived_first() {
        let mut thread = Thread::new("conv-1".to_string(), Vec::new());
        let mut pending = msg("pending-1", 200);
        pending.pending = true;
        thread.internal_add_message(pending);

        // Realtime echo lands before the send call returns
        thread.internal_add_message(msg("msg-9", 201));
        thread.confirm_pending("pending-1", msg("msg-9", 201));

        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].id, "msg-9");
    }

    #[test]
    fn test_other_participant() {
        let conversation = Conversation::new_direct("conv-1".to_string(), "u-me", "u-them");
        assert_eq!(conversation.other_participant("u-me"), Some("u-them"));
        assert_eq!(conversation.other_participant("u-them"), Some("u-me"));
    }

    #[test]
    fn test_apply_preview_truncates_and_advances_timestamp() {
        let mut conversation = Conversation::new_direct("conv-1".to_string(), "u-me", "u-them");
        let mut message = msg("a", 500);
        message.content = Some("x".repeat(300));
        conversation.apply_preview(&message, 120);

        assert_eq!(conversation.last_message_at, 500);
        assert_eq!(conversation.last_message.as_ref().unwrap().chars().count(), 121);

        // An older message never rolls the activity timestamp back
        conversation.apply_preview(&msg("b", 400), 120);
        assert_eq!(conversation.last_message_at, 500);
    }
}
