//! ChatState struct and methods for managing messaging state.
//!
//! This module contains the core state management for profiles, the
//! conversation list, and the single resident message thread.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::chat::{Conversation, Thread};
use crate::profile::Profile;
use crate::Message;

/// Outcome of routing an inbound realtime message into the store.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct InboundOutcome {
    /// The conversation was known locally and its entry was updated.
    pub updated: bool,
    /// The message targets the open, focused conversation: unread stays at
    /// zero and a mark-read side effect should fire instead.
    pub should_mark_read: bool,
}

/// Core messaging state: profiles, the viewer's conversation list, and the
/// resident thread.
///
/// Mutated from two sources (explicit user actions and realtime push), so
/// every mutation is id-keyed replace-or-append and tolerates double
/// delivery.
#[derive(Serialize, Clone, Debug)]
pub struct ChatState {
    pub(crate) profiles: Vec<Profile>,
    pub(crate) conversations: Vec<Conversation>,
    pub(crate) thread: Option<Thread>,
    pub(crate) open_conversation: Option<String>,
    pub(crate) focused: bool,
    /// Bumped on every conversation switch; a thread load tagged with an
    /// older value is discarded instead of installed.
    #[serde(skip)]
    pub(crate) thread_generation: u64,
    /// Ids of inbound rows already routed, per conversation. The same row can
    /// arrive on both feeds or be redelivered by the transport; unread
    /// accounting must never observe it twice.
    #[serde(skip)]
    seen_inbound: HashMap<String, HashSet<String>>,
}

impl ChatState {
    /// Create a new empty ChatState
    pub fn new() -> Self {
        Self {
            profiles: Vec::new(),
            conversations: Vec::new(),
            thread: None,
            open_conversation: None,
            focused: true,
            thread_generation: 0,
            seen_inbound: HashMap::new(),
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.thread.as_ref()
    }

    pub fn open_conversation_id(&self) -> Option<&str> {
        self.open_conversation.as_deref()
    }

    /// Get a conversation by ID
    pub fn get_conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Get a mutable conversation by ID
    pub fn get_conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    /// Get a profile by ID
    pub fn get_profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Replace-or-insert a profile summary.
    pub fn upsert_profile(&mut self, profile: Profile) {
        if let Some(position) = self.profiles.iter().position(|p| p.id == profile.id) {
            self.profiles[position] = profile;
        } else {
            self.profiles.push(profile);
        }
    }

    /// Replace the conversation list wholesale from a collaborator fetch.
    pub(crate) fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
        self.sort_conversations();
    }

    /// Create the local entry for a direct conversation if it is missing.
    /// Idempotent: an existing entry is left untouched.
    pub(crate) fn ensure_direct_conversation(&mut self, id: &str, viewer_id: &str, other_id: &str) {
        if self.get_conversation(id).is_none() {
            self.conversations
                .push(Conversation::new_direct(id.to_string(), viewer_id, other_id));
            self.sort_conversations();
        }
    }

    /// Sort conversation positions by last message time, newest first.
    pub(crate) fn sort_conversations(&mut self) {
        self.conversations
            .sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    }

    /// Begin switching the open conversation; returns the generation token
    /// the eventual thread install must present.
    pub(crate) fn begin_open(&mut self, conversation_id: &str) -> u64 {
        self.thread_generation += 1;
        self.open_conversation = Some(conversation_id.to_string());
        self.thread_generation
    }

    /// Install a freshly loaded thread, replacing any resident one.
    ///
    /// Returns false when the load is stale (the user already switched away)
    /// and was discarded.
    pub(crate) fn install_thread(
        &mut self,
        conversation_id: &str,
        messages: Vec<Message>,
        generation: u64,
    ) -> bool {
        if generation != self.thread_generation
            || self.open_conversation.as_deref() != Some(conversation_id)
        {
            return false;
        }
        self.thread = Some(Thread::new(conversation_id.to_string(), messages));
        true
    }

    /// Evict the resident thread and clear the open marker.
    pub(crate) fn close_thread(&mut self) {
        self.thread_generation += 1;
        self.open_conversation = None;
        self.thread = None;
    }

    /// Append to the resident thread if the message belongs to it.
    pub(crate) fn append_to_thread(&mut self, message: Message) -> bool {
        match self.thread.as_mut() {
            Some(thread) if thread.conversation_id == message.conversation_id => {
                thread.internal_add_message(message)
            }
            _ => false,
        }
    }

    /// Remove an optimistic entry from the resident thread.
    pub(crate) fn remove_pending(&mut self, temp_id: &str) -> Option<Message> {
        self.thread.as_mut()?.remove_pending(temp_id)
    }

    /// Reconcile a pending entry with its confirmed record and refresh the
    /// conversation preview.
    pub(crate) fn confirm_pending(
        &mut self,
        conversation_id: &str,
        temp_id: &str,
        confirmed: Message,
        preview_len: usize,
    ) -> Message {
        let message = match self.thread.as_mut() {
            Some(thread) if thread.conversation_id == conversation_id => {
                thread.confirm_pending(temp_id, confirmed)
            }
            // Thread switched away meanwhile; nothing resident to fix up
            _ => confirmed,
        };
        if let Some(conversation) = self.get_conversation_mut(conversation_id) {
            conversation.apply_preview(&message, preview_len);
        }
        self.sort_conversations();
        message
    }

    /// Append the viewer's own optimistic message and refresh the preview.
    pub(crate) fn apply_own_send(&mut self, message: &Message, preview_len: usize) {
        self.append_to_thread(message.clone());
        if let Some(conversation) = self.get_conversation_mut(&message.conversation_id) {
            conversation.apply_preview(message, preview_len);
        }
        self.sort_conversations();
    }

    /// Route an inbound realtime message into the conversation list.
    ///
    /// Idempotent per message id: a redelivered row, or the same row arriving
    /// on both feeds, mutates the unread count exactly once. Unknown
    /// conversation ids are a no-op; the list becomes consistent again on the
    /// next explicit reload.
    pub(crate) fn apply_inbound_message(
        &mut self,
        message: &Message,
        preview_len: usize,
    ) -> InboundOutcome {
        if self.get_conversation(&message.conversation_id).is_none() {
            log::debug!(
                "[ingest] message {} for unknown conversation {}, ignoring",
                message.id,
                message.conversation_id
            );
            return InboundOutcome::default();
        }

        let is_open = self.open_conversation.as_deref() == Some(message.conversation_id.as_str());
        let focused = self.focused;

        // Unread accounting is keyed by message id: a row only affects the
        // count the first time it is routed, whichever feed delivered it
        let first_delivery = !message.mine
            && self
                .seen_inbound
                .entry(message.conversation_id.clone())
                .or_default()
                .insert(message.id.clone());

        let mut should_mark_read = false;
        if let Some(conversation) = self.get_conversation_mut(&message.conversation_id) {
            conversation.apply_preview(message, preview_len);
            if first_delivery {
                if is_open && focused {
                    conversation.unread_count = 0;
                    should_mark_read = true;
                } else {
                    conversation.unread_count += 1;
                }
            }
        }

        self.sort_conversations();
        InboundOutcome {
            updated: true,
            should_mark_read,
        }
    }

    /// Count unread messages across all conversations
    pub fn count_unread_messages(&self) -> u32 {
        self.conversations.iter().map(|c| c.unread_count).sum()
    }

    /// Zero the local unread count and advance the viewer's read marker.
    /// Returns the updated conversation for emission, if known.
    pub(crate) fn mark_read_local(
        &mut self,
        conversation_id: &str,
        viewer_id: &str,
        now: u64,
    ) -> Option<Conversation> {
        let conversation = self.get_conversation_mut(conversation_id)?;
        conversation.mark_read_local(viewer_id, now);
        Some(conversation.clone())
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}
