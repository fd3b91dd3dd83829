//! Inbound event routing.
//!
//! Normalizes realtime rows into state mutations and frontend notifications.
//! Both ingest paths dedup by id and are structured as replace-or-append
//! operations, so double delivery (the same row via the thread feed and the
//! global feed, or via a feed and the send confirmation) is harmless.

use std::sync::Arc;

use crate::shared::UiEvent;
use crate::{Message, MessengerInner};

/// Handle a row from the thread-scoped feed.
pub(crate) async fn handle_thread_event(inner: &Arc<MessengerInner>, mut message: Message) {
    // Wire rows carry no viewer-relative flags
    message.mine = message.sender == inner.viewer_id;
    let conversation_id = message.conversation_id.clone();

    let (added, outcome, conversation) = {
        let mut state = inner.state.lock().await;
        if state.open_conversation_id() != Some(conversation_id.as_str()) {
            // Late row for a conversation we already switched away from;
            // treat it like any other background message.
            drop(state);
            handle_global_event(inner, message).await;
            return;
        }
        let added = state.append_to_thread(message.clone());
        let outcome = state.apply_inbound_message(&message, inner.config.preview_len);
        let conversation = state.get_conversation(&conversation_id).cloned();
        (added, outcome, conversation)
    };

    if added {
        inner.emit(UiEvent::MessageNew {
            conversation_id: conversation_id.clone(),
            message,
        });
    }
    if let Some(conversation) = conversation {
        inner.emit(UiEvent::ConversationUpdate { conversation });
    }

    // The viewer is looking at this conversation: keep it read.
    if outcome.should_mark_read {
        inner.mark_read_inner(&conversation_id).await;
    }
}

/// Handle a row from the session-wide feed.
pub(crate) async fn handle_global_event(inner: &Arc<MessengerInner>, message: Message) {
    // The feed is system-wide; own echoes are filtered client-side
    if message.sender == inner.viewer_id {
        return;
    }

    let conversation_id = message.conversation_id.clone();
    let (outcome, conversation, total) = {
        let mut state = inner.state.lock().await;
        let outcome = state.apply_inbound_message(&message, inner.config.preview_len);
        let conversation = state.get_conversation(&conversation_id).cloned();
        let total = state.count_unread_messages();
        (outcome, conversation, total)
    };

    if !outcome.updated {
        return;
    }

    if let Some(conversation) = conversation {
        inner.emit(UiEvent::ConversationUpdate { conversation });
    }
    inner.emit(UiEvent::UnreadCount { total });

    if outcome.should_mark_read {
        inner.mark_read_inner(&conversation_id).await;
    }
}
