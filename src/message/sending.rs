//! Optimistic send pipeline.
//!
//! A submitted draft is rendered immediately as a pending entry with a
//! locally-generated id, then reconciled against the durable write: replaced
//! by the confirmed record on success, removed (with the text handed back in
//! the error) on failure. Perceived send latency is zero; the composer never
//! waits on the network and never loses its text.

use std::sync::Arc;

use crate::message::types::{DeliveryStatus, Message, MessageKind};
use crate::shared::{Error, UiEvent};
use crate::util;
use crate::MessengerInner;

pub(crate) async fn send_message(
    inner: &Arc<MessengerInner>,
    conversation_id: &str,
    content: String,
) -> Result<Message, Error> {
    // Pending entry first, synchronously, before any I/O. The id is derived
    // from the current nanosecond so rapid sends stay independent.
    let pending_id = format!("pending-{}", util::now_nanos());
    let pending = Message {
        id: pending_id.clone(),
        conversation_id: conversation_id.to_string(),
        sender: inner.viewer_id.clone(),
        content: Some(content.clone()),
        kind: MessageKind::Text,
        status: DeliveryStatus::Sent,
        at: util::now_ms(),
        pending: true,
        failed: false,
        mine: true,
    };

    {
        let mut state = inner.state.lock().await;
        state.apply_own_send(&pending, inner.config.preview_len);
    }
    inner.emit(UiEvent::MessageNew {
        conversation_id: conversation_id.to_string(),
        message: pending.clone(),
    });

    let max_attempts = inner.config.max_send_attempts.max(1);
    let mut attempt = 0;
    let confirmed = loop {
        attempt += 1;
        match inner.backend.send_message(conversation_id, &content).await {
            Ok(confirmed) => break confirmed,
            Err(reason) if attempt < max_attempts => {
                log::warn!(
                    "[send] attempt {}/{} failed: {}",
                    attempt,
                    max_attempts,
                    reason
                );
                tokio::time::sleep(inner.config.send_retry_delay).await;
            }
            Err(reason) => {
                rollback(inner, conversation_id, &pending_id, &content).await;
                return Err(Error::Send { reason, content });
            }
        }
    };

    // Id-based reconciliation: the realtime echo may already have delivered
    // the confirmed row, in which case the pending entry is dropped.
    let message = {
        let mut state = inner.state.lock().await;
        state.confirm_pending(
            conversation_id,
            &pending_id,
            confirmed,
            inner.config.preview_len,
        )
    };
    inner.emit(UiEvent::MessageUpdate {
        conversation_id: conversation_id.to_string(),
        old_id: pending_id,
        message: message.clone(),
    });
    Ok(message)
}

/// Remove the pending entry and notify the frontend so the composer can be
/// restored with the failed text.
async fn rollback(inner: &Arc<MessengerInner>, conversation_id: &str, pending_id: &str, content: &str) {
    {
        let mut state = inner.state.lock().await;
        state.remove_pending(pending_id);
    }
    inner.emit(UiEvent::MessageFailed {
        conversation_id: conversation_id.to_string(),
        old_id: pending_id.to_string(),
        content: content.to_string(),
    });
}
