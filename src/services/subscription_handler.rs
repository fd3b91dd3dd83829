//! Live feed lifecycle.
//!
//! Two feeds, both required by the delivery contract: a session-stable global
//! feed routing into the conversation list, and a thread-scoped feed that is
//! torn down and recreated whenever the open conversation changes. Feed tasks
//! hold only a weak reference to the session, so they never keep it alive;
//! `shutdown()` aborts them outright, while a task orphaned by dropping the
//! last [`Messenger`](crate::Messenger) clone exits on its next feed item.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::event_handler;
use crate::shared::Error;
use crate::MessengerInner;

#[derive(Default)]
pub(crate) struct SubscriptionSet {
    pub(crate) global: Option<JoinHandle<()>>,
    pub(crate) thread: Option<(String, JoinHandle<()>)>,
}

/// Establish the session-wide feed. Replaces any previous one.
pub(crate) async fn start_global_feed(inner: &Arc<MessengerInner>) -> Result<(), Error> {
    let mut feed = inner
        .backend
        .subscribe_all_messages()
        .await
        .map_err(Error::Subscription)?;

    let weak = Arc::downgrade(inner);
    let handle = tokio::spawn(async move {
        while let Some(message) = feed.next().await {
            let Some(inner) = weak.upgrade() else { break };
            event_handler::handle_global_event(&inner, message).await;
        }
        log::debug!("[ingest] global feed closed");
    });

    if let Some(old) = inner.subs.lock().unwrap().global.replace(handle) {
        old.abort();
    }
    Ok(())
}

/// Scope the thread feed to `conversation_id`, tearing down the previous one.
pub(crate) async fn open_thread_feed(
    inner: &Arc<MessengerInner>,
    conversation_id: &str,
) -> Result<(), Error> {
    close_thread_feed(inner);

    let mut feed = inner
        .backend
        .subscribe_conversation_messages(conversation_id)
        .await
        .map_err(Error::Subscription)?;

    // The user may have switched again while the subscribe call was in
    // flight; a feed for a stale conversation must not replace theirs.
    let still_open = {
        let state = inner.state.lock().await;
        state.open_conversation_id() == Some(conversation_id)
    };
    if !still_open {
        log::debug!("[ingest] discarding stale thread feed for {}", conversation_id);
        return Ok(());
    }

    let weak = Arc::downgrade(inner);
    let handle = tokio::spawn(async move {
        while let Some(message) = feed.next().await {
            let Some(inner) = weak.upgrade() else { break };
            event_handler::handle_thread_event(&inner, message).await;
        }
    });

    let mut subs = inner.subs.lock().unwrap();
    if let Some((_, old)) = subs.thread.replace((conversation_id.to_string(), handle)) {
        old.abort();
    }
    Ok(())
}

/// Tear down the thread feed, if any.
pub(crate) fn close_thread_feed(inner: &Arc<MessengerInner>) {
    if let Some((_, handle)) = inner.subs.lock().unwrap().thread.take() {
        handle.abort();
    }
}

/// Tear down every live feed. Idempotent.
pub(crate) fn shutdown(inner: &Arc<MessengerInner>) {
    let mut subs = inner.subs.lock().unwrap();
    if let Some(handle) = subs.global.take() {
        handle.abort();
    }
    if let Some((_, handle)) = subs.thread.take() {
        handle.abort();
    }
}
