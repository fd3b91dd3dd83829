//! Realtime direct-messaging session core.
//!
//! [`Messenger`] owns the conversation list, one resident message [`Thread`],
//! and the live feeds that keep both current. Durable storage and the push
//! channel are abstracted behind [`MessagingBackend`]; the frontend receives
//! granular [`UiEvent`]s over a channel and renders from [`ChatState`]
//! snapshots.
//!
//! Sends are optimistic: a pending entry renders immediately and is later
//! reconciled with the confirmed record (or rolled back with the text handed
//! back for the composer). Unread counts and read markers follow the viewer's
//! open conversation and window focus.

mod backend;
mod chat;
mod message;
mod profile;
mod services;
mod shared;
mod state;
mod util;

pub use backend::{ConversationRecord, MessageFeed, MessagingBackend};
pub use chat::{Conversation, Participant, Thread};
pub use message::{DeliveryStatus, Message, MessageKind};
pub use profile::Profile;
pub use shared::{Error, UiEvent};
pub use state::ChatState;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use services::subscription_handler::{self, SubscriptionSet};

/// Tunables for a messaging session.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MessengerConfig {
    /// Maximum characters of a conversation preview before truncation.
    pub preview_len: usize,
    /// Total attempts for a durable send before giving up.
    pub max_send_attempts: u32,
    /// Pause between send attempts.
    pub send_retry_delay: Duration,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            preview_len: 120,
            max_send_attempts: 3,
            send_retry_delay: Duration::from_secs(2),
        }
    }
}

pub(crate) struct MessengerInner {
    pub(crate) viewer_id: String,
    pub(crate) backend: Arc<dyn MessagingBackend>,
    pub(crate) state: AsyncMutex<ChatState>,
    pub(crate) config: MessengerConfig,
    events: mpsc::UnboundedSender<UiEvent>,
    pub(crate) subs: std::sync::Mutex<SubscriptionSet>,
}

impl MessengerInner {
    /// Notify the frontend. A gone receiver just means no one is rendering.
    pub(crate) fn emit(&self, event: UiEvent) {
        let _ = self.events.send(event);
    }

    /// Zero the unread count locally, notify the frontend, then persist the
    /// read marker. Backend failure is non-fatal: the local count is already
    /// zero and the marker catches up on the next successful call.
    pub(crate) async fn mark_read_inner(&self, conversation_id: &str) -> bool {
        let (conversation, total) = {
            let mut state = self.state.lock().await;
            let now = util::now_ms();
            let conversation = state.mark_read_local(conversation_id, &self.viewer_id, now);
            (conversation, state.count_unread_messages())
        };
        let Some(conversation) = conversation else {
            return false;
        };

        self.emit(UiEvent::ConversationUpdate { conversation });
        self.emit(UiEvent::UnreadCount { total });

        if let Err(e) = self
            .backend
            .mark_conversation_read(conversation_id, &self.viewer_id)
            .await
        {
            log::warn!("[read] failed to persist read marker for {}: {}", conversation_id, e);
        }
        true
    }
}

/// Handle to one signed-in user's messaging session. Cheap to clone.
#[derive(Clone)]
pub struct Messenger {
    inner: Arc<MessengerInner>,
}

impl Messenger {
    /// Create a session for `viewer_id`. Returns the handle and the event
    /// channel the frontend should drain. No I/O happens until
    /// [`start`](Self::start) or [`load_conversations`](Self::load_conversations).
    pub fn new(
        viewer_id: &str,
        backend: Arc<dyn MessagingBackend>,
        config: MessengerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(MessengerInner {
            viewer_id: viewer_id.to_string(),
            backend,
            state: AsyncMutex::new(ChatState::new()),
            config,
            events,
            subs: std::sync::Mutex::new(SubscriptionSet::default()),
        });
        (Self { inner }, rx)
    }

    /// Establish the session-wide feed so background conversations stay
    /// current without being opened.
    pub async fn start(&self) -> Result<(), Error> {
        subscription_handler::start_global_feed(&self.inner).await
    }

    /// Load the viewer's conversation list, replacing the local one.
    pub async fn load_conversations(&self) -> Result<Vec<Conversation>, Error> {
        let records = self
            .inner
            .backend
            .fetch_conversations(&self.inner.viewer_id)
            .await
            .map_err(Error::Fetch)?;

        let total;
        let conversations = {
            let mut state = self.inner.state.lock().await;
            let mut conversations = Vec::with_capacity(records.len());
            for record in records {
                state.upsert_profile(record.other);
                conversations.push(record.conversation);
            }
            state.set_conversations(conversations);
            total = state.count_unread_messages();
            state.conversations().to_vec()
        };

        self.inner.emit(UiEvent::UnreadCount { total });
        Ok(conversations)
    }

    /// Open a conversation: scope the thread feed to it, load its history,
    /// and mark it read.
    ///
    /// If the user switches again before the history resolves, the late
    /// response is returned but not installed and the conversation is not
    /// marked read.
    pub async fn open_conversation(&self, conversation_id: &str) -> Result<Vec<Message>, Error> {
        let generation = {
            let mut state = self.inner.state.lock().await;
            state.begin_open(conversation_id)
        };

        // History still renders if the live feed cannot be established
        if let Err(e) = subscription_handler::open_thread_feed(&self.inner, conversation_id).await {
            log::warn!("[ingest] thread feed unavailable for {}: {}", conversation_id, e);
        }

        let mut messages = self
            .inner
            .backend
            .fetch_messages(conversation_id)
            .await
            .map_err(Error::Fetch)?;
        for message in &mut messages {
            message.mine = message.sender == self.inner.viewer_id;
        }

        let installed = {
            let mut state = self.inner.state.lock().await;
            state.install_thread(conversation_id, messages.clone(), generation)
        };
        if !installed {
            log::debug!("[thread] discarding stale history for {}", conversation_id);
            return Ok(messages);
        }

        self.inner.mark_read_inner(conversation_id).await;
        Ok(messages)
    }

    /// Close the open conversation, evicting its thread and feed.
    pub async fn close_conversation(&self) {
        subscription_handler::close_thread_feed(&self.inner);
        let mut state = self.inner.state.lock().await;
        state.close_thread();
    }

    /// Track window focus. Regaining focus with a conversation open marks it
    /// read, since the viewer is now actually looking at it.
    pub async fn set_focused(&self, focused: bool) {
        let open_unread = {
            let mut state = self.inner.state.lock().await;
            state.focused = focused;
            state
                .open_conversation_id()
                .map(str::to_string)
                .filter(|id| {
                    state
                        .get_conversation(id)
                        .is_some_and(|c| c.unread_count > 0)
                })
        };
        if focused {
            if let Some(conversation_id) = open_unread {
                self.inner.mark_read_inner(&conversation_id).await;
            }
        }
    }

    /// Send a text message optimistically. On success the confirmed record is
    /// returned; on failure the error carries the text for the composer.
    pub async fn send_message(&self, conversation_id: &str, content: &str) -> Result<Message, Error> {
        message::send_message(&self.inner, conversation_id, content.to_string()).await
    }

    /// Start (or resume) a direct conversation with another user. Idempotent:
    /// the backend returns the existing conversation id for a known pair.
    pub async fn start_conversation(&self, other_user_id: &str) -> Result<String, Error> {
        let conversation_id = self
            .inner
            .backend
            .create_conversation(&self.inner.viewer_id, other_user_id)
            .await
            .map_err(Error::Conversation)?;

        let conversation = {
            let mut state = self.inner.state.lock().await;
            state.ensure_direct_conversation(&conversation_id, &self.inner.viewer_id, other_user_id);
            state.get_conversation(&conversation_id).cloned()
        };
        if let Some(conversation) = conversation {
            self.inner.emit(UiEvent::ConversationUpdate { conversation });
        }
        Ok(conversation_id)
    }

    /// Profile search for the new-conversation picker.
    pub async fn search_users(&self, query: &str) -> Result<Vec<Profile>, Error> {
        self.inner.backend.search_users(query).await.map_err(Error::Fetch)
    }

    /// Explicitly mark a conversation read. Returns false if it is unknown.
    pub async fn mark_read(&self, conversation_id: &str) -> bool {
        self.inner.mark_read_inner(conversation_id).await
    }

    /// Unread messages summed across all conversations.
    pub async fn unread_total(&self) -> u32 {
        self.inner.state.lock().await.count_unread_messages()
    }

    /// A point-in-time copy of the full session state, for rendering.
    pub async fn snapshot(&self) -> ChatState {
        self.inner.state.lock().await.clone()
    }

    /// Tear down every live feed. The handle stays usable for fetches.
    pub fn shutdown(&self) {
        subscription_handler::shutdown(&self.inner);
    }
}
