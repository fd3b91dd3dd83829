//! Collaborator contract for the durable messaging backend.
//!
//! The core never touches the transport: persistence, auth, and the push
//! channel all live behind this trait. Errors are plain strings at this
//! boundary; the [`Messenger`](crate::Messenger) maps them into the public
//! taxonomy at each call site.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::{Conversation, Message, Profile};

/// Push feed of newly inserted message rows.
///
/// Dropping the stream (or aborting the task consuming it) unsubscribes.
pub type MessageFeed = BoxStream<'static, Message>;

/// A conversation row as returned by the backend, with the other
/// participant's public summary and the viewer's unread count embedded.
#[derive(Clone, Debug)]
pub struct ConversationRecord {
    pub conversation: Conversation,
    pub other: Profile,
}

#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// All conversations the viewer participates in.
    async fn fetch_conversations(
        &self,
        viewer_id: &str,
    ) -> Result<Vec<ConversationRecord>, String>;

    /// Full message history for one conversation, ascending by creation time.
    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, String>;

    /// Durable write; assigns the real id and timestamp.
    async fn send_message(&self, conversation_id: &str, content: &str) -> Result<Message, String>;

    /// Idempotent per participant pair: re-initiating between the same two
    /// users returns the existing conversation id.
    async fn create_conversation(
        &self,
        viewer_id: &str,
        other_user_id: &str,
    ) -> Result<String, String>;

    async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        viewer_id: &str,
    ) -> Result<(), String>;

    /// Profile search for starting new conversations.
    async fn search_users(&self, query: &str) -> Result<Vec<Profile>, String>;

    /// Feed of new message rows in a single conversation.
    async fn subscribe_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<MessageFeed, String>;

    /// Feed of every new message row visible to the viewer, across
    /// conversations. Own echoes are filtered by the ingest layer.
    async fn subscribe_all_messages(&self) -> Result<MessageFeed, String>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backend double: scripted data, call counters, and manually
    //! driven push feeds.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::message::{DeliveryStatus, MessageKind};
    use crate::util;

    pub(crate) struct MockBackend {
        pub viewer_id: String,
        pub records: Mutex<Vec<ConversationRecord>>,
        pub messages: Mutex<HashMap<String, Vec<Message>>>,
        pub profiles: Mutex<Vec<Profile>>,
        /// Per-conversation artificial latency for `fetch_messages`.
        pub fetch_delays: Mutex<HashMap<String, Duration>>,
        pub fail_send: AtomicBool,
        pub fail_fetch: AtomicBool,
        pub mark_read_calls: Mutex<Vec<String>>,
        pub thread_subscribes: AtomicU64,
        next_id: AtomicU64,
        pair_ids: Mutex<HashMap<(String, String), String>>,
        thread_feed: Mutex<Option<(String, mpsc::UnboundedSender<Message>)>>,
        global_feed: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    }

    impl MockBackend {
        pub fn new(viewer_id: &str) -> Self {
            Self {
                viewer_id: viewer_id.to_string(),
                records: Mutex::new(Vec::new()),
                messages: Mutex::new(HashMap::new()),
                profiles: Mutex::new(Vec::new()),
                fetch_delays: Mutex::new(HashMap::new()),
                fail_send: AtomicBool::new(false),
                fail_fetch: AtomicBool::new(false),
                mark_read_calls: Mutex::new(Vec::new()),
                thread_subscribes: AtomicU64::new(0),
                next_id: AtomicU64::new(0),
                pair_ids: Mutex::new(HashMap::new()),
                thread_feed: Mutex::new(None),
                global_feed: Mutex::new(None),
            }
        }

        pub fn add_record(&self, conversation: Conversation, other: Profile) {
            self.records
                .lock()
                .unwrap()
                .push(ConversationRecord { conversation, other });
        }

        pub fn set_messages(&self, conversation_id: &str, messages: Vec<Message>) {
            self.messages
                .lock()
                .unwrap()
                .insert(conversation_id.to_string(), messages);
        }

        /// Push a row into the currently scoped thread feed, if any.
        pub fn push_thread_event(&self, message: Message) -> bool {
            match self.thread_feed.lock().unwrap().as_ref() {
                Some((_, tx)) => tx.send(message).is_ok(),
                None => false,
            }
        }

        /// Push a row into the global feed, if subscribed.
        pub fn push_global_event(&self, message: Message) -> bool {
            match self.global_feed.lock().unwrap().as_ref() {
                Some(tx) => tx.send(message).is_ok(),
                None => false,
            }
        }

        /// Which conversation the thread feed is currently scoped to.
        pub fn thread_feed_scope(&self) -> Option<String> {
            self.thread_feed
                .lock()
                .unwrap()
                .as_ref()
                .map(|(id, _)| id.clone())
        }

        fn assign_id(&self) -> String {
            format!("msg-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
        }
    }

    fn feed_from(rx: mpsc::UnboundedReceiver<Message>) -> MessageFeed {
        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        }))
    }

    #[async_trait]
    impl MessagingBackend for MockBackend {
        async fn fetch_conversations(
            &self,
            _viewer_id: &str,
        ) -> Result<Vec<ConversationRecord>, String> {
            if self.fail_fetch.load(Ordering::Relaxed) {
                return Err("backend offline".to_string());
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, String> {
            let delay = self
                .fetch_delays
                .lock()
                .unwrap()
                .get(conversation_id)
                .copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_fetch.load(Ordering::Relaxed) {
                return Err("backend offline".to_string());
            }
            Ok(self
                .messages
                .lock()
                .unwrap()
                .get(conversation_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn send_message(
            &self,
            conversation_id: &str,
            content: &str,
        ) -> Result<Message, String> {
            if self.fail_send.load(Ordering::Relaxed) {
                return Err("relay refused the write".to_string());
            }
            let confirmed = Message {
                id: self.assign_id(),
                conversation_id: conversation_id.to_string(),
                sender: self.viewer_id.clone(),
                content: Some(content.to_string()),
                kind: MessageKind::Text,
                status: DeliveryStatus::Sent,
                at: util::now_ms(),
                pending: false,
                failed: false,
                mine: true,
            };
            self.messages
                .lock()
                .unwrap()
                .entry(conversation_id.to_string())
                .or_default()
                .push(confirmed.clone());
            Ok(confirmed)
        }

        async fn create_conversation(
            &self,
            viewer_id: &str,
            other_user_id: &str,
        ) -> Result<String, String> {
            // Pair key is order-independent, matching the idempotency contract
            let pair = if viewer_id <= other_user_id {
                (viewer_id.to_string(), other_user_id.to_string())
            } else {
                (other_user_id.to_string(), viewer_id.to_string())
            };
            let mut pair_ids = self.pair_ids.lock().unwrap();
            if let Some(existing) = pair_ids.get(&pair) {
                return Ok(existing.clone());
            }
            let id = format!("conv-{}", pair_ids.len() + 1);
            pair_ids.insert(pair, id.clone());
            Ok(id)
        }

        async fn mark_conversation_read(
            &self,
            conversation_id: &str,
            _viewer_id: &str,
        ) -> Result<(), String> {
            self.mark_read_calls
                .lock()
                .unwrap()
                .push(conversation_id.to_string());
            Ok(())
        }

        async fn search_users(&self, query: &str) -> Result<Vec<Profile>, String> {
            Ok(self
                .profiles
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.name.contains(query) || p.id.contains(query))
                .cloned()
                .collect())
        }

        async fn subscribe_conversation_messages(
            &self,
            conversation_id: &str,
        ) -> Result<MessageFeed, String> {
            self.thread_subscribes.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = mpsc::unbounded_channel();
            // Scoping to a new conversation replaces the previous feed
            *self.thread_feed.lock().unwrap() = Some((conversation_id.to_string(), tx));
            Ok(feed_from(rx))
        }

        async fn subscribe_all_messages(&self) -> Result<MessageFeed, String> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.global_feed.lock().unwrap() = Some(tx);
            Ok(feed_from(rx))
        }
    }

    /// Shorthand for an inbound message row from another user.
    pub(crate) fn inbound(id: &str, conversation_id: &str, sender: &str, text: &str, at: u64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            sender: sender.to_string(),
            content: Some(text.to_string()),
            kind: MessageKind::Text,
            status: DeliveryStatus::Sent,
            at,
            pending: false,
            failed: false,
            mine: false,
        }
    }
}
