//! In-memory fake transport shared by the pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{ChatHandle, FetchedMessage, MediaRef, TelegramApi, TopicInfo};
use crate::error::{ForwardError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SentRecord {
    pub chat_id: i64,
    pub topic_id: Option<i32>,
    pub text: String,
    pub media: Vec<MediaRef>,
}

/// Records every call and serves canned chats/messages. Unknown numeric chat
/// identifiers resolve to a handle titled `Chat <id>` so tests only need to
/// seed chats whose metadata matters.
#[derive(Default)]
pub struct FakeApi {
    chats: Mutex<HashMap<String, ChatHandle>>,
    messages: Mutex<HashMap<(i64, i32), FetchedMessage>>,
    failing_resolves: Mutex<HashSet<String>>,
    failing_sends: Mutex<HashSet<i64>>,
    fetch_counts: Mutex<HashMap<(i64, i32), usize>>,
    resolve_calls: Mutex<usize>,
    topic_calls: Mutex<usize>,
    sends: Mutex<Vec<SentRecord>>,
    next_id: AtomicI32,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1000),
            ..Default::default()
        }
    }

    pub async fn add_chat(&self, identifier: &str, handle: ChatHandle) {
        self.chats.lock().await.insert(identifier.to_string(), handle);
    }

    pub async fn add_message(&self, message: FetchedMessage) {
        self.messages
            .lock()
            .await
            .insert((message.chat_id, message.id), message);
    }

    pub async fn fail_resolve(&self, identifier: &str) {
        self.failing_resolves
            .lock()
            .await
            .insert(identifier.to_string());
    }

    pub async fn fail_send_to(&self, chat_id: i64) {
        self.failing_sends.lock().await.insert(chat_id);
    }

    pub async fn resolve_calls(&self) -> usize {
        *self.resolve_calls.lock().await
    }

    pub async fn topic_calls(&self) -> usize {
        *self.topic_calls.lock().await
    }

    pub async fn fetch_count(&self, chat_id: i64, message_id: i32) -> usize {
        self.fetch_counts
            .lock()
            .await
            .get(&(chat_id, message_id))
            .copied()
            .unwrap_or(0)
    }

    pub async fn sends(&self) -> Vec<SentRecord> {
        self.sends.lock().await.clone()
    }
}

#[async_trait]
impl TelegramApi for FakeApi {
    async fn fetch_message(&self, chat_id: i64, message_id: i32) -> Result<FetchedMessage> {
        *self
            .fetch_counts
            .lock()
            .await
            .entry((chat_id, message_id))
            .or_insert(0) += 1;
        self.messages
            .lock()
            .await
            .get(&(chat_id, message_id))
            .cloned()
            .ok_or(ForwardError::NotFound {
                chat_id,
                message_id,
            })
    }

    async fn resolve_chat(&self, identifier: &str) -> Result<ChatHandle> {
        *self.resolve_calls.lock().await += 1;
        if self.failing_resolves.lock().await.contains(identifier) {
            return Err(ForwardError::Resolution {
                identifier: identifier.to_string(),
                reason: "not found".to_string(),
            });
        }
        if let Some(handle) = self.chats.lock().await.get(identifier) {
            return Ok(handle.clone());
        }
        match identifier.parse::<i64>() {
            Ok(id) => Ok(ChatHandle {
                id,
                title: Some(format!("Chat {}", id)),
                username: None,
            }),
            Err(_) => Err(ForwardError::Resolution {
                identifier: identifier.to_string(),
                reason: "unknown identifier".to_string(),
            }),
        }
    }

    async fn resolve_topic_info(&self, _chat_id: i64, topic_id: i32) -> Result<TopicInfo> {
        *self.topic_calls.lock().await += 1;
        Ok(TopicInfo {
            id: topic_id,
            title: Some(format!("Topic {}", topic_id)),
        })
    }

    async fn send_message(
        &self,
        chat_id: i64,
        topic_id: Option<i32>,
        text: &str,
        media: &[MediaRef],
    ) -> Result<i32> {
        if self.failing_sends.lock().await.contains(&chat_id) {
            return Err(ForwardError::Send {
                target: chat_id.to_string(),
                reason: "forbidden".to_string(),
            });
        }
        self.sends.lock().await.push(SentRecord {
            chat_id,
            topic_id,
            text: text.to_string(),
            media: media.to_vec(),
        });
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}
