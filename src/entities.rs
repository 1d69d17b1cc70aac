use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::client::{ChatHandle, TelegramApi, TopicInfo};
use crate::error::Result;

/// Memoizes chat and topic metadata for the lifetime of the process.
///
/// Chat identity is effectively immutable for one run, so entries are never
/// invalidated. A duplicate fetch on a rare concurrent miss is harmless; the
/// lock is never held across the underlying network call.
pub struct EntityCache {
    api: Arc<dyn TelegramApi>,
    chats: Mutex<HashMap<String, ChatHandle>>,
    topics: Mutex<HashMap<(i64, i32), TopicInfo>>,
}

impl EntityCache {
    pub fn new(api: Arc<dyn TelegramApi>) -> Self {
        Self {
            api,
            chats: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a chat identifier (numeric id string or `@handle`).
    /// Resolution failures propagate: a wrong handle must not be guessed at.
    pub async fn resolve(&self, identifier: &str) -> Result<ChatHandle> {
        if let Some(handle) = self.chats.lock().await.get(identifier) {
            return Ok(handle.clone());
        }

        let handle = self.api.resolve_chat(identifier).await?;
        debug!(identifier, chat_id = handle.id, "resolved chat");
        self.chats
            .lock()
            .await
            .insert(identifier.to_string(), handle.clone());
        Ok(handle)
    }

    pub async fn resolve_topic(&self, chat_id: i64, topic_id: i32) -> Result<TopicInfo> {
        if let Some(info) = self.topics.lock().await.get(&(chat_id, topic_id)) {
            return Ok(info.clone());
        }

        let info = self.api.resolve_topic_info(chat_id, topic_id).await?;
        self.topics
            .lock()
            .await
            .insert((chat_id, topic_id), info.clone());
        Ok(info)
    }

    /// Display name for attribution; falls back to the identifier when the
    /// chat cannot be resolved (attribution is not worth failing a forward).
    pub async fn chat_title(&self, identifier: &str) -> String {
        match self.resolve(identifier).await {
            Ok(handle) => handle.display_name(),
            Err(_) => format!("Chat {}", identifier),
        }
    }

    pub async fn topic_title(&self, chat_id: i64, topic_id: i32) -> String {
        match self.resolve_topic(chat_id, topic_id).await {
            Ok(info) => info.display_name(),
            Err(_) => format!("Topic {}", topic_id),
        }
    }
}
