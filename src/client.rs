use async_trait::async_trait;

use crate::error::Result;

/// Resolved chat metadata.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl ChatHandle {
    /// Human-readable name for source attribution.
    pub fn display_name(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        if let Some(username) = &self.username {
            return format!("@{}", username);
        }
        format!("Chat {}", self.id)
    }
}

/// Resolved forum-topic metadata.
#[derive(Debug, Clone)]
pub struct TopicInfo {
    pub id: i32,
    pub title: Option<String>,
}

impl TopicInfo {
    pub fn display_name(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Topic {}", self.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
}

impl MediaKind {
    /// Label used in `[Message with …]` placeholders.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Animation => "animation",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice message",
            MediaKind::VideoNote => "video note",
            MediaKind::Sticker => "sticker",
        }
    }
}

/// Transport-level reference to an already-uploaded media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_ref: String,
}

/// A message fetched by id, reduced to what forwarding needs.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub chat_id: i64,
    pub id: i32,
    pub sender_name: Option<String>,
    pub text: String,
    pub media: Option<MediaRef>,
}

/// What the forwarding core requires from the messaging transport.
///
/// The core only ever talks to this trait; the teloxide-backed implementation
/// lives in `platform::telegram`, tests use an in-memory fake.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// Fetches a single message by id within a chat.
    async fn fetch_message(&self, chat_id: i64, message_id: i32) -> Result<FetchedMessage>;

    /// Resolves a chat identifier (numeric id string or `@handle`) to its metadata.
    async fn resolve_chat(&self, identifier: &str) -> Result<ChatHandle>;

    /// Resolves topic metadata within a chat.
    async fn resolve_topic_info(&self, chat_id: i64, topic_id: i32) -> Result<TopicInfo>;

    /// Sends a text message (plus any media refs) to a chat/topic. Returns the
    /// id of the sent message.
    async fn send_message(
        &self,
        chat_id: i64,
        topic_id: Option<i32>,
        text: &str,
        media: &[MediaRef],
    ) -> Result<i32>;
}
