use std::sync::Arc;

use crate::client::{FetchedMessage, MediaRef};
use crate::enrich::EnrichedContent;
use crate::entities::EntityCache;
use crate::platform::InboundMessage;

/// Telegram message length limit.
pub const MAX_MESSAGE_LEN: usize = 4096;
const TRUNCATION_MARKER: &str = "…";

/// Final composed payload for one target. Built fresh per target, sent once.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPayload {
    pub chat_id: i64,
    pub topic_id: Option<i32>,
    pub text: String,
    pub media: Vec<MediaRef>,
}

/// Assembles the outbound text and media list: attribution header, original
/// body, quoted reply content, then linked-message content in link order.
pub struct MessageComposer {
    cache: Arc<EntityCache>,
}

impl MessageComposer {
    pub fn new(cache: Arc<EntityCache>) -> Self {
        Self { cache }
    }

    pub async fn compose(
        &self,
        msg: &InboundMessage,
        enriched: &EnrichedContent,
        target_chat_id: i64,
        target_topic_id: Option<i32>,
    ) -> OutboundPayload {
        let mut header = format!(
            "📨 Forwarded from: {}",
            self.cache.chat_title(&msg.chat_id.to_string()).await
        );
        if let Some(topic_id) = msg.topic_id {
            header.push_str(&format!(
                " | {}",
                self.cache.topic_title(msg.chat_id, topic_id).await
            ));
        }

        let mut text = format!(
            "{}\n\n{}",
            header,
            content_or_placeholder(&msg.text, msg.media.as_ref())
        );

        if let Some(replied) = &enriched.reply {
            text.push_str("\n\n⤴️ In reply to:\n");
            text.push_str(&quoted(replied));
        }

        for linked in &enriched.links {
            text.push_str(&format!("\n\n🔗 Linked message: {}\n", linked.link.raw));
            text.push_str(&quoted(&linked.message));
        }

        let mut media = Vec::new();
        if let Some(m) = &msg.media {
            media.push(m.clone());
        }
        if let Some(m) = enriched.reply.as_ref().and_then(|r| r.media.as_ref()) {
            media.push(m.clone());
        }
        for linked in &enriched.links {
            if let Some(m) = &linked.message.media {
                media.push(m.clone());
            }
        }

        OutboundPayload {
            chat_id: target_chat_id,
            topic_id: target_topic_id,
            text: truncate(text, MAX_MESSAGE_LEN),
            media,
        }
    }
}

fn quoted(message: &FetchedMessage) -> String {
    let sender = message.sender_name.as_deref().unwrap_or("Unknown");
    format!(
        "{}: {}",
        sender,
        content_or_placeholder(&message.text, message.media.as_ref())
    )
}

fn content_or_placeholder(text: &str, media: Option<&MediaRef>) -> String {
    if !text.is_empty() {
        return text.to_string();
    }
    match media {
        Some(m) => format!("[Message with {}]", m.kind.label()),
        None => "[Empty message]".to_string(),
    }
}

/// Deterministic truncation on a char boundary, marker included in the limit.
fn truncate(text: String, max_len: usize) -> String {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len.saturating_sub(TRUNCATION_MARKER.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}
