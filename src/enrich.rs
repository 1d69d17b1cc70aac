use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{FetchedMessage, TelegramApi};
use crate::entities::EntityCache;
use crate::error::Result;
use crate::links::{extract_message_links, MessageLink};
use crate::platform::InboundMessage;

/// A message link together with its fetched content.
#[derive(Debug, Clone)]
pub struct LinkedContent {
    pub link: MessageLink,
    pub message: FetchedMessage,
}

/// Reply and linked-message content gathered for one forward attempt.
#[derive(Debug, Default)]
pub struct EnrichedContent {
    pub reply: Option<FetchedMessage>,
    pub links: Vec<LinkedContent>,
}

/// Fetches reply and linked-message content for an inbound message.
///
/// Both passes are best effort: a missing or unreadable referenced message is
/// logged and skipped, never allowed to block forwarding of the primary
/// message. Linked-message fetches are memoized for the process lifetime.
pub struct ContentEnricher {
    api: Arc<dyn TelegramApi>,
    cache: Arc<EntityCache>,
    resolved_links: Mutex<HashMap<(i64, i32), FetchedMessage>>,
}

impl ContentEnricher {
    pub fn new(api: Arc<dyn TelegramApi>, cache: Arc<EntityCache>) -> Self {
        Self {
            api,
            cache,
            resolved_links: Mutex::new(HashMap::new()),
        }
    }

    pub async fn enrich(&self, msg: &InboundMessage) -> EnrichedContent {
        let mut enriched = EnrichedContent::default();

        if let Some(reply_id) = msg.reply_to_id {
            match self.api.fetch_message(msg.chat_id, reply_id).await {
                Ok(replied) => {
                    debug!(chat_id = msg.chat_id, reply_id, "captured reply content");
                    enriched.reply = Some(replied);
                }
                Err(e) => {
                    warn!(chat_id = msg.chat_id, reply_id, error = %e,
                        "could not fetch replied-to message, forwarding without it");
                }
            }
        }

        let mut seen = HashSet::new();
        for link in extract_message_links(&msg.text) {
            let chat = match self.cache.resolve(&link.chat_identifier()).await {
                Ok(chat) => chat,
                Err(e) => {
                    warn!(link = %link.raw, error = %e, "could not resolve linked chat, skipping link");
                    continue;
                }
            };

            let key = (chat.id, link.message_id);
            if !seen.insert(key) {
                continue;
            }

            // A link pointing at the reply target reuses the reply fetch.
            if let Some(replied) = &enriched.reply {
                if replied.chat_id == key.0 && replied.id == key.1 {
                    enriched.links.push(LinkedContent {
                        link,
                        message: replied.clone(),
                    });
                    continue;
                }
            }

            match self.fetch_link_target(key.0, key.1).await {
                Ok(message) => enriched.links.push(LinkedContent { link, message }),
                Err(e) => {
                    warn!(link = %link.raw, error = %e, "could not fetch linked message, skipping link");
                }
            }
        }

        enriched
    }

    async fn fetch_link_target(&self, chat_id: i64, message_id: i32) -> Result<FetchedMessage> {
        if let Some(cached) = self.resolved_links.lock().await.get(&(chat_id, message_id)) {
            return Ok(cached.clone());
        }
        let message = self.api.fetch_message(chat_id, message_id).await?;
        self.resolved_links
            .lock()
            .await
            .insert((chat_id, message_id), message.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeApi;

    fn inbound(chat_id: i64, text: &str, reply_to_id: Option<i32>) -> InboundMessage {
        InboundMessage {
            id: 1,
            chat_id,
            topic_id: None,
            sender_id: Some(42),
            text: text.to_string(),
            media: None,
            reply_to_id,
            is_private: false,
        }
    }

    fn fetched(chat_id: i64, id: i32, text: &str) -> FetchedMessage {
        FetchedMessage {
            chat_id,
            id,
            sender_name: Some("Bob".to_string()),
            text: text.to_string(),
            media: None,
        }
    }

    fn enricher(api: &Arc<FakeApi>) -> ContentEnricher {
        let api: Arc<dyn TelegramApi> = api.clone();
        ContentEnricher::new(api.clone(), Arc::new(EntityCache::new(api)))
    }

    #[tokio::test]
    async fn test_reply_content_captured() {
        let api = Arc::new(FakeApi::new());
        api.add_message(fetched(-100111, 5, "original")).await;
        let enricher = enricher(&api);

        let enriched = enricher.enrich(&inbound(-100111, "answer", Some(5))).await;
        assert_eq!(enriched.reply.unwrap().text, "original");
    }

    #[tokio::test]
    async fn test_reply_fetch_failure_is_not_fatal() {
        let api = Arc::new(FakeApi::new());
        let enricher = enricher(&api);

        // Message 5 was deleted; enrichment proceeds without it.
        let enriched = enricher.enrich(&inbound(-100111, "answer", Some(5))).await;
        assert!(enriched.reply.is_none());
        assert!(enriched.links.is_empty());
    }

    #[tokio::test]
    async fn test_two_links_enriched_in_text_order() {
        let api = Arc::new(FakeApi::new());
        api.add_message(fetched(-100222, 1, "first target")).await;
        api.add_message(fetched(-100333, 2, "second target")).await;
        let enricher = enricher(&api);

        let msg = inbound(
            -100111,
            "see https://t.me/c/222/1 and https://t.me/c/333/2",
            None,
        );
        let enriched = enricher.enrich(&msg).await;
        assert_eq!(enriched.links.len(), 2);
        assert_eq!(enriched.links[0].message.text, "first target");
        assert_eq!(enriched.links[1].message.text, "second target");
    }

    #[tokio::test]
    async fn test_link_to_reply_target_fetched_once() {
        let api = Arc::new(FakeApi::new());
        api.add_message(fetched(-100111, 5, "shared")).await;
        api.add_chat(
            "-100111",
            crate::client::ChatHandle {
                id: -100111,
                title: None,
                username: None,
            },
        )
        .await;
        let enricher = enricher(&api);

        let msg = inbound(-100111, "see https://t.me/c/111/5", Some(5));
        let enriched = enricher.enrich(&msg).await;

        assert!(enriched.reply.is_some());
        assert_eq!(enriched.links.len(), 1);
        assert_eq!(enriched.links[0].message.text, "shared");
        assert_eq!(api.fetch_count(-100111, 5).await, 1);
    }

    #[tokio::test]
    async fn test_broken_link_skipped_others_survive() {
        let api = Arc::new(FakeApi::new());
        api.add_message(fetched(-100333, 2, "still here")).await;
        let enricher = enricher(&api);

        // Message 1 in chat 222 does not exist.
        let msg = inbound(
            -100111,
            "https://t.me/c/222/1 https://t.me/c/333/2",
            None,
        );
        let enriched = enricher.enrich(&msg).await;
        assert_eq!(enriched.links.len(), 1);
        assert_eq!(enriched.links[0].message.text, "still here");
    }

    #[tokio::test]
    async fn test_unresolvable_link_chat_skipped() {
        let api = Arc::new(FakeApi::new());
        api.fail_resolve("@nowhere").await;
        let enricher = enricher(&api);

        let msg = inbound(-100111, "https://t.me/nowhere/9", None);
        let enriched = enricher.enrich(&msg).await;
        assert!(enriched.links.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_link_in_one_message_collapsed() {
        let api = Arc::new(FakeApi::new());
        api.add_message(fetched(-100222, 1, "target")).await;
        let enricher = enricher(&api);

        let msg = inbound(-100111, "https://t.me/c/222/1 https://t.me/c/222/1", None);
        let enriched = enricher.enrich(&msg).await;
        assert_eq!(enriched.links.len(), 1);
        assert_eq!(api.fetch_count(-100222, 1).await, 1);
    }

    #[tokio::test]
    async fn test_link_fetches_memoized_across_messages() {
        let api = Arc::new(FakeApi::new());
        api.add_message(fetched(-100222, 1, "target")).await;
        let enricher = enricher(&api);

        let msg = inbound(-100111, "https://t.me/c/222/1", None);
        enricher.enrich(&msg).await;
        enricher.enrich(&msg).await;
        assert_eq!(api.fetch_count(-100222, 1).await, 1);
    }
}
