use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::TelegramApi;
use crate::compose::MessageComposer;
use crate::debug::DebugHandler;
use crate::enrich::{ContentEnricher, EnrichedContent};
use crate::entities::EntityCache;
use crate::error::ForwardError;
use crate::platform::InboundMessage;
use crate::rules::{RuleTable, Target};

/// Outcome of one forward attempt to one target.
#[derive(Debug)]
pub enum SendAttemptResult {
    Sent {
        target: String,
        chat_id: i64,
        topic_id: Option<i32>,
        message_id: i32,
    },
    /// Target was the message's own origin; skipped to avoid forwarding loops.
    SkippedOrigin { target: String },
    Failed {
        target: String,
        error: ForwardError,
    },
}

/// The event-driven entry point: resolves rules, enriches once per message,
/// then composes and sends per target. A failure on one target never prevents
/// the others, and nothing here ever tears down the event loop.
pub struct Forwarder {
    api: Arc<dyn TelegramApi>,
    cache: Arc<EntityCache>,
    enricher: ContentEnricher,
    composer: MessageComposer,
    rules: Arc<RuleTable>,
    debug: DebugHandler,
}

impl Forwarder {
    pub fn new(api: Arc<dyn TelegramApi>, rules: RuleTable, operator_ids: Vec<u64>) -> Self {
        let cache = Arc::new(EntityCache::new(api.clone()));
        let rules = Arc::new(rules);
        Self {
            enricher: ContentEnricher::new(api.clone(), cache.clone()),
            composer: MessageComposer::new(cache.clone()),
            debug: DebugHandler::new(api.clone(), cache.clone(), rules.clone(), operator_ids),
            api,
            cache,
            rules,
        }
    }

    pub async fn handle_message(&self, msg: &InboundMessage) -> Vec<SendAttemptResult> {
        // Private-chat commands go to diagnostics and are never forwarded.
        if msg.is_private && msg.text.starts_with('/') {
            if let Some(reply) = self.debug.handle(msg).await {
                if let Err(e) = self.api.send_message(msg.chat_id, None, &reply, &[]).await {
                    warn!(chat_id = msg.chat_id, error = %e, "failed to send debug reply");
                }
                return Vec::new();
            }
        }

        let targets = self.rules.resolve(msg.chat_id, msg.topic_id, msg.sender_id);
        if targets.is_empty() {
            debug!(
                chat_id = msg.chat_id,
                topic_id = msg.topic_id,
                "no forwarding rules matched"
            );
            return Vec::new();
        }

        info!(
            chat_id = msg.chat_id,
            topic_id = msg.topic_id,
            message_id = msg.id,
            targets = targets.len(),
            "forwarding message"
        );

        // One enrichment pass shared by every target of this message.
        let enriched = self.enricher.enrich(msg).await;

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let outcome = self.forward_to_target(msg, &enriched, target).await;
            match &outcome {
                SendAttemptResult::Sent {
                    target, message_id, ..
                } => {
                    info!(
                        origin = msg.chat_id,
                        to = %target,
                        message_id = *message_id,
                        "forwarded message"
                    );
                }
                SendAttemptResult::SkippedOrigin { target } => {
                    warn!(
                        origin = msg.chat_id,
                        to = %target,
                        "target equals message origin, skipping to avoid a loop"
                    );
                }
                SendAttemptResult::Failed { target, error } => {
                    warn!(
                        origin = msg.chat_id,
                        to = %target,
                        message_id = msg.id,
                        error = %error,
                        "forward attempt failed"
                    );
                }
            }
            results.push(outcome);
        }
        results
    }

    async fn forward_to_target(
        &self,
        msg: &InboundMessage,
        enriched: &EnrichedContent,
        target: &Target,
    ) -> SendAttemptResult {
        let handle = match self.cache.resolve(&target.chat_id).await {
            Ok(handle) => handle,
            Err(error) => {
                return SendAttemptResult::Failed {
                    target: target.chat_id.clone(),
                    error,
                }
            }
        };

        if handle.id == msg.chat_id && target.topic_id == msg.topic_id {
            return SendAttemptResult::SkippedOrigin {
                target: target.chat_id.clone(),
            };
        }

        let payload = self
            .composer
            .compose(msg, enriched, handle.id, target.topic_id)
            .await;

        match self
            .api
            .send_message(payload.chat_id, payload.topic_id, &payload.text, &payload.media)
            .await
        {
            Ok(message_id) => SendAttemptResult::Sent {
                target: target.chat_id.clone(),
                chat_id: payload.chat_id,
                topic_id: payload.topic_id,
                message_id,
            },
            Err(error) => SendAttemptResult::Failed {
                target: target.chat_id.clone(),
                error,
            },
        }
    }
}
