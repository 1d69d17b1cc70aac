use std::sync::Arc;

use crate::client::TelegramApi;
use crate::entities::EntityCache;
use crate::links::extract_message_links;
use crate::platform::InboundMessage;
use crate::rules::RuleTable;

const HELP_TEXT: &str = "Forwarder diagnostic commands:\n\
    /help - show this message\n\
    /debugrules - summarize the loaded forwarding rules\n\
    /debugchat <id> - resolve a chat id or @handle\n\
    /debuglinks <text> - extract and probe message links\n";

/// Operator diagnostics, reachable only from private chats. Replies go back
/// to the requesting chat and nothing here is ever forwarded.
pub struct DebugHandler {
    api: Arc<dyn TelegramApi>,
    cache: Arc<EntityCache>,
    rules: Arc<RuleTable>,
    operator_ids: Vec<u64>,
}

impl DebugHandler {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        cache: Arc<EntityCache>,
        rules: Arc<RuleTable>,
        operator_ids: Vec<u64>,
    ) -> Self {
        Self {
            api,
            cache,
            rules,
            operator_ids,
        }
    }

    /// Returns the reply text for a recognized command, None otherwise.
    pub async fn handle(&self, msg: &InboundMessage) -> Option<String> {
        if !msg.is_private {
            return None;
        }
        if !self.operator_ids.is_empty() {
            let allowed = msg
                .sender_id
                .map(|id| self.operator_ids.contains(&id))
                .unwrap_or(false);
            if !allowed {
                return None;
            }
        }

        let (command, rest) = match msg.text.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (msg.text.as_str(), ""),
        };

        match command {
            "/help" => Some(HELP_TEXT.to_string()),
            "/debugrules" => Some(self.rules.summary()),
            "/debugchat" => Some(self.debug_chat(rest).await),
            "/debuglinks" => Some(self.debug_links(&msg.text).await),
            _ => None,
        }
    }

    async fn debug_chat(&self, identifier: &str) -> String {
        if identifier.is_empty() {
            return "Usage: /debugchat <chat id or @handle>".to_string();
        }
        match self.cache.resolve(identifier).await {
            Ok(handle) => format!(
                "Chat {}:\n  id: {}\n  title: {}\n  username: {}\n",
                identifier,
                handle.id,
                handle.title.as_deref().unwrap_or("-"),
                handle
                    .username
                    .as_deref()
                    .map(|u| format!("@{}", u))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Err(e) => format!("Could not resolve {}: {}", identifier, e),
        }
    }

    async fn debug_links(&self, text: &str) -> String {
        let links = extract_message_links(text);
        if links.is_empty() {
            return "No message links found.".to_string();
        }

        let mut out = String::from("Extracted message links:\n\n");
        for (idx, link) in links.iter().enumerate() {
            out.push_str(&format!(
                "Link {}: {}\n  chat: {}\n  message id: {}\n  topic id: {}\n",
                idx + 1,
                link.raw,
                link.chat_identifier(),
                link.message_id,
                link.topic_id
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ));

            match self.cache.resolve(&link.chat_identifier()).await {
                Ok(chat) => match self.api.fetch_message(chat.id, link.message_id).await {
                    Ok(message) => {
                        let preview: String = message.text.chars().take(100).collect();
                        out.push_str(&format!(
                            "  fetched: '{}' (media: {})\n\n",
                            preview,
                            message.media.is_some()
                        ));
                    }
                    Err(e) => out.push_str(&format!("  fetch failed: {}\n\n", e)),
                },
                Err(e) => out.push_str(&format!("  chat resolution failed: {}\n\n", e)),
            }
        }
        out
    }
}
