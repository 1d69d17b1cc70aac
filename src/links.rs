use std::sync::LazyLock;

use regex::Regex;

/// Matches t.me message links:
/// - https://t.me/c/1234567890/12345 (private/channel, internal id)
/// - https://t.me/username/12345 (public chat)
/// - https://t.me/c/1234567890/12345/67890 (with a topic id suffix)
static TG_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://t\.me/(?:c/(\d+)|([A-Za-z0-9_]{4,}))/(\d+)(?:/(\d+))?").unwrap()
});

/// Chat part of a message link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkChat {
    /// Internal numeric id from a `t.me/c/…` link, without the `-100` prefix.
    Internal(i64),
    /// Public `@handle` from a `t.me/<handle>/…` link.
    Public(String),
}

/// A recognized message link, in source-text order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLink {
    /// The matched text, used as the indicator when composing.
    pub raw: String,
    pub chat: LinkChat,
    pub message_id: i32,
    pub topic_id: Option<i32>,
}

impl MessageLink {
    /// Identifier form accepted by chat resolution.
    pub fn chat_identifier(&self) -> String {
        match &self.chat {
            LinkChat::Internal(id) => format!("-100{}", id),
            LinkChat::Public(handle) => format!("@{}", handle),
        }
    }
}

/// Extracts all recognized message links from `text`, preserving order of
/// appearance. Unparseable numeric parts skip that match only.
pub fn extract_message_links(text: &str) -> Vec<MessageLink> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut links = Vec::new();
    for caps in TG_LINK_PATTERN.captures_iter(text) {
        let Ok(message_id) = caps[3].parse::<i32>() else {
            continue;
        };
        let topic_id = caps.get(4).and_then(|m| m.as_str().parse::<i32>().ok());

        let chat = if let Some(internal) = caps.get(1) {
            match internal.as_str().parse::<i64>() {
                Ok(id) => LinkChat::Internal(id),
                Err(_) => continue,
            }
        } else if let Some(handle) = caps.get(2) {
            LinkChat::Public(handle.as_str().to_string())
        } else {
            continue;
        };

        links.push(MessageLink {
            raw: caps[0].to_string(),
            chat,
            message_id,
            topic_id,
        });
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_link() {
        let links = extract_message_links("see https://t.me/c/1234567890/42");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].chat, LinkChat::Internal(1234567890));
        assert_eq!(links[0].message_id, 42);
        assert_eq!(links[0].topic_id, None);
        assert_eq!(links[0].chat_identifier(), "-1001234567890");
    }

    #[test]
    fn test_public_link_with_topic() {
        let links = extract_message_links("https://t.me/somechannel/42/7");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].chat, LinkChat::Public("somechannel".to_string()));
        assert_eq!(links[0].message_id, 42);
        assert_eq!(links[0].topic_id, Some(7));
        assert_eq!(links[0].chat_identifier(), "@somechannel");
    }

    #[test]
    fn test_links_kept_in_order_of_appearance() {
        let text = "first https://t.me/c/111/1 then https://t.me/other/2";
        let links = extract_message_links(text);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].message_id, 1);
        assert_eq!(links[1].message_id, 2);
    }

    #[test]
    fn test_http_scheme_accepted() {
        let links = extract_message_links("http://t.me/c/111/5");
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_no_links() {
        assert!(extract_message_links("").is_empty());
        assert!(extract_message_links("no links here, just https://example.com/1").is_empty());
        assert!(extract_message_links("bare chat link https://t.me/somechannel").is_empty());
    }
}
