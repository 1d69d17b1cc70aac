use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ForwardError, Result};

const WILDCARD: &str = "*";

/// Which topics of an origin chat a target list applies to.
///
/// The serialized rule table keys topic lists by the topic id as a string, or
/// the literal `"*"` meaning any topic including none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicSelector {
    Specific(i32),
    Wildcard,
}

impl TopicSelector {
    fn parse(key: &str) -> Result<Self> {
        if key == WILDCARD {
            return Ok(TopicSelector::Wildcard);
        }
        key.parse()
            .map(TopicSelector::Specific)
            .map_err(|_| {
                ForwardError::Config(format!(
                    "invalid topic selector '{}' (expected a topic id or '{}')",
                    key, WILDCARD
                ))
            })
    }
}

/// One configured forwarding destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Destination chat: numeric id string or `@handle`. Resolved at send time.
    pub chat_id: String,
    /// Destination topic; None sends to the top-level chat.
    pub topic_id: Option<i32>,
    /// Allow-list of sender ids; None forwards from anyone.
    pub user_ids: Option<Vec<u64>>,
}

impl Target {
    fn allows_sender(&self, sender_id: Option<u64>) -> bool {
        match &self.user_ids {
            None => true,
            Some(ids) => sender_id.map(|s| ids.contains(&s)).unwrap_or(false),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChatIdent {
    Num(i64),
    Str(String),
}

impl ChatIdent {
    fn into_string(self) -> String {
        match self {
            ChatIdent::Num(n) => n.to_string(),
            ChatIdent::Str(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct RawTarget {
    chat_id: ChatIdent,
    #[serde(default)]
    topic_id: Option<i32>,
    #[serde(default)]
    user_ids: Option<Vec<u64>>,
}

/// The loaded rule table: origin chat -> topic selector -> ordered targets.
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: HashMap<String, HashMap<TopicSelector, Vec<Target>>>,
}

impl RuleTable {
    /// Loads and validates the rule table. Any malformed entry is fatal here;
    /// unresolvable destinations only fail later, at send time.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForwardError::Config(format!("cannot read rules file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, HashMap<String, Vec<RawTarget>>> = serde_json::from_str(content)
            .map_err(|e| ForwardError::Config(format!("invalid rules file: {}", e)))?;

        let mut rules = HashMap::new();
        for (origin, topics) in raw {
            if origin.is_empty() {
                return Err(ForwardError::Config("empty origin chat id".into()));
            }
            let mut by_topic = HashMap::new();
            for (key, raw_targets) in topics {
                let selector = TopicSelector::parse(&key)?;
                let mut targets = Vec::with_capacity(raw_targets.len());
                for raw_target in raw_targets {
                    targets.push(validate_target(&origin, raw_target)?);
                }
                by_topic.insert(selector, targets);
            }
            rules.insert(origin, by_topic);
        }
        Ok(RuleTable { rules })
    }

    /// Returns the ordered targets a message from (chat, topic, sender) should
    /// be copied to. Empty when nothing matches.
    ///
    /// A specific-topic rule shadows the wildcard: the wildcard list applies
    /// only when no exact topic key exists, and a message without a topic only
    /// ever matches the wildcard.
    pub fn resolve(
        &self,
        chat_id: i64,
        topic_id: Option<i32>,
        sender_id: Option<u64>,
    ) -> Vec<&Target> {
        let entry = chat_id_variants(chat_id)
            .into_iter()
            .find_map(|variant| self.rules.get(&variant));
        let Some(entry) = entry else {
            debug!(chat_id, "no forwarding rules for chat");
            return Vec::new();
        };

        let list = match topic_id {
            Some(topic) => entry
                .get(&TopicSelector::Specific(topic))
                .or_else(|| entry.get(&TopicSelector::Wildcard)),
            None => entry.get(&TopicSelector::Wildcard),
        };

        list.map(|targets| {
            targets
                .iter()
                .filter(|t| t.allows_sender(sender_id))
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn origin_count(&self) -> usize {
        self.rules.len()
    }

    /// One line per origin, for the /debugrules command.
    pub fn summary(&self) -> String {
        if self.rules.is_empty() {
            return "No forwarding rules loaded.".to_string();
        }
        let mut origins: Vec<_> = self.rules.iter().collect();
        origins.sort_by(|a, b| a.0.cmp(b.0));
        let mut out = String::new();
        for (origin, topics) in origins {
            let target_count: usize = topics.values().map(Vec::len).sum();
            out.push_str(&format!(
                "{}: {} topic rule(s), {} target(s)\n",
                origin,
                topics.len(),
                target_count
            ));
        }
        out
    }
}

fn validate_target(origin: &str, raw: RawTarget) -> Result<Target> {
    let chat_id = raw.chat_id.into_string();
    if chat_id.is_empty() {
        return Err(ForwardError::Config(format!(
            "rule for '{}' has a target with an empty chat id",
            origin
        )));
    }
    // Empty allow-list means no filtering, same as absent.
    let user_ids = raw.user_ids.filter(|ids| !ids.is_empty());
    Ok(Target {
        chat_id,
        topic_id: raw.topic_id,
        user_ids,
    })
}

/// Id forms the platform uses interchangeably for the same supergroup:
/// `-100123…`, the bare internal id, and the single-dash form.
pub fn chat_id_variants(chat_id: i64) -> Vec<String> {
    let s = chat_id.to_string();
    if let Some(bare) = s.strip_prefix("-100") {
        if !bare.is_empty() {
            return vec![s.clone(), bare.to_string(), format!("-{}", bare)];
        }
    }
    vec![s.clone(), format!("-100{}", s.trim_start_matches('-'))]
}
