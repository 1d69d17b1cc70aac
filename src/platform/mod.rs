pub mod telegram;

use crate::client::MediaRef;

/// A message event received from the platform, reduced to what the
/// forwarding pipeline needs.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Message id within its chat.
    pub id: i32,
    /// Chat the message arrived in.
    pub chat_id: i64,
    /// Forum topic the message belongs to, if the chat uses topics.
    pub topic_id: Option<i32>,
    /// Sender user id; absent for anonymous channel posts.
    pub sender_id: Option<u64>,
    /// Text body (or media caption). Empty for media-only messages.
    pub text: String,
    /// Media carried by the message, if any.
    pub media: Option<MediaRef>,
    /// Id of the message this one replies to, if any.
    pub reply_to_id: Option<i32>,
    /// Whether this arrived in a private chat (debug commands only work there).
    pub is_private: bool,
}
