use thiserror::Error;

/// Errors produced by the forwarding pipeline.
///
/// `Resolution` and `Send` abort only the target they occurred on; `NotFound`
/// during enrichment is recovered by skipping that piece of content; `Config`
/// is fatal at startup only.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("failed to resolve '{identifier}': {reason}")]
    Resolution { identifier: String, reason: String },

    #[error("message {message_id} not found in chat {chat_id}")]
    NotFound { chat_id: i64, message_id: i32 },

    #[error("send to {target} failed: {reason}")]
    Send { target: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ForwardError>;
