use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InputFile, MessageId, Recipient, ThreadId};
use teloxide::RequestError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{ChatHandle, FetchedMessage, MediaKind, MediaRef, TelegramApi, TopicInfo};
use crate::dispatch::Forwarder;
use crate::error::ForwardError;
use crate::platform::InboundMessage;

/// How many recently seen messages are kept for reply/link lookups.
const SEEN_CAPACITY: usize = 2048;

/// Bounded insertion-order store of messages observed on the update stream.
///
/// The Bot API has no call to fetch an arbitrary message by id, so lookups
/// are served from here: every inbound message (and the reply target embedded
/// in its update) is recorded, and anything never observed is reported as not
/// found, which enrichment treats as skippable.
#[derive(Default)]
struct SeenStore {
    map: HashMap<(i64, i32), FetchedMessage>,
    order: VecDeque<(i64, i32)>,
}

impl SeenStore {
    fn insert(&mut self, message: FetchedMessage) {
        let key = (message.chat_id, message.id);
        if self.map.insert(key, message).is_none() {
            self.order.push_back(key);
            if self.order.len() > SEEN_CAPACITY {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                }
            }
        }
    }
}

/// Bot API implementation of [`TelegramApi`].
pub struct TelegramClient {
    bot: Bot,
    seen: Mutex<SeenStore>,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            seen: Mutex::new(SeenStore::default()),
        }
    }

    async fn record(&self, message: FetchedMessage) {
        self.seen.lock().await.insert(message);
    }

    async fn send_media_item(
        &self,
        chat: ChatId,
        thread: Option<ThreadId>,
        item: &MediaRef,
    ) -> Result<(), RequestError> {
        let file = InputFile::file_id(FileId(item.file_ref.clone()));
        match item.kind {
            MediaKind::Photo => {
                let mut req = self.bot.send_photo(chat, file);
                if let Some(t) = thread {
                    req = req.message_thread_id(t);
                }
                req.await?;
            }
            MediaKind::Video => {
                let mut req = self.bot.send_video(chat, file);
                if let Some(t) = thread {
                    req = req.message_thread_id(t);
                }
                req.await?;
            }
            MediaKind::Animation => {
                let mut req = self.bot.send_animation(chat, file);
                if let Some(t) = thread {
                    req = req.message_thread_id(t);
                }
                req.await?;
            }
            MediaKind::Document => {
                let mut req = self.bot.send_document(chat, file);
                if let Some(t) = thread {
                    req = req.message_thread_id(t);
                }
                req.await?;
            }
            MediaKind::Audio => {
                let mut req = self.bot.send_audio(chat, file);
                if let Some(t) = thread {
                    req = req.message_thread_id(t);
                }
                req.await?;
            }
            MediaKind::Voice => {
                let mut req = self.bot.send_voice(chat, file);
                if let Some(t) = thread {
                    req = req.message_thread_id(t);
                }
                req.await?;
            }
            MediaKind::VideoNote => {
                let mut req = self.bot.send_video_note(chat, file);
                if let Some(t) = thread {
                    req = req.message_thread_id(t);
                }
                req.await?;
            }
            MediaKind::Sticker => {
                let mut req = self.bot.send_sticker(chat, file);
                if let Some(t) = thread {
                    req = req.message_thread_id(t);
                }
                req.await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TelegramApi for TelegramClient {
    async fn fetch_message(
        &self,
        chat_id: i64,
        message_id: i32,
    ) -> crate::error::Result<FetchedMessage> {
        if let Some(message) = self.seen.lock().await.map.get(&(chat_id, message_id)) {
            return Ok(message.clone());
        }
        debug!(chat_id, message_id, "message not in seen store");
        Err(ForwardError::NotFound {
            chat_id,
            message_id,
        })
    }

    async fn resolve_chat(&self, identifier: &str) -> crate::error::Result<ChatHandle> {
        let recipient = if identifier.starts_with('@') {
            Recipient::ChannelUsername(identifier.to_string())
        } else {
            match identifier.parse::<i64>() {
                Ok(id) => Recipient::Id(ChatId(id)),
                Err(_) => {
                    return Err(ForwardError::Resolution {
                        identifier: identifier.to_string(),
                        reason: "not a numeric id or @handle".to_string(),
                    })
                }
            }
        };

        let chat = self
            .bot
            .get_chat(recipient)
            .await
            .map_err(|e| ForwardError::Resolution {
                identifier: identifier.to_string(),
                reason: e.to_string(),
            })?;

        Ok(ChatHandle {
            id: chat.id.0,
            title: chat.title().map(str::to_owned),
            username: chat.username().map(str::to_owned),
        })
    }

    async fn resolve_topic_info(
        &self,
        _chat_id: i64,
        topic_id: i32,
    ) -> crate::error::Result<TopicInfo> {
        // The Bot API offers no topic metadata lookup; the composer falls
        // back to "Topic <id>" naming.
        Ok(TopicInfo {
            id: topic_id,
            title: None,
        })
    }

    async fn send_message(
        &self,
        chat_id: i64,
        topic_id: Option<i32>,
        text: &str,
        media: &[MediaRef],
    ) -> crate::error::Result<i32> {
        let chat = ChatId(chat_id);
        let thread = topic_id.map(|t| ThreadId(MessageId(t)));

        let mut req = self.bot.send_message(chat, text);
        if let Some(t) = thread {
            req = req.message_thread_id(t);
        }
        let sent = req.await.map_err(|e| ForwardError::Send {
            target: chat_id.to_string(),
            reason: e.to_string(),
        })?;

        // Media goes as follow-up sends; a failed attachment is logged but
        // does not undo the already-delivered text.
        for item in media {
            if let Err(e) = self.send_media_item(chat, thread, item).await {
                warn!(chat_id, file_ref = %item.file_ref, error = %e, "failed to send media item");
            }
        }

        Ok(sent.id.0)
    }
}

fn sender_display_name(user: &teloxide::types::User) -> String {
    let mut name = user.first_name.clone();
    if let Some(last) = &user.last_name {
        name.push(' ');
        name.push_str(last);
    }
    if let Some(username) = &user.username {
        name.push_str(&format!(" (@{})", username));
    }
    name
}

fn media_ref_of(msg: &Message) -> Option<MediaRef> {
    if let Some(sizes) = msg.photo() {
        // Largest size is last.
        return sizes.last().map(|p| MediaRef {
            kind: MediaKind::Photo,
            file_ref: p.file.id.0.clone(),
        });
    }
    if let Some(video) = msg.video() {
        return Some(MediaRef {
            kind: MediaKind::Video,
            file_ref: video.file.id.0.clone(),
        });
    }
    if let Some(animation) = msg.animation() {
        return Some(MediaRef {
            kind: MediaKind::Animation,
            file_ref: animation.file.id.0.clone(),
        });
    }
    if let Some(document) = msg.document() {
        return Some(MediaRef {
            kind: MediaKind::Document,
            file_ref: document.file.id.0.clone(),
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(MediaRef {
            kind: MediaKind::Audio,
            file_ref: audio.file.id.0.clone(),
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(MediaRef {
            kind: MediaKind::Voice,
            file_ref: voice.file.id.0.clone(),
        });
    }
    if let Some(video_note) = msg.video_note() {
        return Some(MediaRef {
            kind: MediaKind::VideoNote,
            file_ref: video_note.file.id.0.clone(),
        });
    }
    if let Some(sticker) = msg.sticker() {
        return Some(MediaRef {
            kind: MediaKind::Sticker,
            file_ref: sticker.file.id.0.clone(),
        });
    }
    None
}

fn topic_of(msg: &Message) -> Option<i32> {
    if msg.is_topic_message {
        msg.thread_id.map(|t| t.0 .0)
    } else {
        None
    }
}

/// A reply is only genuine when it points at something other than the topic
/// starter; in forums every topic message implicitly replies to it.
fn reply_of(msg: &Message) -> Option<i32> {
    let replied = msg.reply_to_message()?;
    if topic_of(msg) == Some(replied.id.0) {
        return None;
    }
    Some(replied.id.0)
}

fn message_text(msg: &Message) -> String {
    msg.text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string()
}

fn to_fetched(msg: &Message) -> FetchedMessage {
    FetchedMessage {
        chat_id: msg.chat.id.0,
        id: msg.id.0,
        sender_name: msg.from.as_ref().map(sender_display_name),
        text: message_text(msg),
        media: media_ref_of(msg),
    }
}

fn to_inbound(msg: &Message) -> InboundMessage {
    InboundMessage {
        id: msg.id.0,
        chat_id: msg.chat.id.0,
        topic_id: topic_of(msg),
        sender_id: msg.from.as_ref().map(|u| u.id.0),
        text: message_text(msg),
        media: media_ref_of(msg),
        reply_to_id: reply_of(msg),
        is_private: msg.chat.is_private(),
    }
}

/// Run the event loop: convert each update, record it for later lookups, and
/// hand it to the forwarder.
pub async fn run(forwarder: Arc<Forwarder>, client: Arc<TelegramClient>) -> Result<()> {
    let bot = client.bot.clone();

    info!("Starting Telegram event loop...");

    let handler = Update::filter_message().endpoint(handle_update);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![forwarder, client])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("fwdbot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_update(
    msg: Message,
    forwarder: Arc<Forwarder>,
    client: Arc<TelegramClient>,
) -> ResponseResult<()> {
    client.record(to_fetched(&msg)).await;
    if let Some(replied) = msg.reply_to_message() {
        client.record(to_fetched(replied)).await;
    }

    let inbound = to_inbound(&msg);
    let results = forwarder.handle_message(&inbound).await;
    if !results.is_empty() {
        debug!(
            chat_id = inbound.chat_id,
            message_id = inbound.id,
            attempts = results.len(),
            "message handled"
        );
    }

    Ok(())
}
