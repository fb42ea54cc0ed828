//! Telegram long-polling loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use farewatch_types::InboundMessage;

use crate::api::TelegramApi;
use crate::types::{GetUpdatesParams, MessageEntity, TgMessage};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Run the long-polling loop, converting Telegram updates to `InboundMessage`.
///
/// Exits when `cancel` is cancelled or the `sender` is closed.
pub async fn run_polling_loop(
    api: &TelegramApi,
    channel_id: String,
    poll_timeout_secs: u64,
    sender: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) {
    let mut offset: Option<i64> = None;
    let mut backoff = INITIAL_BACKOFF;

    info!(channel_id, "Telegram polling loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let params = GetUpdatesParams {
            offset,
            timeout: Some(poll_timeout_secs),
            allowed_updates: Some(vec!["message".into()]),
        };

        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.get_updates(&params) => result,
        };

        match updates {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;

                for update in updates {
                    offset = Some(update.update_id + 1);

                    let Some(inbound) = update.message.and_then(|m| to_inbound(&channel_id, m)) else {
                        continue;
                    };

                    debug!(
                        channel_id,
                        update_id = update.update_id,
                        chat_id = inbound.chat_id,
                        "Forwarding Telegram message"
                    );

                    if sender.send(inbound).await.is_err() {
                        info!(channel_id, "Inbound channel closed, stopping polling");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(
                    channel_id,
                    backoff_secs = backoff.as_secs(),
                    "getUpdates error: {e}"
                );

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {},
                }

                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    info!(channel_id, "Telegram polling loop stopped");
}

/// Convert a Telegram message into an `InboundMessage`. Non-text messages
/// (stickers, photos, joins) yield `None`.
pub fn to_inbound(channel_id: &str, msg: TgMessage) -> Option<InboundMessage> {
    let text = msg.text?;
    let command = parse_command(&text, &msg.entities);

    let sender_id = msg
        .from
        .as_ref()
        .map(|u| u.id.to_string())
        .unwrap_or_else(|| msg.chat.id.to_string());

    Some(InboundMessage {
        channel_type: "telegram".into(),
        channel_id: channel_id.to_string(),
        chat_id: msg.chat.id,
        sender_id,
        sender_name: msg.from.as_ref().map(|u| u.display_name()),
        text,
        command,
        timestamp: msg.date * 1000,
    })
}

/// Command name of a message starting with a bot command entity,
/// e.g. `/start` → `start`, `/Stop@fare_bot` → `stop`.
pub fn parse_command(text: &str, entities: &[MessageEntity]) -> Option<String> {
    let is_command = entities
        .iter()
        .any(|e| e.entity_type == "bot_command" && e.offset == 0);
    if !is_command {
        return None;
    }

    let name = text
        .split_whitespace()
        .next()?
        .trim_start_matches('/')
        .split('@')
        .next()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_ascii_lowercase())
}
