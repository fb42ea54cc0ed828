//! Telegram Bot channel plugin for farewatch.
//!
//! Uses Telegram Bot API with long-polling (no webhook required).
//!
//! # Configuration
//!
//! ```json5
//! telegram: {
//!     bot_token: "123456:ABC-DEF...", // or TELEGRAM_BOT_TOKEN
//!     poll_timeout_secs: 30,
//! }
//! ```

pub mod api;
pub mod polling;
pub mod types;

use std::sync::Arc;

use anyhow::bail;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use farewatch_bot::channel::ChannelPlugin;
use farewatch_config::FarewatchConfig;
use farewatch_types::{ChannelStatus, InboundMessage, OutboundMessage};

use api::TelegramApi;
use types::{BotCommand, SendChatActionParams, SendMessageParams, SetMyCommandsParams};

/// Telegram channel plugin implementing `ChannelPlugin`.
pub struct TelegramChannel {
    id: String,
    api: Arc<TelegramApi>,
    poll_timeout_secs: u64,
    state: Mutex<TelegramState>,
}

struct TelegramState {
    status: ChannelStatus,
    cancel: Option<CancellationToken>,
    poll_handle: Option<JoinHandle<()>>,
}

impl TelegramChannel {
    pub fn new(id: String, bot_token: &str, poll_timeout_secs: u64) -> anyhow::Result<Self> {
        let api = TelegramApi::new(bot_token, poll_timeout_secs)?;
        Ok(Self::with_api(id, api, poll_timeout_secs))
    }

    pub fn with_api(id: String, api: TelegramApi, poll_timeout_secs: u64) -> Self {
        Self {
            id,
            api: Arc::new(api),
            poll_timeout_secs,
            state: Mutex::new(TelegramState {
                status: ChannelStatus::Stopped,
                cancel: None,
                poll_handle: None,
            }),
        }
    }
}

/// Commands shown in the Telegram menu.
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Set up a daily flight price alert"),
        BotCommand::new("stop", "Cancel your daily alert"),
        BotCommand::new("status", "Show your active alert"),
    ]
}

#[async_trait::async_trait]
impl ChannelPlugin for TelegramChannel {
    fn channel_type(&self) -> &str {
        "telegram"
    }

    fn channel_id(&self) -> &str {
        &self.id
    }

    async fn start(&self, sender: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if state.status == ChannelStatus::Running {
            bail!("Telegram channel {} is already running", self.id);
        }

        state.status = ChannelStatus::Starting;

        // Verify bot token
        match self.api.get_me().await {
            Ok(bot) => {
                info!(
                    channel_id = self.id,
                    bot_id = bot.id,
                    bot_username = bot.username.as_deref().unwrap_or("unknown"),
                    "Telegram bot authenticated"
                );
            }
            Err(e) => {
                state.status = ChannelStatus::Error(format!("Auth failed: {e}"));
                bail!("Failed to authenticate Telegram bot: {e}");
            }
        }

        let commands = SetMyCommandsParams {
            commands: bot_commands(),
        };
        if let Err(e) = self.api.set_my_commands(&commands).await {
            warn!(channel_id = self.id, "Failed to register bot commands: {e}");
        }

        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        let channel_id = self.id.clone();
        let api = self.api.clone();
        let poll_timeout = self.poll_timeout_secs;

        let handle = tokio::spawn(async move {
            polling::run_polling_loop(&api, channel_id, poll_timeout, sender, cancel_child).await;
        });

        state.cancel = Some(cancel);
        state.poll_handle = Some(handle);
        state.status = ChannelStatus::Running;

        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;

        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }

        if let Some(handle) = state.poll_handle.take() {
            let _ = handle.await;
        }

        state.status = ChannelStatus::Stopped;
        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let chat_id = message.chat_id;

        if message.markdown {
            // Try Markdown first, fallback to plain text
            let result = self
                .api
                .send_message(&SendMessageParams {
                    chat_id,
                    text: message.text.clone(),
                    parse_mode: Some("Markdown".into()),
                })
                .await;
            match result {
                Ok(_) => return Ok(()),
                Err(e) => warn!(chat_id, "Markdown send failed, retrying as plain text: {e}"),
            }
        }

        self.api
            .send_message(&SendMessageParams {
                chat_id,
                text: message.text,
                parse_mode: None,
            })
            .await?;
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        match self.state.try_lock() {
            Ok(state) => state.status.clone(),
            Err(_) => ChannelStatus::Starting,
        }
    }

    async fn notify_processing(&self, chat_id: i64) -> anyhow::Result<()> {
        self.api
            .send_chat_action(&SendChatActionParams {
                chat_id,
                action: "typing".into(),
            })
            .await
    }
}

/// Create the Telegram channel described by `config.telegram`.
pub fn create_telegram_channel(config: &FarewatchConfig) -> anyhow::Result<Arc<dyn ChannelPlugin>> {
    let Some(bot_token) = config.telegram.bot_token.as_deref() else {
        bail!(
            "Telegram requires telegram.bot_token or {}",
            farewatch_config::BOT_TOKEN_ENV
        );
    };
    let channel = TelegramChannel::new(
        "telegram".to_string(),
        bot_token,
        config.telegram.poll_timeout_secs,
    )?;
    Ok(Arc::new(channel))
}
