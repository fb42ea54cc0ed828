//! Channel plugin seam between chat platforms and the bot.
//!
//! # Architecture
//!
//! ```text
//! Chat platform
//!     ↓ (platform-specific protocol)
//! ChannelPlugin::start() spawns listener
//!     ↓ (InboundMessage via mpsc)
//! Dispatcher → per-chat worker → ConversationEngine
//!     ↓ (Reply)
//! ChannelPlugin::send(OutboundMessage)
//!     ↓ (platform-specific protocol)
//! Chat platform
//! ```
//!
//! Recurring alerts hold an `Arc<dyn ChannelPlugin>` too and push through
//! the same `send`.

use tokio::sync::mpsc;

use farewatch_types::{ChannelStatus, InboundMessage, OutboundMessage};

/// Trait for channel plugins that bridge a chat platform to the bot.
///
/// Use `&self` for all methods; implementations should use interior mutability
/// (e.g. `Mutex`, `RwLock`) for any mutable state.
#[async_trait::async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Returns the channel type identifier (e.g. "telegram").
    fn channel_type(&self) -> &str;

    /// Returns the unique instance identifier for this channel.
    fn channel_id(&self) -> &str;

    /// Start the channel, connecting to the external platform.
    ///
    /// The `sender` should be used to push incoming messages to the bot.
    /// Implementations typically spawn a background task for the listener.
    async fn start(&self, sender: mpsc::Sender<InboundMessage>) -> anyhow::Result<()>;

    /// Stop the channel, disconnecting from the external platform.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Send a message to the external platform.
    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()>;

    /// Returns the current status of this channel.
    fn status(&self) -> ChannelStatus;

    /// Show a "working on it" indicator in `chat_id`. No-op by default.
    async fn notify_processing(&self, _chat_id: i64) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A message the bot wants delivered to the chat it is talking to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markdown: bool,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
        }
    }
}

/// Deliver `reply` to `chat_id` through `channel`.
pub async fn send_reply(
    channel: &dyn ChannelPlugin,
    chat_id: i64,
    reply: Reply,
) -> anyhow::Result<()> {
    channel
        .send(OutboundMessage {
            channel_type: channel.channel_type().to_string(),
            channel_id: channel.channel_id().to_string(),
            chat_id,
            text: reply.text,
            markdown: reply.markdown,
        })
        .await
}
