//! Telegram Bot API HTTP client.

use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::types::{
    ApiResponse, BotInfo, GetUpdatesParams, SendChatActionParams, SendMessageParams,
    SetMyCommandsParams, TgMessage, Update,
};

pub const DEFAULT_API_ROOT: &str = "https://api.telegram.org";

/// Headroom on top of the long-poll timeout before the HTTP request gives up.
const REQUEST_SLACK_SECS: u64 = 30;

/// HTTP client for the Telegram Bot API.
pub struct TelegramApi {
    client: Client,
    base_url: String,
}

impl TelegramApi {
    /// Create a client for `bot_token` that can hold a long poll of
    /// `poll_timeout_secs`.
    pub fn new(bot_token: &str, poll_timeout_secs: u64) -> anyhow::Result<Self> {
        Self::with_api_root(DEFAULT_API_ROOT, bot_token, poll_timeout_secs)
    }

    /// Same as [`TelegramApi::new`] against a different API host.
    pub fn with_api_root(
        api_root: &str,
        bot_token: &str,
        poll_timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + REQUEST_SLACK_SECS))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{bot_token}", api_root.trim_end_matches('/')),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> anyhow::Result<ApiResponse<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let resp: ApiResponse<R> = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(params)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?
            .json()
            .await
            .with_context(|| format!("{method} response parse failed"))?;

        if !resp.ok {
            bail!(
                "{method} failed: {}",
                resp.description.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(resp)
    }

    /// Verify the bot token by calling `getMe`.
    pub async fn get_me(&self) -> anyhow::Result<BotInfo> {
        let resp: ApiResponse<BotInfo> = self.call("getMe", &serde_json::json!({})).await?;
        resp.result.context("getMe returned no result")
    }

    /// Long-poll for updates.
    pub async fn get_updates(&self, params: &GetUpdatesParams) -> anyhow::Result<Vec<Update>> {
        let resp: ApiResponse<Vec<Update>> = self.call("getUpdates", params).await?;
        Ok(resp.result.unwrap_or_default())
    }

    /// Send a chat action (e.g. "typing").
    pub async fn send_chat_action(&self, params: &SendChatActionParams) -> anyhow::Result<()> {
        let _: ApiResponse<bool> = self.call("sendChatAction", params).await?;
        Ok(())
    }

    /// Register bot commands in the menu.
    pub async fn set_my_commands(&self, params: &SetMyCommandsParams) -> anyhow::Result<()> {
        let _: ApiResponse<bool> = self.call("setMyCommands", params).await?;
        Ok(())
    }

    /// Send a text message.
    pub async fn send_message(&self, params: &SendMessageParams) -> anyhow::Result<TgMessage> {
        let resp: ApiResponse<TgMessage> = self.call("sendMessage", params).await?;
        resp.result.context("sendMessage returned no result")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_base_url() {
        let api = TelegramApi::new("123:ABC", 30).unwrap();
        assert_eq!(api.base_url, "https://api.telegram.org/bot123:ABC");

        let api = TelegramApi::with_api_root("http://localhost:9/", "t", 0).unwrap();
        assert_eq!(api.base_url, "http://localhost:9/bott");
    }

    #[tokio::test]
    async fn test_get_me() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"id": 1, "is_bot": true, "first_name": "Fares", "username": "fare_bot"}
            })))
            .mount(&server)
            .await;

        let api = TelegramApi::with_api_root(&server.uri(), "TOKEN", 1).unwrap();
        let me = api.get_me().await.unwrap();
        assert_eq!(me.id, 1);
        assert_eq!(me.username.as_deref(), Some("fare_bot"));
    }

    #[tokio::test]
    async fn test_error_description_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let api = TelegramApi::with_api_root(&server.uri(), "TOKEN", 1).unwrap();
        let err = api
            .send_message(&SendMessageParams {
                chat_id: 1,
                text: "hi".into(),
                parse_mode: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_get_updates_sends_offset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getUpdates"))
            .and(body_partial_json(json!({"offset": 7, "timeout": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{"update_id": 7}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = TelegramApi::with_api_root(&server.uri(), "TOKEN", 1).unwrap();
        let updates = api
            .get_updates(&GetUpdatesParams {
                offset: Some(7),
                timeout: Some(1),
                allowed_updates: None,
            })
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 7);
    }
}
