//! Telegram adapter (teloxide).
//!
//! Two things live here: the `/start` bot that hands out access codes, and the
//! delivery channels the core `Notifier` uses to reach the admin chat.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use teloxide::{
    prelude::*,
    types::{ParseMode, Recipient},
};

pub mod handlers;
pub mod router;

use devdeck_core::{
    config::Config,
    errors::Error,
    notify::{DeliveryChannel, Notifier},
    Result,
};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Primary channel: the teloxide bot client.
#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram-bot"
    }

    async fn deliver(&self, destination: &str, html: &str) -> Result<()> {
        self.bot
            .send_message(recipient(destination), html.to_string())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}

/// Fallback channel: a plain HTTPS call to the Bot API `sendMessage` method.
#[derive(Clone, Debug)]
pub struct HttpsChannel {
    token: String,
    api_base: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

impl HttpsChannel {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, TELEGRAM_API_BASE)
    }

    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl DeliveryChannel for HttpsChannel {
    fn name(&self) -> &str {
        "telegram-https"
    }

    async fn deliver(&self, destination: &str, html: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.send_message_url())
            .json(&SendMessage {
                chat_id: destination,
                text: html,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| {
                Error::External(format!("telegram https request error: {}", e.without_url()))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "telegram https send failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }
}

/// Numeric destinations are chat ids; anything else is a channel username.
pub fn recipient(destination: &str) -> Recipient {
    let d = destination.trim();
    match d.parse::<i64>() {
        Ok(id) => Recipient::Id(teloxide::types::ChatId(id)),
        Err(_) if d.starts_with('@') => Recipient::ChannelUsername(d.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{d}")),
    }
}

/// Build the admin notifier from configuration: teloxide first, raw HTTPS as
/// the single fallback. Disabled when the token or the chat id is missing.
pub fn build_notifier(cfg: &Config) -> Notifier {
    let (Some(token), Some(chat_id)) = (&cfg.telegram_bot_token, &cfg.telegram_chat_id) else {
        return Notifier::disabled();
    };

    let primary: Arc<dyn DeliveryChannel> = Arc::new(TelegramChannel::new(Bot::new(token.clone())));
    let fallback: Arc<dyn DeliveryChannel> = Arc::new(HttpsChannel::new(token.clone()));
    Notifier::new(chat_id.clone(), vec![primary, fallback])
}
