use std::future::Future;
use std::time::Duration;

use log::{error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::TelegramSettings;
use crate::error::SyncError;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers a rendered message. Delivery problems are logged and reported as
/// `false`; they never propagate.
pub trait Notifier {
    fn send_message(&self, text: &str) -> impl Future<Output = bool>;
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize)]
struct TelegramReply {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
    parse_mode: String,
}

impl TelegramNotifier {
    pub fn new(settings: &TelegramSettings) -> Result<TelegramNotifier, SyncError> {
        Ok(TelegramNotifier {
            client: Client::builder().timeout(SEND_TIMEOUT).build()?,
            endpoint: format!("{}/bot{}/sendMessage", settings.api_url, settings.bot_token),
            chat_id: settings.chat_id.clone(),
            parse_mode: settings.parse_mode.clone(),
        })
    }

    async fn try_send(&self, text: &str) -> Result<(), SyncError> {
        let body = SendMessageBody {
            chat_id: &self.chat_id,
            text,
            parse_mode: &self.parse_mode,
        };
        // The endpoint embeds the bot token; keep it out of error messages.
        let res = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())?;
        let status = res.status();
        let reply = res.json::<TelegramReply>().await.ok();
        match reply {
            Some(TelegramReply { ok: true, .. }) if status.is_success() => Ok(()),
            reply => Err(SyncError::Str(format!(
                "Telegram API returned {}: {}",
                status,
                reply
                    .and_then(|x| x.description)
                    .unwrap_or_else(|| "no description".into())
            ))),
        }
    }
}

impl Notifier for TelegramNotifier {
    async fn send_message(&self, text: &str) -> bool {
        match self.try_send(text).await {
            Ok(()) => {
                info!("Telegram notification sent successfully");
                true
            }
            Err(e) => {
                error!("Failed to send Telegram notification: {e}");
                false
            }
        }
    }
}
