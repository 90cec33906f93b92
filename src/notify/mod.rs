//! Outbound notification channels.
//!
//! Webhook, Slack, and Discord adapters post JSON with a 10-second request
//! deadline; the log channel writes to the process log and never fails.

mod manager;

pub use manager::NotificationManager;

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification delivery failed")]
    DeliveryFailed,
    #[error("invalid notifier type: {0}")]
    InvalidNotifier(String),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The kind of alert being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Down,
    Recovery,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Down => "down",
            AlertKind::Recovery => "recovery",
        }
    }
}

/// A notification event.
#[derive(Debug, Clone)]
pub struct Alert {
    pub service_url: String,
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Configuration for one notification channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub username: String,
}

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

const COLOR_DOWN_HEX: &str = "#FF0000";
const COLOR_RECOVERY_HEX: &str = "#00FF00";
const COLOR_DOWN: u32 = 0xFF0000;
const COLOR_RECOVERY: u32 = 0x00FF00;

/// An outbound notification channel.
#[derive(Debug)]
pub enum Notifier {
    Webhook(WebhookNotifier),
    Slack(SlackNotifier),
    Discord(DiscordNotifier),
    Log,
}

impl Notifier {
    /// Build a notifier from its channel configuration.
    pub fn from_config(config: &NotifierConfig) -> Result<Notifier, NotifyError> {
        match config.kind.as_str() {
            "webhook" => Ok(Notifier::Webhook(WebhookNotifier::new(&config.webhook_url)?)),
            "slack" => Ok(Notifier::Slack(SlackNotifier::new(
                &config.webhook_url,
                &config.channel,
                &config.username,
            )?)),
            "discord" => Ok(Notifier::Discord(DiscordNotifier::new(
                &config.webhook_url,
                &config.username,
            )?)),
            "log" => Ok(Notifier::Log),
            other => Err(NotifyError::InvalidNotifier(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notifier::Webhook(_) => "webhook",
            Notifier::Slack(_) => "slack",
            Notifier::Discord(_) => "discord",
            Notifier::Log => "log",
        }
    }

    /// Deliver one alert through this channel.
    pub async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        match self {
            Notifier::Webhook(n) => n.notify(alert).await,
            Notifier::Slack(n) => n.notify(alert).await,
            Notifier::Discord(n) => n.notify(alert).await,
            Notifier::Log => {
                tracing::info!(
                    kind = alert.kind.as_str(),
                    service = %alert.service_url,
                    at = %alert.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                    "{}",
                    alert.message
                );
                Ok(())
            }
        }
    }
}

fn build_client() -> Result<reqwest::Client, NotifyError> {
    reqwest::Client::builder()
        .timeout(NOTIFY_TIMEOUT)
        .build()
        .map_err(NotifyError::Client)
}

async fn post_json<T: Serialize>(
    client: &reqwest::Client,
    url: &str,
    payload: &T,
) -> Result<(), NotifyError> {
    let resp = client
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|_| NotifyError::DeliveryFailed)?;

    if resp.status().is_success() {
        Ok(())
    } else {
        Err(NotifyError::DeliveryFailed)
    }
}

/// Generic webhook channel.
#[derive(Debug)]
pub struct WebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    service_url: &'a str,
    alert_type: &'a str,
    message: &'a str,
    timestamp: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: &str) -> Result<Self, NotifyError> {
        Ok(Self {
            webhook_url: webhook_url.to_string(),
            client: build_client()?,
        })
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            service_url: &alert.service_url,
            alert_type: alert.kind.as_str(),
            message: &alert.message,
            timestamp: alert.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        post_json(&self.client, &self.webhook_url, &payload).await
    }
}

/// Slack incoming-webhook channel.
#[derive(Debug)]
pub struct SlackNotifier {
    webhook_url: String,
    channel: String,
    username: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    channel: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    username: &'a str,
    text: &'a str,
    attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment<'a> {
    color: &'a str,
    title: &'a str,
    text: &'a str,
}

impl SlackNotifier {
    pub fn new(webhook_url: &str, channel: &str, username: &str) -> Result<Self, NotifyError> {
        Ok(Self {
            webhook_url: webhook_url.to_string(),
            channel: channel.to_string(),
            username: username.to_string(),
            client: build_client()?,
        })
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let color = match alert.kind {
            AlertKind::Down => COLOR_DOWN_HEX,
            AlertKind::Recovery => COLOR_RECOVERY_HEX,
        };
        let payload = SlackPayload {
            channel: &self.channel,
            username: &self.username,
            text: "",
            attachments: vec![SlackAttachment {
                color,
                title: alert.kind.as_str(),
                text: &alert.message,
            }],
        };
        post_json(&self.client, &self.webhook_url, &payload).await
    }
}

/// Discord webhook channel.
#[derive(Debug)]
pub struct DiscordNotifier {
    webhook_url: String,
    username: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct DiscordPayload<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    username: &'a str,
    embeds: Vec<DiscordEmbed<'a>>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
}

impl DiscordNotifier {
    pub fn new(webhook_url: &str, username: &str) -> Result<Self, NotifyError> {
        Ok(Self {
            webhook_url: webhook_url.to_string(),
            username: username.to_string(),
            client: build_client()?,
        })
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let color = match alert.kind {
            AlertKind::Down => COLOR_DOWN,
            AlertKind::Recovery => COLOR_RECOVERY,
        };
        let payload = DiscordPayload {
            username: &self.username,
            embeds: vec![DiscordEmbed {
                title: alert.kind.as_str(),
                description: &alert.message,
                color,
            }],
        };
        post_json(&self.client, &self.webhook_url, &payload).await
    }
}
