use std::future::Future;

use poise::serenity_prelude as serenity;
use thiserror::Error;
use tracing::info;

/// Discord embed limits.
const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("discord webhook error: {0}")]
    Discord(String),
}

/// Where notifications go.
pub trait NotificationSink: Send + Sync {
    fn publish(
        &self,
        subject: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Posts each notification as an embed through a Discord webhook.
pub struct DiscordWebhook {
    http: serenity::Http,
    url: String,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>) -> Self {
        // Executing a webhook needs no bot token
        Self {
            http: serenity::Http::new(""),
            url: url.into(),
        }
    }
}

impl NotificationSink for DiscordWebhook {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        let webhook = serenity::Webhook::from_url(&self.http, &self.url)
            .await
            .map_err(|e| NotifyError::Discord(e.to_string()))?;

        let embed = serenity::CreateEmbed::new()
            .title(truncate(subject, TITLE_LIMIT))
            .description(truncate(message, DESCRIPTION_LIMIT))
            .color(0x5865F2);

        webhook
            .execute(&self.http, true, serenity::ExecuteWebhook::new().embed(embed))
            .await
            .map_err(|e| NotifyError::Discord(e.to_string()))?;

        info!(subject, "posted notification to discord");
        Ok(())
    }
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        info!(subject, message, "notification");
        Ok(())
    }
}

/// The sink picked from configuration.
pub enum Sink {
    Discord(DiscordWebhook),
    Log(LogSink),
}

impl NotificationSink for Sink {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        match self {
            Sink::Discord(webhook) => webhook.publish(subject, message).await,
            Sink::Log(log) => log.publish(subject, message).await,
        }
    }
}

/// Cut to at most `limit` characters, marking the cut with an ellipsis.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}
