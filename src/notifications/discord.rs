use super::{Notification, Notifier, NotifierError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
}

/// Posts notifications to a Discord channel webhook
pub struct DiscordWebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
    username: String,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            username: "Recruit Registrations".to_string(),
        })
    }

    /// Set the display name used for webhook messages
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    fn color_for(notification: &Notification) -> u32 {
        match notification {
            Notification::EventCreated { .. } => 0x2ecc71,
            Notification::EventDeleted { .. } | Notification::RegistrationRemoved { .. } => 0xe74c3c,
            Notification::EventReconciled { .. } => 0xf1c40f,
            _ => 0x3498db,
        }
    }

    fn payload<'a>(&'a self, notification: &Notification) -> WebhookPayload<'a> {
        WebhookPayload {
            username: &self.username,
            embeds: vec![Embed {
                title: notification.name().replace('_', " "),
                description: notification.summary(),
                color: Self::color_for(notification),
                timestamp: chrono::Utc::now().to_rfc3339(),
            }],
        }
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifierError> {
        self.client
            .post(&self.webhook_url)
            .json(&self.payload(notification))
            .send()
            .await?
            .error_for_status()?;

        debug!(notification = notification.name(), "Discord webhook delivered");
        Ok(())
    }
}
