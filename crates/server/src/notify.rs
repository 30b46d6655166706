use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use corrubox_core::config::NotificationConfig;
use corrubox_core::notification::{NotificationError, NotificationSink, QuoteNotification};

/// Posts contact-request notifications to the configured webhook. The shared
/// secret, when set, travels in a header so the receiving end can reject
/// forged submissions.
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    url: String,
    secret: Option<SecretString>,
}

impl WebhookNotificationSink {
    pub fn from_config(
        config: &NotificationConfig,
    ) -> Result<Option<Self>, NotificationError> {
        if !config.enabled {
            return Ok(None);
        }
        let url = config
            .webhook_url
            .clone()
            .ok_or_else(|| NotificationError("notification webhook URL is not set".to_owned()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| NotificationError(error.to_string()))?;
        Ok(Some(Self { client, url, secret: config.webhook_secret.clone() }))
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify(&self, notification: QuoteNotification) -> Result<(), NotificationError> {
        let mut request = self.client.post(&self.url).json(&notification);
        if let Some(secret) = &self.secret {
            request = request.header("X-Webhook-Token", secret.expose_secret());
        }
        let response =
            request.send().await.map_err(|error| NotificationError(error.to_string()))?;
        if !response.status().is_success() {
            return Err(NotificationError(format!(
                "webhook responded with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Stands in when notifications are disabled; the quote path never branches
/// on sink presence.
pub struct DisabledNotificationSink;

#[async_trait]
impl NotificationSink for DisabledNotificationSink {
    async fn notify(&self, _notification: QuoteNotification) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use corrubox_core::config::NotificationConfig;

    use crate::notify::WebhookNotificationSink;

    #[test]
    fn disabled_config_builds_no_sink() {
        let config = NotificationConfig {
            enabled: false,
            webhook_url: None,
            webhook_secret: None,
            timeout_secs: 10,
        };
        assert!(WebhookNotificationSink::from_config(&config).expect("build").is_none());
    }

    #[test]
    fn enabled_config_without_a_url_is_rejected() {
        let config = NotificationConfig {
            enabled: true,
            webhook_url: None,
            webhook_secret: None,
            timeout_secs: 10,
        };
        assert!(WebhookNotificationSink::from_config(&config).is_err());
    }

    #[test]
    fn enabled_config_with_a_url_builds_a_sink() {
        let config = NotificationConfig {
            enabled: true,
            webhook_url: Some("https://hooks.example.com/corrubox".to_owned()),
            webhook_secret: None,
            timeout_secs: 10,
        };
        assert!(WebhookNotificationSink::from_config(&config).expect("build").is_some());
    }
}
