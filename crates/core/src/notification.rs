use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::public_quote::PublicQuote;

/// Payload pushed to the sales channel when a visitor asks to be contacted.
/// Carries enough to act on without opening the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteNotification {
    pub public_quote_id: String,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_phone: Option<String>,
    pub city: Option<String>,
    pub box_summary: String,
    pub quantity: u32,
    pub total_m2: Decimal,
    pub subtotal: Decimal,
    pub oversized: bool,
}

impl QuoteNotification {
    pub fn from_public_quote(record: &PublicQuote) -> Self {
        Self {
            public_quote_id: record.id.to_string(),
            requester_name: record.requester_name.clone(),
            requester_email: record.requester_email.clone(),
            requester_phone: record.requester_phone.clone(),
            city: record.city.clone(),
            box_summary: format!(
                "{}x{}x{} mm",
                record.length_mm, record.width_mm, record.height_mm
            ),
            quantity: record.quantity,
            total_m2: record.total_m2,
            subtotal: record.subtotal,
            oversized: record.oversized,
        }
    }
}

/// Outbound notification channel. Delivery is best-effort: callers log a
/// failure and carry on, the quote itself is already persisted.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: QuoteNotification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    sent: std::sync::Arc<std::sync::Mutex<Vec<QuoteNotification>>>,
}

impl InMemoryNotificationSink {
    pub fn sent(&self) -> Vec<QuoteNotification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(&self, notification: QuoteNotification) -> Result<(), NotificationError> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}
