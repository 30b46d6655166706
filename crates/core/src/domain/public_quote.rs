use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::client::ClientId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicQuoteId(pub Uuid);

impl std::fmt::Display for PublicQuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicQuoteStatus {
    Pending,
    Contacted,
    Converted,
    Rejected,
}

impl PublicQuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Contacted => "contacted",
            Self::Converted => "converted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "contacted" => Some(Self::Contacted),
            "converted" => Some(Self::Converted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One row per visitor intent: a lead (`requested_contact = false`, the
/// visitor only saw a price) or a web quote (`requested_contact = true`).
/// Denormalized on purpose — a single box spec per row, no line-item table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicQuote {
    pub id: PublicQuoteId,
    pub requester_name: String,
    pub requester_email: String,
    pub normalized_email: String,
    pub requester_phone: Option<String>,
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub quantity: u32,
    pub has_printing: bool,
    pub printing_colors: Option<u32>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub distance_km: Option<u32>,
    pub total_m2: Decimal,
    pub price_per_m2: Decimal,
    pub subtotal: Decimal,
    pub estimated_days: u32,
    pub oversized: bool,
    pub requested_contact: bool,
    pub status: PublicQuoteStatus,
    pub converted_at: Option<DateTime<Utc>>,
    pub converted_to_client_id: Option<ClientId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublicQuote {
    pub fn can_transition_to(&self, next: PublicQuoteStatus) -> bool {
        matches!(
            (self.status, next),
            (PublicQuoteStatus::Pending, PublicQuoteStatus::Contacted)
                | (PublicQuoteStatus::Pending, PublicQuoteStatus::Converted)
                | (PublicQuoteStatus::Pending, PublicQuoteStatus::Rejected)
                | (PublicQuoteStatus::Contacted, PublicQuoteStatus::Converted)
                | (PublicQuoteStatus::Contacted, PublicQuoteStatus::Rejected)
        )
    }

    pub fn transition_to(
        &mut self,
        next: PublicQuoteStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidPublicQuoteTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}
