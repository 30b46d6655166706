use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::errors::DomainError;

/// Sequence-allocated quote number, e.g. `Q-2026-0042`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Approved,
    Converted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Approved => "approved",
            Self::Converted => "converted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "approved" => Some(Self::Approved),
            "converted" => Some(Self::Converted),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted | Self::Rejected | Self::Expired)
    }
}

/// Entry surface the quote was produced through. Each channel binds to its
/// own pricing policy; the geometry math is shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteChannel {
    Dashboard,
    Web,
    Phone,
}

impl QuoteChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Web => "web",
            Self::Phone => "phone",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dashboard" => Some(Self::Dashboard),
            "web" => Some(Self::Web),
            "phone" => Some(Self::Phone),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub quantity: u32,
    pub sheet_width_mm: u32,
    pub sheet_length_mm: u32,
    /// Sheet area for one box, stored at 4 decimal places.
    pub area_m2: Decimal,
    /// `area_m2 × quantity`, stored at 4 decimal places.
    pub total_m2: Decimal,
    pub oversized: bool,
    pub is_custom: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub client_id: Option<ClientId>,
    pub status: QuoteStatus,
    pub channel: QuoteChannel,
    pub lines: Vec<QuoteLine>,
    pub total_m2: Decimal,
    pub price_per_m2: Decimal,
    pub subtotal: Decimal,
    pub printing_cost: Option<Decimal>,
    pub die_cut_cost: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub total: Decimal,
    pub production_days: u32,
    pub estimated_delivery: Option<NaiveDate>,
    pub valid_until: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    /// Allow-list of forward transitions. Terminals never transition again;
    /// `expired` is reachable from every pre-conversion state.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteStatus::Draft, QuoteStatus::Sent)
                | (QuoteStatus::Draft, QuoteStatus::Approved)
                | (QuoteStatus::Sent, QuoteStatus::Approved)
                | (QuoteStatus::Draft, QuoteStatus::Rejected)
                | (QuoteStatus::Sent, QuoteStatus::Rejected)
                | (QuoteStatus::Approved, QuoteStatus::Converted)
                | (QuoteStatus::Draft, QuoteStatus::Expired)
                | (QuoteStatus::Sent, QuoteStatus::Expired)
                | (QuoteStatus::Approved, QuoteStatus::Expired)
        )
    }

    /// Applies a transition and stamps the corresponding timestamp field.
    /// Stamps are written once and never overwritten.
    pub fn transition_to(
        &mut self,
        next: QuoteStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidQuoteTransition { from: self.status, to: next });
        }

        self.status = next;
        let stamp = match next {
            QuoteStatus::Sent => Some(&mut self.sent_at),
            QuoteStatus::Approved => Some(&mut self.approved_at),
            QuoteStatus::Expired => Some(&mut self.expired_at),
            QuoteStatus::Converted => Some(&mut self.converted_at),
            QuoteStatus::Draft | QuoteStatus::Rejected => None,
        };
        if let Some(stamp) = stamp {
            stamp.get_or_insert(at);
        }
        Ok(())
    }

    /// Line items are mutable only while drafting.
    pub fn ensure_editable(&self) -> Result<(), DomainError> {
        if self.status == QuoteStatus::Draft {
            Ok(())
        } else {
            Err(DomainError::QuoteNotEditable { status: self.status })
        }
    }

    /// Converted quotes anchor an order and must never be deleted.
    pub fn can_delete(&self) -> bool {
        self.status != QuoteStatus::Converted
    }

    /// System-driven expiry: moves a pre-conversion quote to `expired` once
    /// its validity deadline has elapsed. Returns whether the status changed.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if now <= self.valid_until || !self.can_transition_to(QuoteStatus::Expired) {
            return false;
        }
        self.transition_to(QuoteStatus::Expired, now).is_ok()
    }
}
