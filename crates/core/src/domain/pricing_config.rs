use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PricingConfigId(pub i64);

/// Versioned rate card. Rows are never edited in place: a change supersedes
/// the active row and inserts a new one, so every historical quote can name
/// the exact rates it was priced with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub id: PricingConfigId,
    pub standard_price_per_m2: Decimal,
    pub volume_price_per_m2: Decimal,
    /// Inclusive floor for the volume rate, in m2 of total quote area.
    pub volume_threshold_m2: Decimal,
    pub min_m2_per_model: Decimal,
    /// Surcharge rate for runs under the minimum; `None` disables the rule.
    pub below_min_price_per_m2: Option<Decimal>,
    pub free_shipping_min_m2: Decimal,
    pub free_shipping_max_km: u32,
    pub production_days_standard: u32,
    pub production_days_printing: u32,
    pub quote_validity_days: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PricingConfig {
    pub fn is_currently_active(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from <= now
            && self.valid_until.map(|until| now < until).unwrap_or(true)
    }

    /// Closes this version out. Idempotent: a second supersede keeps the
    /// original closing timestamp.
    pub fn supersede(&mut self, at: DateTime<Utc>) {
        self.is_active = false;
        self.valid_until.get_or_insert(at);
    }
}

/// Picks the governing rate card from a caller-fetched set: the active row
/// with the latest `valid_from`. `None` means pricing must halt; there is no
/// hardcoded fallback rate.
pub fn select_active(configs: &[PricingConfig], now: DateTime<Utc>) -> Option<&PricingConfig> {
    configs
        .iter()
        .filter(|config| config.is_currently_active(now))
        .max_by_key(|config| config.valid_from)
}
