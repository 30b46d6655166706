use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::pricing_config::PricingConfig;
use crate::domain::quote::QuoteChannel;

/// Rate selection strategy per entry channel. Geometry is shared across
/// channels; the constant tables behind each policy are not, and must never
/// be merged.
pub trait PricingPolicy: Send + Sync {
    /// Price per square metre for a whole quote. Always called with the
    /// quote's grand total area — volume tiers apply to the order, never to
    /// a single line.
    fn price_per_m2(&self, total_m2: Decimal, config: &PricingConfig) -> Decimal;
}

/// Web/dashboard pricing: volume tier with an inclusive threshold, plus a
/// below-minimum surcharge that overrides the tier outcome. The surcharge is
/// a penalty for runs too small to schedule economically, not a discount.
#[derive(Clone, Copy, Debug, Default)]
pub struct TieredPricingPolicy;

impl PricingPolicy for TieredPricingPolicy {
    fn price_per_m2(&self, total_m2: Decimal, config: &PricingConfig) -> Decimal {
        if total_m2 < config.min_m2_per_model {
            if let Some(surcharge) = config.below_min_price_per_m2 {
                return surcharge;
            }
        }

        if total_m2 >= config.volume_threshold_m2 {
            config.volume_price_per_m2
        } else {
            config.standard_price_per_m2
        }
    }
}

/// Phone-bot pricing: fixed discount bands off the standard rate. The bands
/// are an independent rule set from the tiered table.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhonePricingPolicy;

impl PhonePricingPolicy {
    /// (area floor in m², discount percent) pairs, largest floor first.
    fn bands() -> [(Decimal, Decimal); 3] {
        [
            (Decimal::from(3000u32), Decimal::from(15u32)),
            (Decimal::from(1500u32), Decimal::from(10u32)),
            (Decimal::from(500u32), Decimal::from(5u32)),
        ]
    }
}

impl PricingPolicy for PhonePricingPolicy {
    fn price_per_m2(&self, total_m2: Decimal, config: &PricingConfig) -> Decimal {
        let discount_pct = Self::bands()
            .into_iter()
            .find(|(floor, _)| total_m2 >= *floor)
            .map(|(_, pct)| pct)
            .unwrap_or(Decimal::ZERO);

        let factor = (Decimal::ONE_HUNDRED - discount_pct) / Decimal::ONE_HUNDRED;
        (config.standard_price_per_m2 * factor).round_dp(2)
    }
}

pub fn policy_for_channel(channel: QuoteChannel) -> &'static dyn PricingPolicy {
    static TIERED: TieredPricingPolicy = TieredPricingPolicy;
    static PHONE: PhonePricingPolicy = PhonePricingPolicy;
    match channel {
        QuoteChannel::Dashboard | QuoteChannel::Web => &TIERED,
        QuoteChannel::Phone => &PHONE,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAssessment {
    pub free_shipping: bool,
    pub note: String,
}

/// Shipping is free only when both the area floor and the distance ceiling
/// hold. An unknown distance can never qualify.
pub fn shipping_eligibility(
    total_m2: Decimal,
    distance_km: Option<u32>,
    config: &PricingConfig,
) -> ShippingAssessment {
    match distance_km {
        Some(distance)
            if total_m2 >= config.free_shipping_min_m2
                && distance <= config.free_shipping_max_km =>
        {
            ShippingAssessment {
                free_shipping: true,
                note: format!(
                    "free shipping: {total_m2} m2 within {distance} km",
                ),
            }
        }
        Some(_) => ShippingAssessment {
            free_shipping: false,
            note: "shipping quoted separately".to_owned(),
        },
        None => ShippingAssessment {
            free_shipping: false,
            note: "shipping requires a delivery distance".to_owned(),
        },
    }
}

pub fn subtotal(total_m2: Decimal, price_per_m2: Decimal) -> Decimal {
    (total_m2 * price_per_m2).round_dp(2)
}

pub fn production_days(has_printing: bool, config: &PricingConfig) -> u32 {
    if has_printing {
        config.production_days_printing
    } else {
        config.production_days_standard
    }
}

pub fn total(
    subtotal: Decimal,
    printing_cost: Option<Decimal>,
    die_cut_cost: Option<Decimal>,
    shipping_cost: Option<Decimal>,
) -> Decimal {
    subtotal
        + printing_cost.unwrap_or(Decimal::ZERO)
        + die_cut_cost.unwrap_or(Decimal::ZERO)
        + shipping_cost.unwrap_or(Decimal::ZERO)
}
