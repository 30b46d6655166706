use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::pricing_config::PricingConfig;
use crate::domain::quote::{Quote, QuoteChannel, QuoteId, QuoteLine, QuoteStatus};
use crate::errors::DomainError;
use crate::geometry::{self, BoxDimensions};
use crate::pricing::{self, PricingPolicy, ShippingAssessment};

/// One requested box model within a quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxLineRequest {
    pub dimensions: BoxDimensions,
    pub quantity: u32,
    pub is_custom: bool,
}

/// Optional cost add-ons carried on top of the area subtotal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostExtras {
    pub printing_cost: Option<Decimal>,
    pub die_cut_cost: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedQuote {
    pub lines: Vec<QuoteLine>,
    /// Sum of line totals; the figure the single pricing call runs against.
    pub total_m2: Decimal,
    pub price_per_m2: Decimal,
    pub subtotal: Decimal,
    pub extras: CostExtras,
    pub total: Decimal,
    pub production_days: u32,
    pub shipping: ShippingAssessment,
}

/// Prices a whole quote: per-line geometry, one grand total area, exactly
/// one rate applied across every line. Mixing small and large boxes in one
/// order cross-subsidizes intentionally — the volume tier is earned by the
/// order, not the model.
pub fn aggregate(
    requests: &[BoxLineRequest],
    has_printing: bool,
    distance_km: Option<u32>,
    extras: CostExtras,
    config: &PricingConfig,
    policy: &dyn PricingPolicy,
) -> Result<AggregatedQuote, DomainError> {
    if requests.is_empty() {
        return Err(DomainError::InvariantViolation(
            "cannot aggregate a quote with no line items".to_owned(),
        ));
    }

    let mut lines = Vec::with_capacity(requests.len());
    let mut total_m2 = Decimal::ZERO;

    for request in requests {
        let sheet = geometry::unfold(&request.dimensions);
        let area_m2 = sheet.area_m2.round_dp(4);
        let line_total_m2 = (sheet.area_m2 * Decimal::from(request.quantity)).round_dp(4);
        total_m2 += line_total_m2;

        lines.push(QuoteLine {
            length_mm: request.dimensions.length_mm,
            width_mm: request.dimensions.width_mm,
            height_mm: request.dimensions.height_mm,
            quantity: request.quantity,
            sheet_width_mm: sheet.width_mm,
            sheet_length_mm: sheet.length_mm,
            area_m2,
            total_m2: line_total_m2,
            oversized: sheet.oversized,
            is_custom: request.is_custom,
        });
    }

    let price_per_m2 = policy.price_per_m2(total_m2, config);
    let subtotal = pricing::subtotal(total_m2, price_per_m2);
    let total =
        pricing::total(subtotal, extras.printing_cost, extras.die_cut_cost, extras.shipping_cost);

    Ok(AggregatedQuote {
        lines,
        total_m2,
        price_per_m2,
        subtotal,
        extras,
        total,
        production_days: pricing::production_days(has_printing, config),
        shipping: pricing::shipping_eligibility(total_m2, distance_km, config),
    })
}

impl AggregatedQuote {
    /// Materializes a draft quote around the aggregation, with the validity
    /// deadline and delivery estimate derived from the config.
    pub fn into_quote(
        self,
        id: QuoteId,
        client_id: Option<ClientId>,
        channel: QuoteChannel,
        config: &PricingConfig,
        now: DateTime<Utc>,
    ) -> Quote {
        let production_days = self.production_days;
        Quote {
            id,
            client_id,
            status: QuoteStatus::Draft,
            channel,
            lines: self.lines,
            total_m2: self.total_m2,
            price_per_m2: self.price_per_m2,
            subtotal: self.subtotal,
            printing_cost: self.extras.printing_cost,
            die_cut_cost: self.extras.die_cut_cost,
            shipping_cost: self.extras.shipping_cost,
            total: self.total,
            production_days,
            estimated_delivery: Some(
                (now + Duration::days(i64::from(production_days))).date_naive(),
            ),
            valid_until: now + Duration::days(i64::from(config.quote_validity_days)),
            sent_at: None,
            approved_at: None,
            expired_at: None,
            converted_at: None,
            created_at: now,
        }
    }
}
