use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregator::{self, BoxLineRequest, CostExtras};
use crate::domain::client::{self, Client, ClientId};
use crate::domain::pricing_config::PricingConfig;
use crate::domain::public_quote::{PublicQuote, PublicQuoteStatus};
use crate::domain::quote::{Quote, QuoteChannel, QuoteId};
use crate::errors::DomainError;
use crate::geometry::BoxDimensions;
use crate::pricing::PricingPolicy;

/// Caller-fetched candidate clients for the requester. CUIT identifies a
/// business more reliably than an email, so it wins when both match rows.
#[derive(Clone, Debug, Default)]
pub struct ClientMatches {
    pub by_cuit: Option<Client>,
    pub by_email: Option<Client>,
}

/// Everything needed to mint a draft quote alongside the conversion: a
/// pre-reserved quote number and the governing rate card.
pub struct QuoteSynthesis<'a> {
    pub quote_number: QuoteId,
    pub config: &'a PricingConfig,
    pub policy: &'a dyn PricingPolicy,
}

#[derive(Clone, Debug)]
pub struct ConversionOutcome {
    pub public_quote: PublicQuote,
    pub client: Client,
    /// `false` when an existing client was matched and refreshed instead.
    pub client_created: bool,
    pub draft_quote: Option<Quote>,
}

/// Converts a web quote into a client (and optionally a draft dashboard
/// quote). Pure over caller-fetched inputs: the caller looks up candidate
/// clients and reserves a quote number before calling, and persists the
/// outcome afterwards in one transaction.
pub fn convert(
    mut record: PublicQuote,
    cuit: Option<&str>,
    matches: ClientMatches,
    synthesis: Option<QuoteSynthesis<'_>>,
    now: DateTime<Utc>,
) -> Result<ConversionOutcome, DomainError> {
    if record.status == PublicQuoteStatus::Converted || record.converted_at.is_some() {
        return Err(DomainError::AlreadyConverted);
    }
    record.transition_to(PublicQuoteStatus::Converted, now)?;
    record.converted_at = Some(now);

    let normalized_cuit = cuit.and_then(client::normalize_cuit);
    let (mut resolved, client_created) = match matches.by_cuit.or(matches.by_email) {
        Some(existing) => (existing, false),
        None => (
            Client {
                id: ClientId(Uuid::new_v4()),
                name: String::new(),
                email: String::new(),
                normalized_email: String::new(),
                phone: None,
                cuit: None,
                address: None,
                city: None,
                province: None,
                distance_km: None,
                created_at: now,
                updated_at: now,
            },
            true,
        ),
    };

    // Latest write wins: the conversion form is fresher than whatever the
    // matched client row holds.
    resolved.name = record.requester_name.clone();
    resolved.email = record.requester_email.clone();
    resolved.normalized_email = client::normalize_email(&record.requester_email);
    if record.requester_phone.is_some() {
        resolved.phone = record.requester_phone.clone();
    }
    if normalized_cuit.is_some() {
        resolved.cuit = normalized_cuit;
    }
    if record.address.is_some() {
        resolved.address = record.address.clone();
    }
    if record.city.is_some() {
        resolved.city = record.city.clone();
    }
    if record.province.is_some() {
        resolved.province = record.province.clone();
    }
    if record.distance_km.is_some() {
        resolved.distance_km = record.distance_km;
    }
    resolved.updated_at = now;

    record.converted_to_client_id = Some(resolved.id);

    let draft_quote = match synthesis {
        Some(synthesis) => {
            let aggregated = aggregator::aggregate(
                &[BoxLineRequest {
                    dimensions: BoxDimensions {
                        length_mm: record.length_mm,
                        width_mm: record.width_mm,
                        height_mm: record.height_mm,
                    },
                    quantity: record.quantity,
                    is_custom: true,
                }],
                record.has_printing,
                record.distance_km,
                CostExtras::default(),
                synthesis.config,
                synthesis.policy,
            )?;
            Some(aggregated.into_quote(
                synthesis.quote_number,
                Some(resolved.id),
                QuoteChannel::Web,
                synthesis.config,
                now,
            ))
        }
        None => None,
    };

    Ok(ConversionOutcome { public_quote: record, client: resolved, client_created, draft_quote })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::conversion::{convert, ClientMatches, ConversionOutcome, QuoteSynthesis};
    use crate::domain::client::{Client, ClientId};
    use crate::domain::pricing_config::{PricingConfig, PricingConfigId};
    use crate::domain::public_quote::{PublicQuote, PublicQuoteId, PublicQuoteStatus};
    use crate::domain::quote::{QuoteChannel, QuoteId, QuoteStatus};
    use crate::errors::DomainError;
    use crate::pricing::TieredPricingPolicy;

    fn web_quote() -> PublicQuote {
        let now = Utc::now();
        PublicQuote {
            id: PublicQuoteId(Uuid::new_v4()),
            requester_name: "Ana Pereyra".to_owned(),
            requester_email: "Ana@Ejemplo.com".to_owned(),
            normalized_email: "ana@ejemplo.com".to_owned(),
            requester_phone: Some("+54 11 4000 0000".to_owned()),
            length_mm: 400,
            width_mm: 300,
            height_mm: 200,
            quantity: 500,
            has_printing: false,
            printing_colors: None,
            address: Some("Av. Siempreviva 742".to_owned()),
            city: Some("Lanús".to_owned()),
            province: Some("Buenos Aires".to_owned()),
            distance_km: Some(40),
            total_m2: Decimal::new(3_562_500, 4),
            price_per_m2: Decimal::new(55000, 2),
            subtotal: Decimal::new(19_593_750, 2),
            estimated_days: 10,
            oversized: false,
            requested_contact: true,
            status: PublicQuoteStatus::Pending,
            converted_at: None,
            converted_to_client_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn existing_client(email: &str) -> Client {
        let now = Utc::now();
        Client {
            id: ClientId(Uuid::new_v4()),
            name: "Pereyra SRL".to_owned(),
            email: email.to_owned(),
            normalized_email: email.to_lowercase(),
            phone: None,
            cuit: Some("30712345678".to_owned()),
            address: None,
            city: None,
            province: None,
            distance_km: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn config() -> PricingConfig {
        PricingConfig {
            id: PricingConfigId(1),
            standard_price_per_m2: Decimal::new(55000, 2),
            volume_price_per_m2: Decimal::new(48000, 2),
            volume_threshold_m2: Decimal::from(3000u32),
            min_m2_per_model: Decimal::from(1000u32),
            below_min_price_per_m2: Some(Decimal::new(68000, 2)),
            free_shipping_min_m2: Decimal::from(2000u32),
            free_shipping_max_km: 100,
            production_days_standard: 10,
            production_days_printing: 15,
            quote_validity_days: 15,
            valid_from: Utc::now(),
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unmatched_requester_becomes_a_new_client() {
        let outcome = convert(
            web_quote(),
            Some("20-31234567-8"),
            ClientMatches::default(),
            None,
            Utc::now(),
        )
        .expect("convert");

        assert!(outcome.client_created);
        assert_eq!(outcome.client.name, "Ana Pereyra");
        assert_eq!(outcome.client.normalized_email, "ana@ejemplo.com");
        assert_eq!(outcome.client.cuit.as_deref(), Some("20312345678"));
        assert_eq!(outcome.client.distance_km, Some(40));
        assert_eq!(outcome.public_quote.status, PublicQuoteStatus::Converted);
        assert_eq!(outcome.public_quote.converted_to_client_id, Some(outcome.client.id));
        assert!(outcome.public_quote.converted_at.is_some());
        assert!(outcome.draft_quote.is_none());
    }

    #[test]
    fn cuit_match_outranks_email_match() {
        let by_cuit = existing_client("facturacion@pereyra.com");
        let by_email = existing_client("ana@ejemplo.com");
        let expected = by_cuit.id;

        let outcome = convert(
            web_quote(),
            Some("30-71234567-8"),
            ClientMatches { by_cuit: Some(by_cuit), by_email: Some(by_email) },
            None,
            Utc::now(),
        )
        .expect("convert");

        assert!(!outcome.client_created);
        assert_eq!(outcome.client.id, expected);
        // The fresher form data overwrites the stored contact details.
        assert_eq!(outcome.client.name, "Ana Pereyra");
        assert_eq!(outcome.client.phone.as_deref(), Some("+54 11 4000 0000"));
    }

    #[test]
    fn matched_client_keeps_fields_the_form_left_blank() {
        let mut record = web_quote();
        record.requester_phone = None;
        record.address = None;
        let existing = existing_client("ana@ejemplo.com");

        let outcome = convert(
            record,
            None,
            ClientMatches { by_cuit: None, by_email: Some(existing) },
            None,
            Utc::now(),
        )
        .expect("convert");

        assert!(!outcome.client_created);
        assert_eq!(outcome.client.cuit.as_deref(), Some("30712345678"));
        assert_eq!(outcome.client.phone, None);
    }

    #[test]
    fn conversion_can_mint_a_draft_quote_in_one_step() {
        let config = config();
        let outcome: ConversionOutcome = convert(
            web_quote(),
            None,
            ClientMatches::default(),
            Some(QuoteSynthesis {
                quote_number: QuoteId("Q-2026-0042".to_owned()),
                config: &config,
                policy: &TieredPricingPolicy,
            }),
            Utc::now(),
        )
        .expect("convert");

        let draft = outcome.draft_quote.expect("draft quote");
        assert_eq!(draft.id, QuoteId("Q-2026-0042".to_owned()));
        assert_eq!(draft.status, QuoteStatus::Draft);
        assert_eq!(draft.channel, QuoteChannel::Web);
        assert_eq!(draft.client_id, Some(outcome.client.id));
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.total_m2, Decimal::new(3_562_500, 4));
    }

    #[test]
    fn a_second_conversion_is_rejected() {
        let outcome =
            convert(web_quote(), None, ClientMatches::default(), None, Utc::now()).expect("first");

        let error =
            convert(outcome.public_quote, None, ClientMatches::default(), None, Utc::now())
                .expect_err("second");
        assert!(matches!(error, DomainError::AlreadyConverted));
    }

    #[test]
    fn rejected_leads_cannot_convert() {
        let mut record = web_quote();
        record.status = PublicQuoteStatus::Rejected;

        let error = convert(record, None, ClientMatches::default(), None, Utc::now())
            .expect_err("rejected lead");
        assert!(matches!(error, DomainError::InvalidPublicQuoteTransition { .. }));
    }
}
