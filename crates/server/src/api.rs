//! JSON API for the quote lifecycle.
//!
//! Endpoints:
//! - `POST  /api/v1/public/quotes`                      — instant web quote (lead or contact request)
//! - `POST  /api/v1/public/quotes/{id}/convert`         — convert a web quote into a client
//! - `PATCH /api/v1/orders/{id}/status`                 — move an order through the pipeline
//! - `POST  /api/v1/orders/{id}/confirm-quantities`     — reconcile delivered production counts

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{patch, post},
    Json, Router,
};
use chrono::{Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use corrubox_core::aggregator::{self, BoxLineRequest, CostExtras};
use corrubox_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use corrubox_core::config::QuotingConfig;
use corrubox_core::conversion::{self, ClientMatches, QuoteSynthesis};
use corrubox_core::dedup::{self, DedupDecision};
use corrubox_core::domain::client;
use corrubox_core::domain::order::{OrderId, OrderItemId, OrderStatus, OrderTransitionPolicy};
use corrubox_core::domain::public_quote::{PublicQuote, PublicQuoteId, PublicQuoteStatus};
use corrubox_core::domain::quote::QuoteChannel;
use corrubox_core::errors::{ApplicationError, DomainError, InterfaceError};
use corrubox_core::geometry::BoxDimensions;
use corrubox_core::notification::{NotificationSink, QuoteNotification};
use corrubox_core::pricing::policy_for_channel;
use corrubox_core::reconciliation::{self, DeliveredQuantity};
use corrubox_core::validation::{self, BoxLineInput, ContactInput};
use corrubox_db::repositories::{
    ClientRepository, OrderRepository, PricingConfigRepository, PublicQuoteRepository,
    QuoteRepository, RepositoryError,
};

#[derive(Clone)]
pub struct ApiState {
    pub pricing_configs: Arc<dyn PricingConfigRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub public_quotes: Arc<dyn PublicQuoteRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub audit: Arc<dyn AuditSink>,
    pub notifications: Arc<dyn NotificationSink>,
    pub quoting: QuotingConfig,
    pub notification_enabled: bool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/public/quotes", post(submit_public_quote))
        .route("/api/v1/public/quotes/{id}/convert", post(convert_public_quote))
        .route("/api/v1/orders/{id}/status", patch(transition_order))
        .route("/api/v1/orders/{id}/confirm-quantities", post(confirm_quantities))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    NotFound { message: String, correlation_id: String },
    Interface(InterfaceError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    correlation_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, correlation_id) = match self {
            ApiError::NotFound { message, correlation_id } => {
                (StatusCode::NOT_FOUND, message, correlation_id)
            }
            ApiError::Interface(error) => {
                let status = match &error {
                    InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
                    InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
                    InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let correlation_id = match &error {
                    InterfaceError::BadRequest { correlation_id, .. }
                    | InterfaceError::Conflict { correlation_id, .. }
                    | InterfaceError::ServiceUnavailable { correlation_id, .. }
                    | InterfaceError::Internal { correlation_id, .. } => correlation_id.clone(),
                };
                (status, error.user_message().to_owned(), correlation_id)
            }
        };
        (status, Json(ErrorBody { error: message, correlation_id })).into_response()
    }
}

fn domain_error(error: DomainError, correlation_id: &str) -> ApiError {
    ApiError::Interface(ApplicationError::from(error).into_interface(correlation_id))
}

fn persistence_error(error: RepositoryError, correlation_id: &str) -> ApiError {
    tracing::error!(error = %error, correlation_id = %correlation_id, "repository failure");
    ApiError::Interface(
        ApplicationError::Persistence(error.to_string()).into_interface(correlation_id),
    )
}

fn bad_request(message: String, correlation_id: &str) -> ApiError {
    ApiError::Interface(InterfaceError::BadRequest {
        message,
        correlation_id: correlation_id.to_owned(),
    })
}

fn not_found(message: String, correlation_id: &str) -> ApiError {
    ApiError::NotFound { message, correlation_id: correlation_id.to_owned() }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PublicQuoteRequest {
    pub requester_name: String,
    pub requester_email: String,
    #[serde(default)]
    pub requester_phone: Option<String>,
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub quantity: u32,
    #[serde(default)]
    pub has_printing: bool,
    #[serde(default)]
    pub printing_colors: Option<u32>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub distance_km: Option<u32>,
    #[serde(default)]
    pub requested_contact: bool,
}

#[derive(Debug, Serialize)]
pub struct PublicQuoteResponse {
    pub id: String,
    /// `true` when the request was folded into a recent lead from the same
    /// email instead of creating a second row.
    pub merged: bool,
    pub total_m2: Decimal,
    pub price_per_m2: Decimal,
    pub subtotal: Decimal,
    pub estimated_days: u32,
    pub oversized: bool,
    pub free_shipping: bool,
    pub shipping_note: String,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    #[serde(default)]
    pub cuit: Option<String>,
    #[serde(default)]
    pub create_draft_quote: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub public_quote_id: String,
    pub client_id: String,
    pub client_created: bool,
    pub quote_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderTransitionRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    pub production_started_at: Option<chrono::DateTime<Utc>>,
    pub shipped_at: Option<chrono::DateTime<Utc>>,
    pub delivered_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmQuantitiesRequest {
    pub counts: Vec<DeliveredCount>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveredCount {
    pub item_id: Uuid,
    pub quantity_delivered: u32,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    pub order_id: String,
    pub total_delivered_m2: Decimal,
    pub difference_m2: Decimal,
    pub amount_due: Decimal,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn submit_public_quote(
    State(state): State<ApiState>,
    Json(body): Json<PublicQuoteRequest>,
) -> Result<(StatusCode, Json<PublicQuoteResponse>), ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let context = AuditContext::new(None, correlation_id.clone(), "public-api");

    let checks = validation::merge([
        validation::validate_box_lines(
            &[BoxLineInput {
                length_mm: body.length_mm,
                width_mm: body.width_mm,
                height_mm: body.height_mm,
                quantity: body.quantity,
            }],
            &state.quoting,
        ),
        validation::validate_contact(
            &ContactInput {
                requester_name: &body.requester_name,
                requester_email: &body.requester_email,
                requester_phone: body.requester_phone.as_deref(),
            },
            body.requested_contact,
        ),
        validation::validate_distance(body.distance_km, &state.quoting),
    ]);
    if let Err(error) = checks.into_domain_result() {
        state.audit.emit(AuditEvent::new(
            &context,
            "public_quote.validation_failed",
            AuditCategory::Ingress,
            AuditOutcome::Rejected,
        ));
        return Err(domain_error(error, &correlation_id));
    }

    let config = state
        .pricing_configs
        .find_active(now)
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?
        .ok_or_else(|| {
            tracing::error!(correlation_id = %correlation_id, "no active pricing configuration");
            ApiError::Interface(ApplicationError::MissingActiveConfig.into_interface(&correlation_id))
        })?;

    let aggregated = aggregator::aggregate(
        &[BoxLineRequest {
            dimensions: BoxDimensions {
                length_mm: body.length_mm,
                width_mm: body.width_mm,
                height_mm: body.height_mm,
            },
            quantity: body.quantity,
            is_custom: true,
        }],
        body.has_printing,
        body.distance_km,
        CostExtras::default(),
        &config,
        policy_for_channel(QuoteChannel::Web),
    )
    .map_err(|error| domain_error(error, &correlation_id))?;

    let normalized_email = client::normalize_email(&body.requester_email);
    let oversized = aggregated.lines.first().map(|line| line.oversized).unwrap_or(false);

    let fresh_record = |id: PublicQuoteId| PublicQuote {
        id,
        requester_name: body.requester_name.clone(),
        requester_email: body.requester_email.clone(),
        normalized_email: normalized_email.clone(),
        requester_phone: body.requester_phone.clone(),
        length_mm: body.length_mm,
        width_mm: body.width_mm,
        height_mm: body.height_mm,
        quantity: body.quantity,
        has_printing: body.has_printing,
        printing_colors: body.printing_colors,
        address: body.address.clone(),
        city: body.city.clone(),
        province: body.province.clone(),
        distance_km: body.distance_km,
        total_m2: aggregated.total_m2,
        price_per_m2: aggregated.price_per_m2,
        subtotal: aggregated.subtotal,
        estimated_days: aggregated.production_days,
        oversized,
        requested_contact: body.requested_contact,
        status: PublicQuoteStatus::Pending,
        converted_at: None,
        converted_to_client_id: None,
        created_at: now,
        updated_at: now,
    };

    let mut merged = false;
    let record = if body.requested_contact {
        let window = Duration::hours(i64::from(state.quoting.lead_merge_window_hours));
        let candidates = state
            .public_quotes
            .recent_for_email(&normalized_email, now - window)
            .await
            .map_err(|error| persistence_error(error, &correlation_id))?;
        match dedup::decide(&candidates, now, window) {
            DedupDecision::PromoteExisting(id) => {
                match candidates.into_iter().find(|candidate| candidate.id == id) {
                    Some(mut existing) => {
                        dedup::promote(
                            &mut existing,
                            &dedup::SubmissionContact {
                                requester_name: body.requester_name.clone(),
                                requester_email: body.requester_email.clone(),
                                requester_phone: body.requester_phone.clone(),
                                address: body.address.clone(),
                                city: body.city.clone(),
                                province: body.province.clone(),
                                distance_km: body.distance_km,
                            },
                            now,
                        );
                        merged = true;
                        existing
                    }
                    None => fresh_record(PublicQuoteId(Uuid::new_v4())),
                }
            }
            DedupDecision::CreateNew => fresh_record(PublicQuoteId(Uuid::new_v4())),
        }
    } else {
        fresh_record(PublicQuoteId(Uuid::new_v4()))
    };

    state
        .public_quotes
        .save(record.clone())
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?;

    let context =
        AuditContext::new(Some(record.id.to_string()), correlation_id.clone(), "public-api");
    state.audit.emit(
        AuditEvent::new(
            &context,
            if merged { "public_quote.merged" } else { "public_quote.created" },
            AuditCategory::Ingress,
            AuditOutcome::Success,
        )
        .with_metadata("requested_contact", record.requested_contact.to_string())
        .with_metadata("total_m2", record.total_m2.to_string()),
    );

    // Best effort: the quote is already persisted, a delivery failure only
    // costs the sales ping.
    if record.requested_contact && state.notification_enabled {
        let notification = QuoteNotification::from_public_quote(&record);
        if let Err(error) = state.notifications.notify(notification).await {
            tracing::warn!(
                error = %error,
                correlation_id = %correlation_id,
                public_quote_id = %record.id,
                "contact notification delivery failed"
            );
        }
    }

    let status = if merged { StatusCode::OK } else { StatusCode::CREATED };
    Ok((
        status,
        Json(PublicQuoteResponse {
            id: record.id.to_string(),
            merged,
            total_m2: record.total_m2,
            price_per_m2: record.price_per_m2,
            subtotal: record.subtotal,
            estimated_days: record.estimated_days,
            oversized: record.oversized,
            free_shipping: aggregated.shipping.free_shipping,
            shipping_note: aggregated.shipping.note,
        }),
    ))
}

pub async fn convert_public_quote(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<ConvertRequest>,
) -> Result<Json<ConversionResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let context = AuditContext::new(Some(id.clone()), correlation_id.clone(), "public-api");

    let record_id = id
        .parse::<Uuid>()
        .map(PublicQuoteId)
        .map_err(|_| bad_request(format!("invalid public quote id `{id}`"), &correlation_id))?;
    let record = state
        .public_quotes
        .find_by_id(&record_id)
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?
        .ok_or_else(|| not_found(format!("public quote `{id}` not found"), &correlation_id))?;

    let normalized_cuit = body.cuit.as_deref().and_then(client::normalize_cuit);
    let by_cuit = match &normalized_cuit {
        Some(cuit) => state
            .clients
            .find_by_cuit(cuit)
            .await
            .map_err(|error| persistence_error(error, &correlation_id))?,
        None => None,
    };
    let by_email = state
        .clients
        .find_by_normalized_email(&record.normalized_email)
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?;

    let mut active_config = None;
    let mut reserved_number = None;
    if body.create_draft_quote {
        let config = state
            .pricing_configs
            .find_active(now)
            .await
            .map_err(|error| persistence_error(error, &correlation_id))?
            .ok_or_else(|| {
                ApiError::Interface(
                    ApplicationError::MissingActiveConfig.into_interface(&correlation_id),
                )
            })?;
        let number =
            state.quotes.next_quote_number(now.year()).await.map_err(|error| {
                ApiError::Interface(
                    ApplicationError::SequenceUnavailable(error.to_string())
                        .into_interface(&correlation_id),
                )
            })?;
        active_config = Some(config);
        reserved_number = Some(number);
    }
    let synthesis = active_config.as_ref().zip(reserved_number).map(|(config, quote_number)| {
        QuoteSynthesis { quote_number, config, policy: policy_for_channel(QuoteChannel::Web) }
    });

    let outcome = conversion::convert(
        record,
        body.cuit.as_deref(),
        ClientMatches { by_cuit, by_email },
        synthesis,
        now,
    )
    .map_err(|error| {
        state.audit.emit(AuditEvent::new(
            &context,
            "public_quote.conversion_rejected",
            AuditCategory::Conversion,
            AuditOutcome::Rejected,
        ));
        domain_error(error, &correlation_id)
    })?;

    state
        .clients
        .save(outcome.client.clone())
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?;
    state
        .public_quotes
        .save(outcome.public_quote.clone())
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?;
    if let Some(draft) = &outcome.draft_quote {
        state
            .quotes
            .save(draft.clone())
            .await
            .map_err(|error| persistence_error(error, &correlation_id))?;
    }

    state.audit.emit(
        AuditEvent::new(
            &context,
            "public_quote.converted",
            AuditCategory::Conversion,
            AuditOutcome::Success,
        )
        .with_metadata("client_id", outcome.client.id.to_string())
        .with_metadata("client_created", outcome.client_created.to_string()),
    );

    Ok(Json(ConversionResponse {
        public_quote_id: outcome.public_quote.id.to_string(),
        client_id: outcome.client.id.to_string(),
        client_created: outcome.client_created,
        quote_id: outcome.draft_quote.map(|quote| quote.id.0),
    }))
}

pub async fn transition_order(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<OrderTransitionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let context = AuditContext::new(Some(id.clone()), correlation_id.clone(), "operations-api");

    let order_id = id
        .parse::<Uuid>()
        .map(OrderId)
        .map_err(|_| bad_request(format!("invalid order id `{id}`"), &correlation_id))?;
    let next = OrderStatus::parse(&body.status)
        .ok_or_else(|| bad_request(format!("unknown order status `{}`", body.status), &correlation_id))?;

    let mut order = state
        .orders
        .find_by_id(&order_id)
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?
        .ok_or_else(|| not_found(format!("order `{id}` not found"), &correlation_id))?;

    let from = order.status;
    let policy =
        OrderTransitionPolicy { allow_backward: state.quoting.allow_backward_order_transitions };
    order.transition_to(next, policy, now).map_err(|error| {
        state.audit.emit(
            AuditEvent::new(
                &context,
                "order.transition_rejected",
                AuditCategory::Lifecycle,
                AuditOutcome::Rejected,
            )
            .with_metadata("from", from.as_str())
            .with_metadata("to", next.as_str()),
        );
        domain_error(error, &correlation_id)
    })?;

    state
        .orders
        .save(order.clone())
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?;

    state.audit.emit(
        AuditEvent::new(
            &context,
            "order.transition_applied",
            AuditCategory::Lifecycle,
            AuditOutcome::Success,
        )
        .with_metadata("from", from.as_str())
        .with_metadata("to", next.as_str()),
    );

    Ok(Json(OrderResponse {
        order_id: order.id.to_string(),
        status: order.status.as_str().to_owned(),
        production_started_at: order.production_started_at,
        shipped_at: order.shipped_at,
        delivered_at: order.delivered_at,
    }))
}

pub async fn confirm_quantities(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<ConfirmQuantitiesRequest>,
) -> Result<Json<ReconciliationResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let context = AuditContext::new(Some(id.clone()), correlation_id.clone(), "operations-api");

    let order_id = id
        .parse::<Uuid>()
        .map(OrderId)
        .map_err(|_| bad_request(format!("invalid order id `{id}`"), &correlation_id))?;
    let order = state
        .orders
        .find_by_id(&order_id)
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?
        .ok_or_else(|| not_found(format!("order `{id}` not found"), &correlation_id))?;

    let counts: Vec<DeliveredQuantity> = body
        .counts
        .iter()
        .map(|count| DeliveredQuantity {
            item_id: OrderItemId(count.item_id),
            quantity_delivered: count.quantity_delivered,
        })
        .collect();

    let outcome = reconciliation::reconcile(order, &counts, now).map_err(|error| {
        state.audit.emit(AuditEvent::new(
            &context,
            "order.confirmation_rejected",
            AuditCategory::Lifecycle,
            AuditOutcome::Rejected,
        ));
        domain_error(error, &correlation_id)
    })?;

    state
        .orders
        .save(outcome.order.clone())
        .await
        .map_err(|error| persistence_error(error, &correlation_id))?;

    state.audit.emit(
        AuditEvent::new(
            &context,
            "order.quantities_confirmed",
            AuditCategory::Lifecycle,
            AuditOutcome::Success,
        )
        .with_metadata("total_delivered_m2", outcome.total_delivered_m2.to_string())
        .with_metadata("difference_m2", outcome.difference_m2.to_string()),
    );

    Ok(Json(ReconciliationResponse {
        order_id: outcome.order.id.to_string(),
        total_delivered_m2: outcome.total_delivered_m2,
        difference_m2: outcome.difference_m2,
        amount_due: outcome.order.amount_due,
        status: outcome.order.status.as_str().to_owned(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use corrubox_core::audit::InMemoryAuditSink;
    use corrubox_core::config::QuotingConfig;
    use corrubox_core::domain::client::ClientId;
    use corrubox_core::domain::order::{Order, OrderId, OrderItem, OrderItemId, OrderStatus};
    use corrubox_core::domain::pricing_config::{PricingConfig, PricingConfigId};
    use corrubox_core::domain::public_quote::{PublicQuote, PublicQuoteId, PublicQuoteStatus};
    use corrubox_core::domain::quote::QuoteId;
    use corrubox_core::errors::InterfaceError;
    use corrubox_core::notification::InMemoryNotificationSink;
    use corrubox_db::repositories::{
        InMemoryClientRepository, InMemoryOrderRepository, InMemoryPricingConfigRepository,
        InMemoryPublicQuoteRepository, InMemoryQuoteRepository, OrderRepository,
        PricingConfigRepository, PublicQuoteRepository, QuoteRepository,
    };

    use super::{
        confirm_quantities, convert_public_quote, submit_public_quote, transition_order, ApiError,
        ApiState, ConfirmQuantitiesRequest, ConvertRequest, DeliveredCount,
        OrderTransitionRequest, PublicQuoteRequest,
    };

    struct Harness {
        state: ApiState,
        public_quotes: Arc<InMemoryPublicQuoteRepository>,
        quotes: Arc<InMemoryQuoteRepository>,
        orders: Arc<InMemoryOrderRepository>,
        audit: InMemoryAuditSink,
        notifications: InMemoryNotificationSink,
    }

    fn rate_card() -> PricingConfig {
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
            valid_from: Utc::now() - Duration::days(1),
            valid_until: None,
            is_active: true,
            created_at: Utc::now() - Duration::days(1),
        }
    }

    async fn harness(with_active_config: bool) -> Harness {
        let pricing_configs = Arc::new(InMemoryPricingConfigRepository::default());
        if with_active_config {
            pricing_configs.replace_active(rate_card()).await.expect("seed config");
        }
        let clients = Arc::new(InMemoryClientRepository::default());
        let public_quotes = Arc::new(InMemoryPublicQuoteRepository::default());
        let quotes = Arc::new(InMemoryQuoteRepository::default());
        let orders = Arc::new(InMemoryOrderRepository::default());
        let audit = InMemoryAuditSink::default();
        let notifications = InMemoryNotificationSink::default();

        let state = ApiState {
            pricing_configs,
            clients,
            public_quotes: public_quotes.clone(),
            quotes: quotes.clone(),
            orders: orders.clone(),
            audit: Arc::new(audit.clone()),
            notifications: Arc::new(notifications.clone()),
            quoting: QuotingConfig::default(),
            notification_enabled: true,
        };

        Harness { state, public_quotes, quotes, orders, audit, notifications }
    }

    fn submission(requested_contact: bool) -> PublicQuoteRequest {
        PublicQuoteRequest {
            requester_name: "Ana Pereyra".to_owned(),
            requester_email: "Ana@Ejemplo.com".to_owned(),
            requester_phone: Some("+54 11 4000 0000".to_owned()),
            length_mm: 400,
            width_mm: 300,
            height_mm: 200,
            quantity: 500,
            has_printing: false,
            printing_colors: None,
            address: None,
            city: Some("Lanús".to_owned()),
            province: Some("Buenos Aires".to_owned()),
            distance_km: Some(40),
            requested_contact,
        }
    }

    fn lead(normalized_email: &str, hours_ago: i64) -> PublicQuote {
        let created_at = Utc::now() - Duration::hours(hours_ago);
        PublicQuote {
            id: PublicQuoteId(Uuid::new_v4()),
            requester_name: "Ana".to_owned(),
            requester_email: normalized_email.to_owned(),
            normalized_email: normalized_email.to_owned(),
            requester_phone: None,
            length_mm: 400,
            width_mm: 300,
            height_mm: 200,
            quantity: 500,
            has_printing: false,
            printing_colors: None,
            address: None,
            city: None,
            province: None,
            distance_km: None,
            total_m2: Decimal::new(3_562_500, 4),
            price_per_m2: Decimal::new(68000, 2),
            subtotal: Decimal::new(24_225_000, 2),
            estimated_days: 10,
            oversized: false,
            requested_contact: false,
            status: PublicQuoteStatus::Pending,
            converted_at: None,
            converted_to_client_id: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn ready_order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId(Uuid::new_v4()),
            quote_id: QuoteId("Q-2026-0001".to_owned()),
            client_id: ClientId(Uuid::new_v4()),
            status: OrderStatus::Ready,
            items: vec![OrderItem {
                id: OrderItemId(Uuid::new_v4()),
                length_mm: 400,
                width_mm: 300,
                height_mm: 200,
                quantity_quoted: 5000,
                quantity_delivered: None,
                area_per_unit_m2: Decimal::new(7125, 4),
            }],
            deposit_paid: true,
            balance_paid: false,
            quantities_confirmed: false,
            total_m2: Decimal::new(3_562_5000, 4),
            price_per_m2: Decimal::new(48000, 2),
            amount_due: Decimal::new(1_710_000_00, 2),
            production_started_at: Some(now),
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn anonymous_lead_is_priced_and_persisted() {
        let harness = harness(true).await;

        let (status, Json(response)) =
            submit_public_quote(State(harness.state.clone()), Json(submission(false)))
                .await
                .expect("submit");

        assert_eq!(status, StatusCode::CREATED);
        assert!(!response.merged);
        // 356.25 m2 is below the 1000 m2 model minimum: surcharge rate.
        assert_eq!(response.total_m2, Decimal::new(3_562_500, 4));
        assert_eq!(response.price_per_m2, Decimal::new(68000, 2));
        assert_eq!(response.subtotal, Decimal::new(24_225_000, 2));
        assert!(!response.free_shipping);

        let stored = harness
            .public_quotes
            .recent_for_email("ana@ejemplo.com", Utc::now() - Duration::hours(1))
            .await
            .expect("query");
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].requested_contact);

        // A silent price view sends no sales ping.
        assert!(harness.notifications.sent().is_empty());
        assert!(harness
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "public_quote.created"));
    }

    #[tokio::test]
    async fn contact_request_merges_into_a_recent_lead_and_notifies() {
        let harness = harness(true).await;
        let existing = lead("ana@ejemplo.com", 2);
        harness.public_quotes.save(existing.clone()).await.expect("seed lead");

        let (status, Json(response)) =
            submit_public_quote(State(harness.state.clone()), Json(submission(true)))
                .await
                .expect("submit");

        assert_eq!(status, StatusCode::OK);
        assert!(response.merged);
        assert_eq!(response.id, existing.id.to_string());

        let stored =
            harness.public_quotes.find_by_id(&existing.id).await.expect("query").expect("row");
        assert!(stored.requested_contact);
        assert_eq!(stored.requester_name, "Ana Pereyra");
        assert_eq!(stored.city.as_deref(), Some("Lanús"));
        // The priced spec of the original lead is untouched.
        assert_eq!(stored.total_m2, existing.total_m2);

        assert_eq!(harness.notifications.sent().len(), 1);
        assert!(harness
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "public_quote.merged"));
    }

    #[tokio::test]
    async fn stale_leads_get_a_fresh_row_instead_of_merging() {
        let harness = harness(true).await;
        let existing = lead("ana@ejemplo.com", 30);
        harness.public_quotes.save(existing.clone()).await.expect("seed lead");

        let (status, Json(response)) =
            submit_public_quote(State(harness.state.clone()), Json(submission(true)))
                .await
                .expect("submit");

        assert_eq!(status, StatusCode::CREATED);
        assert!(!response.merged);
        assert_ne!(response.id, existing.id.to_string());
    }

    #[tokio::test]
    async fn out_of_range_dimensions_are_rejected_with_every_violation() {
        let harness = harness(true).await;
        let mut body = submission(false);
        body.length_mm = 10;
        body.quantity = 0;

        let error = submit_public_quote(State(harness.state.clone()), Json(body))
            .await
            .expect_err("invalid submission");

        match error {
            ApiError::Interface(InterfaceError::BadRequest { message, .. }) => {
                assert!(message.contains("below the 50mm minimum"));
                assert!(message.contains("at least 1"));
            }
            other => panic!("expected bad request, got {other:?}"),
        }
        assert!(harness
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "public_quote.validation_failed"));
    }

    #[tokio::test]
    async fn missing_rate_card_is_an_internal_error_never_a_default_price() {
        let harness = harness(false).await;

        let error = submit_public_quote(State(harness.state.clone()), Json(submission(false)))
            .await
            .expect_err("no active config");

        assert!(matches!(error, ApiError::Interface(InterfaceError::Internal { .. })));
    }

    #[tokio::test]
    async fn conversion_creates_a_client_and_mints_a_draft_quote() {
        let harness = harness(true).await;
        let mut record = lead("ana@ejemplo.com", 2);
        record.requested_contact = true;
        harness.public_quotes.save(record.clone()).await.expect("seed");

        let Json(response) = convert_public_quote(
            Path(record.id.to_string()),
            State(harness.state.clone()),
            Json(ConvertRequest {
                cuit: Some("30-71234567-8".to_owned()),
                create_draft_quote: true,
            }),
        )
        .await
        .expect("convert");

        assert!(response.client_created);
        let quote_id = response.quote_id.expect("draft quote id");
        assert!(quote_id.starts_with("Q-"));

        let stored =
            harness.public_quotes.find_by_id(&record.id).await.expect("query").expect("row");
        assert_eq!(stored.status, PublicQuoteStatus::Converted);
        assert!(stored.converted_to_client_id.is_some());

        let draft =
            harness.quotes.find_by_id(&QuoteId(quote_id)).await.expect("query").expect("draft");
        assert_eq!(draft.lines.len(), 1);
        assert!(harness
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "public_quote.converted"));
    }

    #[tokio::test]
    async fn a_second_conversion_is_a_conflict() {
        let harness = harness(true).await;
        let mut record = lead("ana@ejemplo.com", 2);
        record.requested_contact = true;
        harness.public_quotes.save(record.clone()).await.expect("seed");

        let Json(first) = convert_public_quote(
            Path(record.id.to_string()),
            State(harness.state.clone()),
            Json(ConvertRequest { cuit: None, create_draft_quote: false }),
        )
        .await
        .expect("first conversion");
        assert!(first.client_created);
        assert_eq!(first.quote_id, None);

        let error = convert_public_quote(
            Path(record.id.to_string()),
            State(harness.state.clone()),
            Json(ConvertRequest { cuit: None, create_draft_quote: false }),
        )
        .await
        .expect_err("second conversion");

        assert!(matches!(error, ApiError::Interface(InterfaceError::Conflict { .. })));
    }

    #[tokio::test]
    async fn unknown_public_quote_is_not_found() {
        let harness = harness(true).await;

        let error = convert_public_quote(
            Path(Uuid::new_v4().to_string()),
            State(harness.state.clone()),
            Json(ConvertRequest { cuit: None, create_draft_quote: false }),
        )
        .await
        .expect_err("missing record");

        assert!(matches!(error, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn order_transition_stamps_the_shipping_milestone() {
        let harness = harness(true).await;
        let order = ready_order();
        harness.orders.save(order.clone()).await.expect("seed order");

        let Json(response) = transition_order(
            Path(order.id.to_string()),
            State(harness.state.clone()),
            Json(OrderTransitionRequest { status: "shipped".to_owned() }),
        )
        .await
        .expect("transition");

        assert_eq!(response.status, "shipped");
        assert!(response.shipped_at.is_some());
        assert!(harness
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "order.transition_applied"));
    }

    #[tokio::test]
    async fn unpaid_deposit_blocks_leaving_pending_deposit() {
        let harness = harness(true).await;
        let mut order = ready_order();
        order.status = OrderStatus::PendingDeposit;
        order.deposit_paid = false;
        harness.orders.save(order.clone()).await.expect("seed order");

        let error = transition_order(
            Path(order.id.to_string()),
            State(harness.state.clone()),
            Json(OrderTransitionRequest { status: "confirmed".to_owned() }),
        )
        .await
        .expect_err("deposit gate");

        assert!(matches!(error, ApiError::Interface(InterfaceError::Conflict { .. })));
        assert!(harness
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "order.transition_rejected"));
    }

    #[tokio::test]
    async fn unknown_status_value_is_a_bad_request() {
        let harness = harness(true).await;
        let order = ready_order();
        harness.orders.save(order.clone()).await.expect("seed order");

        let error = transition_order(
            Path(order.id.to_string()),
            State(harness.state.clone()),
            Json(OrderTransitionRequest { status: "teleported".to_owned() }),
        )
        .await
        .expect_err("unknown status");

        assert!(matches!(error, ApiError::Interface(InterfaceError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn quantity_confirmation_recomputes_the_amount_due() {
        let harness = harness(true).await;
        let order = ready_order();
        let item_id = order.items[0].id;
        harness.orders.save(order.clone()).await.expect("seed order");

        let Json(response) = confirm_quantities(
            Path(order.id.to_string()),
            State(harness.state.clone()),
            Json(ConfirmQuantitiesRequest {
                counts: vec![DeliveredCount { item_id: item_id.0, quantity_delivered: 5200 }],
            }),
        )
        .await
        .expect("confirm");

        // 0.7125 m2 x 5200 = 3705.0000 m2 at the frozen 480.00 rate.
        assert_eq!(response.total_delivered_m2, Decimal::new(3_705_0000, 4));
        assert_eq!(response.difference_m2, Decimal::new(142_5000, 4));
        assert_eq!(response.amount_due, Decimal::new(1_778_400_00, 2));

        let stored =
            harness.orders.find_by_id(&order.id).await.expect("query").expect("order");
        assert!(stored.quantities_confirmed);
        assert_eq!(stored.items[0].quantity_delivered, Some(5200));
    }

    #[tokio::test]
    async fn a_second_confirmation_is_a_conflict() {
        let harness = harness(true).await;
        let order = ready_order();
        harness.orders.save(order.clone()).await.expect("seed order");

        // Empty counts default every item to its quoted quantity.
        let Json(first) = confirm_quantities(
            Path(order.id.to_string()),
            State(harness.state.clone()),
            Json(ConfirmQuantitiesRequest { counts: Vec::new() }),
        )
        .await
        .expect("first confirmation");
        assert_eq!(first.total_delivered_m2, order.total_m2);
        assert_eq!(first.difference_m2, Decimal::ZERO);

        let error = confirm_quantities(
            Path(order.id.to_string()),
            State(harness.state.clone()),
            Json(ConfirmQuantitiesRequest { counts: Vec::new() }),
        )
        .await
        .expect_err("second confirmation");

        assert!(matches!(error, ApiError::Interface(InterfaceError::Conflict { .. })));
    }

    #[tokio::test]
    async fn counts_for_unknown_items_are_rejected_before_any_write() {
        let harness = harness(true).await;
        let order = ready_order();
        harness.orders.save(order.clone()).await.expect("seed order");

        let error = confirm_quantities(
            Path(order.id.to_string()),
            State(harness.state.clone()),
            Json(ConfirmQuantitiesRequest {
                counts: vec![DeliveredCount { item_id: Uuid::new_v4(), quantity_delivered: 10 }],
            }),
        )
        .await
        .expect_err("unknown item");

        assert!(matches!(error, ApiError::Interface(InterfaceError::BadRequest { .. })));
        let stored =
            harness.orders.find_by_id(&order.id).await.expect("query").expect("order");
        assert!(!stored.quantities_confirmed);
    }
}
