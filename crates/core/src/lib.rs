pub mod aggregator;
pub mod audit;
pub mod config;
pub mod conversion;
pub mod dedup;
pub mod domain;
pub mod errors;
pub mod geometry;
pub mod notification;
pub mod pricing;
pub mod reconciliation;
pub mod validation;

pub use aggregator::{AggregatedQuote, BoxLineRequest, CostExtras};
pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat, QuotingConfig};
pub use conversion::{ClientMatches, ConversionOutcome, QuoteSynthesis};
pub use dedup::{DedupDecision, SubmissionContact};
pub use domain::client::{Client, ClientId};
pub use domain::order::{Order, OrderId, OrderItem, OrderItemId, OrderStatus, OrderTransitionPolicy};
pub use domain::pricing_config::{PricingConfig, PricingConfigId};
pub use domain::public_quote::{PublicQuote, PublicQuoteId, PublicQuoteStatus};
pub use domain::quote::{Quote, QuoteChannel, QuoteId, QuoteLine, QuoteStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use geometry::{BoxDimensions, SheetLayout};
pub use notification::{NotificationSink, QuoteNotification};
pub use pricing::{PhonePricingPolicy, PricingPolicy, ShippingAssessment, TieredPricingPolicy};
pub use reconciliation::{DeliveredQuantity, ReconciliationOutcome};
pub use validation::{ValidationResult, ValidationViolation};
