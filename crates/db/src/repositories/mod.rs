use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use corrubox_core::domain::client::{Client, ClientId};
use corrubox_core::domain::order::{Order, OrderId};
use corrubox_core::domain::pricing_config::PricingConfig;
use corrubox_core::domain::public_quote::{PublicQuote, PublicQuoteId};
use corrubox_core::domain::quote::{Quote, QuoteId};

pub mod client;
pub mod memory;
pub mod order;
pub mod pricing_config;
pub mod public_quote;
pub mod quote;

pub use client::SqlClientRepository;
pub use memory::{
    InMemoryClientRepository, InMemoryOrderRepository, InMemoryPricingConfigRepository,
    InMemoryPublicQuoteRepository, InMemoryQuoteRepository,
};
pub use order::SqlOrderRepository;
pub use pricing_config::SqlPricingConfigRepository;
pub use public_quote::SqlPublicQuoteRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PricingConfigRepository: Send + Sync {
    /// The governing rate card: active, in its validity window, latest
    /// `valid_from` wins.
    async fn find_active(&self, now: DateTime<Utc>)
        -> Result<Option<PricingConfig>, RepositoryError>;

    /// Supersedes the current active version and inserts the given one as a
    /// new row, atomically. Returns the stored row with its assigned id.
    async fn replace_active(
        &self,
        config: PricingConfig,
    ) -> Result<PricingConfig, RepositoryError>;

    async fn list(&self) -> Result<Vec<PricingConfig>, RepositoryError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError>;
    async fn find_by_normalized_email(
        &self,
        normalized_email: &str,
    ) -> Result<Option<Client>, RepositoryError>;
    async fn find_by_cuit(&self, cuit: &str) -> Result<Option<Client>, RepositoryError>;
    async fn save(&self, client: Client) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PublicQuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &PublicQuoteId)
        -> Result<Option<PublicQuote>, RepositoryError>;

    /// Dedup candidates: rows with the same normalized email created at or
    /// after `since`, newest first.
    async fn recent_for_email(
        &self,
        normalized_email: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PublicQuote>, RepositoryError>;

    async fn save(&self, record: PublicQuote) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError>;

    /// Reserves the next quote number for the year, `Q-<year>-<seq>`.
    async fn next_quote_number(&self, year: i32) -> Result<QuoteId, RepositoryError>;

    /// Non-terminal quotes whose validity deadline has passed.
    async fn list_expiry_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quote>, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn save(&self, order: Order) -> Result<(), RepositoryError>;
}

// SQLite has no decimal affinity, so money and area columns are TEXT and
// re-parsed on the way out.
pub(crate) fn decimal_column(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    use sqlx::Row;
    let raw: String = row.try_get(column)?;
    std::str::FromStr::from_str(&raw)
        .map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
}

pub(crate) fn optional_decimal_column(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<rust_decimal::Decimal>, RepositoryError> {
    use sqlx::Row;
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        std::str::FromStr::from_str(&value)
            .map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
    })
    .transpose()
}

pub(crate) fn u32_column(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<u32, RepositoryError> {
    use sqlx::Row;
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw)
        .map_err(|_| RepositoryError::Decode(format!("column `{column}`: `{raw}` out of range")))
}

pub(crate) fn optional_u32_column(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<u32>, RepositoryError> {
    use sqlx::Row;
    let raw: Option<i64> = row.try_get(column)?;
    raw.map(|value| {
        u32::try_from(value).map_err(|_| {
            RepositoryError::Decode(format!("column `{column}`: `{value}` out of range"))
        })
    })
    .transpose()
}

pub(crate) fn uuid_column(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<uuid::Uuid, RepositoryError> {
    use sqlx::Row;
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
}
