use sqlx::{Executor, Row};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic demo dataset: one active rate card, one client, one pending
/// web lead, an approved quote, and a ready order awaiting quantity
/// confirmation. Used by the CLI `seed` command and end-to-end tests.
pub struct SeedDataset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub pricing_configs: i64,
    pub clients: i64,
    pub public_quotes: i64,
    pub quotes: i64,
    pub orders: i64,
}

impl SeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Loads the dataset in one transaction. Expects empty tables; reseeding
    /// a populated database is rejected rather than silently duplicated.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let existing: i64 = sqlx::query("SELECT COUNT(*) AS count FROM pricing_config")
            .fetch_one(pool)
            .await?
            .get("count");
        if existing > 0 {
            return Err(RepositoryError::Decode(
                "database already contains pricing data; refusing to seed".to_owned(),
            ));
        }

        let mut tx = pool.begin().await?;
        tx.execute(sqlx::raw_sql(Self::SQL)).await?;
        tx.commit().await?;

        Self::verify(pool).await
    }

    pub async fn verify(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        async fn count(pool: &DbPool, table: &str) -> Result<i64, RepositoryError> {
            Ok(sqlx::query(&format!("SELECT COUNT(*) AS count FROM {table}"))
                .fetch_one(pool)
                .await?
                .get("count"))
        }

        Ok(SeedResult {
            pricing_configs: count(pool, "pricing_config").await?,
            clients: count(pool, "client").await?,
            public_quotes: count(pool, "public_quote").await?,
            quotes: count(pool, "quote").await?,
            orders: count(pool, "sale_order").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::SeedDataset;
    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{
        PricingConfigRepository, QuoteRepository, SqlPricingConfigRepository, SqlQuoteRepository,
    };

    #[tokio::test]
    async fn seed_loads_once_and_rejects_a_second_pass() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");

        let result = SeedDataset::load(&pool).await.expect("seed");
        assert_eq!(result.pricing_configs, 1);
        assert_eq!(result.clients, 1);
        assert_eq!(result.public_quotes, 1);
        assert_eq!(result.quotes, 1);
        assert_eq!(result.orders, 1);

        assert!(SeedDataset::load(&pool).await.is_err());
    }

    #[tokio::test]
    async fn seeded_rate_card_is_the_active_one() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        SeedDataset::load(&pool).await.expect("seed");

        let repo = SqlPricingConfigRepository::new(pool);
        let active = repo.find_active(Utc::now()).await.expect("query").expect("active config");

        assert_eq!(active.quote_validity_days, 15);
        assert!(active.is_active);
    }

    #[tokio::test]
    async fn seeded_sequence_continues_after_existing_quotes() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        SeedDataset::load(&pool).await.expect("seed");

        let repo = SqlQuoteRepository::new(pool);
        let next = repo.next_quote_number(2026).await.expect("next number");

        assert_eq!(next.0, "Q-2026-0003");
    }
}
