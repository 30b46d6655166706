use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use corrubox_core::domain::pricing_config::{PricingConfig, PricingConfigId};

use super::{decimal_column, optional_decimal_column, u32_column, PricingConfigRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPricingConfigRepository {
    pool: DbPool,
}

impl SqlPricingConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<PricingConfig, RepositoryError> {
        Ok(PricingConfig {
            id: PricingConfigId(row.try_get("id")?),
            standard_price_per_m2: decimal_column(row, "standard_price_per_m2")?,
            volume_price_per_m2: decimal_column(row, "volume_price_per_m2")?,
            volume_threshold_m2: decimal_column(row, "volume_threshold_m2")?,
            min_m2_per_model: decimal_column(row, "min_m2_per_model")?,
            below_min_price_per_m2: optional_decimal_column(row, "below_min_price_per_m2")?,
            free_shipping_min_m2: decimal_column(row, "free_shipping_min_m2")?,
            free_shipping_max_km: u32_column(row, "free_shipping_max_km")?,
            production_days_standard: u32_column(row, "production_days_standard")?,
            production_days_printing: u32_column(row, "production_days_printing")?,
            quote_validity_days: u32_column(row, "quote_validity_days")?,
            valid_from: row.try_get("valid_from")?,
            valid_until: row.try_get("valid_until")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

const SELECT_COLUMNS: &str = "id, standard_price_per_m2, volume_price_per_m2, \
     volume_threshold_m2, min_m2_per_model, below_min_price_per_m2, free_shipping_min_m2, \
     free_shipping_max_km, production_days_standard, production_days_printing, \
     quote_validity_days, valid_from, valid_until, is_active, created_at";

#[async_trait]
impl PricingConfigRepository for SqlPricingConfigRepository {
    async fn find_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<PricingConfig>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM pricing_config
             WHERE is_active = 1
               AND valid_from <= ?
               AND (valid_until IS NULL OR valid_until > ?)
             ORDER BY valid_from DESC
             LIMIT 1"
        ))
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn replace_active(
        &self,
        config: PricingConfig,
    ) -> Result<PricingConfig, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE pricing_config
             SET is_active = 0, valid_until = COALESCE(valid_until, ?)
             WHERE is_active = 1",
        )
        .bind(config.valid_from)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            "INSERT INTO pricing_config (
                standard_price_per_m2, volume_price_per_m2, volume_threshold_m2,
                min_m2_per_model, below_min_price_per_m2, free_shipping_min_m2,
                free_shipping_max_km, production_days_standard, production_days_printing,
                quote_validity_days, valid_from, valid_until, is_active, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 1, ?)
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(config.standard_price_per_m2.to_string())
        .bind(config.volume_price_per_m2.to_string())
        .bind(config.volume_threshold_m2.to_string())
        .bind(config.min_m2_per_model.to_string())
        .bind(config.below_min_price_per_m2.map(|value| value.to_string()))
        .bind(config.free_shipping_min_m2.to_string())
        .bind(i64::from(config.free_shipping_max_km))
        .bind(i64::from(config.production_days_standard))
        .bind(i64::from(config.production_days_printing))
        .bind(i64::from(config.quote_validity_days))
        .bind(config.valid_from)
        .bind(config.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Self::map_row(&row)
    }

    async fn list(&self) -> Result<Vec<PricingConfig>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM pricing_config ORDER BY valid_from DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
