use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use corrubox_core::domain::client::ClientId;
use corrubox_core::domain::quote::{Quote, QuoteChannel, QuoteId, QuoteLine, QuoteStatus};

use super::{
    decimal_column, optional_decimal_column, u32_column, QuoteRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

const SELECT_COLUMNS: &str = "id, client_id, status, channel, total_m2, price_per_m2, subtotal, \
     printing_cost, die_cut_cost, shipping_cost, total, production_days, estimated_delivery, \
     valid_until, sent_at, approved_at, expired_at, converted_at, created_at";

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_header(row: &SqliteRow) -> Result<Quote, RepositoryError> {
        let status_raw: String = row.try_get("status")?;
        let status = QuoteStatus::parse(&status_raw)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_raw}`")))?;

        let channel_raw: String = row.try_get("channel")?;
        let channel = QuoteChannel::parse(&channel_raw).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown quote channel `{channel_raw}`"))
        })?;

        let client_id: Option<String> = row.try_get("client_id")?;
        let client_id = client_id
            .map(|raw| {
                raw.parse()
                    .map(ClientId)
                    .map_err(|err| RepositoryError::Decode(format!("client_id: {err}")))
            })
            .transpose()?;

        Ok(Quote {
            id: QuoteId(row.try_get("id")?),
            client_id,
            status,
            channel,
            lines: Vec::new(),
            total_m2: decimal_column(row, "total_m2")?,
            price_per_m2: decimal_column(row, "price_per_m2")?,
            subtotal: decimal_column(row, "subtotal")?,
            printing_cost: optional_decimal_column(row, "printing_cost")?,
            die_cut_cost: optional_decimal_column(row, "die_cut_cost")?,
            shipping_cost: optional_decimal_column(row, "shipping_cost")?,
            total: decimal_column(row, "total")?,
            production_days: u32_column(row, "production_days")?,
            estimated_delivery: row.try_get("estimated_delivery")?,
            valid_until: row.try_get("valid_until")?,
            sent_at: row.try_get("sent_at")?,
            approved_at: row.try_get("approved_at")?,
            expired_at: row.try_get("expired_at")?,
            converted_at: row.try_get("converted_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn map_line(row: &SqliteRow) -> Result<QuoteLine, RepositoryError> {
        Ok(QuoteLine {
            length_mm: u32_column(row, "length_mm")?,
            width_mm: u32_column(row, "width_mm")?,
            height_mm: u32_column(row, "height_mm")?,
            quantity: u32_column(row, "quantity")?,
            sheet_width_mm: u32_column(row, "sheet_width_mm")?,
            sheet_length_mm: u32_column(row, "sheet_length_mm")?,
            area_m2: decimal_column(row, "area_m2")?,
            total_m2: decimal_column(row, "total_m2")?,
            oversized: row.try_get("oversized")?,
            is_custom: row.try_get("is_custom")?,
        })
    }

    async fn load_lines(&self, quote_id: &QuoteId) -> Result<Vec<QuoteLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT length_mm, width_mm, height_mm, quantity, sheet_width_mm, sheet_length_mm,
                    area_m2, total_m2, oversized, is_custom
             FROM quote_line WHERE quote_id = ? ORDER BY position ASC",
        )
        .bind(&quote_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_line).collect()
    }
}

#[async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM quote WHERE id = ? LIMIT 1"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else { return Ok(None) };
        let mut quote = Self::map_header(&row)?;
        quote.lines = self.load_lines(id).await?;
        Ok(Some(quote))
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quote (
                id, client_id, status, channel, total_m2, price_per_m2, subtotal,
                printing_cost, die_cut_cost, shipping_cost, total, production_days,
                estimated_delivery, valid_until, sent_at, approved_at, expired_at,
                converted_at, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                client_id = excluded.client_id,
                status = excluded.status,
                total_m2 = excluded.total_m2,
                price_per_m2 = excluded.price_per_m2,
                subtotal = excluded.subtotal,
                printing_cost = excluded.printing_cost,
                die_cut_cost = excluded.die_cut_cost,
                shipping_cost = excluded.shipping_cost,
                total = excluded.total,
                production_days = excluded.production_days,
                estimated_delivery = excluded.estimated_delivery,
                valid_until = excluded.valid_until,
                sent_at = excluded.sent_at,
                approved_at = excluded.approved_at,
                expired_at = excluded.expired_at,
                converted_at = excluded.converted_at",
        )
        .bind(&quote.id.0)
        .bind(quote.client_id.map(|id| id.to_string()))
        .bind(quote.status.as_str())
        .bind(quote.channel.as_str())
        .bind(quote.total_m2.to_string())
        .bind(quote.price_per_m2.to_string())
        .bind(quote.subtotal.to_string())
        .bind(quote.printing_cost.map(|value| value.to_string()))
        .bind(quote.die_cut_cost.map(|value| value.to_string()))
        .bind(quote.shipping_cost.map(|value| value.to_string()))
        .bind(quote.total.to_string())
        .bind(i64::from(quote.production_days))
        .bind(quote.estimated_delivery)
        .bind(quote.valid_until)
        .bind(quote.sent_at)
        .bind(quote.approved_at)
        .bind(quote.expired_at)
        .bind(quote.converted_at)
        .bind(quote.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM quote_line WHERE quote_id = ?")
            .bind(&quote.id.0)
            .execute(&mut *tx)
            .await?;

        for (position, line) in quote.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quote_line (
                    quote_id, position, length_mm, width_mm, height_mm, quantity,
                    sheet_width_mm, sheet_length_mm, area_m2, total_m2, oversized, is_custom
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&quote.id.0)
            .bind(position as i64)
            .bind(i64::from(line.length_mm))
            .bind(i64::from(line.width_mm))
            .bind(i64::from(line.height_mm))
            .bind(i64::from(line.quantity))
            .bind(i64::from(line.sheet_width_mm))
            .bind(i64::from(line.sheet_length_mm))
            .bind(line.area_m2.to_string())
            .bind(line.total_m2.to_string())
            .bind(line.oversized)
            .bind(line.is_custom)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM quote WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn next_quote_number(&self, year: i32) -> Result<QuoteId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO quote_sequence (year, next_value) VALUES (?, 1) ON CONFLICT (year) DO NOTHING")
            .bind(i64::from(year))
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            "UPDATE quote_sequence SET next_value = next_value + 1 WHERE year = ?
             RETURNING next_value",
        )
        .bind(i64::from(year))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        // next_value holds the value AFTER the reservation.
        let reserved: i64 = row.try_get::<i64, _>("next_value")? - 1;
        Ok(QuoteId(format!("Q-{year}-{reserved:04}")))
    }

    async fn list_expiry_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM quote
             WHERE status IN ('draft', 'sent', 'approved') AND valid_until < ?
             ORDER BY valid_until ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut quotes = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut quote = Self::map_header(row)?;
            quote.lines = self.load_lines(&quote.id).await?;
            quotes.push(quote);
        }
        Ok(quotes)
    }
}
