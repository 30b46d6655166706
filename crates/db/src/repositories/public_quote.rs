use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use corrubox_core::domain::client::ClientId;
use corrubox_core::domain::public_quote::{PublicQuote, PublicQuoteId, PublicQuoteStatus};

use super::{
    decimal_column, optional_u32_column, u32_column, uuid_column, PublicQuoteRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlPublicQuoteRepository {
    pool: DbPool,
}

const SELECT_COLUMNS: &str = "id, requester_name, requester_email, normalized_email, \
     requester_phone, length_mm, width_mm, height_mm, quantity, has_printing, printing_colors, \
     address, city, province, distance_km, total_m2, price_per_m2, subtotal, estimated_days, \
     oversized, requested_contact, status, converted_at, converted_to_client_id, created_at, \
     updated_at";

impl SqlPublicQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<PublicQuote, RepositoryError> {
        let status_raw: String = row.try_get("status")?;
        let status = PublicQuoteStatus::parse(&status_raw).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown public quote status `{status_raw}`"))
        })?;

        let converted_to_client_id: Option<String> = row.try_get("converted_to_client_id")?;
        let converted_to_client_id = converted_to_client_id
            .map(|raw| {
                raw.parse()
                    .map(ClientId)
                    .map_err(|err| RepositoryError::Decode(format!("converted_to_client_id: {err}")))
            })
            .transpose()?;

        Ok(PublicQuote {
            id: PublicQuoteId(uuid_column(row, "id")?),
            requester_name: row.try_get("requester_name")?,
            requester_email: row.try_get("requester_email")?,
            normalized_email: row.try_get("normalized_email")?,
            requester_phone: row.try_get("requester_phone")?,
            length_mm: u32_column(row, "length_mm")?,
            width_mm: u32_column(row, "width_mm")?,
            height_mm: u32_column(row, "height_mm")?,
            quantity: u32_column(row, "quantity")?,
            has_printing: row.try_get("has_printing")?,
            printing_colors: optional_u32_column(row, "printing_colors")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            province: row.try_get("province")?,
            distance_km: optional_u32_column(row, "distance_km")?,
            total_m2: decimal_column(row, "total_m2")?,
            price_per_m2: decimal_column(row, "price_per_m2")?,
            subtotal: decimal_column(row, "subtotal")?,
            estimated_days: u32_column(row, "estimated_days")?,
            oversized: row.try_get("oversized")?,
            requested_contact: row.try_get("requested_contact")?,
            status,
            converted_at: row.try_get("converted_at")?,
            converted_to_client_id,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PublicQuoteRepository for SqlPublicQuoteRepository {
    async fn find_by_id(
        &self,
        id: &PublicQuoteId,
    ) -> Result<Option<PublicQuote>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM public_quote WHERE id = ? LIMIT 1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn recent_for_email(
        &self,
        normalized_email: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PublicQuote>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM public_quote
             WHERE normalized_email = ? AND created_at >= ?
             ORDER BY created_at DESC"
        ))
        .bind(normalized_email)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn save(&self, record: PublicQuote) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO public_quote (
                id, requester_name, requester_email, normalized_email, requester_phone,
                length_mm, width_mm, height_mm, quantity, has_printing, printing_colors,
                address, city, province, distance_km, total_m2, price_per_m2, subtotal,
                estimated_days, oversized, requested_contact, status, converted_at,
                converted_to_client_id, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                requester_name = excluded.requester_name,
                requester_email = excluded.requester_email,
                normalized_email = excluded.normalized_email,
                requester_phone = excluded.requester_phone,
                address = excluded.address,
                city = excluded.city,
                province = excluded.province,
                distance_km = excluded.distance_km,
                requested_contact = excluded.requested_contact,
                status = excluded.status,
                converted_at = excluded.converted_at,
                converted_to_client_id = excluded.converted_to_client_id,
                updated_at = excluded.updated_at",
        )
        .bind(record.id.to_string())
        .bind(&record.requester_name)
        .bind(&record.requester_email)
        .bind(&record.normalized_email)
        .bind(&record.requester_phone)
        .bind(i64::from(record.length_mm))
        .bind(i64::from(record.width_mm))
        .bind(i64::from(record.height_mm))
        .bind(i64::from(record.quantity))
        .bind(record.has_printing)
        .bind(record.printing_colors.map(i64::from))
        .bind(&record.address)
        .bind(&record.city)
        .bind(&record.province)
        .bind(record.distance_km.map(i64::from))
        .bind(record.total_m2.to_string())
        .bind(record.price_per_m2.to_string())
        .bind(record.subtotal.to_string())
        .bind(i64::from(record.estimated_days))
        .bind(record.oversized)
        .bind(record.requested_contact)
        .bind(record.status.as_str())
        .bind(record.converted_at)
        .bind(record.converted_to_client_id.map(|id| id.to_string()))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
