use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use corrubox_core::domain::client::ClientId;
use corrubox_core::domain::order::{Order, OrderId, OrderItem, OrderItemId, OrderStatus};
use corrubox_core::domain::quote::QuoteId;

use super::{
    decimal_column, optional_u32_column, u32_column, uuid_column, OrderRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_header(row: &SqliteRow) -> Result<Order, RepositoryError> {
        let status_raw: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_raw)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

        Ok(Order {
            id: OrderId(uuid_column(row, "id")?),
            quote_id: QuoteId(row.try_get("quote_id")?),
            client_id: ClientId(uuid_column(row, "client_id")?),
            status,
            items: Vec::new(),
            deposit_paid: row.try_get("deposit_paid")?,
            balance_paid: row.try_get("balance_paid")?,
            quantities_confirmed: row.try_get("quantities_confirmed")?,
            total_m2: decimal_column(row, "total_m2")?,
            price_per_m2: decimal_column(row, "price_per_m2")?,
            amount_due: decimal_column(row, "amount_due")?,
            production_started_at: row.try_get("production_started_at")?,
            shipped_at: row.try_get("shipped_at")?,
            delivered_at: row.try_get("delivered_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn map_item(row: &SqliteRow) -> Result<OrderItem, RepositoryError> {
        Ok(OrderItem {
            id: OrderItemId(uuid_column(row, "id")?),
            length_mm: u32_column(row, "length_mm")?,
            width_mm: u32_column(row, "width_mm")?,
            height_mm: u32_column(row, "height_mm")?,
            quantity_quoted: u32_column(row, "quantity_quoted")?,
            quantity_delivered: optional_u32_column(row, "quantity_delivered")?,
            area_per_unit_m2: decimal_column(row, "area_per_unit_m2")?,
        })
    }
}

#[async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, quote_id, client_id, status, deposit_paid, balance_paid,
                    quantities_confirmed, total_m2, price_per_m2, amount_due,
                    production_started_at, shipped_at, delivered_at, created_at, updated_at
             FROM sale_order WHERE id = ? LIMIT 1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let mut order = Self::map_header(&row)?;

        let item_rows = sqlx::query(
            "SELECT id, length_mm, width_mm, height_mm, quantity_quoted, quantity_delivered,
                    area_per_unit_m2
             FROM order_item WHERE order_id = ? ORDER BY rowid ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        order.items = item_rows.iter().map(Self::map_item).collect::<Result<_, _>>()?;
        Ok(Some(order))
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sale_order (
                id, quote_id, client_id, status, deposit_paid, balance_paid,
                quantities_confirmed, total_m2, price_per_m2, amount_due,
                production_started_at, shipped_at, delivered_at, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                status = excluded.status,
                deposit_paid = excluded.deposit_paid,
                balance_paid = excluded.balance_paid,
                quantities_confirmed = excluded.quantities_confirmed,
                total_m2 = excluded.total_m2,
                price_per_m2 = excluded.price_per_m2,
                amount_due = excluded.amount_due,
                production_started_at = excluded.production_started_at,
                shipped_at = excluded.shipped_at,
                delivered_at = excluded.delivered_at,
                updated_at = excluded.updated_at",
        )
        .bind(order.id.to_string())
        .bind(&order.quote_id.0)
        .bind(order.client_id.to_string())
        .bind(order.status.as_str())
        .bind(order.deposit_paid)
        .bind(order.balance_paid)
        .bind(order.quantities_confirmed)
        .bind(order.total_m2.to_string())
        .bind(order.price_per_m2.to_string())
        .bind(order.amount_due.to_string())
        .bind(order.production_started_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_item WHERE order_id = ?")
            .bind(order.id.to_string())
            .execute(&mut *tx)
            .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_item (
                    id, order_id, length_mm, width_mm, height_mm, quantity_quoted,
                    quantity_delivered, area_per_unit_m2
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(item.id.0.to_string())
            .bind(order.id.to_string())
            .bind(i64::from(item.length_mm))
            .bind(i64::from(item.width_mm))
            .bind(i64::from(item.height_mm))
            .bind(i64::from(item.quantity_quoted))
            .bind(item.quantity_delivered.map(i64::from))
            .bind(item.area_per_unit_m2.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
