use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use corrubox_core::domain::client::{Client, ClientId};

use super::{optional_u32_column, uuid_column, ClientRepository, RepositoryError};
use crate::DbPool;

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<Client, RepositoryError> {
        Ok(Client {
            id: ClientId(uuid_column(row, "id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            normalized_email: row.try_get("normalized_email")?,
            phone: row.try_get("phone")?,
            cuit: row.try_get("cuit")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            province: row.try_get("province")?,
            distance_km: optional_u32_column(row, "distance_km")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn find_one(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT id, name, email, normalized_email, phone, cuit, address, city, province,
                    distance_km, created_at, updated_at
             FROM client WHERE {column} = ? LIMIT 1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }
}

#[async_trait]
impl ClientRepository for SqlClientRepository {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_normalized_email(
        &self,
        normalized_email: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        self.find_one("normalized_email", normalized_email).await
    }

    async fn find_by_cuit(&self, cuit: &str) -> Result<Option<Client>, RepositoryError> {
        self.find_one("cuit", cuit).await
    }

    async fn save(&self, client: Client) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO client (
                id, name, email, normalized_email, phone, cuit, address, city, province,
                distance_km, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                normalized_email = excluded.normalized_email,
                phone = excluded.phone,
                cuit = excluded.cuit,
                address = excluded.address,
                city = excluded.city,
                province = excluded.province,
                distance_km = excluded.distance_km,
                updated_at = excluded.updated_at",
        )
        .bind(client.id.to_string())
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.normalized_email)
        .bind(&client.phone)
        .bind(&client.cuit)
        .bind(&client.address)
        .bind(&client.city)
        .bind(&client.province)
        .bind(client.distance_km.map(i64::from))
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
