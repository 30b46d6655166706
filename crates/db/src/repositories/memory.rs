use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use corrubox_core::domain::client::{Client, ClientId};
use corrubox_core::domain::order::{Order, OrderId};
use corrubox_core::domain::pricing_config::{self, PricingConfig, PricingConfigId};
use corrubox_core::domain::public_quote::{PublicQuote, PublicQuoteId};
use corrubox_core::domain::quote::{Quote, QuoteId, QuoteStatus};

use super::{
    ClientRepository, OrderRepository, PricingConfigRepository, PublicQuoteRepository,
    QuoteRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryPricingConfigRepository {
    configs: RwLock<Vec<PricingConfig>>,
}

#[async_trait::async_trait]
impl PricingConfigRepository for InMemoryPricingConfigRepository {
    async fn find_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<PricingConfig>, RepositoryError> {
        let configs = self.configs.read().await;
        Ok(pricing_config::select_active(&configs, now).cloned())
    }

    async fn replace_active(
        &self,
        mut config: PricingConfig,
    ) -> Result<PricingConfig, RepositoryError> {
        let mut configs = self.configs.write().await;
        for existing in configs.iter_mut() {
            if existing.is_active {
                existing.supersede(config.valid_from);
            }
        }
        config.id = PricingConfigId(configs.len() as i64 + 1);
        config.is_active = true;
        config.valid_until = None;
        configs.push(config.clone());
        Ok(config)
    }

    async fn list(&self) -> Result<Vec<PricingConfig>, RepositoryError> {
        Ok(self.configs.read().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryClientRepository {
    clients: RwLock<HashMap<ClientId, Client>>,
}

#[async_trait::async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        Ok(self.clients.read().await.get(id).cloned())
    }

    async fn find_by_normalized_email(
        &self,
        normalized_email: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        let clients = self.clients.read().await;
        Ok(clients.values().find(|client| client.normalized_email == normalized_email).cloned())
    }

    async fn find_by_cuit(&self, cuit: &str) -> Result<Option<Client>, RepositoryError> {
        let clients = self.clients.read().await;
        Ok(clients.values().find(|client| client.cuit.as_deref() == Some(cuit)).cloned())
    }

    async fn save(&self, client: Client) -> Result<(), RepositoryError> {
        self.clients.write().await.insert(client.id, client);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPublicQuoteRepository {
    records: RwLock<HashMap<PublicQuoteId, PublicQuote>>,
}

#[async_trait::async_trait]
impl PublicQuoteRepository for InMemoryPublicQuoteRepository {
    async fn find_by_id(
        &self,
        id: &PublicQuoteId,
    ) -> Result<Option<PublicQuote>, RepositoryError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn recent_for_email(
        &self,
        normalized_email: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PublicQuote>, RepositoryError> {
        let records = self.records.read().await;
        let mut matches: Vec<PublicQuote> = records
            .values()
            .filter(|record| {
                record.normalized_email == normalized_email && record.created_at >= since
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn save(&self, record: PublicQuote) -> Result<(), RepositoryError> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<String, Quote>>,
    sequences: RwLock<HashMap<i32, i64>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Ok(self.quotes.read().await.get(&id.0).cloned())
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        self.quotes.write().await.insert(quote.id.0.clone(), quote);
        Ok(())
    }

    async fn delete(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        Ok(self.quotes.write().await.remove(&id.0).is_some())
    }

    async fn next_quote_number(&self, year: i32) -> Result<QuoteId, RepositoryError> {
        let mut sequences = self.sequences.write().await;
        let counter = sequences.entry(year).or_insert(1);
        let reserved = *counter;
        *counter += 1;
        Ok(QuoteId(format!("Q-{year}-{reserved:04}")))
    }

    async fn list_expiry_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        let mut candidates: Vec<Quote> = quotes
            .values()
            .filter(|quote| {
                quote.valid_until < now
                    && matches!(
                        quote.status,
                        QuoteStatus::Draft | QuoteStatus::Sent | QuoteStatus::Approved
                    )
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.valid_until.cmp(&b.valid_until));
        Ok(candidates)
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        self.orders.write().await.insert(order.id, order);
        Ok(())
    }
}
