use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::client::ClientId;
use crate::domain::quote::QuoteId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderItemId(pub Uuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingDeposit,
    Confirmed,
    InProduction,
    Ready,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingDeposit => "pending_deposit",
            Self::Confirmed => "confirmed",
            Self::InProduction => "in_production",
            Self::Ready => "ready",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending_deposit" => Some(Self::PendingDeposit),
            "confirmed" => Some(Self::Confirmed),
            "in_production" => Some(Self::InProduction),
            "ready" => Some(Self::Ready),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Position along the forward production path; `None` for `cancelled`.
    pub fn sequence_index(&self) -> Option<u8> {
        match self {
            Self::PendingDeposit => Some(0),
            Self::Confirmed => Some(1),
            Self::InProduction => Some(2),
            Self::Ready => Some(3),
            Self::Shipped => Some(4),
            Self::Delivered => Some(5),
            Self::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Whether the board may be dragged backwards. The source behaviour allows
/// free reordering between states; operators who want a strict forward-only
/// pipeline flip this off in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransitionPolicy {
    pub allow_backward: bool,
}

impl Default for OrderTransitionPolicy {
    fn default() -> Self {
        Self { allow_backward: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub quantity_quoted: u32,
    /// Set exactly once, by quantity confirmation on a `ready` order.
    pub quantity_delivered: Option<u32>,
    /// Sheet area for one box at quote time, 4 decimal places.
    pub area_per_unit_m2: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub quote_id: QuoteId,
    pub client_id: ClientId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub deposit_paid: bool,
    pub balance_paid: bool,
    /// Irreversible once true; flipped only by quantity confirmation.
    pub quantities_confirmed: bool,
    pub total_m2: Decimal,
    /// Frozen at quote time; reconciliation never re-prices.
    pub price_per_m2: Decimal,
    pub amount_due: Decimal,
    pub production_started_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Side-effect-free transition validator. A rejection leaves the order
    /// untouched so optimistic UI updates can be reverted cleanly.
    pub fn validate_transition(
        &self,
        next: OrderStatus,
        policy: OrderTransitionPolicy,
    ) -> Result<(), DomainError> {
        let reject = |reason: &str| {
            Err(DomainError::InvalidOrderTransition {
                from: self.status,
                to: next,
                reason: reason.to_owned(),
            })
        };

        if next == self.status {
            return reject("order is already in this status");
        }
        if self.status.is_terminal() {
            return reject("order is in a terminal status");
        }
        if next == OrderStatus::Cancelled {
            return Ok(());
        }

        let (Some(from_index), Some(to_index)) =
            (self.status.sequence_index(), next.sequence_index())
        else {
            return reject("cancelled orders cannot re-enter the pipeline");
        };

        if to_index < from_index && !policy.allow_backward {
            return reject("backward transitions are disabled by policy");
        }
        if self.status == OrderStatus::PendingDeposit && !self.deposit_paid {
            return reject("deposit has not been recorded");
        }
        if next == OrderStatus::Delivered && !self.balance_paid {
            return reject("balance has not been recorded");
        }
        Ok(())
    }

    /// Applies a validated transition and stamps production milestones.
    /// Stamps are written once and never overwritten.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        policy: OrderTransitionPolicy,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.validate_transition(next, policy)?;

        self.status = next;
        self.updated_at = at;
        let stamp = match next {
            OrderStatus::InProduction => Some(&mut self.production_started_at),
            OrderStatus::Shipped => Some(&mut self.shipped_at),
            OrderStatus::Delivered => Some(&mut self.delivered_at),
            _ => None,
        };
        if let Some(stamp) = stamp {
            stamp.get_or_insert(at);
        }
        Ok(())
    }

    /// Quantity confirmation gate: only while `ready`, and only once. The
    /// already-confirmed check comes first so a second attempt is rejected
    /// regardless of whatever status the order has moved to since.
    pub fn ensure_quantities_confirmable(&self) -> Result<(), DomainError> {
        if self.quantities_confirmed {
            return Err(DomainError::QuantitiesAlreadyConfirmed);
        }
        if self.status != OrderStatus::Ready {
            return Err(DomainError::QuantityConfirmationNotReady { status: self.status });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::domain::client::ClientId;
    use crate::domain::order::{
        Order, OrderId, OrderItem, OrderItemId, OrderStatus, OrderTransitionPolicy,
    };
    use crate::domain::quote::QuoteId;
    use crate::errors::DomainError;

    fn order_fixture(status: OrderStatus) -> Order {
        Order {
            id: OrderId(Uuid::new_v4()),
            quote_id: QuoteId("Q-2026-0001".to_owned()),
            client_id: ClientId(Uuid::new_v4()),
            status,
            items: vec![OrderItem {
                id: OrderItemId(Uuid::new_v4()),
                length_mm: 400,
                width_mm: 300,
                height_mm: 200,
                quantity_quoted: 500,
                quantity_delivered: None,
                area_per_unit_m2: Decimal::new(7125, 4),
            }],
            deposit_paid: false,
            balance_paid: false,
            quantities_confirmed: false,
            total_m2: Decimal::new(35_625_000, 4),
            price_per_m2: Decimal::new(48000, 2),
            amount_due: Decimal::new(171_000_000, 2),
            production_started_at: None,
            shipped_at: None,
            delivered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn deposit_gates_departure_from_pending_deposit() {
        let mut order = order_fixture(OrderStatus::PendingDeposit);
        let policy = OrderTransitionPolicy::default();

        let error = order
            .transition_to(OrderStatus::Confirmed, policy, Utc::now())
            .expect_err("deposit unpaid");
        assert!(matches!(error, DomainError::InvalidOrderTransition { .. }));
        assert_eq!(order.status, OrderStatus::PendingDeposit);

        order.deposit_paid = true;
        order.transition_to(OrderStatus::Confirmed, policy, Utc::now()).expect("deposit recorded");
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn balance_gates_delivery() {
        let mut order = order_fixture(OrderStatus::Shipped);
        order.deposit_paid = true;
        let policy = OrderTransitionPolicy::default();

        assert!(order.transition_to(OrderStatus::Delivered, policy, Utc::now()).is_err());

        order.balance_paid = true;
        order.transition_to(OrderStatus::Delivered, policy, Utc::now()).expect("balance recorded");
        assert!(order.delivered_at.is_some());
    }

    #[test]
    fn same_state_transition_is_always_rejected() {
        let order = order_fixture(OrderStatus::Ready);
        let error = order
            .validate_transition(OrderStatus::Ready, OrderTransitionPolicy::default())
            .expect_err("same state");
        assert!(matches!(error, DomainError::InvalidOrderTransition { .. }));
    }

    #[test]
    fn backward_moves_follow_the_configured_policy() {
        let order = order_fixture(OrderStatus::Shipped);

        assert!(order
            .validate_transition(OrderStatus::Confirmed, OrderTransitionPolicy { allow_backward: true })
            .is_ok());
        assert!(order
            .validate_transition(
                OrderStatus::Confirmed,
                OrderTransitionPolicy { allow_backward: false }
            )
            .is_err());
    }

    #[test]
    fn cancellation_is_reachable_from_any_non_terminal_state() {
        let policy = OrderTransitionPolicy::default();
        for status in [
            OrderStatus::PendingDeposit,
            OrderStatus::Confirmed,
            OrderStatus::InProduction,
            OrderStatus::Ready,
            OrderStatus::Shipped,
        ] {
            assert!(order_fixture(status).validate_transition(OrderStatus::Cancelled, policy).is_ok());
        }

        assert!(order_fixture(OrderStatus::Delivered)
            .validate_transition(OrderStatus::Cancelled, policy)
            .is_err());
        assert!(order_fixture(OrderStatus::Cancelled)
            .validate_transition(OrderStatus::Confirmed, policy)
            .is_err());
    }

    #[test]
    fn quantity_confirmation_requires_ready_and_only_once() {
        let mut order = order_fixture(OrderStatus::InProduction);
        assert!(matches!(
            order.ensure_quantities_confirmable(),
            Err(DomainError::QuantityConfirmationNotReady { status: OrderStatus::InProduction })
        ));

        order.status = OrderStatus::Ready;
        assert!(order.ensure_quantities_confirmable().is_ok());

        order.quantities_confirmed = true;
        order.status = OrderStatus::Shipped;
        assert!(matches!(
            order.ensure_quantities_confirmable(),
            Err(DomainError::QuantitiesAlreadyConfirmed)
        ));
    }

    #[test]
    fn status_round_trips_from_storage_encoding() {
        let cases = [
            OrderStatus::PendingDeposit,
            OrderStatus::Confirmed,
            OrderStatus::InProduction,
            OrderStatus::Ready,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];
        for status in cases {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
    }
}
