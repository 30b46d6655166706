use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderItemId};
use crate::errors::DomainError;
use crate::pricing;

/// Counted output for one order item, reported from the plant floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredQuantity {
    pub item_id: OrderItemId,
    pub quantity_delivered: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    pub order: Order,
    pub total_delivered_m2: Decimal,
    /// Delivered minus quoted area; negative on a short run.
    pub difference_m2: Decimal,
}

/// Reconciles an order against actual production counts. Corrugated runs
/// rarely land on the quoted quantity, so the amount due is recomputed from
/// delivered area at the price frozen when the quote was approved. Items not
/// mentioned in `counts` default to their quoted quantity. One-shot: a
/// confirmed order rejects any further attempt.
pub fn reconcile(
    mut order: Order,
    counts: &[DeliveredQuantity],
    now: DateTime<Utc>,
) -> Result<ReconciliationOutcome, DomainError> {
    order.ensure_quantities_confirmable()?;

    for count in counts {
        if !order.items.iter().any(|item| item.id == count.item_id) {
            return Err(DomainError::InvariantViolation(format!(
                "delivered quantity for unknown order item {}",
                count.item_id.0
            )));
        }
    }

    let quoted_m2 = order.total_m2;
    let mut total_delivered_m2 = Decimal::ZERO;

    for item in &mut order.items {
        let delivered = counts
            .iter()
            .find(|count| count.item_id == item.id)
            .map(|count| count.quantity_delivered)
            .unwrap_or(item.quantity_quoted);
        item.quantity_delivered = Some(delivered);
        total_delivered_m2 +=
            (item.area_per_unit_m2 * Decimal::from(delivered)).round_dp(4);
    }

    order.quantities_confirmed = true;
    order.amount_due = pricing::subtotal(total_delivered_m2, order.price_per_m2);
    order.updated_at = now;

    Ok(ReconciliationOutcome {
        difference_m2: total_delivered_m2 - quoted_m2,
        total_delivered_m2,
        order,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::domain::client::ClientId;
    use crate::domain::order::{
        Order, OrderId, OrderItem, OrderItemId, OrderStatus,
    };
    use crate::domain::quote::QuoteId;
    use crate::errors::DomainError;
    use crate::reconciliation::{reconcile, DeliveredQuantity};

    fn two_item_order() -> Order {
        // Item A: 0.7125 m2/unit x 500 = 356.25 m2.
        // Item B: 0.3588 m2/unit x 1000 = 358.80 m2.
        let items = vec![
            OrderItem {
                id: OrderItemId(Uuid::new_v4()),
                length_mm: 400,
                width_mm: 300,
                height_mm: 200,
                quantity_quoted: 500,
                quantity_delivered: None,
                area_per_unit_m2: Decimal::new(7125, 4),
            },
            OrderItem {
                id: OrderItemId(Uuid::new_v4()),
                length_mm: 300,
                width_mm: 200,
                height_mm: 150,
                quantity_quoted: 1000,
                quantity_delivered: None,
                area_per_unit_m2: Decimal::new(3588, 4),
            },
        ];
        Order {
            id: OrderId(Uuid::new_v4()),
            quote_id: QuoteId("Q-2026-0003".to_owned()),
            client_id: ClientId(Uuid::new_v4()),
            status: OrderStatus::Ready,
            items,
            deposit_paid: true,
            balance_paid: false,
            quantities_confirmed: false,
            total_m2: Decimal::new(7_150_500, 4),
            price_per_m2: Decimal::new(48000, 2),
            amount_due: Decimal::new(34_322_400, 2),
            production_started_at: None,
            shipped_at: None,
            delivered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn overrun_raises_the_amount_due_at_the_frozen_rate() {
        let order = two_item_order();
        let item_a = order.items[0].id;

        let outcome = reconcile(
            order,
            &[DeliveredQuantity { item_id: item_a, quantity_delivered: 520 }],
            Utc::now(),
        )
        .expect("reconcile");

        // 0.7125 x 520 = 370.50; item B defaults to quoted 358.80.
        assert_eq!(outcome.total_delivered_m2, Decimal::new(7_293_000, 4));
        assert_eq!(outcome.difference_m2, Decimal::new(142_500, 4));
        assert_eq!(outcome.order.amount_due, Decimal::new(35_006_400, 2));
        assert!(outcome.order.quantities_confirmed);
        assert_eq!(outcome.order.items[0].quantity_delivered, Some(520));
        assert_eq!(outcome.order.items[1].quantity_delivered, Some(1000));
    }

    #[test]
    fn short_run_lowers_the_amount_due() {
        let order = two_item_order();
        let item_b = order.items[1].id;

        let outcome = reconcile(
            order,
            &[DeliveredQuantity { item_id: item_b, quantity_delivered: 940 }],
            Utc::now(),
        )
        .expect("reconcile");

        assert!(outcome.difference_m2 < Decimal::ZERO);
        // 356.25 + 0.3588 x 940 = 356.25 + 337.2720 = 693.5220 m2.
        assert_eq!(outcome.total_delivered_m2, Decimal::new(6_935_220, 4));
        assert_eq!(outcome.order.amount_due, Decimal::new(33_289_056, 2));
    }

    #[test]
    fn an_empty_count_confirms_every_quoted_quantity() {
        let order = two_item_order();
        let quoted = order.total_m2;

        let outcome = reconcile(order, &[], Utc::now()).expect("reconcile");

        assert_eq!(outcome.total_delivered_m2, quoted);
        assert_eq!(outcome.difference_m2, Decimal::ZERO);
    }

    #[test]
    fn confirmation_is_one_shot() {
        let order = two_item_order();
        let confirmed = reconcile(order, &[], Utc::now()).expect("first confirmation").order;

        let error = reconcile(confirmed, &[], Utc::now()).expect_err("second confirmation");
        assert!(matches!(error, DomainError::QuantitiesAlreadyConfirmed));
    }

    #[test]
    fn only_ready_orders_reconcile() {
        let mut order = two_item_order();
        order.status = OrderStatus::InProduction;

        let error = reconcile(order, &[], Utc::now()).expect_err("not ready");
        assert!(matches!(error, DomainError::QuantityConfirmationNotReady { .. }));
    }

    #[test]
    fn unknown_item_ids_are_rejected_before_any_write() {
        let order = two_item_order();
        let error = reconcile(
            order,
            &[DeliveredQuantity { item_id: OrderItemId(Uuid::new_v4()), quantity_delivered: 10 }],
            Utc::now(),
        )
        .expect_err("unknown item");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }
}
