use std::fmt::Debug;

use log::*;
use ppe_common::Kobo;
use serde_json::json;

use crate::{
    config::EscrowConfig,
    db_types::Order,
    events::{EventProducers, OrderDeliveredEvent, OrderShippedEvent, PaymentConfirmedEvent},
    ledger_objects::DeliveryReceipt,
    order_objects::{CheckoutReceipt, NewCheckout},
    traits::{MarketplaceDatabase, PaymentEngineError, PaymentGateway},
};

/// `OrderFlowApi` drives an order from checkout to delivery: staging and splitting the cart,
/// confirming the gateway payment, and the Pending→Shipped→Delivered state machine that ends with
/// the escrow rows locked.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    config: EscrowConfig,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, config: EscrowConfig::default() }
    }

    pub fn with_config(mut self, config: EscrowConfig) -> Self {
        self.config = config;
        self
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    /// Splits the cart into one order per supplier and opens a payment intent for the grand total.
    ///
    /// The buyer is upserted on (email, phone), so repeating a checkout never duplicates contacts.
    /// If any item is pay-on-delivery the whole checkout collapses to POD: every sub-order is
    /// created `Pending` and no intent is opened. Otherwise the orders are created `Staged` and the
    /// returned intent's reference is stamped on each of them; confirmation later matches on it.
    ///
    /// If the gateway refuses to open the intent, the freshly staged orders are discarded again and
    /// the gateway error is returned.
    pub async fn stage_checkout(&self, checkout: NewCheckout) -> Result<CheckoutReceipt, PaymentEngineError> {
        if checkout.items.is_empty() {
            return Err(PaymentEngineError::Validation("The cart is empty".to_string()));
        }
        if let Some(item) = checkout.items.iter().find(|i| i.quantity <= 0) {
            return Err(PaymentEngineError::Validation(format!(
                "Quantity for product {} must be positive",
                item.product_id
            )));
        }
        let buyer_email = checkout.buyer.email.clone();
        let staged = self.db.stage_checkout(checkout).await?;
        if staged.pay_on_delivery {
            info!("🛒️ Checkout collapsed to pay-on-delivery; {} order(s) created Pending", staged.orders.len());
            return Ok(CheckoutReceipt { orders: staged.orders, payment: None });
        }
        let order_numbers: Vec<&str> = staged.orders.iter().map(|o| o.order_number.as_str()).collect();
        let metadata = json!({ "order_numbers": order_numbers });
        let intent = match self.gateway.initialize_payment(staged.grand_total, &buyer_email, metadata).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("🛒️ Gateway refused to open an intent ({e}); discarding the staged checkout");
                let order_ids: Vec<i64> = staged.orders.iter().map(|o| o.id).collect();
                if let Err(cleanup) = self.db.discard_staged_orders(&order_ids).await {
                    // The rows stay Staged and unconfirmable; harmless, but worth a trace.
                    error!("🛒️ Could not discard staged orders after gateway failure: {cleanup}");
                }
                return Err(e.into());
            },
        };
        let order_ids: Vec<i64> = staged.orders.iter().map(|o| o.id).collect();
        self.db.attach_payment_reference(&order_ids, &intent.reference).await?;
        info!(
            "🛒️ Staged {} order(s) totalling {} under reference [{}]",
            staged.orders.len(),
            staged.grand_total,
            intent.reference
        );
        // Re-read so callers see the stamped reference.
        let mut orders = Vec::with_capacity(staged.orders.len());
        for order in staged.orders {
            let refreshed = self.db.fetch_order(order.id).await?.unwrap_or(order);
            orders.push(refreshed);
        }
        Ok(CheckoutReceipt { orders, payment: Some(intent) })
    }

    /// Confirms a gateway payment and advances every order staged under `reference`.
    ///
    /// The staged totals must match the gateway-reported amount exactly (integer minor units); this
    /// guards against the cart mutating between staging and confirmation. Idempotent by
    /// construction: a repeat call finds no staged orders and returns an empty list without
    /// touching anything. Verification or amount failures leave all state unchanged and are safe
    /// to retry.
    pub async fn confirm_payment(&self, reference: &str) -> Result<Vec<Order>, PaymentEngineError> {
        let staged = self.db.fetch_staged_orders(reference).await?;
        if staged.is_empty() {
            debug!("💳️ No staged orders for [{reference}]; nothing to confirm");
            return Ok(Vec::new());
        }
        let expected: Kobo = staged.iter().map(|o| o.total_amount).sum();
        let verified = self.gateway.verify_payment(reference).await?;
        if !verified.is_success() {
            return Err(PaymentEngineError::GatewayNotSuccessful(verified.status));
        }
        if verified.amount != expected {
            return Err(PaymentEngineError::AmountMismatch { expected, reported: verified.amount });
        }
        let confirmed = self.db.confirm_staged_orders(reference).await?;
        info!("💳️ Payment [{reference}] confirmed; {} order(s) now Pending", confirmed.len());
        for producer in &self.producers.payment_confirmed_producer {
            let event = PaymentConfirmedEvent { reference: reference.to_string(), orders: confirmed.clone() };
            producer.publish_event(event).await;
        }
        Ok(confirmed)
    }

    /// Guarded Pending→Shipped. The only side effect is a notification; the ledger is untouched.
    pub async fn mark_shipped(&self, order_id: i64) -> Result<Order, PaymentEngineError> {
        let order = self.db.mark_order_shipped(order_id).await?;
        info!("📦️ Order {} shipped", order.order_number);
        for producer in &self.producers.order_shipped_producer {
            producer.publish_event(OrderShippedEvent::new(order.clone())).await;
        }
        Ok(order)
    }

    /// Guarded Shipped→Delivered. One transaction locks the plug's profit and each supplier's
    /// earnings into escrow and bumps the sold counters; the hold clock starts at the delivery
    /// timestamp.
    pub async fn deliver_order(&self, order_id: i64) -> Result<DeliveryReceipt, PaymentEngineError> {
        let receipt = self.db.deliver_order(order_id, self.config.hold).await?;
        info!("📦️ Order {} delivered; escrow rows locked", receipt.order.order_number);
        for producer in &self.producers.order_delivered_producer {
            let event = OrderDeliveredEvent {
                order: receipt.order.clone(),
                plug_payment: receipt.plug_payment.clone(),
                supplier_payments: receipt.supplier_payments.clone(),
            };
            producer.publish_event(event).await;
        }
        Ok(receipt)
    }

    /// Pre-shipment edit: `surviving` lists the order-item ids that remain on the order. Removed
    /// items get their stock back; an emptied order is cancelled.
    pub async fn edit_order(&self, order_id: i64, surviving: &[i64]) -> Result<Order, PaymentEngineError> {
        let order = self.db.edit_order_items(order_id, surviving).await?;
        info!("📦️ Order {} edited ({} item(s) remain)", order.order_number, surviving.len());
        Ok(order)
    }

    /// Cancels a Pending order outright, restoring all of its stock.
    pub async fn cancel_order(&self, order_id: i64) -> Result<Order, PaymentEngineError> {
        self.edit_order(order_id, &[]).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
