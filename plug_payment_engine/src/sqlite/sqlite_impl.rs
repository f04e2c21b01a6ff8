//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`traits`](crate::traits) module. Every mutating flow opens one transaction and commits it only
//! when every row involved has been written.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use ppe_common::Kobo;
use sqlx::SqlitePool;

use super::db::{buyers, catalog, disputes, escrow, locks, new_pool, order_items, orders, withdrawals};
use crate::{
    db_types::{
        EscrowStatus,
        Order,
        OrderItem,
        OrderNumber,
        OrderOwner,
        OrderStatusType,
        PausedOrderItem,
        PlugPayment,
        ResolvePlugPayment,
        ResolveSupplierPayment,
        ReturnedOrderItem,
        SupplierPayment,
        VerificationToken,
        WithdrawalRecord,
        WithdrawalStatus,
    },
    ledger_objects::{DeliveryReceipt, EarningsSummary, LedgerAdjustment, SettledWithdrawal, UnpauseOutcome},
    order_objects::{CartItem, NewCheckout, StagedCheckout},
    sqlite::db::order_items::PricedLine,
    traits::{EarningsApiError, EarningsManagement, MarketplaceDatabase, PaymentEngineError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentEngineError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Resolves the frozen prices for one supplier group. Reseller context reads the plug's resale
    /// listing; otherwise the base price stands in for both sides of the margin.
    async fn resolve_lines(
        &self,
        plug_id: Option<i64>,
        items: &[&CartItem],
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<Vec<PricedLine>, PaymentEngineError> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = catalog::fetch_product(item.product_id, &mut *conn)
                .await?
                .ok_or(PaymentEngineError::ProductNotFound(item.product_id))?;
            if product.supplier_id != item.supplier_id {
                return Err(PaymentEngineError::Validation(format!(
                    "Product {} does not belong to supplier {}",
                    product.id, item.supplier_id
                )));
            }
            let supplier_price = match item.variant_id {
                Some(variant_id) => {
                    let variant = catalog::fetch_variant(variant_id, &mut *conn)
                        .await?
                        .ok_or(PaymentEngineError::VariantNotFound(variant_id))?;
                    if variant.product_id != product.id {
                        return Err(PaymentEngineError::Validation(format!(
                            "Variant {variant_id} does not belong to product {}",
                            product.id
                        )));
                    }
                    variant.price.unwrap_or(product.price)
                },
                None => product.price,
            };
            let plug_price = match plug_id {
                Some(plug_id) => {
                    let resale = catalog::resale_price(plug_id, product.id, &mut *conn).await?.ok_or(
                        PaymentEngineError::ResaleListingNotFound { plug_id, product_id: product.id },
                    )?;
                    if resale < supplier_price {
                        return Err(PaymentEngineError::Validation(format!(
                            "Resale price {resale} for product {} is below the supplier price {supplier_price}",
                            product.id
                        )));
                    }
                    resale
                },
                None => supplier_price,
            };
            lines.push(PricedLine {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                plug_price,
                supplier_price,
                supplier_id: item.supplier_id,
                plug_id,
            });
        }
        Ok(lines)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn stage_checkout(&self, checkout: NewCheckout) -> Result<StagedCheckout, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let buyer_id = buyers::upsert_buyer(&checkout.buyer, &mut tx).await?;
        let pay_on_delivery = checkout.is_pay_on_delivery();
        // A single pay-on-delivery item collapses the whole checkout: every sub-order bypasses the
        // gateway and is born Pending.
        let initial_status = if pay_on_delivery { OrderStatusType::Pending } else { OrderStatusType::Staged };

        // Group the cart per supplier, preserving cart order.
        let mut groups: Vec<(i64, Vec<&CartItem>)> = Vec::new();
        for item in &checkout.items {
            match groups.iter_mut().find(|(supplier_id, _)| *supplier_id == item.supplier_id) {
                Some((_, items)) => items.push(item),
                None => groups.push((item.supplier_id, vec![item])),
            }
        }

        let mut staged = Vec::with_capacity(groups.len());
        let mut grand_total = Kobo::from(0);
        for (supplier_id, items) in groups {
            let lines = self.resolve_lines(checkout.plug_id, &items, &mut tx).await?;
            let items_total: Kobo = lines.iter().map(|l| l.plug_price * l.quantity).sum();
            let total = items_total + checkout.delivery_fee;
            let order = orders::insert_order(
                buyer_id,
                supplier_id,
                checkout.plug_id,
                total,
                checkout.delivery_fee,
                initial_status,
                &mut tx,
            )
            .await?;
            for line in &lines {
                order_items::insert_order_item(order.id, line, &mut tx).await?;
                if pay_on_delivery {
                    // Confirmation never runs for POD orders, so stock is taken here.
                    catalog::decrement_stock(line.product_id, line.variant_id, line.quantity, &mut tx).await?;
                }
            }
            grand_total += total;
            staged.push(order);
        }
        tx.commit().await?;
        debug!(
            "🛒️ Checkout staged for buyer #{buyer_id}: {} sub-order(s) totalling {grand_total}{}",
            staged.len(),
            if pay_on_delivery { " (pay on delivery)" } else { "" }
        );
        Ok(StagedCheckout { buyer_id, orders: staged, grand_total, pay_on_delivery })
    }

    async fn attach_payment_reference(&self, order_ids: &[i64], reference: &str) -> Result<(), PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        orders::set_payment_reference(order_ids, reference, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn discard_staged_orders(&self, order_ids: &[i64]) -> Result<(), PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        for id in order_ids {
            orders::delete_staged_order(*id, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_staged_orders(&self, reference: &str) -> Result<Vec<Order>, PaymentEngineError> {
        let mut conn = self.pool.acquire().await?;
        let staged = orders::fetch_by_reference_and_status(reference, OrderStatusType::Staged, &mut conn).await?;
        Ok(staged)
    }

    async fn confirm_staged_orders(&self, reference: &str) -> Result<Vec<Order>, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let staged = orders::fetch_by_reference_and_status(reference, OrderStatusType::Staged, &mut tx).await?;
        let mut confirmed = Vec::with_capacity(staged.len());
        for order in staged {
            let items = order_items::items_for_order(order.id, &mut tx).await?;
            for item in &items {
                catalog::decrement_stock(item.product_id, item.variant_id, item.quantity, &mut tx).await?;
            }
            let order = orders::update_order_status(order.id, OrderStatusType::Pending, &mut tx).await?;
            trace!("💳️ Order {} confirmed", order.order_number);
            confirmed.push(order);
        }
        tx.commit().await?;
        Ok(confirmed)
    }

    async fn mark_order_shipped(&self, order_id: i64) -> Result<Order, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or(PaymentEngineError::OrderNotFound(order_id))?;
        if order.status != OrderStatusType::Pending {
            return Err(PaymentEngineError::InvalidStateTransition {
                order_id,
                from: order.status,
                to: OrderStatusType::Shipped,
            });
        }
        let order = orders::update_order_status(order_id, OrderStatusType::Shipped, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn deliver_order(&self, order_id: i64, hold: Duration) -> Result<DeliveryReceipt, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or(PaymentEngineError::OrderNotFound(order_id))?;
        if order.status != OrderStatusType::Shipped {
            return Err(PaymentEngineError::InvalidStateTransition {
                order_id,
                from: order.status,
                to: OrderStatusType::Delivered,
            });
        }
        let delivered_at = Utc::now();
        let unlock_at = delivered_at + hold;
        let order = orders::set_delivered(order_id, delivered_at, &mut tx).await?;
        let items = order_items::items_for_order(order_id, &mut tx).await?;

        let mut plug_profit = Kobo::from(0);
        let mut supplier_earnings: Vec<(i64, Kobo)> = Vec::new();
        for item in &items {
            plug_profit += item.plug_portion(item.quantity);
            let earned = item.supplier_portion(item.quantity);
            match supplier_earnings.iter_mut().find(|(supplier_id, _)| *supplier_id == item.supplier_id) {
                Some((_, amount)) => *amount += earned,
                None => supplier_earnings.push((item.supplier_id, earned)),
            }
            catalog::increment_sold(item.product_id, item.quantity, &mut tx).await?;
        }

        let plug_payment = match order.plug_id {
            Some(plug_id) => {
                Some(escrow::insert_plug_payment(order_id, plug_id, plug_profit, unlock_at, &mut tx).await?)
            },
            None => None,
        };
        let mut supplier_payments = Vec::with_capacity(supplier_earnings.len());
        for (supplier_id, amount) in supplier_earnings {
            supplier_payments
                .push(escrow::insert_supplier_payment(order_id, supplier_id, amount, unlock_at, &mut tx).await?);
        }
        tx.commit().await?;
        debug!("📦️ Order {} delivered; escrow locked until {unlock_at}", order.order_number);
        Ok(DeliveryReceipt { order, plug_payment, supplier_payments })
    }

    async fn edit_order_items(&self, order_id: i64, surviving: &[i64]) -> Result<Order, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or(PaymentEngineError::OrderNotFound(order_id))?;
        if order.status != OrderStatusType::Pending {
            return Err(PaymentEngineError::Validation(format!(
                "Order {order_id} can only be edited while Pending (status is {})",
                order.status
            )));
        }
        let items = order_items::items_for_order(order_id, &mut tx).await?;
        for id in surviving {
            if !items.iter().any(|item| item.id == *id) {
                return Err(PaymentEngineError::OrderItemNotFound(*id));
            }
        }
        let mut kept_total = Kobo::from(0);
        let mut kept_any = false;
        for item in &items {
            if surviving.contains(&item.id) {
                kept_total += item.line_total();
                kept_any = true;
            } else {
                catalog::restore_stock(item.product_id, item.variant_id, item.quantity, &mut tx).await?;
                order_items::delete_order_item(item.id, &mut tx).await?;
            }
        }
        let order = if kept_any {
            orders::update_total(order_id, kept_total + order.delivery_fee, &mut tx).await?
        } else {
            orders::update_total(order_id, Kobo::from(0), &mut tx).await?;
            let order = orders::update_order_status(order_id, OrderStatusType::Cancelled, &mut tx).await?;
            debug!("📦️ Order {} cancelled: no items remain", order.order_number);
            order
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn pause_order_item(
        &self,
        order_item_id: i64,
        quantity: i64,
    ) -> Result<PausedOrderItem, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let item = order_items::fetch_order_item(order_item_id, &mut tx)
            .await?
            .ok_or(PaymentEngineError::OrderItemNotFound(order_item_id))?;
        let already_returned = disputes::returned_quantity_for_item(order_item_id, &mut tx).await?;
        if quantity > item.quantity - already_returned {
            return Err(PaymentEngineError::Validation(format!(
                "Cannot pause {quantity} unit(s) of order item {order_item_id}; only {} remain",
                item.quantity - already_returned
            )));
        }
        let pause = disputes::insert_pause(order_item_id, quantity, &mut tx).await?;
        if let Some(plug_id) = item.plug_id {
            let row = escrow::plug_payment_for_order(item.order_id, &mut tx).await?.ok_or(
                PaymentEngineError::LedgerRowMissing { order_id: item.order_id, owner: OrderOwner::Plug(plug_id) },
            )?;
            escrow::adjust_plug_payment(row.id, -item.plug_portion(quantity), &mut tx).await?;
        }
        let row = escrow::supplier_payment_for_order(item.order_id, item.supplier_id, &mut tx).await?.ok_or(
            PaymentEngineError::LedgerRowMissing {
                order_id: item.order_id,
                owner: OrderOwner::Supplier(item.supplier_id),
            },
        )?;
        escrow::adjust_supplier_payment(row.id, -item.supplier_portion(quantity), &mut tx).await?;
        tx.commit().await?;
        debug!("⚖️ Paused {quantity} unit(s) of order item {order_item_id} and debited its escrow rows");
        Ok(pause)
    }

    async fn unpause_order_item(
        &self,
        order_item_id: i64,
        quantity: i64,
    ) -> Result<UnpauseOutcome, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let item = order_items::fetch_order_item(order_item_id, &mut tx)
            .await?
            .ok_or(PaymentEngineError::OrderItemNotFound(order_item_id))?;
        let pause = disputes::fetch_pause(order_item_id, &mut tx)
            .await?
            .ok_or(PaymentEngineError::NoActivePause(order_item_id))?;
        if quantity > pause.quantity {
            return Err(PaymentEngineError::PauseQuantityExceeded { requested: quantity, held: pause.quantity });
        }

        let plug = match item.plug_id {
            Some(plug_id) => {
                let amount = item.plug_portion(quantity);
                let row = escrow::plug_payment_for_order(item.order_id, &mut tx).await?.ok_or(
                    PaymentEngineError::LedgerRowMissing { order_id: item.order_id, owner: OrderOwner::Plug(plug_id) },
                )?;
                // A settled row is never mutated; the credit becomes an independent resolve claim.
                let adjustment = if row.status == EscrowStatus::Paid {
                    escrow::insert_resolve_plug_payment(order_item_id, item.order_id, plug_id, amount, &mut tx)
                        .await?;
                    LedgerAdjustment::ResolveCreated { amount }
                } else {
                    escrow::adjust_plug_payment(row.id, amount, &mut tx).await?;
                    LedgerAdjustment::CreditedLiveRow { amount }
                };
                Some(adjustment)
            },
            None => None,
        };

        let amount = item.supplier_portion(quantity);
        let row = escrow::supplier_payment_for_order(item.order_id, item.supplier_id, &mut tx).await?.ok_or(
            PaymentEngineError::LedgerRowMissing {
                order_id: item.order_id,
                owner: OrderOwner::Supplier(item.supplier_id),
            },
        )?;
        let supplier = if row.status == EscrowStatus::Paid {
            escrow::insert_resolve_supplier_payment(order_item_id, item.order_id, item.supplier_id, amount, &mut tx)
                .await?;
            LedgerAdjustment::ResolveCreated { amount }
        } else {
            escrow::adjust_supplier_payment(row.id, amount, &mut tx).await?;
            LedgerAdjustment::CreditedLiveRow { amount }
        };

        let remaining = disputes::shrink_pause(&pause, quantity, &mut tx).await?;
        tx.commit().await?;
        debug!("⚖️ Released {quantity} unit(s) of the pause on order item {order_item_id}");
        Ok(UnpauseOutcome { plug, supplier, remaining })
    }

    async fn return_order_item(
        &self,
        order_item_id: i64,
        quantity: i64,
    ) -> Result<ReturnedOrderItem, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let pause = disputes::fetch_pause(order_item_id, &mut tx)
            .await?
            .ok_or(PaymentEngineError::NoActivePause(order_item_id))?;
        if quantity > pause.quantity {
            return Err(PaymentEngineError::PauseQuantityExceeded { requested: quantity, held: pause.quantity });
        }
        // No ledger movement: the paused value was already debited when the dispute opened.
        let returned = disputes::insert_return(order_item_id, quantity, &mut tx).await?;
        disputes::shrink_pause(&pause, quantity, &mut tx).await?;
        tx.commit().await?;
        debug!("⚖️ Return of {quantity} unit(s) of order item {order_item_id} completed");
        Ok(returned)
    }

    async fn sweep_unlockable(&self, now: DateTime<Utc>) -> Result<u64, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        let flipped = escrow::sweep_unlockable(now, &mut tx).await?;
        tx.commit().await?;
        Ok(flipped)
    }

    async fn upsert_verification_token(
        &self,
        owner: OrderOwner,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationToken, PaymentEngineError> {
        let mut conn = self.pool.acquire().await?;
        let token = withdrawals::upsert_token(owner, token, expires_at, &mut conn).await?;
        Ok(token)
    }

    async fn fetch_valid_verification_token(
        &self,
        owner: OrderOwner,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationToken>, PaymentEngineError> {
        let mut conn = self.pool.acquire().await?;
        let token = withdrawals::fetch_valid_token(owner, now, &mut conn).await?;
        Ok(token)
    }

    async fn settle_withdrawal(
        &self,
        owner: OrderOwner,
        reference: &str,
    ) -> Result<SettledWithdrawal, PaymentEngineError> {
        let mut tx = self.pool.begin().await?;
        // The Opened set is re-derived here rather than trusted from the caller's earlier
        // snapshot; whatever is opened at settlement time is exactly what gets marked Paid.
        let amount = escrow::settle_opened_rows(owner, &mut tx).await?;
        withdrawals::delete_token(owner, &mut tx).await?;
        let record = withdrawals::insert_history(owner, amount, reference, WithdrawalStatus::Success, &mut tx).await?;
        tx.commit().await?;
        info!("💸️ Withdrawal of {amount} settled for {owner} [{reference}]");
        Ok(SettledWithdrawal { amount, record })
    }

    async fn record_failed_withdrawal(
        &self,
        owner: OrderOwner,
        amount: Kobo,
    ) -> Result<WithdrawalRecord, PaymentEngineError> {
        let mut conn = self.pool.acquire().await?;
        let record = withdrawals::insert_history(owner, amount, "", WithdrawalStatus::Failed, &mut conn).await?;
        Ok(record)
    }

    async fn try_acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool, PaymentEngineError> {
        let mut conn = self.pool.acquire().await?;
        let acquired = locks::try_acquire(key, ttl, Utc::now(), &mut conn).await?;
        Ok(acquired)
    }

    async fn release_lock(&self, key: &str) -> Result<(), PaymentEngineError> {
        let mut conn = self.pool.acquire().await?;
        locks::release(key, &mut conn).await?;
        Ok(())
    }
}

impl EarningsManagement for SqliteDatabase {
    async fn earnings_for_owner(&self, owner: OrderOwner) -> Result<EarningsSummary, EarningsApiError> {
        // A transaction gives the three sums a consistent snapshot.
        let mut tx = self.pool.begin().await.map_err(EarningsApiError::from)?;
        let locked = escrow::direct_total(owner, EscrowStatus::Locked, &mut tx).await?;
        let unlocked = escrow::direct_total(owner, EscrowStatus::Opened, &mut tx).await?
            + escrow::resolve_total(owner, EscrowStatus::Opened, &mut tx).await?;
        let paid = escrow::direct_total(owner, EscrowStatus::Paid, &mut tx).await?
            + escrow::resolve_total(owner, EscrowStatus::Paid, &mut tx).await?;
        tx.commit().await.map_err(EarningsApiError::from)?;
        Ok(EarningsSummary { owner, locked, unlocked, paid })
    }

    async fn opened_balance(&self, owner: OrderOwner) -> Result<Kobo, EarningsApiError> {
        let mut tx = self.pool.begin().await.map_err(EarningsApiError::from)?;
        let balance = escrow::direct_total(owner, EscrowStatus::Opened, &mut tx).await?
            + escrow::resolve_total(owner, EscrowStatus::Opened, &mut tx).await?;
        tx.commit().await.map_err(EarningsApiError::from)?;
        Ok(balance)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, EarningsApiError> {
        let mut conn = self.pool.acquire().await.map_err(EarningsApiError::from)?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, EarningsApiError> {
        let mut conn = self.pool.acquire().await.map_err(EarningsApiError::from)?;
        let order = orders::fetch_order_by_number(number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, EarningsApiError> {
        let mut conn = self.pool.acquire().await.map_err(EarningsApiError::from)?;
        let items = order_items::items_for_order(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_plug_payment(&self, order_id: i64) -> Result<Option<PlugPayment>, EarningsApiError> {
        let mut conn = self.pool.acquire().await.map_err(EarningsApiError::from)?;
        let payment = escrow::plug_payment_for_order(order_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_supplier_payments(&self, order_id: i64) -> Result<Vec<SupplierPayment>, EarningsApiError> {
        let mut conn = self.pool.acquire().await.map_err(EarningsApiError::from)?;
        let payments = escrow::supplier_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }

    async fn fetch_resolve_plug_payments(&self, plug_id: i64) -> Result<Vec<ResolvePlugPayment>, EarningsApiError> {
        let mut conn = self.pool.acquire().await.map_err(EarningsApiError::from)?;
        let rows = escrow::resolve_plug_payments_for_party(plug_id, &mut conn).await?;
        Ok(rows)
    }

    async fn fetch_resolve_supplier_payments(
        &self,
        supplier_id: i64,
    ) -> Result<Vec<ResolveSupplierPayment>, EarningsApiError> {
        let mut conn = self.pool.acquire().await.map_err(EarningsApiError::from)?;
        let rows = escrow::resolve_supplier_payments_for_party(supplier_id, &mut conn).await?;
        Ok(rows)
    }

    async fn fetch_withdrawal_history(&self, owner: OrderOwner) -> Result<Vec<WithdrawalRecord>, EarningsApiError> {
        let mut conn = self.pool.acquire().await.map_err(EarningsApiError::from)?;
        let history = withdrawals::history_for(owner, &mut conn).await?;
        Ok(history)
    }
}
