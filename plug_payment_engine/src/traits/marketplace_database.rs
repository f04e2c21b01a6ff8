use chrono::{DateTime, Duration, Utc};
use ppe_common::Kobo;
use thiserror::Error;

use crate::{
    db_types::{
        Order,
        OrderOwner,
        OrderStatusType,
        PausedOrderItem,
        ReturnedOrderItem,
        VerificationToken,
        WithdrawalRecord,
    },
    ledger_objects::{DeliveryReceipt, SettledWithdrawal, UnpauseOutcome},
    order_objects::{NewCheckout, StagedCheckout},
    traits::{EarningsApiError, EarningsManagement, GatewayError},
};

/// This trait defines the behaviour backends must expose to support the payment engine.
///
/// Every method that touches more than one row executes as a single atomic transaction: partial
/// application of a financial mutation is never acceptable. The flows covered are:
/// * staging a checkout (buyer upsert, per-supplier split, order/item creation)
/// * payment confirmation (status flip + stock decrement)
/// * fulfillment (ship/deliver, delivery's escrow row creation, pre-shipment edits)
/// * the dispute engine (pause/unpause/return with compensating resolve rows)
/// * the deferred unlock sweep
/// * withdrawal settlement, OTP storage and TTL advisory locks
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + EarningsManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Upserts the buyer by (email, phone), groups the cart per supplier, resolves and freezes
    /// prices, and creates one order (with items) per supplier — all in one transaction. Orders are
    /// born `Staged`, or `Pending` when the checkout collapsed to pay-on-delivery (in which case
    /// stock is taken immediately, since confirmation will never run for them).
    ///
    /// Any lookup failure (unknown product or variant, foreign supplier product, missing or
    /// underpriced resale listing) aborts the whole checkout.
    async fn stage_checkout(&self, checkout: NewCheckout) -> Result<StagedCheckout, PaymentEngineError>;

    /// Stamps the gateway reference on every freshly staged sub-order.
    async fn attach_payment_reference(&self, order_ids: &[i64], reference: &str) -> Result<(), PaymentEngineError>;

    /// Compensating cleanup when the gateway refused to open an intent: deletes the given orders
    /// (and their items) as long as they are still `Staged`.
    async fn discard_staged_orders(&self, order_ids: &[i64]) -> Result<(), PaymentEngineError>;

    async fn fetch_staged_orders(&self, reference: &str) -> Result<Vec<Order>, PaymentEngineError>;

    /// Flips every `Staged` order holding this reference to `Pending` and decrements stock (and
    /// variant stock) per item, clamped at zero — one transaction. Returns the confirmed orders;
    /// an empty result means there was nothing left to confirm (the idempotent repeat case).
    async fn confirm_staged_orders(&self, reference: &str) -> Result<Vec<Order>, PaymentEngineError>;

    /// Guarded Pending→Shipped transition. No ledger impact.
    async fn mark_order_shipped(&self, order_id: i64) -> Result<Order, PaymentEngineError>;

    /// Guarded Shipped→Delivered transition. In one transaction: computes the plug profit and the
    /// per-supplier earnings from the frozen item prices, bumps product `sold` counters, and
    /// creates the `Locked` escrow rows with `unlock_at = delivered_at + hold`.
    async fn deliver_order(&self, order_id: i64, hold: Duration) -> Result<DeliveryReceipt, PaymentEngineError>;

    /// Pre-shipment edit (guarded `Pending`): `surviving` lists the order-item ids that remain.
    /// Removed items have their stock restored and their rows deleted, and the order total is
    /// recomputed, atomically. An empty survivor set cancels the order.
    async fn edit_order_items(&self, order_id: i64, surviving: &[i64]) -> Result<Order, PaymentEngineError>;

    /// Opens a dispute hold: records the paused quantity and debits the owning escrow rows by the
    /// item's plug/supplier portions. The owning rows must exist (the order must have been
    /// delivered) — a missing row is an error, never silently ignored.
    async fn pause_order_item(&self, order_item_id: i64, quantity: i64) -> Result<PausedOrderItem, PaymentEngineError>;

    /// Releases (part of) a hold. Per ledger side, the credit lands back in the live row unless
    /// that row has already reached `Paid`, in which case a fresh resolve claim is created instead
    /// — settled rows are never mutated.
    async fn unpause_order_item(&self, order_item_id: i64, quantity: i64)
        -> Result<UnpauseOutcome, PaymentEngineError>;

    /// Terminal step of a dispute: records the returned quantity and shrinks the hold. No ledger
    /// movement — the value was already removed at pause time.
    async fn return_order_item(
        &self,
        order_item_id: i64,
        quantity: i64,
    ) -> Result<ReturnedOrderItem, PaymentEngineError>;

    /// Flips every `Locked` escrow row whose `unlock_at` has passed to `Opened`. Filtering on
    /// status makes repeated and overlapping sweeps idempotent. Returns the number of rows flipped.
    async fn sweep_unlockable(&self, now: DateTime<Utc>) -> Result<u64, PaymentEngineError>;

    /// Stores (or refreshes) the single live OTP for an owner.
    async fn upsert_verification_token(
        &self,
        owner: OrderOwner,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationToken, PaymentEngineError>;

    async fn fetch_valid_verification_token(
        &self,
        owner: OrderOwner,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationToken>, PaymentEngineError>;

    /// Settles a successful payout in one transaction: re-derives the `Opened` set (direct and
    /// resolve), flips it to `Paid`, deletes the consumed OTP and appends the Success audit row.
    /// Returns the settled amount, which callers should compare against their pre-transfer
    /// snapshot.
    async fn settle_withdrawal(
        &self,
        owner: OrderOwner,
        reference: &str,
    ) -> Result<SettledWithdrawal, PaymentEngineError>;

    /// Appends a Failed audit row (empty reference). The ledger is left untouched.
    async fn record_failed_withdrawal(
        &self,
        owner: OrderOwner,
        amount: Kobo,
    ) -> Result<WithdrawalRecord, PaymentEngineError>;

    /// Tries to take the TTL advisory lock for `key`. Returns `false` if another holder has it.
    /// Expired locks are reaped on the way in, so a crashed holder cannot block forever.
    async fn try_acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool, PaymentEngineError>;

    async fn release_lock(&self, key: &str) -> Result<(), PaymentEngineError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentEngineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentEngineError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("The requested order (id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("The requested order item (id {0}) does not exist")]
    OrderItemNotFound(i64),
    #[error("The requested product (id {0}) does not exist")]
    ProductNotFound(i64),
    #[error("The requested product variant (id {0}) does not exist")]
    VariantNotFound(i64),
    #[error("Plug {plug_id} has no resale listing for product {product_id}")]
    ResaleListingNotFound { plug_id: i64, product_id: i64 },
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStateTransition { order_id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Could not generate a unique order number")]
    OrderNumberCollision,
    #[error("Order item {0} already has an active pause")]
    PauseAlreadyExists(i64),
    #[error("Order item {0} has no active pause")]
    NoActivePause(i64),
    #[error("Requested quantity {requested} exceeds the paused quantity {held}")]
    PauseQuantityExceeded { requested: i64, held: i64 },
    #[error("No {owner} escrow row exists for order {order_id}; refusing to adjust a ledger that is not there")]
    LedgerRowMissing { order_id: i64, owner: OrderOwner },
    #[error("The verification code is invalid or has expired")]
    InvalidOtp,
    #[error("There is no opened balance to withdraw")]
    NothingToWithdraw,
    #[error("Another operation holds the lock {0}")]
    LockHeld(String),
    #[error("Gateway reported amount {reported} but the staged orders total {expected}")]
    AmountMismatch { expected: Kobo, reported: Kobo },
    #[error("Gateway did not report success: {0}")]
    GatewayNotSuccessful(String),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

impl From<sqlx::Error> for PaymentEngineError {
    fn from(e: sqlx::Error) -> Self {
        PaymentEngineError::DatabaseError(e.to_string())
    }
}

impl From<EarningsApiError> for PaymentEngineError {
    fn from(e: EarningsApiError) -> Self {
        match e {
            EarningsApiError::DatabaseError(msg) => PaymentEngineError::DatabaseError(msg),
        }
    }
}
