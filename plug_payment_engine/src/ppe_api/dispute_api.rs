use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{PausedOrderItem, ReturnedOrderItem},
    ledger_objects::UnpauseOutcome,
    traits::{MarketplaceDatabase, PaymentEngineError},
};

/// `DisputeApi` is the return/pause adjustment engine. Pausing removes a disputed quantity's value
/// from the live escrow rows; unpausing puts exactly that value back — into the live row when it is
/// still Locked or Opened, or as a fresh resolve claim when the row has already been paid out.
/// Returning finalizes a dispute with an audit record and no further ledger movement.
pub struct DisputeApi<B> {
    db: B,
}

impl<B> Debug for DisputeApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DisputeApi")
    }
}

impl<B> DisputeApi<B>
where B: MarketplaceDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Opens a dispute hold on `quantity` units of the item. Requires a positive quantity, an
    /// existing item with no active pause, and the post-delivery escrow rows to exist — the debit
    /// refuses to run against a ledger that is not there.
    pub async fn pause_item(&self, order_item_id: i64, quantity: i64) -> Result<PausedOrderItem, PaymentEngineError> {
        if quantity <= 0 {
            return Err(PaymentEngineError::Validation("Pause quantity must be positive".to_string()));
        }
        let pause = self.db.pause_order_item(order_item_id, quantity).await?;
        info!("⚖️ Dispute opened on order item {order_item_id} ({quantity} unit(s))");
        Ok(pause)
    }

    /// Releases `quantity` units of an active hold, crediting the value back to wherever it can
    /// still legally go.
    pub async fn unpause_item(&self, order_item_id: i64, quantity: i64) -> Result<UnpauseOutcome, PaymentEngineError> {
        if quantity <= 0 {
            return Err(PaymentEngineError::Validation("Unpause quantity must be positive".to_string()));
        }
        let outcome = self.db.unpause_order_item(order_item_id, quantity).await?;
        info!("⚖️ Dispute on order item {order_item_id} released for {quantity} unit(s)");
        Ok(outcome)
    }

    /// Completes a dispute as a return. The paused value was already debited at pause time, so this
    /// only records the audit row and shrinks the hold.
    pub async fn return_item(&self, order_item_id: i64, quantity: i64) -> Result<ReturnedOrderItem, PaymentEngineError> {
        if quantity <= 0 {
            return Err(PaymentEngineError::Validation("Return quantity must be positive".to_string()));
        }
        let returned = self.db.return_order_item(order_item_id, quantity).await?;
        info!("⚖️ Order item {order_item_id}: {quantity} unit(s) returned");
        Ok(returned)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
