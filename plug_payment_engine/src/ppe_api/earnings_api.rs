//! Unified read access to earnings and the escrow ledger.

use std::fmt::Debug;

use crate::{
    db_types::{Order, OrderItem, OrderNumber, OrderOwner, WithdrawalRecord},
    ledger_objects::EarningsSummary,
    traits::{EarningsApiError, EarningsManagement},
};

/// The `EarningsApi` answers the questions a party's dashboard asks: how much is locked, how much
/// is withdrawable, what has been paid out, and the audit trail behind it.
pub struct EarningsApi<B> {
    db: B,
}

impl<B: Debug> Debug for EarningsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EarningsApi ({:?})", self.db)
    }
}

impl<B> EarningsApi<B>
where B: EarningsManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Locked / unlocked / paid totals for the party. Resolve rows count toward unlocked and paid;
    /// locked is reported separately and excluded from total earnings.
    pub async fn earnings_for(&self, owner: OrderOwner) -> Result<EarningsSummary, EarningsApiError> {
        self.db.earnings_for_owner(owner).await
    }

    pub async fn order_by_id(&self, order_id: i64) -> Result<Option<Order>, EarningsApiError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, EarningsApiError> {
        self.db.fetch_order_by_number(number).await
    }

    pub async fn items_for_order(&self, order_id: i64) -> Result<Vec<OrderItem>, EarningsApiError> {
        self.db.fetch_order_items(order_id).await
    }

    pub async fn withdrawal_history(&self, owner: OrderOwner) -> Result<Vec<WithdrawalRecord>, EarningsApiError> {
        self.db.fetch_withdrawal_history(owner).await
    }
}
