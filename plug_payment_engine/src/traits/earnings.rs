use ppe_common::Kobo;
use thiserror::Error;

use crate::{
    db_types::{
        Order,
        OrderItem,
        OrderNumber,
        OrderOwner,
        PlugPayment,
        ResolvePlugPayment,
        ResolveSupplierPayment,
        SupplierPayment,
        WithdrawalRecord,
    },
    ledger_objects::EarningsSummary,
};

#[derive(Debug, Clone, Error)]
pub enum EarningsApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for EarningsApiError {
    fn from(e: sqlx::Error) -> Self {
        EarningsApiError::DatabaseError(e.to_string())
    }
}

/// Read model over orders and the escrow ledger. [`MarketplaceDatabase`] does the mutating;
/// `EarningsManagement` answers the questions a storefront or payout screen asks.
///
/// [`MarketplaceDatabase`]: crate::traits::MarketplaceDatabase
#[allow(async_fn_in_trait)]
pub trait EarningsManagement {
    /// The locked / unlocked / paid totals for a party. Unlocked and paid both include resolve
    /// rows; locked is reported separately and excluded from the total.
    async fn earnings_for_owner(&self, owner: OrderOwner) -> Result<EarningsSummary, EarningsApiError>;

    /// The withdrawable balance: Σ Opened(direct) + Σ Opened(resolve).
    async fn opened_balance(&self, owner: OrderOwner) -> Result<Kobo, EarningsApiError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, EarningsApiError>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, EarningsApiError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, EarningsApiError>;

    /// The live plug escrow row for an order, if the order was placed through a plug and has been
    /// delivered.
    async fn fetch_plug_payment(&self, order_id: i64) -> Result<Option<PlugPayment>, EarningsApiError>;

    async fn fetch_supplier_payments(&self, order_id: i64) -> Result<Vec<SupplierPayment>, EarningsApiError>;

    async fn fetch_resolve_plug_payments(&self, plug_id: i64) -> Result<Vec<ResolvePlugPayment>, EarningsApiError>;

    async fn fetch_resolve_supplier_payments(
        &self,
        supplier_id: i64,
    ) -> Result<Vec<ResolveSupplierPayment>, EarningsApiError>;

    async fn fetch_withdrawal_history(&self, owner: OrderOwner) -> Result<Vec<WithdrawalRecord>, EarningsApiError>;
}
