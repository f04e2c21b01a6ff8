use ppe_common::Kobo;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderOwner, PausedOrderItem, PlugPayment, SupplierPayment, WithdrawalRecord};

//--------------------------------------  DeliveryReceipt      ---------------------------------------------------------
/// Everything delivery created: the updated order and the freshly locked escrow rows.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub order: Order,
    /// Absent for orders placed directly with a supplier (no reseller margin to escrow).
    pub plug_payment: Option<PlugPayment>,
    pub supplier_payments: Vec<SupplierPayment>,
}

//-------------------------------------- LedgerAdjustment      ---------------------------------------------------------
/// Where an unpause credit landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerAdjustment {
    /// The owning row was still live (Locked or Opened) and was incremented in place.
    CreditedLiveRow { amount: Kobo },
    /// The owning row had already been paid out; an independent resolve claim was created.
    ResolveCreated { amount: Kobo },
}

impl LedgerAdjustment {
    pub fn amount(&self) -> Kobo {
        match self {
            LedgerAdjustment::CreditedLiveRow { amount } | LedgerAdjustment::ResolveCreated { amount } => *amount,
        }
    }
}

//--------------------------------------  UnpauseOutcome       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct UnpauseOutcome {
    /// Absent when the item was sold directly by the supplier (no plug side to credit).
    pub plug: Option<LedgerAdjustment>,
    pub supplier: LedgerAdjustment,
    /// What is left of the hold, if any.
    pub remaining: Option<PausedOrderItem>,
}

//-------------------------------------- SettledWithdrawal     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct SettledWithdrawal {
    /// The amount actually flipped to Paid inside the settlement transaction.
    pub amount: Kobo,
    pub record: WithdrawalRecord,
}

//--------------------------------------  EarningsSummary      ---------------------------------------------------------
/// The earnings read model for one party. `locked` is still in escrow and excluded from the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub owner: OrderOwner,
    pub locked: Kobo,
    /// Opened(direct) + Opened(resolve): withdrawable right now.
    pub unlocked: Kobo,
    /// Paid(direct) + Paid(resolve): already settled.
    pub paid: Kobo,
}

impl EarningsSummary {
    pub fn total_earnings(&self) -> Kobo {
        self.unlocked + self.paid
    }
}
