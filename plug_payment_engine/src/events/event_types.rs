use chrono::{DateTime, Utc};
use ppe_common::Kobo;

use crate::db_types::{Order, OrderOwner, PlugPayment, SupplierPayment};

/// A gateway payment was verified and its orders moved to Pending.
#[derive(Debug, Clone)]
pub struct PaymentConfirmedEvent {
    pub reference: String,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone)]
pub struct OrderShippedEvent {
    pub order: Order,
}

impl OrderShippedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Delivery happened and the escrow rows were locked.
#[derive(Debug, Clone)]
pub struct OrderDeliveredEvent {
    pub order: Order,
    pub plug_payment: Option<PlugPayment>,
    pub supplier_payments: Vec<SupplierPayment>,
}

/// A payout OTP was minted (or refreshed) and should be emailed to the party.
#[derive(Debug, Clone)]
pub struct OtpIssuedEvent {
    pub owner: OrderOwner,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WithdrawalCompletedEvent {
    pub owner: OrderOwner,
    pub amount: Kobo,
    pub reference: String,
}
