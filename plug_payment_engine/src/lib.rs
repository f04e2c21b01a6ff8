//! Plug Payment Engine
//!
//! The core of a multi-party marketplace connecting suppliers, resellers ("plugs") and buyers:
//! an escrow payment ledger and order-fulfillment state machine. It splits a buyer's cart across
//! suppliers, confirms gateway payment, advances orders through shipment and delivery, locks the
//! proceeds in escrow for a hold period, lets disputed quantities be paused and returned with
//! compensating ledger entries, and finally settles withdrawals.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the
//!    database directly; use the public API instead. The exception is the data types stored in the
//!    database, which are defined in [`db_types`] and are public.
//! 2. The public API ([`mod@ppe_api`], re-exported at the crate root). Backends implement the
//!    contracts in [`traits`] to power these APIs; the payment gateway is likewise injected
//!    through a trait so tests can run against a double.
//! 3. Event hooks ([`events`]): a simple actor-style pub-sub layer used for fire-and-forget
//!    notifications (order shipped/delivered, payment confirmed, payout OTPs).
pub mod config;
pub mod db_types;
pub mod events;
#[cfg(feature = "paystack")]
pub mod gateway;
pub mod helpers;
mod ppe_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod test_utils;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use ppe_api::{
    dispute_api::DisputeApi,
    earnings_api::EarningsApi,
    ledger_objects,
    order_flow_api::OrderFlowApi,
    order_objects,
    sweeper::UnlockSweeper,
    withdrawal_api::WithdrawalApi,
};
pub use traits::{EarningsManagement, MarketplaceDatabase, PaymentEngineError, PaymentGateway};
