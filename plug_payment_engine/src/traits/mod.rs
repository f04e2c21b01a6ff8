//! # Backend and collaborator contracts.
//!
//! This module defines the interface contracts of the payment engine.
//!
//! * [`MarketplaceDatabase`] is the mutating surface a storage backend must provide: each method is
//!   one atomic transaction over the order, stock and escrow rows it names.
//! * [`EarningsManagement`] is the read model: earnings summaries, order/ledger lookups and the
//!   withdrawal audit trail.
//! * [`PaymentGateway`] is the external payment collaborator (intent, verification, account
//!   resolution, transfers). It is injected so that tests can run against a scriptable double.
mod earnings;
mod marketplace_database;
mod payment_gateway;

pub use earnings::{EarningsApiError, EarningsManagement};
pub use marketplace_database::{MarketplaceDatabase, PaymentEngineError};
pub use payment_gateway::{
    BankAccount,
    GatewayError,
    PaymentGateway,
    PaymentIntent,
    RecipientHandle,
    ResolvedBankAccount,
    TransferReceipt,
    VerifiedPayment,
    GATEWAY_SUCCESS,
};
