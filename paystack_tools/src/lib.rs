//! A minimal Paystack REST client covering the endpoints the payment engine needs: transaction
//! initialization and verification, bank account resolution, transfer recipients and transfers.
//! All amounts are integer minor units ([`ppe_common::Kobo`]).
mod api;
mod config;
mod data_objects;
mod error;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use data_objects::{
    InitializedTransaction,
    InitiatedTransfer,
    ResolvedAccount,
    TransferRecipient,
    VerifiedTransaction,
};
pub use error::PaystackApiError;
