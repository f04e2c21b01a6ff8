//! # Payment engine public API
//!
//! The `ppe_api` module exposes the programmatic API for the marketplace payment engine. The API is
//! modular so that callers can pick the functionality they need:
//!
//! * [`order_flow_api`] drives checkout staging, payment confirmation and the fulfillment state
//!   machine through to delivery.
//! * [`dispute_api`] is the return/pause adjustment engine over the escrow ledger.
//! * [`earnings_api`] is the read model: earnings summaries, order lookups, audit history.
//! * [`withdrawal_api`] gates and settles payouts.
//! * [`sweeper`] hosts the deferred unlock sweeper.
//!
//! The pattern for all of them is the same: an API instance is created by supplying a database
//! backend implementing the relevant trait (and, where gateway calls are made, a
//! [`PaymentGateway`](crate::traits::PaymentGateway) implementation), e.g.
//!
//! ```rust,ignore
//! use plug_payment_engine::{EarningsApi, SqliteDatabase, db_types::OrderOwner};
//! let db = SqliteDatabase::new_with_url(&url, 5).await?;
//! let api = EarningsApi::new(db);
//! let summary = api.earnings_for(OrderOwner::Plug(42)).await?;
//! ```

pub mod dispute_api;
pub mod earnings_api;
pub mod ledger_objects;
pub mod order_flow_api;
pub mod order_objects;
pub mod sweeper;
pub mod withdrawal_api;
