//! # SQLite database methods
//!
//! "Low-level" SQLite interactions for the marketplace engine.
//!
//! Everything here is a simple function (rather than a stateful struct) accepting a
//! `&mut SqliteConnection`. Callers obtain a connection from a pool, or open a transaction and pass
//! `&mut *tx` so that several of these calls commit or roll back together.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod buyers;
pub mod catalog;
pub mod disputes;
pub mod escrow;
pub mod locks;
pub mod order_items;
pub mod orders;
pub mod withdrawals;

const SQLITE_DB_URL: &str = "sqlite://data/plug_market.db";

pub fn db_url() -> String {
    let result = env::var("PPE_DATABASE_URL").unwrap_or_else(|_| {
        info!("PPE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
