use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::Buyer, order_objects::ContactInfo, traits::PaymentEngineError};

/// Upserts the buyer on the (email, phone) composite key. Contact resolution is idempotent:
/// re-staging with the same email and phone lands on the same row, refreshing name and address.
pub async fn upsert_buyer(contact: &ContactInfo, conn: &mut SqliteConnection) -> Result<i64, PaymentEngineError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO buyers (name, email, phone, address) VALUES ($1, $2, $3, $4)
            ON CONFLICT (email, phone) DO UPDATE
                SET name = excluded.name, address = excluded.address, updated_at = CURRENT_TIMESTAMP
            RETURNING id;
        "#,
    )
    .bind(&contact.name)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.address)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Buyer <{}> resolved to id {id}", contact.email);
    Ok(id)
}

pub async fn fetch_buyer(id: i64, conn: &mut SqliteConnection) -> Result<Option<Buyer>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM buyers WHERE id = $1").bind(id).fetch_optional(conn).await
}
