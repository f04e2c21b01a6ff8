use chrono::{DateTime, Utc};
use log::debug;
use ppe_common::Kobo;
use sqlx::SqliteConnection;

use crate::db_types::{OrderOwner, VerificationToken, WithdrawalRecord, WithdrawalStatus};

/// Stores the single live OTP for an owner, replacing any previous one.
pub async fn upsert_token(
    owner: OrderOwner,
    token: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<VerificationToken, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO withdrawal_verification_tokens (role, party_id, token, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (role, party_id) DO UPDATE SET token = excluded.token, expires_at = excluded.expires_at
            RETURNING *;
        "#,
    )
    .bind(owner.role())
    .bind(owner.party_id())
    .bind(token)
    .bind(expires_at)
    .fetch_one(conn)
    .await
}

pub async fn fetch_valid_token(
    owner: OrderOwner,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<VerificationToken>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM withdrawal_verification_tokens WHERE role = $1 AND party_id = $2 AND expires_at > $3",
    )
    .bind(owner.role())
    .bind(owner.party_id())
    .bind(now)
    .fetch_optional(conn)
    .await
}

pub async fn delete_token(owner: OrderOwner, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM withdrawal_verification_tokens WHERE role = $1 AND party_id = $2")
        .bind(owner.role())
        .bind(owner.party_id())
        .execute(conn)
        .await?;
    Ok(())
}

/// Appends to the audit trail. History rows are never mutated after creation.
pub async fn insert_history(
    owner: OrderOwner,
    amount: Kobo,
    reference: &str,
    status: WithdrawalStatus,
    conn: &mut SqliteConnection,
) -> Result<WithdrawalRecord, sqlx::Error> {
    let record: WithdrawalRecord = sqlx::query_as(
        r#"
            INSERT INTO withdrawal_history (role, party_id, amount, reference, status)
            VALUES ($1, $2, $3, $4, $5) RETURNING *;
        "#,
    )
    .bind(owner.role())
    .bind(owner.party_id())
    .bind(amount)
    .bind(reference)
    .bind(status)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Withdrawal {status:?} of {amount} recorded for {owner}");
    Ok(record)
}

pub async fn history_for(owner: OrderOwner, conn: &mut SqliteConnection) -> Result<Vec<WithdrawalRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM withdrawal_history WHERE role = $1 AND party_id = $2 ORDER BY id DESC")
        .bind(owner.role())
        .bind(owner.party_id())
        .fetch_all(conn)
        .await
}
