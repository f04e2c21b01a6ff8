use chrono::{DateTime, Duration, Utc};
use log::trace;
use sqlx::SqliteConnection;

/// Tries to take the TTL advisory lock for `key`. Expired locks are reaped first, so a crashed
/// holder can delay a new acquisition by at most the TTL.
pub async fn try_acquire(
    key: &str,
    ttl: Duration,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM advisory_locks WHERE lock_key = $1 AND expires_at <= $2")
        .bind(key)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    let result = sqlx::query("INSERT INTO advisory_locks (lock_key, expires_at) VALUES ($1, $2)")
        .bind(key)
        .bind(now + ttl)
        .execute(conn)
        .await;
    match result {
        Ok(_) => {
            trace!("🗃️ Acquired advisory lock [{key}]");
            Ok(true)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn release(key: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM advisory_locks WHERE lock_key = $1").bind(key).execute(conn).await?;
    trace!("🗃️ Released advisory lock [{key}]");
    Ok(())
}
