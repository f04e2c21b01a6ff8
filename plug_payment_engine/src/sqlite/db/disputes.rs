use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{PausedOrderItem, ReturnedOrderItem},
    traits::PaymentEngineError,
};

pub async fn fetch_pause(
    order_item_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PausedOrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM paused_order_items WHERE order_item_id = $1")
        .bind(order_item_id)
        .fetch_optional(conn)
        .await
}

/// Creates the dispute hold. The unique constraint on `order_item_id` enforces "at most one active
/// pause per item"; a violation surfaces as [`PaymentEngineError::PauseAlreadyExists`].
pub async fn insert_pause(
    order_item_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<PausedOrderItem, PaymentEngineError> {
    let pause = sqlx::query_as(
        "INSERT INTO paused_order_items (order_item_id, quantity) VALUES ($1, $2) RETURNING *",
    )
    .bind(order_item_id)
    .bind(quantity)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            PaymentEngineError::PauseAlreadyExists(order_item_id)
        },
        _ => PaymentEngineError::from(e),
    })?;
    debug!("🗃️ Paused {quantity} unit(s) of order item {order_item_id}");
    Ok(pause)
}

/// Reduces the hold by `quantity`, deleting it when it reaches zero. Returns what remains.
pub async fn shrink_pause(
    pause: &PausedOrderItem,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PausedOrderItem>, sqlx::Error> {
    if quantity >= pause.quantity {
        sqlx::query("DELETE FROM paused_order_items WHERE id = $1").bind(pause.id).execute(conn).await?;
        debug!("🗃️ Pause on order item {} fully released", pause.order_item_id);
        return Ok(None);
    }
    let remaining = sqlx::query_as(
        "UPDATE paused_order_items SET quantity = quantity - $1 WHERE id = $2 RETURNING *",
    )
    .bind(quantity)
    .bind(pause.id)
    .fetch_one(conn)
    .await?;
    Ok(Some(remaining))
}

pub async fn insert_return(
    order_item_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<ReturnedOrderItem, sqlx::Error> {
    let returned: ReturnedOrderItem = sqlx::query_as(
        "INSERT INTO returned_order_items (order_item_id, quantity) VALUES ($1, $2) RETURNING *",
    )
    .bind(order_item_id)
    .bind(quantity)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Recorded return of {quantity} unit(s) of order item {order_item_id}");
    Ok(returned)
}

pub async fn returned_quantity_for_item(order_item_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM returned_order_items WHERE order_item_id = $1")
        .bind(order_item_id)
        .fetch_one(conn)
        .await
}
