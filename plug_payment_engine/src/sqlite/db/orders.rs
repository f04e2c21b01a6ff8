use chrono::{DateTime, Utc};
use log::{debug, trace};
use ppe_common::Kobo;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, OrderNumber, OrderStatusType},
    helpers::new_order_number,
    traits::PaymentEngineError,
};

/// How many fresh order numbers we try before giving up on a clear run of unique violations.
const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// Inserts a new order under a freshly generated order number. A uniqueness violation on the
/// number (vanishingly rare, but possible) triggers a bounded regenerate-and-retry.
pub async fn insert_order(
    buyer_id: i64,
    supplier_id: i64,
    plug_id: Option<i64>,
    total_amount: Kobo,
    delivery_fee: Kobo,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentEngineError> {
    for _attempt in 0..MAX_ORDER_NUMBER_ATTEMPTS {
        let number = new_order_number();
        let result = sqlx::query_as::<_, Order>(
            r#"
                INSERT INTO orders (order_number, buyer_id, supplier_id, plug_id, total_amount, delivery_fee, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *;
            "#,
        )
        .bind(&number)
        .bind(buyer_id)
        .bind(supplier_id)
        .bind(plug_id)
        .bind(total_amount)
        .bind(delivery_fee)
        .bind(status)
        .fetch_one(&mut *conn)
        .await;
        match result {
            Ok(order) => {
                debug!("🗃️ Order {} inserted with id {}", order.order_number, order.id);
                return Ok(order);
            },
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                trace!("🗃️ Order number {number} collided, regenerating");
                continue;
            },
            Err(e) => return Err(e.into()),
        }
    }
    Err(PaymentEngineError::OrderNumberCollision)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(number.as_str()).fetch_optional(conn).await
}

/// All orders holding `reference` in the given status, oldest first.
pub async fn fetch_by_reference_and_status(
    reference: &str,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE payment_reference = $1 AND status = $2 ORDER BY id ASC")
        .bind(reference)
        .bind(status)
        .fetch_all(conn)
        .await
}

pub async fn set_payment_reference(
    order_ids: &[i64],
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    for id in order_ids {
        sqlx::query("UPDATE orders SET payment_reference = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
            .bind(reference)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Deletes an order and its items, but only while it is still `Staged`. Used as compensating
/// cleanup when the gateway refuses to open an intent.
pub async fn delete_staged_order(order_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM orders WHERE id = $1 AND status = 'Staged'")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    if deleted.rows_affected() > 0 {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1").bind(order_id).execute(conn).await?;
        debug!("🗃️ Discarded staged order {order_id}");
    }
    Ok(())
}

pub async fn update_order_status(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentEngineError> {
    let result: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(status)
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(PaymentEngineError::OrderNotFound(order_id))
}

pub async fn set_delivered(
    order_id: i64,
    delivered_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentEngineError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Delivered', delivered_at = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 RETURNING *;
        "#,
    )
    .bind(delivered_at)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(PaymentEngineError::OrderNotFound(order_id))
}

pub async fn update_total(
    order_id: i64,
    total_amount: Kobo,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentEngineError> {
    let result: Option<Order> =
        sqlx::query_as("UPDATE orders SET total_amount = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(total_amount)
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(PaymentEngineError::OrderNotFound(order_id))
}
