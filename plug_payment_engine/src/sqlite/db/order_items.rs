use ppe_common::Kobo;
use sqlx::SqliteConnection;

use crate::db_types::OrderItem;

/// A resolved cart line, ready to be frozen onto an order.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub plug_price: Kobo,
    pub supplier_price: Kobo,
    pub supplier_id: i64,
    pub plug_id: Option<i64>,
}

pub async fn insert_order_item(
    order_id: i64,
    line: &PricedLine,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO order_items
                (order_id, product_id, variant_id, quantity, plug_price, supplier_price, supplier_id, plug_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(line.variant_id)
    .bind(line.quantity)
    .bind(line.plug_price)
    .bind(line.supplier_price)
    .bind(line.supplier_id)
    .bind(line.plug_id)
    .fetch_one(conn)
    .await
}

pub async fn items_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_order_item(item_id: i64, conn: &mut SqliteConnection) -> Result<Option<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE id = $1").bind(item_id).fetch_optional(conn).await
}

pub async fn delete_order_item(item_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM order_items WHERE id = $1").bind(item_id).execute(conn).await?;
    Ok(())
}
