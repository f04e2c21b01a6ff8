use ppe_common::Kobo;
use sqlx::SqliteConnection;

use crate::db_types::{Product, ProductVariant};

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await
}

pub async fn fetch_variant(
    variant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductVariant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM product_variants WHERE id = $1").bind(variant_id).fetch_optional(conn).await
}

/// The plug's storefront price for a product, if the plug lists it.
pub async fn resale_price(
    plug_id: i64,
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Kobo>, sqlx::Error> {
    sqlx::query_scalar("SELECT resale_price FROM plug_listings WHERE plug_id = $1 AND product_id = $2")
        .bind(plug_id)
        .bind(product_id)
        .fetch_optional(conn)
        .await
}

/// Takes `qty` units out of stock, clamped at zero. Oversell is resolved at fulfillment time, not
/// by driving the counter negative.
pub async fn decrement_stock(
    product_id: i64,
    variant_id: Option<i64>,
    qty: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET stock = MAX(stock - $1, 0) WHERE id = $2")
        .bind(qty)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    if let Some(variant_id) = variant_id {
        sqlx::query("UPDATE product_variants SET stock = MAX(stock - $1, 0) WHERE id = $2")
            .bind(qty)
            .bind(variant_id)
            .execute(conn)
            .await?;
    }
    Ok(())
}

pub async fn restore_stock(
    product_id: i64,
    variant_id: Option<i64>,
    qty: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
        .bind(qty)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    if let Some(variant_id) = variant_id {
        sqlx::query("UPDATE product_variants SET stock = stock + $1 WHERE id = $2")
            .bind(qty)
            .bind(variant_id)
            .execute(conn)
            .await?;
    }
    Ok(())
}

pub async fn increment_sold(product_id: i64, qty: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET sold = sold + $1 WHERE id = $2")
        .bind(qty)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(())
}
