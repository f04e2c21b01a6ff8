//! Catalog seeding and inspection helpers for tests.

use ppe_common::Kobo;
use sqlx::SqlitePool;

pub async fn seed_product(pool: &SqlitePool, supplier_id: i64, name: &str, price: Kobo, stock: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO products (supplier_id, name, price, stock) VALUES ($1, $2, $3, $4) RETURNING id")
        .bind(supplier_id)
        .bind(name)
        .bind(price)
        .bind(stock)
        .fetch_one(pool)
        .await
        .expect("Error seeding product")
}

pub async fn seed_variant(pool: &SqlitePool, product_id: i64, name: &str, price: Option<Kobo>, stock: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO product_variants (product_id, name, price, stock) VALUES ($1, $2, $3, $4) RETURNING id")
        .bind(product_id)
        .bind(name)
        .bind(price)
        .bind(stock)
        .fetch_one(pool)
        .await
        .expect("Error seeding variant")
}

pub async fn seed_plug_listing(pool: &SqlitePool, plug_id: i64, product_id: i64, resale_price: Kobo) -> i64 {
    sqlx::query_scalar("INSERT INTO plug_listings (plug_id, product_id, resale_price) VALUES ($1, $2, $3) RETURNING id")
        .bind(plug_id)
        .bind(product_id)
        .bind(resale_price)
        .fetch_one(pool)
        .await
        .expect("Error seeding plug listing")
}

pub async fn product_stock(pool: &SqlitePool, product_id: i64) -> i64 {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("Error reading product stock")
}

pub async fn variant_stock(pool: &SqlitePool, variant_id: i64) -> i64 {
    sqlx::query_scalar("SELECT stock FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_one(pool)
        .await
        .expect("Error reading variant stock")
}

pub async fn product_sold(pool: &SqlitePool, product_id: i64) -> i64 {
    sqlx::query_scalar("SELECT sold FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("Error reading sold counter")
}

pub async fn order_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(pool).await.expect("Error counting orders")
}
