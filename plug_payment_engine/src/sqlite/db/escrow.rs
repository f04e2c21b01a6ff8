use chrono::{DateTime, Utc};
use log::{debug, trace};
use ppe_common::Kobo;
use sqlx::SqliteConnection;

use crate::db_types::{EscrowStatus, OrderOwner, PlugPayment, ResolvePlugPayment, ResolveSupplierPayment, SupplierPayment};

pub async fn insert_plug_payment(
    order_id: i64,
    plug_id: i64,
    amount: Kobo,
    unlock_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PlugPayment, sqlx::Error> {
    let payment: PlugPayment = sqlx::query_as(
        r#"
            INSERT INTO plug_payments (order_id, plug_id, amount, unlock_at) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(plug_id)
    .bind(amount)
    .bind(unlock_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Locked {amount} for plug {plug_id} on order {order_id}");
    Ok(payment)
}

pub async fn insert_supplier_payment(
    order_id: i64,
    supplier_id: i64,
    amount: Kobo,
    unlock_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<SupplierPayment, sqlx::Error> {
    let payment: SupplierPayment = sqlx::query_as(
        r#"
            INSERT INTO supplier_payments (order_id, supplier_id, amount, unlock_at) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(supplier_id)
    .bind(amount)
    .bind(unlock_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Locked {amount} for supplier {supplier_id} on order {order_id}");
    Ok(payment)
}

/// The live plug escrow row for an order. There is at most one: an order has at most one plug.
pub async fn plug_payment_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PlugPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM plug_payments WHERE order_id = $1").bind(order_id).fetch_optional(conn).await
}

pub async fn supplier_payment_for_order(
    order_id: i64,
    supplier_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<SupplierPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM supplier_payments WHERE order_id = $1 AND supplier_id = $2")
        .bind(order_id)
        .bind(supplier_id)
        .fetch_optional(conn)
        .await
}

pub async fn supplier_payments_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<SupplierPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM supplier_payments WHERE order_id = $1 ORDER BY supplier_id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Adds `delta` (which may be negative, for pause debits) to a live plug row.
pub async fn adjust_plug_payment(
    id: i64,
    delta: Kobo,
    conn: &mut SqliteConnection,
) -> Result<PlugPayment, sqlx::Error> {
    sqlx::query_as(
        "UPDATE plug_payments SET amount = amount + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(delta)
    .bind(id)
    .fetch_one(conn)
    .await
}

pub async fn adjust_supplier_payment(
    id: i64,
    delta: Kobo,
    conn: &mut SqliteConnection,
) -> Result<SupplierPayment, sqlx::Error> {
    sqlx::query_as(
        "UPDATE supplier_payments SET amount = amount + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(delta)
    .bind(id)
    .fetch_one(conn)
    .await
}

pub async fn insert_resolve_plug_payment(
    order_item_id: i64,
    order_id: i64,
    plug_id: i64,
    amount: Kobo,
    conn: &mut SqliteConnection,
) -> Result<ResolvePlugPayment, sqlx::Error> {
    let row: ResolvePlugPayment = sqlx::query_as(
        r#"
            INSERT INTO resolve_plug_payments (order_item_id, order_id, plug_id, amount)
            VALUES ($1, $2, $3, $4) RETURNING *;
        "#,
    )
    .bind(order_item_id)
    .bind(order_id)
    .bind(plug_id)
    .bind(amount)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Resolve claim of {amount} created for plug {plug_id} (order item {order_item_id})");
    Ok(row)
}

pub async fn insert_resolve_supplier_payment(
    order_item_id: i64,
    order_id: i64,
    supplier_id: i64,
    amount: Kobo,
    conn: &mut SqliteConnection,
) -> Result<ResolveSupplierPayment, sqlx::Error> {
    let row: ResolveSupplierPayment = sqlx::query_as(
        r#"
            INSERT INTO resolve_supplier_payments (order_item_id, order_id, supplier_id, amount)
            VALUES ($1, $2, $3, $4) RETURNING *;
        "#,
    )
    .bind(order_item_id)
    .bind(order_id)
    .bind(supplier_id)
    .bind(amount)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Resolve claim of {amount} created for supplier {supplier_id} (order item {order_item_id})");
    Ok(row)
}

pub async fn resolve_plug_payments_for_party(
    plug_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ResolvePlugPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM resolve_plug_payments WHERE plug_id = $1 ORDER BY id ASC")
        .bind(plug_id)
        .fetch_all(conn)
        .await
}

pub async fn resolve_supplier_payments_for_party(
    supplier_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ResolveSupplierPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM resolve_supplier_payments WHERE supplier_id = $1 ORDER BY id ASC")
        .bind(supplier_id)
        .fetch_all(conn)
        .await
}

/// Flips every Locked row whose unlock time has passed to Opened. The status filter is what makes
/// repeated or overlapping sweeps idempotent.
pub async fn sweep_unlockable(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let mut flipped = 0;
    for table in ["plug_payments", "supplier_payments"] {
        let sql = format!(
            "UPDATE {table} SET status = 'Opened', updated_at = CURRENT_TIMESTAMP \
             WHERE status = 'Locked' AND unlock_at <= $1"
        );
        let result = sqlx::query(&sql).bind(now).execute(&mut *conn).await?;
        flipped += result.rows_affected();
    }
    trace!("🗃️ Sweep flipped {flipped} escrow rows to Opened");
    Ok(flipped)
}

fn direct_table(owner: OrderOwner) -> (&'static str, &'static str) {
    match owner {
        OrderOwner::Plug(_) => ("plug_payments", "plug_id"),
        OrderOwner::Supplier(_) => ("supplier_payments", "supplier_id"),
    }
}

fn resolve_table(owner: OrderOwner) -> (&'static str, &'static str) {
    match owner {
        OrderOwner::Plug(_) => ("resolve_plug_payments", "plug_id"),
        OrderOwner::Supplier(_) => ("resolve_supplier_payments", "supplier_id"),
    }
}

async fn total_for(
    table: &str,
    party_col: &str,
    party_id: i64,
    status: EscrowStatus,
    conn: &mut SqliteConnection,
) -> Result<Kobo, sqlx::Error> {
    let sql = format!("SELECT COALESCE(SUM(amount), 0) FROM {table} WHERE {party_col} = $1 AND status = $2");
    sqlx::query_scalar(&sql).bind(party_id).bind(status).fetch_one(conn).await
}

/// Sum over the party's direct escrow rows in the given status.
pub async fn direct_total(
    owner: OrderOwner,
    status: EscrowStatus,
    conn: &mut SqliteConnection,
) -> Result<Kobo, sqlx::Error> {
    let (table, col) = direct_table(owner);
    total_for(table, col, owner.party_id(), status, conn).await
}

/// Sum over the party's resolve rows in the given status.
pub async fn resolve_total(
    owner: OrderOwner,
    status: EscrowStatus,
    conn: &mut SqliteConnection,
) -> Result<Kobo, sqlx::Error> {
    let (table, col) = resolve_table(owner);
    total_for(table, col, owner.party_id(), status, conn).await
}

/// Flips every Opened row (direct and resolve) for the party to Paid and returns the amount that
/// was settled. Must run inside the withdrawal settlement transaction.
pub async fn settle_opened_rows(owner: OrderOwner, conn: &mut SqliteConnection) -> Result<Kobo, sqlx::Error> {
    let (direct, direct_col) = direct_table(owner);
    let (resolve, resolve_col) = resolve_table(owner);
    let sql = format!(
        "UPDATE {direct} SET status = 'Paid', updated_at = CURRENT_TIMESTAMP \
         WHERE {direct_col} = $1 AND status = 'Opened' RETURNING amount"
    );
    let direct_amounts: Vec<Kobo> = sqlx::query_scalar(&sql).bind(owner.party_id()).fetch_all(&mut *conn).await?;
    let sql =
        format!("UPDATE {resolve} SET status = 'Paid' WHERE {resolve_col} = $1 AND status = 'Opened' RETURNING amount");
    let resolve_amounts: Vec<Kobo> = sqlx::query_scalar(&sql).bind(owner.party_id()).fetch_all(conn).await?;
    let total = direct_amounts.into_iter().sum::<Kobo>() + resolve_amounts.into_iter().sum::<Kobo>();
    debug!("🗃️ Settled {total} of opened escrow for {owner}");
    Ok(total)
}
