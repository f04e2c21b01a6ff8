//! The escrow ledger through its full life: delivery locks funds, disputes pause and release them,
//! the sweeper opens them, withdrawals settle them, and late disputes spawn resolve claims.

use chrono::{Duration, Utc};
use plug_payment_engine::{
    config::EscrowConfig,
    db_types::{EscrowStatus, Order, OrderOwner},
    events::EventProducers,
    ledger_objects::LedgerAdjustment,
    order_objects::{CartItem, ContactInfo, NewCheckout, PaymentMethod},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed,
        TestGateway,
    },
    traits::{BankAccount, EarningsManagement, MarketplaceDatabase, PaymentEngineError},
    DisputeApi,
    OrderFlowApi,
    SqliteDatabase,
    UnlockSweeper,
    WithdrawalApi,
};
use ppe_common::Kobo;

const SUPPLIER: i64 = 1;
const PLUG: i64 = 9;

fn zero_hold() -> EscrowConfig {
    EscrowConfig { hold: Duration::zero(), ..EscrowConfig::default() }
}

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn contact() -> ContactInfo {
    ContactInfo {
        name: "Ada Obi".to_string(),
        email: "ada@example.com".to_string(),
        phone: "+2348012345678".to_string(),
        address: "12 Marina Rd, Lagos".to_string(),
    }
}

/// Stages, confirms, ships and delivers a single-item plug order: resale 1000, supplier price 800,
/// so delivery locks 200 for the plug and 800 for the supplier. Returns the order and its item id.
async fn delivered_plug_order(db: &SqliteDatabase, gateway: &TestGateway, qty: i64) -> (Order, i64) {
    let api = OrderFlowApi::new(db.clone(), gateway.clone(), EventProducers::default()).with_config(zero_hold());
    let product = seed::seed_product(db.pool(), SUPPLIER, "Adire shirt", Kobo::from(800), 50).await;
    seed::seed_plug_listing(db.pool(), PLUG, product, Kobo::from(1_000)).await;
    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: Some(PLUG),
        delivery_fee: Kobo::from(0),
        items: vec![CartItem {
            product_id: product,
            variant_id: None,
            quantity: qty,
            supplier_id: SUPPLIER,
            payment_method: PaymentMethod::Gateway,
        }],
    };
    let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");
    let reference = receipt.payment.unwrap().reference;
    let confirmed = api.confirm_payment(&reference).await.expect("Error confirming payment");
    let order_id = confirmed[0].id;
    api.mark_shipped(order_id).await.expect("Error shipping order");
    let receipt = api.deliver_order(order_id).await.expect("Error delivering order");
    let item_id = db.fetch_order_items(order_id).await.unwrap()[0].id;
    (receipt.order, item_id)
}

/// Conservation over one delivered order: the live rows plus all resolve claims, plus the value
/// still held by active pauses and the value removed by completed returns, always add up to what
/// delivery fixed.
async fn assert_conserved(db: &SqliteDatabase, order: &Order, item_id: i64, fixed_plug: Kobo, fixed_supplier: Kobo) {
    let item = db
        .fetch_order_items(order.id)
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.id == item_id)
        .expect("Item disappeared");
    let paused_qty = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(quantity), 0) FROM paused_order_items WHERE order_item_id = $1",
    )
    .bind(item_id)
    .fetch_one(db.pool())
    .await
    .unwrap();
    let returned_qty = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(quantity), 0) FROM returned_order_items WHERE order_item_id = $1",
    )
    .bind(item_id)
    .fetch_one(db.pool())
    .await
    .unwrap();

    let plug_row = db.fetch_plug_payment(order.id).await.unwrap().expect("Plug escrow row missing");
    let resolve_plug: Kobo =
        db.fetch_resolve_plug_payments(PLUG).await.unwrap().into_iter().map(|r| r.amount).sum();
    let held_plug = item.plug_portion(paused_qty) + item.plug_portion(returned_qty);
    assert_eq!(plug_row.amount + resolve_plug + held_plug, fixed_plug, "plug ledger leaked");

    let supplier_row = &db.fetch_supplier_payments(order.id).await.unwrap()[0];
    let resolve_supplier: Kobo =
        db.fetch_resolve_supplier_payments(SUPPLIER).await.unwrap().into_iter().map(|r| r.amount).sum();
    let held_supplier = item.supplier_portion(paused_qty) + item.supplier_portion(returned_qty);
    assert_eq!(supplier_row.amount + resolve_supplier + held_supplier, fixed_supplier, "supplier ledger leaked");
}

#[tokio::test]
async fn delivery_locks_the_margin_and_the_supplier_earnings() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let (order, item_id) = delivered_plug_order(&db, &gateway, 1).await;

    let plug_row = db.fetch_plug_payment(order.id).await.unwrap().expect("Plug escrow row missing");
    assert_eq!(plug_row.amount, Kobo::from(200));
    assert_eq!(plug_row.status, EscrowStatus::Locked);
    let supplier_rows = db.fetch_supplier_payments(order.id).await.unwrap();
    assert_eq!(supplier_rows.len(), 1);
    assert_eq!(supplier_rows[0].amount, Kobo::from(800));
    assert_eq!(supplier_rows[0].status, EscrowStatus::Locked);
    // The sold counter moved at delivery.
    let item = &db.fetch_order_items(order.id).await.unwrap()[0];
    assert_eq!(seed::product_sold(db.pool(), item.product_id).await, 1);
    assert_conserved(&db, &order, item_id, Kobo::from(200), Kobo::from(800)).await;
}

#[tokio::test]
async fn the_full_dispute_and_payout_walkthrough() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let disputes = DisputeApi::new(db.clone());
    let sweeper = UnlockSweeper::new(db.clone()).with_config(zero_hold());
    let withdrawals =
        WithdrawalApi::new(db.clone(), gateway.clone(), EventProducers::default()).with_config(zero_hold());
    let account = BankAccount { account_number: "0001234567".to_string(), bank_code: "058".to_string() };
    let (order, item_id) = delivered_plug_order(&db, &gateway, 1).await;
    let fixed = (Kobo::from(200), Kobo::from(800));

    // Pausing the only unit empties both live rows.
    disputes.pause_item(item_id, 1).await.expect("Error pausing item");
    let plug_row = db.fetch_plug_payment(order.id).await.unwrap().unwrap();
    assert_eq!(plug_row.amount, Kobo::from(0));
    let supplier_row = &db.fetch_supplier_payments(order.id).await.unwrap()[0];
    assert_eq!(supplier_row.amount, Kobo::from(0));
    assert_conserved(&db, &order, item_id, fixed.0, fixed.1).await;

    // The hold has elapsed (zero in this test); the sweep opens both rows unchanged.
    let flipped = sweeper.sweep_once().await.expect("Error sweeping");
    assert_eq!(flipped, 2);
    let plug_row = db.fetch_plug_payment(order.id).await.unwrap().unwrap();
    assert_eq!((plug_row.status, plug_row.amount), (EscrowStatus::Opened, Kobo::from(0)));
    // Sweeping again finds nothing: the status filter makes it idempotent.
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);

    // Unpausing while Opened credits the live rows directly.
    let outcome = disputes.unpause_item(item_id, 1).await.expect("Error unpausing item");
    assert_eq!(outcome.plug, Some(LedgerAdjustment::CreditedLiveRow { amount: Kobo::from(200) }));
    assert_eq!(outcome.supplier, LedgerAdjustment::CreditedLiveRow { amount: Kobo::from(800) });
    assert!(outcome.remaining.is_none());
    let plug_row = db.fetch_plug_payment(order.id).await.unwrap().unwrap();
    assert_eq!((plug_row.status, plug_row.amount), (EscrowStatus::Opened, Kobo::from(200)));
    assert_conserved(&db, &order, item_id, fixed.0, fixed.1).await;

    // The plug withdraws its opened 200.
    withdrawals.resolve_bank_account(OrderOwner::Plug(PLUG), &account).await.expect("Error resolving account");
    let otp = db.fetch_valid_verification_token(OrderOwner::Plug(PLUG), Utc::now()).await.unwrap().unwrap().token;
    let settled =
        withdrawals.process_withdrawal(OrderOwner::Plug(PLUG), &otp, &account).await.expect("Error withdrawing");
    assert_eq!(settled.amount, Kobo::from(200));
    let earnings = db.earnings_for_owner(OrderOwner::Plug(PLUG)).await.unwrap();
    assert_eq!(earnings.locked, Kobo::from(0));
    assert_eq!(earnings.unlocked, Kobo::from(0));
    assert_eq!(earnings.paid, Kobo::from(200));
    assert_eq!(gateway.transfers(), vec![(Kobo::from(200), settled.record.reference.clone())]);

    // A fresh dispute against the already-settled margin. The pause debits the Paid
    // row; the unpause must not touch it again and spawns a resolve claim instead.
    disputes.pause_item(item_id, 1).await.expect("Error pausing item again");
    let outcome = disputes.unpause_item(item_id, 1).await.expect("Error unpausing item again");
    assert_eq!(outcome.plug, Some(LedgerAdjustment::ResolveCreated { amount: Kobo::from(200) }));
    // The supplier never withdrew, so its side still credits the live row.
    assert_eq!(outcome.supplier, LedgerAdjustment::CreditedLiveRow { amount: Kobo::from(800) });
    let resolves = db.fetch_resolve_plug_payments(PLUG).await.unwrap();
    assert_eq!(resolves.len(), 1);
    assert_eq!((resolves[0].amount, resolves[0].status), (Kobo::from(200), EscrowStatus::Opened));
    assert_conserved(&db, &order, item_id, fixed.0, fixed.1).await;

    // Monotonic status: nothing ever moved backwards, so a sweep now has nothing to do.
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
}

#[tokio::test]
async fn pausing_before_delivery_refuses_to_run() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = OrderFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let disputes = DisputeApi::new(db.clone());
    let product = seed::seed_product(db.pool(), SUPPLIER, "Adire shirt", Kobo::from(800), 50).await;
    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(0),
        items: vec![CartItem {
            product_id: product,
            variant_id: None,
            quantity: 1,
            supplier_id: SUPPLIER,
            payment_method: PaymentMethod::Gateway,
        }],
    };
    let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");
    let reference = receipt.payment.unwrap().reference;
    let confirmed = api.confirm_payment(&reference).await.expect("Error confirming payment");
    let item_id = db.fetch_order_items(confirmed[0].id).await.unwrap()[0].id;

    // No escrow rows exist yet; the debit must refuse rather than corrupt silently.
    let err = disputes.pause_item(item_id, 1).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::LedgerRowMissing { .. }));
}

#[tokio::test]
async fn one_active_pause_per_item() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let disputes = DisputeApi::new(db.clone());
    let (_, item_id) = delivered_plug_order(&db, &gateway, 5).await;

    disputes.pause_item(item_id, 2).await.expect("Error pausing item");
    let err = disputes.pause_item(item_id, 1).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::PauseAlreadyExists(_)));

    // Releasing part of the hold keeps the rest in place.
    let outcome = disputes.unpause_item(item_id, 1).await.expect("Error unpausing item");
    assert_eq!(outcome.remaining.as_ref().map(|p| p.quantity), Some(1));
    let err = disputes.unpause_item(item_id, 5).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::PauseQuantityExceeded { .. }));
}

#[tokio::test]
async fn returns_are_terminal_and_move_no_money() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let disputes = DisputeApi::new(db.clone());
    let (order, item_id) = delivered_plug_order(&db, &gateway, 5).await;
    let fixed = (Kobo::from(1_000), Kobo::from(4_000));

    // Returning without a pause is an error.
    assert!(matches!(disputes.return_item(item_id, 1).await.unwrap_err(), PaymentEngineError::NoActivePause(_)));

    disputes.pause_item(item_id, 2).await.expect("Error pausing item");
    let plug_row = db.fetch_plug_payment(order.id).await.unwrap().unwrap();
    assert_eq!(plug_row.amount, Kobo::from(600));

    let returned = disputes.return_item(item_id, 2).await.expect("Error returning item");
    assert_eq!(returned.quantity, 2);
    // The pause is gone and the rows keep their debited amounts: returned value leaves the ledger.
    let plug_row = db.fetch_plug_payment(order.id).await.unwrap().unwrap();
    assert_eq!(plug_row.amount, Kobo::from(600));
    let supplier_row = &db.fetch_supplier_payments(order.id).await.unwrap()[0];
    assert_eq!(supplier_row.amount, Kobo::from(2_400));
    assert_conserved(&db, &order, item_id, fixed.0, fixed.1).await;

    // Only the three unreturned units can ever be paused again.
    let err = disputes.pause_item(item_id, 4).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::Validation(_)));
    disputes.pause_item(item_id, 3).await.expect("Error pausing the remainder");
    assert_conserved(&db, &order, item_id, fixed.0, fixed.1).await;
}

#[tokio::test]
async fn sweep_only_touches_rows_whose_hold_has_elapsed() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    // Real three-day hold: freshly delivered rows must stay locked.
    let (order, _) = delivered_plug_order(&db, &gateway, 1).await;
    let plug_row = db.fetch_plug_payment(order.id).await.unwrap().unwrap();
    assert_eq!(plug_row.status, EscrowStatus::Locked);

    let sweeper = UnlockSweeper::new(db.clone());
    // delivered_plug_order uses a zero hold, so this sweep opens the rows...
    assert_eq!(sweeper.sweep_once().await.unwrap(), 2);
    // ...and a second delivery under the default three-day hold stays locked through a sweep.
    let order2 = {
        let api = OrderFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
        let product = seed::seed_product(db.pool(), 2, "Raffia mat", Kobo::from(300), 10).await;
        let checkout = NewCheckout {
            buyer: contact(),
            plug_id: None,
            delivery_fee: Kobo::from(0),
            items: vec![CartItem {
                product_id: product,
                variant_id: None,
                quantity: 1,
                supplier_id: 2,
                payment_method: PaymentMethod::Gateway,
            }],
        };
        let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");
        let reference = receipt.payment.unwrap().reference;
        let confirmed = api.confirm_payment(&reference).await.expect("Error confirming payment");
        api.mark_shipped(confirmed[0].id).await.expect("Error shipping order");
        let receipt = api.deliver_order(confirmed[0].id).await.expect("Error delivering order");
        receipt.order
    };
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    let row = &db.fetch_supplier_payments(order2.id).await.unwrap()[0];
    assert_eq!(row.status, EscrowStatus::Locked);
}
