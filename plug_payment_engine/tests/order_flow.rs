//! Checkout staging, payment confirmation and pre-shipment edits, end to end against SQLite.

use plug_payment_engine::{
    db_types::OrderStatusType,
    events::EventProducers,
    order_objects::{CartItem, ContactInfo, NewCheckout, PaymentMethod},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed,
        TestGateway,
    },
    traits::{EarningsManagement, MarketplaceDatabase, PaymentEngineError},
    OrderFlowApi,
    SqliteDatabase,
};
use ppe_common::Kobo;

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn order_api(db: &SqliteDatabase, gateway: &TestGateway) -> OrderFlowApi<SqliteDatabase, TestGateway> {
    OrderFlowApi::new(db.clone(), gateway.clone(), EventProducers::default())
}

fn contact() -> ContactInfo {
    ContactInfo {
        name: "Ada Obi".to_string(),
        email: "ada@example.com".to_string(),
        phone: "+2348012345678".to_string(),
        address: "12 Marina Rd, Lagos".to_string(),
    }
}

fn gateway_item(product_id: i64, supplier_id: i64, quantity: i64) -> CartItem {
    CartItem { product_id, variant_id: None, quantity, supplier_id, payment_method: PaymentMethod::Gateway }
}

#[tokio::test]
async fn checkout_splits_the_cart_per_supplier() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = order_api(&db, &gateway);
    let p1 = seed::seed_product(db.pool(), 1, "Gourd lamp", Kobo::from(500), 10).await;
    let p2 = seed::seed_product(db.pool(), 1, "Raffia mat", Kobo::from(300), 5).await;
    let p3 = seed::seed_product(db.pool(), 2, "Adire shirt", Kobo::from(1_000), 3).await;

    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(100),
        items: vec![gateway_item(p1, 1, 2), gateway_item(p3, 2, 1), gateway_item(p2, 1, 1)],
    };
    let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");

    assert_eq!(receipt.orders.len(), 2);
    let intent = receipt.payment.expect("A gateway checkout must open an intent");
    for order in &receipt.orders {
        assert_eq!(order.status, OrderStatusType::Staged);
        assert_eq!(order.payment_reference.as_deref(), Some(intent.reference.as_str()));
    }
    let by_supplier_one = receipt.orders.iter().find(|o| o.supplier_id == 1).unwrap();
    let by_supplier_two = receipt.orders.iter().find(|o| o.supplier_id == 2).unwrap();
    // 2×500 + 1×300 + fee and 1×1000 + fee respectively.
    assert_eq!(by_supplier_one.total_amount, Kobo::from(1_400));
    assert_eq!(by_supplier_two.total_amount, Kobo::from(1_100));

    // Staging must not touch stock; that happens at confirmation.
    assert_eq!(seed::product_stock(db.pool(), p1).await, 10);
    assert_eq!(seed::product_stock(db.pool(), p3).await, 3);

    // Contact resolution is idempotent on (email, phone).
    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(100),
        items: vec![gateway_item(p1, 1, 1)],
    };
    let second = api.stage_checkout(checkout).await.expect("Error staging second checkout");
    assert_eq!(second.orders[0].buyer_id, by_supplier_one.buyer_id);
}

#[tokio::test]
async fn confirmation_advances_orders_and_decrements_stock_once() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = order_api(&db, &gateway);
    let p1 = seed::seed_product(db.pool(), 1, "Gourd lamp", Kobo::from(500), 10).await;
    let v1 = seed::seed_variant(db.pool(), p1, "Large", Some(Kobo::from(650)), 4).await;

    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(0),
        items: vec![CartItem {
            product_id: p1,
            variant_id: Some(v1),
            quantity: 2,
            supplier_id: 1,
            payment_method: PaymentMethod::Gateway,
        }],
    };
    let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");
    let reference = receipt.payment.unwrap().reference;

    let confirmed = api.confirm_payment(&reference).await.expect("Error confirming payment");
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].status, OrderStatusType::Pending);
    // The variant price (650) was frozen onto the item.
    assert_eq!(confirmed[0].total_amount, Kobo::from(1_300));
    assert_eq!(seed::product_stock(db.pool(), p1).await, 8);
    assert_eq!(seed::variant_stock(db.pool(), v1).await, 2);

    // Idempotent: a repeat confirmation finds nothing staged and mutates nothing.
    let again = api.confirm_payment(&reference).await.expect("Repeat confirmation must not error");
    assert!(again.is_empty());
    assert_eq!(seed::product_stock(db.pool(), p1).await, 8);
    assert_eq!(seed::variant_stock(db.pool(), v1).await, 2);
}

#[tokio::test]
async fn confirmation_rejects_amount_mismatch_and_leaves_state_alone() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = order_api(&db, &gateway);
    let p1 = seed::seed_product(db.pool(), 1, "Gourd lamp", Kobo::from(500), 10).await;

    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(0),
        items: vec![gateway_item(p1, 1, 2)],
    };
    let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");
    let reference = receipt.payment.unwrap().reference;

    // The gateway reports a different amount than the staged total: the cart mutated somewhere.
    gateway.set_verification(&reference, "success", Kobo::from(999));
    let err = api.confirm_payment(&reference).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::AmountMismatch { .. }));
    assert_eq!(db.fetch_staged_orders(&reference).await.unwrap().len(), 1);
    assert_eq!(seed::product_stock(db.pool(), p1).await, 10);

    // A non-success verification is also rejected, retry-safe.
    gateway.set_verification(&reference, "abandoned", Kobo::from(1_000));
    let err = api.confirm_payment(&reference).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::GatewayNotSuccessful(_)));

    // Once the gateway reports the true state, the retry succeeds.
    gateway.set_verification(&reference, "success", Kobo::from(1_000));
    let confirmed = api.confirm_payment(&reference).await.expect("Error confirming payment");
    assert_eq!(confirmed.len(), 1);
    assert_eq!(seed::product_stock(db.pool(), p1).await, 8);
}

#[tokio::test]
async fn pay_on_delivery_collapses_the_whole_checkout() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = order_api(&db, &gateway);
    let p1 = seed::seed_product(db.pool(), 1, "Gourd lamp", Kobo::from(500), 10).await;
    let p2 = seed::seed_product(db.pool(), 2, "Adire shirt", Kobo::from(1_000), 3).await;

    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(50),
        items: vec![
            gateway_item(p1, 1, 1),
            CartItem {
                product_id: p2,
                variant_id: None,
                quantity: 1,
                supplier_id: 2,
                payment_method: PaymentMethod::OnDelivery,
            },
        ],
    };
    let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");
    assert!(receipt.payment.is_none());
    for order in &receipt.orders {
        assert_eq!(order.status, OrderStatusType::Pending);
        assert!(order.payment_reference.is_none());
    }
    // POD orders never pass through confirmation, so stock is taken at staging.
    assert_eq!(seed::product_stock(db.pool(), p1).await, 9);
    assert_eq!(seed::product_stock(db.pool(), p2).await, 2);
}

#[tokio::test]
async fn missing_resale_listing_aborts_the_whole_checkout() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = order_api(&db, &gateway);
    let p1 = seed::seed_product(db.pool(), 1, "Gourd lamp", Kobo::from(500), 10).await;
    let p2 = seed::seed_product(db.pool(), 1, "Raffia mat", Kobo::from(300), 5).await;
    seed::seed_plug_listing(db.pool(), 9, p1, Kobo::from(700)).await;
    // No listing for p2: the reseller checkout must abort entirely.

    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: Some(9),
        delivery_fee: Kobo::from(0),
        items: vec![gateway_item(p1, 1, 1), gateway_item(p2, 1, 1)],
    };
    let err = api.stage_checkout(checkout).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::ResaleListingNotFound { .. }));
    assert_eq!(seed::order_count(db.pool()).await, 0);
}

#[tokio::test]
async fn empty_and_zero_quantity_carts_are_rejected() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = order_api(&db, &gateway);
    let p1 = seed::seed_product(db.pool(), 1, "Gourd lamp", Kobo::from(500), 10).await;

    let checkout =
        NewCheckout { buyer: contact(), plug_id: None, delivery_fee: Kobo::from(0), items: vec![] };
    assert!(matches!(api.stage_checkout(checkout).await.unwrap_err(), PaymentEngineError::Validation(_)));

    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(0),
        items: vec![gateway_item(p1, 1, 0)],
    };
    assert!(matches!(api.stage_checkout(checkout).await.unwrap_err(), PaymentEngineError::Validation(_)));
}

#[tokio::test]
async fn editing_a_pending_order_restores_stock_and_recomputes_the_total() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = order_api(&db, &gateway);
    let p1 = seed::seed_product(db.pool(), 1, "Gourd lamp", Kobo::from(500), 10).await;
    let p2 = seed::seed_product(db.pool(), 1, "Raffia mat", Kobo::from(300), 5).await;

    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(100),
        items: vec![gateway_item(p1, 1, 2), gateway_item(p2, 1, 1)],
    };
    let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");
    let reference = receipt.payment.unwrap().reference;
    let confirmed = api.confirm_payment(&reference).await.expect("Error confirming payment");
    let order = &confirmed[0];
    let items = db.fetch_order_items(order.id).await.unwrap();
    assert_eq!(items.len(), 2);
    let kept = items.iter().find(|i| i.product_id == p1).unwrap();

    let edited = api.edit_order(order.id, &[kept.id]).await.expect("Error editing order");
    assert_eq!(edited.status, OrderStatusType::Pending);
    assert_eq!(edited.total_amount, Kobo::from(1_100));
    // The removed item's stock came back; the kept item's did not.
    assert_eq!(seed::product_stock(db.pool(), p2).await, 5);
    assert_eq!(seed::product_stock(db.pool(), p1).await, 8);
    assert_eq!(db.fetch_order_items(order.id).await.unwrap().len(), 1);

    // Editing away the last item cancels the order.
    let cancelled = api.cancel_order(order.id).await.expect("Error cancelling order");
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(cancelled.total_amount, Kobo::from(0));
    assert_eq!(seed::product_stock(db.pool(), p1).await, 10);
}

#[tokio::test]
async fn fulfillment_transitions_are_guarded() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = order_api(&db, &gateway);
    let p1 = seed::seed_product(db.pool(), 1, "Gourd lamp", Kobo::from(500), 10).await;

    let checkout = NewCheckout {
        buyer: contact(),
        plug_id: None,
        delivery_fee: Kobo::from(0),
        items: vec![gateway_item(p1, 1, 1)],
    };
    let receipt = api.stage_checkout(checkout).await.expect("Error staging checkout");
    let order_id = receipt.orders[0].id;
    let reference = receipt.payment.unwrap().reference;

    // Shipping a Staged order is forbidden, as is delivering a Pending one.
    let err = api.mark_shipped(order_id).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::InvalidStateTransition { .. }));

    api.confirm_payment(&reference).await.expect("Error confirming payment");
    let err = api.deliver_order(order_id).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::InvalidStateTransition { .. }));

    let shipped = api.mark_shipped(order_id).await.expect("Error shipping order");
    assert_eq!(shipped.status, OrderStatusType::Shipped);
    // Editing after shipment is forbidden.
    assert!(api.edit_order(order_id, &[]).await.is_err());
    let receipt = api.deliver_order(order_id).await.expect("Error delivering order");
    assert_eq!(receipt.order.status, OrderStatusType::Delivered);
    assert!(receipt.order.delivered_at.is_some());
}
