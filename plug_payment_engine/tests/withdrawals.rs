//! The payout engine: OTP gating, per-party serialization, failure audit trails and settlement.

use chrono::{Duration, Utc};
use plug_payment_engine::{
    config::EscrowConfig,
    db_types::{EscrowStatus, OrderOwner, WithdrawalStatus},
    events::EventProducers,
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

fn account() -> BankAccount {
    BankAccount { account_number: "0001234567".to_string(), bank_code: "058".to_string() }
}

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

/// Delivers and sweeps a single-unit plug order so the plug holds an Opened 200 and the supplier an
/// Opened 800. Returns the order item id for dispute tests.
async fn opened_plug_ledger(db: &SqliteDatabase, gateway: &TestGateway) -> i64 {
    let api = OrderFlowApi::new(db.clone(), gateway.clone(), EventProducers::default()).with_config(zero_hold());
    let product = seed::seed_product(db.pool(), SUPPLIER, "Adire shirt", Kobo::from(800), 50).await;
    seed::seed_plug_listing(db.pool(), PLUG, product, Kobo::from(1_000)).await;
    let buyer = ContactInfo {
        name: "Ada Obi".to_string(),
        email: "ada@example.com".to_string(),
        phone: "+2348012345678".to_string(),
        address: "12 Marina Rd, Lagos".to_string(),
    };
    let checkout = NewCheckout {
        buyer,
        plug_id: Some(PLUG),
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
    let order_id = confirmed[0].id;
    api.mark_shipped(order_id).await.expect("Error shipping order");
    api.deliver_order(order_id).await.expect("Error delivering order");
    let sweeper = UnlockSweeper::new(db.clone()).with_config(zero_hold());
    assert_eq!(sweeper.sweep_once().await.unwrap(), 2);
    db.fetch_order_items(order_id).await.unwrap()[0].id
}

#[tokio::test]
async fn the_otp_gates_the_payout() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = WithdrawalApi::new(db.clone(), gateway.clone(), EventProducers::default());
    opened_plug_ledger(&db, &gateway).await;
    let owner = OrderOwner::Plug(PLUG);

    // Without a resolution step there is no token at all.
    let err = api.process_withdrawal(owner, "123456", &account()).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::InvalidOtp));

    let resolved = api.resolve_bank_account(owner, &account()).await.expect("Error resolving account");
    assert_eq!(resolved.account_name, "TEST ACCOUNT HOLDER");
    let token = db.fetch_valid_verification_token(owner, Utc::now()).await.unwrap().unwrap();
    assert_eq!(token.token.len(), 6);

    // Resolving again within the TTL reuses the same code.
    api.resolve_bank_account(owner, &account()).await.expect("Error re-resolving account");
    let again = db.fetch_valid_verification_token(owner, Utc::now()).await.unwrap().unwrap();
    assert_eq!(again.token, token.token);

    // A wrong code is rejected and settles nothing.
    let wrong = if token.token == "000000" { "111111" } else { "000000" };
    let err = api.process_withdrawal(owner, wrong, &account()).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::InvalidOtp));
    assert_eq!(db.opened_balance(owner).await.unwrap(), Kobo::from(200));

    let settled = api.process_withdrawal(owner, &token.token, &account()).await.expect("Error withdrawing");
    assert_eq!(settled.amount, Kobo::from(200));
    assert_eq!(settled.record.status, WithdrawalStatus::Success);
    assert!(!settled.record.reference.is_empty());
    // Withdrawal completeness: the opened balance is exactly zero afterwards.
    assert_eq!(db.opened_balance(owner).await.unwrap(), Kobo::from(0));
    // The OTP was consumed with the settlement.
    assert!(db.fetch_valid_verification_token(owner, Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn an_expired_otp_is_no_otp() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = WithdrawalApi::new(db.clone(), gateway.clone(), EventProducers::default());
    opened_plug_ledger(&db, &gateway).await;
    let owner = OrderOwner::Plug(PLUG);

    db.upsert_verification_token(owner, "424242", Utc::now() - Duration::seconds(1))
        .await
        .expect("Error planting expired token");
    let err = api.process_withdrawal(owner, "424242", &account()).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::InvalidOtp));
}

#[tokio::test]
async fn a_failed_transfer_leaves_an_audit_row_and_an_intact_ledger() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = WithdrawalApi::new(db.clone(), gateway.clone(), EventProducers::default());
    opened_plug_ledger(&db, &gateway).await;
    let owner = OrderOwner::Supplier(SUPPLIER);

    api.resolve_bank_account(owner, &account()).await.expect("Error resolving account");
    let token = db.fetch_valid_verification_token(owner, Utc::now()).await.unwrap().unwrap();

    gateway.fail_transfers(true);
    let err = api.process_withdrawal(owner, &token.token, &account()).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::Gateway(_)));
    // The ledger is untouched and the failure is on the record, reference empty.
    assert_eq!(db.opened_balance(owner).await.unwrap(), Kobo::from(800));
    let history = db.fetch_withdrawal_history(owner).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, WithdrawalStatus::Failed);
    assert_eq!(history[0].amount, Kobo::from(800));
    assert_eq!(history[0].reference, "");

    // Once the gateway recovers, the same OTP (still unexpired and unconsumed) settles it all.
    gateway.fail_transfers(false);
    let settled = api.process_withdrawal(owner, &token.token, &account()).await.expect("Error withdrawing");
    assert_eq!(settled.amount, Kobo::from(800));
    assert_eq!(db.opened_balance(owner).await.unwrap(), Kobo::from(0));
    let history = db.fetch_withdrawal_history(owner).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, WithdrawalStatus::Success);
}

#[tokio::test]
async fn resolve_claims_are_withdrawable() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = WithdrawalApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let disputes = DisputeApi::new(db.clone());
    let item_id = opened_plug_ledger(&db, &gateway).await;
    let owner = OrderOwner::Plug(PLUG);

    // First payout settles the opened 200.
    api.resolve_bank_account(owner, &account()).await.expect("Error resolving account");
    let token = db.fetch_valid_verification_token(owner, Utc::now()).await.unwrap().unwrap();
    api.process_withdrawal(owner, &token.token, &account()).await.expect("Error withdrawing");

    // A post-payout dispute resolves in the plug's favour: a resolve claim appears.
    disputes.pause_item(item_id, 1).await.expect("Error pausing item");
    disputes.unpause_item(item_id, 1).await.expect("Error unpausing item");
    assert_eq!(db.opened_balance(owner).await.unwrap(), Kobo::from(200));

    api.resolve_bank_account(owner, &account()).await.expect("Error resolving account");
    let token = db.fetch_valid_verification_token(owner, Utc::now()).await.unwrap().unwrap();
    let settled = api.process_withdrawal(owner, &token.token, &account()).await.expect("Error withdrawing claim");
    assert_eq!(settled.amount, Kobo::from(200));
    let resolves = db.fetch_resolve_plug_payments(PLUG).await.unwrap();
    assert_eq!(resolves[0].status, EscrowStatus::Paid);
    assert_eq!(db.opened_balance(owner).await.unwrap(), Kobo::from(0));
}

#[tokio::test]
async fn withdrawals_are_serialized_per_party() {
    let db = new_db().await;
    let gateway = TestGateway::new();
    let api = WithdrawalApi::new(db.clone(), gateway.clone(), EventProducers::default());
    opened_plug_ledger(&db, &gateway).await;
    let owner = OrderOwner::Plug(PLUG);

    api.resolve_bank_account(owner, &account()).await.expect("Error resolving account");
    let token = db.fetch_valid_verification_token(owner, Utc::now()).await.unwrap().unwrap();

    // Simulate a concurrent holder of the party's withdrawal lock.
    let lock_key = format!("withdrawal:{owner}");
    assert!(db.try_acquire_lock(&lock_key, Duration::minutes(2)).await.unwrap());
    let err = api.process_withdrawal(owner, &token.token, &account()).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::LockHeld(_)));

    // The other party is unaffected, and releasing the lock unblocks this one.
    db.release_lock(&lock_key).await.unwrap();
    let settled = api.process_withdrawal(owner, &token.token, &account()).await.expect("Error withdrawing");
    assert_eq!(settled.amount, Kobo::from(200));

    // An empty balance is rejected before any gateway traffic.
    api.resolve_bank_account(owner, &account()).await.expect("Error resolving account");
    let token = db.fetch_valid_verification_token(owner, Utc::now()).await.unwrap().unwrap();
    let err = api.process_withdrawal(owner, &token.token, &account()).await.unwrap_err();
    assert!(matches!(err, PaymentEngineError::NothingToWithdraw));
}
