use ppe_common::Kobo;
use serde::{Deserialize, Serialize};

use crate::{db_types::Order, traits::PaymentIntent};

//--------------------------------------   PaymentMethod       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Paid up front through the gateway.
    Gateway,
    /// Pay on delivery. A single such item collapses the whole checkout to pay-on-delivery.
    OnDelivery,
}

//--------------------------------------    ContactInfo        ---------------------------------------------------------
/// Buyer contact details. `(email, phone)` is the upsert identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

//--------------------------------------      CartItem         ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub supplier_id: i64,
    pub payment_method: PaymentMethod,
}

//--------------------------------------    NewCheckout        ---------------------------------------------------------
/// A buyer's cart, ready to be split into per-supplier orders. When `plug_id` is set the checkout
/// runs in reseller context: item prices come from the plug's listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCheckout {
    pub buyer: ContactInfo,
    pub plug_id: Option<i64>,
    /// Charged once per sub-order; each supplier ships separately.
    pub delivery_fee: Kobo,
    pub items: Vec<CartItem>,
}

impl NewCheckout {
    pub fn is_pay_on_delivery(&self) -> bool {
        self.items.iter().any(|i| i.payment_method == PaymentMethod::OnDelivery)
    }
}

//--------------------------------------   StagedCheckout      ---------------------------------------------------------
/// What [`stage_checkout`] persisted: the per-supplier orders and the grand total a payment intent
/// must cover.
///
/// [`stage_checkout`]: crate::traits::MarketplaceDatabase::stage_checkout
#[derive(Debug, Clone)]
pub struct StagedCheckout {
    pub buyer_id: i64,
    pub orders: Vec<Order>,
    pub grand_total: Kobo,
    pub pay_on_delivery: bool,
}

//--------------------------------------  CheckoutReceipt      ---------------------------------------------------------
/// The caller-facing result of staging: the created orders and, unless the checkout collapsed to
/// pay-on-delivery, the open payment intent to redirect the buyer to.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub orders: Vec<Order>,
    pub payment: Option<PaymentIntent>,
}
