use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use ppe_common::Kobo;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Created and waiting for the gateway payment to be confirmed.
    Staged,
    /// Payment confirmed (or pay-on-delivery); awaiting shipment.
    Pending,
    /// Handed to the courier.
    Shipped,
    /// Received by the buyer. Delivery opens the escrow rows.
    Delivered,
    /// Terminal. Only reachable from Pending.
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Staged => write!(f, "Staged"),
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Staged" => Ok(Self::Staged),
            "Pending" => Ok(Self::Pending),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    EscrowStatus       ---------------------------------------------------------
/// Status of an escrow ledger row. Strictly monotonic: Locked→Opened→Paid, never reversed.
/// Resolve rows skip Locked and are born Opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EscrowStatus {
    Locked,
    Opened,
    Paid,
}

impl Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowStatus::Locked => write!(f, "Locked"),
            EscrowStatus::Opened => write!(f, "Opened"),
            EscrowStatus::Paid => write!(f, "Paid"),
        }
    }
}

impl FromStr for EscrowStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Locked" => Ok(Self::Locked),
            "Opened" => Ok(Self::Opened),
            "Paid" => Ok(Self::Paid),
            s => Err(ConversionError(format!("Invalid escrow status: {s}"))),
        }
    }
}

//--------------------------------------  WithdrawalStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Success,
    Failed,
}

impl Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalStatus::Success => write!(f, "Success"),
            WithdrawalStatus::Failed => write!(f, "Failed"),
        }
    }
}

//--------------------------------------     OrderOwner        ---------------------------------------------------------
/// The party an order's earnings belong to. Replaces nullable-foreign-key branching so every
/// earnings and payout path handles both cases exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderOwner {
    Plug(i64),
    Supplier(i64),
}

/// The role half of an [`OrderOwner`], as persisted in owner-keyed tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OwnerRole {
    Plug,
    Supplier,
}

impl Display for OwnerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerRole::Plug => write!(f, "Plug"),
            OwnerRole::Supplier => write!(f, "Supplier"),
        }
    }
}

impl OrderOwner {
    pub fn role(&self) -> OwnerRole {
        match self {
            OrderOwner::Plug(_) => OwnerRole::Plug,
            OrderOwner::Supplier(_) => OwnerRole::Supplier,
        }
    }

    pub fn party_id(&self) -> i64 {
        match self {
            OrderOwner::Plug(id) | OrderOwner::Supplier(id) => *id,
        }
    }

    pub fn from_parts(role: OwnerRole, party_id: i64) -> Self {
        match role {
            OwnerRole::Plug => OrderOwner::Plug(party_id),
            OwnerRole::Supplier => OrderOwner::Supplier(party_id),
        }
    }
}

impl Display for OrderOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderOwner::Plug(id) => write!(f, "plug:{id}"),
            OrderOwner::Supplier(id) => write!(f, "supplier:{id}"),
        }
    }
}

//--------------------------------------    OrderNumber        ---------------------------------------------------------
/// Public-facing order identifier with a random high-entropy suffix.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Buyer          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Buyer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub buyer_id: i64,
    pub supplier_id: i64,
    pub plug_id: Option<i64>,
    /// Invariant: `total_amount = Σ(plug_price × quantity) + delivery_fee` over the live items.
    pub total_amount: Kobo,
    pub delivery_fee: Kobo,
    pub status: OrderStatusType,
    pub payment_reference: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn owner(&self) -> OrderOwner {
        match self.plug_id {
            Some(plug_id) => OrderOwner::Plug(plug_id),
            None => OrderOwner::Supplier(self.supplier_id),
        }
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
/// A cart line frozen at staging time. Prices are immutable snapshots; `plug_price ≥ supplier_price`
/// and the difference is the plug's margin.
#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub plug_price: Kobo,
    pub supplier_price: Kobo,
    pub supplier_id: i64,
    pub plug_id: Option<i64>,
}

impl OrderItem {
    /// The plug's margin over `qty` units of this line.
    pub fn plug_portion(&self, qty: i64) -> Kobo {
        (self.plug_price - self.supplier_price) * qty
    }

    /// The supplier's earnings over `qty` units of this line.
    pub fn supplier_portion(&self, qty: i64) -> Kobo {
        self.supplier_price * qty
    }

    pub fn line_total(&self) -> Kobo {
        self.plug_price * self.quantity
    }
}

//--------------------------------------     PlugPayment       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct PlugPayment {
    pub id: i64,
    pub order_id: i64,
    pub plug_id: i64,
    pub amount: Kobo,
    pub status: EscrowStatus,
    pub unlock_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   SupplierPayment     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct SupplierPayment {
    pub id: i64,
    pub order_id: i64,
    pub supplier_id: i64,
    pub amount: Kobo,
    pub status: EscrowStatus,
    pub unlock_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  ResolvePlugPayment   ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct ResolvePlugPayment {
    pub id: i64,
    pub order_item_id: i64,
    pub order_id: i64,
    pub plug_id: i64,
    pub amount: Kobo,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
}

//------------------------------------ ResolveSupplierPayment  ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct ResolveSupplierPayment {
    pub id: i64,
    pub order_item_id: i64,
    pub order_id: i64,
    pub supplier_id: i64,
    pub amount: Kobo,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   PausedOrderItem     ---------------------------------------------------------
/// An active dispute hold on part (or all) of an order item's quantity.
#[derive(Debug, Clone, FromRow)]
pub struct PausedOrderItem {
    pub id: i64,
    pub order_item_id: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  ReturnedOrderItem    ---------------------------------------------------------
/// Terminal audit record of a completed return. Never mutated after creation.
#[derive(Debug, Clone, FromRow)]
pub struct ReturnedOrderItem {
    pub id: i64,
    pub order_item_id: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  WithdrawalRecord     ---------------------------------------------------------
/// Append-only audit trail of payout attempts.
#[derive(Debug, Clone, FromRow)]
pub struct WithdrawalRecord {
    pub id: i64,
    pub role: OwnerRole,
    pub party_id: i64,
    pub amount: Kobo,
    pub reference: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

impl WithdrawalRecord {
    pub fn owner(&self) -> OrderOwner {
        OrderOwner::from_parts(self.role, self.party_id)
    }
}

//------------------------------------  VerificationToken      ---------------------------------------------------------
/// Short-lived OTP gating payout initiation. One live token per owner.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub id: i64,
    pub role: OwnerRole,
    pub party_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------      Product          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub supplier_id: i64,
    pub name: String,
    pub price: Kobo,
    pub stock: i64,
    pub sold: i64,
}

//--------------------------------------   ProductVariant      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct ProductVariant {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    /// Falls back to the parent product's price when absent.
    pub price: Option<Kobo>,
    pub stock: i64,
}

//--------------------------------------    PlugListing        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct PlugListing {
    pub id: i64,
    pub plug_id: i64,
    pub product_id: i64,
    pub resale_price: Kobo,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_roundtrips() {
        for s in ["Staged", "Pending", "Shipped", "Delivered", "Cancelled"] {
            assert_eq!(s.parse::<OrderStatusType>().unwrap().to_string(), s);
        }
        for s in ["Locked", "Opened", "Paid"] {
            assert_eq!(s.parse::<EscrowStatus>().unwrap().to_string(), s);
        }
        assert!("Refunded".parse::<EscrowStatus>().is_err());
    }

    #[test]
    fn owner_parts_roundtrip() {
        let owner = OrderOwner::Plug(42);
        assert_eq!(OrderOwner::from_parts(owner.role(), owner.party_id()), owner);
        assert_eq!(owner.to_string(), "plug:42");
        assert_eq!(OrderOwner::Supplier(7).to_string(), "supplier:7");
    }

    #[test]
    fn item_portions() {
        let item = OrderItem {
            id: 1,
            order_id: 1,
            product_id: 1,
            variant_id: None,
            quantity: 3,
            plug_price: Kobo::from(1_000),
            supplier_price: Kobo::from(800),
            supplier_id: 1,
            plug_id: Some(9),
        };
        assert_eq!(item.plug_portion(2), Kobo::from(400));
        assert_eq!(item.supplier_portion(2), Kobo::from(1_600));
        assert_eq!(item.line_total(), Kobo::from(3_000));
    }
}
