use ppe_common::Kobo;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The gateway status string that confirms a payment. Anything else is a failure.
pub const GATEWAY_SUCCESS: &str = "success";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway call timed out: {0}")]
    Timeout(String),
    #[error("Gateway declined the request: {0}")]
    Declined(String),
    #[error("Gateway transport error: {0}")]
    Transport(String),
    #[error("Gateway response was malformed: {0}")]
    Malformed(String),
}

//-------------------------------------- Gateway data objects --------------------------------------------------------

/// An open payment intent. The reference is stamped on every sub-order of the checkout and is the
/// key that confirmation verifies against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub reference: String,
    pub authorization_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedPayment {
    pub reference: String,
    pub status: String,
    pub amount: Kobo,
}

impl VerifiedPayment {
    pub fn is_success(&self) -> bool {
        self.status == GATEWAY_SUCCESS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_number: String,
    pub bank_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedBankAccount {
    pub account_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientHandle {
    pub recipient_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub reference: String,
}

/// The payment gateway collaborator (modelled on Paystack's surface). Injected into the APIs so
/// tests can substitute a scriptable double. All amounts are integer minor units; every call must
/// carry a timeout and report it as [`GatewayError::Timeout`] rather than hang.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Opens a payment intent for the grand total of a checkout.
    async fn initialize_payment(
        &self,
        amount: Kobo,
        email: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Re-verifiable read of a transaction's state. Safe to call repeatedly.
    async fn verify_payment(&self, reference: &str) -> Result<VerifiedPayment, GatewayError>;

    /// Resolves the display name on a bank account. A read; safe to repeat.
    async fn resolve_account(&self, account: &BankAccount) -> Result<ResolvedBankAccount, GatewayError>;

    async fn create_recipient(&self, name: &str, account: &BankAccount) -> Result<RecipientHandle, GatewayError>;

    /// Initiates a transfer of the full `amount` to the recipient. There are no partial transfers.
    async fn initiate_transfer(
        &self,
        amount: Kobo,
        recipient: &RecipientHandle,
        reason: &str,
    ) -> Result<TransferReceipt, GatewayError>;
}
