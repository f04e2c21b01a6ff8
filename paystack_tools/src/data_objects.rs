use serde::{Deserialize, Serialize};

/// Every Paystack response wraps its payload in the same envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub reference: String,
    pub authorization_url: String,
    #[serde(default)]
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub reference: String,
    /// Gateway-reported state, e.g. `success`, `failed`, `abandoned`.
    pub status: String,
    /// Integer minor units, as reported by the gateway.
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedAccount {
    pub account_number: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecipient {
    pub recipient_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatedTransfer {
    pub reference: String,
    #[serde(default)]
    pub transfer_code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
