//! Production [`PaymentGateway`] implementation backed by the Paystack client crate.

use paystack_tools::{PaystackApi, PaystackApiError, PaystackConfig};
use ppe_common::Kobo;

use crate::traits::{
    BankAccount,
    GatewayError,
    PaymentGateway,
    PaymentIntent,
    RecipientHandle,
    ResolvedBankAccount,
    TransferReceipt,
    VerifiedPayment,
};

impl From<PaystackApiError> for GatewayError {
    fn from(e: PaystackApiError) -> Self {
        match e {
            PaystackApiError::Timeout(msg) => GatewayError::Timeout(msg),
            PaystackApiError::DeclinedRequest(msg) => GatewayError::Declined(msg),
            PaystackApiError::QueryError { status, message } => {
                GatewayError::Declined(format!("HTTP {status}: {message}"))
            },
            PaystackApiError::JsonError(msg) => GatewayError::Malformed(msg),
            PaystackApiError::EmptyResponse => GatewayError::Malformed("empty data payload".to_string()),
            PaystackApiError::Initialization(msg) | PaystackApiError::RestResponseError(msg) => {
                GatewayError::Transport(msg)
            },
        }
    }
}

#[derive(Clone)]
pub struct PaystackGateway {
    api: PaystackApi,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> Result<Self, GatewayError> {
        let api = PaystackApi::new(config)?;
        Ok(Self { api })
    }

    pub fn new_from_env_or_default() -> Result<Self, GatewayError> {
        Self::new(PaystackConfig::new_from_env_or_default())
    }
}

impl PaymentGateway for PaystackGateway {
    async fn initialize_payment(
        &self,
        amount: Kobo,
        email: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentIntent, GatewayError> {
        let tx = self.api.initialize_transaction(amount, email, metadata).await?;
        Ok(PaymentIntent { reference: tx.reference, authorization_url: tx.authorization_url })
    }

    async fn verify_payment(&self, reference: &str) -> Result<VerifiedPayment, GatewayError> {
        let tx = self.api.verify_transaction(reference).await?;
        Ok(VerifiedPayment { reference: tx.reference, status: tx.status, amount: Kobo::from(tx.amount) })
    }

    async fn resolve_account(&self, account: &BankAccount) -> Result<ResolvedBankAccount, GatewayError> {
        let resolved = self.api.resolve_account(&account.account_number, &account.bank_code).await?;
        Ok(ResolvedBankAccount { account_name: resolved.account_name })
    }

    async fn create_recipient(&self, name: &str, account: &BankAccount) -> Result<RecipientHandle, GatewayError> {
        let recipient =
            self.api.create_transfer_recipient(name, &account.account_number, &account.bank_code).await?;
        Ok(RecipientHandle { recipient_code: recipient.recipient_code })
    }

    async fn initiate_transfer(
        &self,
        amount: Kobo,
        recipient: &RecipientHandle,
        reason: &str,
    ) -> Result<TransferReceipt, GatewayError> {
        let transfer = self.api.initiate_transfer(amount, &recipient.recipient_code, reason).await?;
        Ok(TransferReceipt { reference: transfer.reference })
    }
}
