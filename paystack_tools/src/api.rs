use std::sync::Arc;

use log::*;
use ppe_common::{Kobo, NAIRA_CURRENCY_CODE};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{
    data_objects::ApiEnvelope,
    InitializedTransaction,
    InitiatedTransfer,
    PaystackApiError,
    PaystackConfig,
    ResolvedAccount,
    TransferRecipient,
    VerifiedTransaction,
};

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Sends a request and unwraps the standard Paystack envelope. A `status: false` envelope is a
    /// decline; a missing `data` payload on success is an error in its own right.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<T, PaystackApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                PaystackApiError::Timeout(e.to_string())
            } else {
                PaystackApiError::RestResponseError(e.to_string())
            }
        })?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaystackApiError::RestResponseError(e.to_string()))?;
            return Err(PaystackApiError::QueryError { status, message });
        }
        let envelope =
            response.json::<ApiEnvelope<T>>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))?;
        if !envelope.status {
            return Err(PaystackApiError::DeclinedRequest(envelope.message));
        }
        envelope.data.ok_or(PaystackApiError::EmptyResponse)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    /// Opens a payment intent for `amount`. The returned reference is what the buyer's payment is
    /// later verified against.
    pub async fn initialize_transaction(
        &self,
        amount: Kobo,
        email: &str,
        metadata: Value,
    ) -> Result<InitializedTransaction, PaystackApiError> {
        let body = json!({
            "email": email,
            "amount": amount.value(),
            "currency": NAIRA_CURRENCY_CODE,
            "metadata": metadata,
        });
        debug!("Initializing transaction of {amount} for {email}");
        let result =
            self.rest_query::<InitializedTransaction>(Method::POST, "/transaction/initialize", &[], Some(body)).await?;
        info!("Initialized transaction [{}]", result.reference);
        Ok(result)
    }

    pub async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, PaystackApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying transaction [{reference}]");
        let result = self.rest_query::<VerifiedTransaction>(Method::GET, &path, &[], None).await?;
        info!("Verified transaction [{reference}]: {}", result.status);
        Ok(result)
    }

    pub async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, PaystackApiError> {
        let params = [("account_number", account_number), ("bank_code", bank_code)];
        debug!("Resolving bank account ****{}", last4(account_number));
        self.rest_query::<ResolvedAccount>(Method::GET, "/bank/resolve", &params, None).await
    }

    pub async fn create_transfer_recipient(
        &self,
        name: &str,
        account_number: &str,
        bank_code: &str,
    ) -> Result<TransferRecipient, PaystackApiError> {
        let body = json!({
            "type": "nuban",
            "name": name,
            "account_number": account_number,
            "bank_code": bank_code,
            "currency": NAIRA_CURRENCY_CODE,
        });
        debug!("Creating transfer recipient for ****{}", last4(account_number));
        self.rest_query::<TransferRecipient>(Method::POST, "/transferrecipient", &[], Some(body)).await
    }

    pub async fn initiate_transfer(
        &self,
        amount: Kobo,
        recipient_code: &str,
        reason: &str,
    ) -> Result<InitiatedTransfer, PaystackApiError> {
        let body = json!({
            "source": "balance",
            "amount": amount.value(),
            "recipient": recipient_code,
            "reason": reason,
        });
        debug!("Initiating transfer of {amount} to [{recipient_code}]");
        let result = self.rest_query::<InitiatedTransfer>(Method::POST, "/transfer", &[], Some(body)).await?;
        info!("Initiated transfer [{}] of {amount}", result.reference);
        Ok(result)
    }
}

fn last4(account_number: &str) -> &str {
    let n = account_number.len();
    &account_number[n.saturating_sub(4)..]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn url_joins_path() {
        let api = PaystackApi::new(PaystackConfig::default()).unwrap();
        assert_eq!(api.url("/transaction/initialize"), "https://api.paystack.co/transaction/initialize");
    }

    #[test]
    fn last4_handles_short_numbers() {
        assert_eq!(last4("0001234567"), "4567");
        assert_eq!(last4("99"), "99");
    }
}
