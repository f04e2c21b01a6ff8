//! A scriptable in-memory stand-in for the payment gateway.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

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
    GATEWAY_SUCCESS,
};

#[derive(Debug)]
struct TestGatewayState {
    counter: u64,
    verifications: HashMap<String, VerifiedPayment>,
    fail_transfers: bool,
    account_name: String,
    transfers: Vec<(Kobo, String)>,
}

impl Default for TestGatewayState {
    fn default() -> Self {
        Self {
            counter: 0,
            verifications: HashMap::new(),
            fail_transfers: false,
            account_name: "TEST ACCOUNT HOLDER".to_string(),
            transfers: Vec::new(),
        }
    }
}

/// By default every initialized intent verifies as a success for the initialized amount, account
/// resolution succeeds and transfers go through. Individual behaviours can be overridden per test.
#[derive(Clone, Default)]
pub struct TestGateway {
    state: Arc<Mutex<TestGatewayState>>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides what `verify_payment` reports for a reference.
    pub fn set_verification(&self, reference: &str, status: &str, amount: Kobo) {
        let mut state = self.state.lock().unwrap();
        state.verifications.insert(
            reference.to_string(),
            VerifiedPayment { reference: reference.to_string(), status: status.to_string(), amount },
        );
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.state.lock().unwrap().fail_transfers = fail;
    }

    /// Every transfer that was initiated, as (amount, reference) pairs.
    pub fn transfers(&self) -> Vec<(Kobo, String)> {
        self.state.lock().unwrap().transfers.clone()
    }
}

impl PaymentGateway for TestGateway {
    async fn initialize_payment(
        &self,
        amount: Kobo,
        _email: &str,
        _metadata: serde_json::Value,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.counter += 1;
        let reference = format!("PSTK-{:06}", state.counter);
        state.verifications.insert(
            reference.clone(),
            VerifiedPayment { reference: reference.clone(), status: GATEWAY_SUCCESS.to_string(), amount },
        );
        let authorization_url = format!("https://checkout.test/{reference}");
        Ok(PaymentIntent { reference, authorization_url })
    }

    async fn verify_payment(&self, reference: &str) -> Result<VerifiedPayment, GatewayError> {
        let state = self.state.lock().unwrap();
        state
            .verifications
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::Declined(format!("Unknown reference {reference}")))
    }

    async fn resolve_account(&self, _account: &BankAccount) -> Result<ResolvedBankAccount, GatewayError> {
        let state = self.state.lock().unwrap();
        Ok(ResolvedBankAccount { account_name: state.account_name.clone() })
    }

    async fn create_recipient(&self, _name: &str, account: &BankAccount) -> Result<RecipientHandle, GatewayError> {
        Ok(RecipientHandle { recipient_code: format!("RCP_{}", account.account_number) })
    }

    async fn initiate_transfer(
        &self,
        amount: Kobo,
        _recipient: &RecipientHandle,
        _reason: &str,
    ) -> Result<TransferReceipt, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_transfers {
            return Err(GatewayError::Declined("Transfers are disabled for this test".to_string()));
        }
        state.counter += 1;
        let reference = format!("TRF-{:06}", state.counter);
        state.transfers.push((amount, reference.clone()));
        Ok(TransferReceipt { reference })
    }
}
