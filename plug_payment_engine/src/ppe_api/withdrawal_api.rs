use std::fmt::Debug;

use chrono::Utc;
use log::*;
use ppe_common::Kobo;

use crate::{
    config::EscrowConfig,
    db_types::OrderOwner,
    events::{EventProducers, OtpIssuedEvent, WithdrawalCompletedEvent},
    helpers::new_otp,
    ledger_objects::SettledWithdrawal,
    traits::{
        BankAccount,
        GatewayError,
        MarketplaceDatabase,
        PaymentEngineError,
        PaymentGateway,
        ResolvedBankAccount,
        TransferReceipt,
    },
};

/// `WithdrawalApi` is the payout engine. Payouts are gated by a short-lived OTP minted during bank
/// account resolution, serialized per party by a TTL advisory lock, and always settle the entire
/// opened balance — there are no partial withdrawals.
pub struct WithdrawalApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    config: EscrowConfig,
}

impl<B, G> Debug for WithdrawalApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WithdrawalApi")
    }
}

impl<B, G> WithdrawalApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, config: EscrowConfig::default() }
    }

    pub fn with_config(mut self, config: EscrowConfig) -> Self {
        self.config = config;
        self
    }

    fn lock_key(owner: OrderOwner) -> String {
        format!("withdrawal:{owner}")
    }
}

impl<B, G> WithdrawalApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    /// Step one of a payout: resolves the bank account name via the gateway and mints (or reuses,
    /// while unexpired) the party's 6-digit OTP. The OTP is delivered out-of-band through the
    /// [`OtpIssuedEvent`] hook.
    pub async fn resolve_bank_account(
        &self,
        owner: OrderOwner,
        account: &BankAccount,
    ) -> Result<ResolvedBankAccount, PaymentEngineError> {
        let resolved = self.gateway.resolve_account(account).await?;
        let now = Utc::now();
        let token = match self.db.fetch_valid_verification_token(owner, now).await? {
            Some(existing) => {
                debug!("💸️ Reusing the live OTP for {owner}");
                existing
            },
            None => self.db.upsert_verification_token(owner, &new_otp(), now + self.config.otp_ttl).await?,
        };
        for producer in &self.producers.otp_issued_producer {
            let event = OtpIssuedEvent { owner, token: token.token.clone(), expires_at: token.expires_at };
            producer.publish_event(event).await;
        }
        info!("💸️ Bank account resolved for {owner}; OTP issued (expires {})", token.expires_at);
        Ok(resolved)
    }

    /// Step two: settles the party's entire opened balance (direct + resolve rows).
    ///
    /// Serialized per party via the advisory lock so two concurrent calls cannot both read the
    /// same opened balance. The OTP must match a non-expired token. A transfer initiation failure
    /// is recorded as a Failed audit row with the ledger untouched — safe to retry once the
    /// gateway recovers. On success the settlement transaction re-derives the opened set, flips it
    /// to Paid, consumes the OTP and appends the Success audit row.
    pub async fn process_withdrawal(
        &self,
        owner: OrderOwner,
        otp: &str,
        account: &BankAccount,
    ) -> Result<SettledWithdrawal, PaymentEngineError> {
        let lock_key = Self::lock_key(owner);
        if !self.db.try_acquire_lock(&lock_key, self.config.lock_ttl).await? {
            return Err(PaymentEngineError::LockHeld(lock_key));
        }
        let result = self.execute_withdrawal(owner, otp, account).await;
        if let Err(e) = self.db.release_lock(&lock_key).await {
            // The TTL reaps it; the next attempt is merely delayed.
            warn!("💸️ Could not release {lock_key}: {e}");
        }
        result
    }

    async fn execute_withdrawal(
        &self,
        owner: OrderOwner,
        otp: &str,
        account: &BankAccount,
    ) -> Result<SettledWithdrawal, PaymentEngineError> {
        let now = Utc::now();
        let token = self.db.fetch_valid_verification_token(owner, now).await?.ok_or(PaymentEngineError::InvalidOtp)?;
        if token.token != otp {
            return Err(PaymentEngineError::InvalidOtp);
        }
        let balance = self.db.opened_balance(owner).await?;
        if !balance.is_positive() {
            return Err(PaymentEngineError::NothingToWithdraw);
        }
        // The recipient name comes from a fresh resolution, not from client input.
        let resolved = self.gateway.resolve_account(account).await?;
        let receipt = match self.open_transfer(&resolved.account_name, account, balance).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("💸️ Transfer initiation failed for {owner}: {e}");
                if let Err(audit) = self.db.record_failed_withdrawal(owner, balance).await {
                    error!("💸️ Could not record the failed withdrawal for {owner}: {audit}");
                }
                return Err(e.into());
            },
        };
        let settled = self.db.settle_withdrawal(owner, &receipt.reference).await?;
        if settled.amount != balance {
            // A pause landed between the snapshot and settlement; the ledger is still consistent,
            // but the transferred and settled amounts differ.
            warn!(
                "💸️ Settled {} for {owner} but transferred {balance}; a concurrent ledger adjustment intervened",
                settled.amount
            );
        }
        for producer in &self.producers.withdrawal_completed_producer {
            let event =
                WithdrawalCompletedEvent { owner, amount: settled.amount, reference: receipt.reference.clone() };
            producer.publish_event(event).await;
        }
        Ok(settled)
    }

    async fn open_transfer(
        &self,
        account_name: &str,
        account: &BankAccount,
        amount: Kobo,
    ) -> Result<TransferReceipt, GatewayError> {
        let recipient = self.gateway.create_recipient(account_name, account).await?;
        self.gateway.initiate_transfer(amount, &recipient, "Marketplace earnings payout").await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
