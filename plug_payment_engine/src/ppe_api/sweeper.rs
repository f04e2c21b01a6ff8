use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    config::EscrowConfig,
    traits::{MarketplaceDatabase, PaymentEngineError},
};

/// Lock key shared by every sweeper instance; only one may sweep at a time.
const SWEEP_LOCK_KEY: &str = "escrow-unlock-sweep";

/// The deferred unlock sweeper: flips Locked escrow rows whose hold has elapsed to Opened.
///
/// Everything it needs is derived from persisted state (`status` + `unlock_at`), so it is correct
/// across restarts; the status filter makes overlapping sweeps idempotent, and a short-TTL advisory
/// lock keeps multiple instances from double-processing.
pub struct UnlockSweeper<B> {
    db: B,
    config: EscrowConfig,
}

impl<B> Debug for UnlockSweeper<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnlockSweeper")
    }
}

impl<B> UnlockSweeper<B>
where B: MarketplaceDatabase
{
    pub fn new(db: B) -> Self {
        Self { db, config: EscrowConfig::default() }
    }

    pub fn with_config(mut self, config: EscrowConfig) -> Self {
        self.config = config;
        self
    }

    /// One sweep pass. Returns the number of rows opened, or zero when another instance holds the
    /// sweep lock.
    pub async fn sweep_once(&self) -> Result<u64, PaymentEngineError> {
        if !self.db.try_acquire_lock(SWEEP_LOCK_KEY, self.config.lock_ttl).await? {
            debug!("⏲️ Another sweeper holds [{SWEEP_LOCK_KEY}]; skipping this pass");
            return Ok(0);
        }
        let result = self.db.sweep_unlockable(Utc::now()).await;
        if let Err(e) = self.db.release_lock(SWEEP_LOCK_KEY).await {
            warn!("⏲️ Could not release [{SWEEP_LOCK_KEY}]: {e}");
        }
        let flipped = result?;
        if flipped > 0 {
            info!("⏲️ Unlock sweep opened {flipped} escrow row(s)");
        } else {
            trace!("⏲️ Unlock sweep found nothing to open");
        }
        Ok(flipped)
    }

    /// Runs the sweeper on a fixed interval until the task is dropped. Callers decide where it
    /// lives, typically `tokio::spawn(sweeper.run())`.
    pub async fn run(self) {
        let mut timer = tokio::time::interval(self.config.sweep_interval);
        info!("⏲️ Unlock sweeper started (every {:?})", self.config.sweep_interval);
        loop {
            timer.tick().await;
            if let Err(e) = self.sweep_once().await {
                error!("⏲️ Unlock sweep failed: {e}");
            }
        }
    }
}
