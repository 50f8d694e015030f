//! Lease expiry for reservations that were never booked.
//!
//! A coordinator that dies between reserve and book leaves its slot
//! RESERVED with nobody left to release it. The sweeper hands such slots
//! back to the pool once they have been held longer than the lease.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use common::SlotId;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{Ledger, Result};

/// Periodically returns expired reservations to the pool.
pub struct ReservationSweeper<L: Ledger> {
    ledger: L,
    lease: TimeDelta,
    interval: Duration,
    stop_signal: watch::Receiver<bool>,
}

impl<L: Ledger + 'static> ReservationSweeper<L> {
    /// Creates a sweeper reclaiming reservations older than `lease` every
    /// `interval`, until `stop_signal` flips to true.
    pub fn new(
        ledger: L,
        lease: Duration,
        interval: Duration,
        stop_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger,
            lease: TimeDelta::from_std(lease).unwrap_or(TimeDelta::MAX),
            interval,
            stop_signal,
        }
    }

    /// Runs a single sweep.
    pub async fn sweep_once(&self) -> Result<Vec<SlotId>> {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.lease) else {
            return Ok(Vec::new());
        };
        let reclaimed = self.ledger.sweep_expired(cutoff).await?;
        if !reclaimed.is_empty() {
            tracing::warn!(
                resource = %self.ledger.kind(),
                count = reclaimed.len(),
                slots = ?reclaimed,
                "reclaimed expired reservations"
            );
        }
        Ok(reclaimed)
    }

    /// Sweeps on every tick until stopped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            let sender_gone = tokio::select! {
                _ = ticker.tick() => false,
                changed = self.stop_signal.changed() => changed.is_err(),
            };
            if sender_gone || *self.stop_signal.borrow() {
                tracing::debug!(resource = %self.ledger.kind(), "reservation sweeper stopped");
                break;
            }

            if let Err(e) = self.sweep_once().await {
                tracing::error!(resource = %self.ledger.kind(), error = %e, "reservation sweep failed");
            }
        }
    }

    /// Spawns the sweep loop onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
