// File: dealdrop-core/src/tasks/expiry_reaper.rs

use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use dealdrop_common::error::Error;
use dealdrop_common::models::claim::{ClaimStatus, TransitionExtra, TransitionOutcome};
use dealdrop_common::traits::repository_traits::{
    ClaimLedgerRepository, SlotInventoryRepository,
};
use crate::clock::Clock;
use crate::eventbus::{DealEvent, EventBus};

/// Counters for one sweep, surfaced for operational observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Overdue claims the page returned.
    pub scanned: usize,
    /// Claims this sweep actually transitioned to Expired.
    pub expired: usize,
    /// Units returned to their slots.
    pub restocked: usize,
}

/// Reclaims overdue reservations. The only writer path that restocks
/// inventory after the fact; it restocks a unit only when ITS transition
/// won the claim, so overlapping sweeps and redemption races can never
/// return the same unit twice.
pub struct ExpiryReaper {
    inventory: Arc<dyn SlotInventoryRepository>,
    ledger: Arc<dyn ClaimLedgerRepository>,
    event_bus: Arc<EventBus>,
    page_size: i64,
}

impl ExpiryReaper {
    pub fn new(
        inventory: Arc<dyn SlotInventoryRepository>,
        ledger: Arc<dyn ClaimLedgerRepository>,
        event_bus: Arc<EventBus>,
        page_size: i64,
    ) -> Self {
        Self {
            inventory,
            ledger,
            event_bus,
            page_size,
        }
    }

    /// One pass over (at most) a page of overdue claims. Idempotent and
    /// safe to run concurrently with itself: a claim another sweep already
    /// handled just fails the guarded transition here and is skipped.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepSummary, Error> {
        let overdue = self.ledger.find_overdue(now, self.page_size).await?;
        let mut summary = SweepSummary {
            scanned: overdue.len(),
            ..Default::default()
        };

        for claim in overdue {
            let outcome = self
                .ledger
                .transition(
                    claim.claim_id,
                    ClaimStatus::Reserved,
                    ClaimStatus::Expired,
                    TransitionExtra::default(),
                )
                .await;

            match outcome {
                Ok(TransitionOutcome::Applied(expired)) => {
                    summary.expired += 1;
                    match self.inventory.restock(expired.slot_id, 1).await {
                        Ok(_) => summary.restocked += 1,
                        Err(e) => {
                            error!(
                                "Expired claim {} but failed to restock slot {}: {:?}",
                                expired.claim_id, expired.slot_id, e
                            );
                        }
                    }
                    self.event_bus
                        .publish(DealEvent::ClaimExpired {
                            claim_id: expired.claim_id,
                            slot_id: expired.slot_id,
                            expired_at: now,
                        })
                        .await;
                }
                Ok(TransitionOutcome::Conflict { actual }) => {
                    debug!(
                        "Claim {} already {} by the time the sweep reached it; skipping.",
                        claim.claim_id, actual
                    );
                }
                // One bad claim must not abort the batch; it stays Reserved
                // and the next sweep picks it up again.
                Err(e) => {
                    error!("Failed to expire claim {}: {:?}", claim.claim_id, e);
                }
            }
        }

        if summary.expired > 0 {
            info!(
                "Expiry sweep: scanned={} expired={} restocked={}",
                summary.scanned, summary.expired, summary.restocked
            );
        }
        Ok(summary)
    }
}

/// Spawns the background sweep loop. Runs until the shutdown watch flips
/// to `true` (the event bus hands its receiver to every background task).
pub fn spawn_expiry_reaper(
    reaper: Arc<ExpiryReaper>,
    clock: Arc<dyn Clock>,
    interval: std::time::Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = reaper.sweep(clock.now()).await {
                        error!("Expiry sweep failed: {:?}", e);
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Expiry reaper shutting down.");
                        break;
                    }
                }
            }
        }
    })
}
