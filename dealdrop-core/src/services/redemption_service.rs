// File: dealdrop-core/src/services/redemption_service.rs

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use dealdrop_common::error::Error;
use dealdrop_common::models::claim::{Claim, ClaimStatus, TransitionExtra, TransitionOutcome};
use dealdrop_common::traits::repository_traits::ClaimLedgerRepository;
use crate::clock::Clock;
use crate::eventbus::{DealEvent, EventBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemRejectReason {
    /// No claim carries the presented code.
    NotFound,
    /// The claim already reached a terminal state.
    AlreadyUsed,
    /// The reservation TTL has passed (whether or not the reaper got to it
    /// yet).
    Expired,
}

#[derive(Debug, Clone)]
pub enum RedemptionOutcome {
    Redeemed(Claim),
    Rejected(RedeemRejectReason),
}

/// Completes claims at the counter. Never touches inventory: the unit was
/// committed at reservation time, and expiry restocking belongs to the
/// reaper.
pub struct RedemptionService {
    ledger: Arc<dyn ClaimLedgerRepository>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
}

impl RedemptionService {
    pub fn new(
        ledger: Arc<dyn ClaimLedgerRepository>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            ledger,
            clock,
            event_bus,
        }
    }

    /// Redeem by QR token or six-digit code. Single-use by construction:
    /// once the status leaves `Reserved`, no lookup of the same code can
    /// succeed again.
    pub async fn redeem(
        &self,
        code: &str,
        staff_id: Uuid,
        basket_total: Option<f64>,
    ) -> Result<RedemptionOutcome, Error> {
        let Some(claim) = self.ledger.find_by_code(code).await? else {
            return Ok(RedemptionOutcome::Rejected(RedeemRejectReason::NotFound));
        };

        if claim.status != ClaimStatus::Reserved {
            return Ok(RedemptionOutcome::Rejected(RedeemRejectReason::AlreadyUsed));
        }

        // Freshness is re-checked against the clock rather than trusting
        // the stored status; the reaper may simply not have swept yet.
        let now = self.clock.now();
        if claim.expires_at < now {
            return Ok(RedemptionOutcome::Rejected(RedeemRejectReason::Expired));
        }

        let outcome = self
            .ledger
            .transition(
                claim.claim_id,
                ClaimStatus::Reserved,
                ClaimStatus::Redeemed,
                TransitionExtra {
                    redeemed_at: Some(now),
                    staff_id: Some(staff_id),
                    basket_total,
                },
            )
            .await?;

        match outcome {
            TransitionOutcome::Applied(claim) => {
                info!(
                    "Claim {} redeemed by staff {} for user {}",
                    claim.claim_id, staff_id, claim.user_id
                );
                self.event_bus
                    .publish(DealEvent::ClaimRedeemed {
                        claim_id: claim.claim_id,
                        user_id: claim.user_id,
                        offer_id: claim.offer_id,
                        slot_id: claim.slot_id,
                        staff_id: claim.staff_id,
                        redeemed_at: now,
                    })
                    .await;
                Ok(RedemptionOutcome::Redeemed(claim))
            }
            // Lost the race, most likely to the reaper. Report what the
            // claim became instead of corrupting anything.
            TransitionOutcome::Conflict { actual } => {
                let reason = match actual {
                    ClaimStatus::Expired => RedeemRejectReason::Expired,
                    _ => RedeemRejectReason::AlreadyUsed,
                };
                Ok(RedemptionOutcome::Rejected(reason))
            }
        }
    }
}
