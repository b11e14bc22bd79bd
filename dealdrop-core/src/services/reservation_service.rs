// File: dealdrop-core/src/services/reservation_service.rs

use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use dealdrop_common::error::Error;
use dealdrop_common::models::claim::{Claim, ClaimStatus, TransitionExtra, TransitionOutcome};
use dealdrop_common::models::offer::OfferPolicy;
use dealdrop_common::models::slot::ReserveOutcome;
use dealdrop_common::traits::eligibility_traits::GeofenceCheck;
use dealdrop_common::traits::repository_traits::{
    ClaimLedgerRepository, SlotInventoryRepository,
};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::eventbus::{DealEvent, EventBus};
use crate::services::codes;

/// One claim attempt, with the policy inputs the catalog collaborator
/// resolved for the offer.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub user_id: Uuid,
    pub offer_id: Uuid,
    pub slot_id: Uuid,
    pub policy: OfferPolicy,
}

/// Why a reservation was declined. These are business outcomes the caller
/// turns into user-facing messaging; none of them is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    OutOfStock,
    SlotNotLive,
    PerUserLimitReached,
    CooldownActive,
    GeofenceViolation,
}

#[derive(Debug, Clone)]
pub enum ReservationOutcome {
    Reserved(Claim),
    Rejected(RejectReason),
}

#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Cancelled(Claim),
    /// The claim had already reached a terminal state; nothing changed.
    AlreadyFinalized { status: ClaimStatus },
}

/// The only writer path that takes units out of a slot. Eligibility runs
/// first so a rejected request never moves the counter; the ledger insert
/// is compensated with a restock if it fails after the decrement.
pub struct ReservationService {
    inventory: Arc<dyn SlotInventoryRepository>,
    ledger: Arc<dyn ClaimLedgerRepository>,
    geofence: Arc<dyn GeofenceCheck>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
    config: EngineConfig,
}

impl ReservationService {
    pub fn new(
        inventory: Arc<dyn SlotInventoryRepository>,
        ledger: Arc<dyn ClaimLedgerRepository>,
        geofence: Arc<dyn GeofenceCheck>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inventory,
            ledger,
            geofence,
            clock,
            event_bus,
            config,
        }
    }

    pub async fn reserve(&self, req: ReserveRequest) -> Result<ReservationOutcome, Error> {
        let now = self.clock.now();

        if !self.geofence.allows(req.user_id, req.offer_id).await? {
            return Ok(ReservationOutcome::Rejected(RejectReason::GeofenceViolation));
        }

        let active = self
            .ledger
            .find_active_for_user(req.user_id, req.offer_id)
            .await?;
        if active.len() as i32 >= req.policy.per_user_limit {
            return Ok(ReservationOutcome::Rejected(
                RejectReason::PerUserLimitReached,
            ));
        }

        if let Some(cooldown_minutes) = req.policy.cooldown_minutes {
            if let Some(last) = self.ledger.last_claim_at(req.user_id, req.offer_id).await? {
                if last + chrono::Duration::minutes(cooldown_minutes) > now {
                    return Ok(ReservationOutcome::Rejected(RejectReason::CooldownActive));
                }
            }
        }

        let remaining = match self.inventory.try_reserve(req.slot_id, 1, now).await? {
            ReserveOutcome::Reserved { remaining } => remaining,
            ReserveOutcome::OutOfStock => {
                return Ok(ReservationOutcome::Rejected(RejectReason::OutOfStock));
            }
            ReserveOutcome::SlotNotLive => {
                return Ok(ReservationOutcome::Rejected(RejectReason::SlotNotLive));
            }
        };

        // The unit is ours from here on. Anything that fails before the
        // ledger insert commits must put it back.
        let pair = match codes::generate_code_pair(self.ledger.as_ref()).await {
            Ok(pair) => pair,
            Err(e) => {
                self.compensate(req.slot_id).await;
                return Err(e);
            }
        };

        let claim = Claim::new(
            req.user_id,
            req.offer_id,
            req.slot_id,
            pair.qr_token,
            pair.six_code,
            now,
            now + self.config.reservation_ttl(),
        );

        if let Err(e) = self.ledger.insert_claim(&claim).await {
            warn!(
                "Ledger insert failed for claim {} on slot {}; restocking: {:?}",
                claim.claim_id, req.slot_id, e
            );
            self.compensate(req.slot_id).await;
            return Err(e);
        }

        info!(
            "Reserved claim {} for user {} on slot {} (remaining={})",
            claim.claim_id, req.user_id, req.slot_id, remaining
        );

        self.event_bus
            .publish(DealEvent::ClaimReserved {
                claim_id: claim.claim_id,
                user_id: claim.user_id,
                offer_id: claim.offer_id,
                slot_id: claim.slot_id,
                expires_at: claim.expires_at,
            })
            .await;

        if remaining <= self.config.low_stock_threshold {
            self.event_bus
                .publish(DealEvent::SlotLowStock {
                    slot_id: req.slot_id,
                    offer_id: req.offer_id,
                    remaining,
                })
                .await;
        }

        Ok(ReservationOutcome::Reserved(claim))
    }

    /// Explicit user/merchant cancellation. Uses the same guarded
    /// transition + restock path as expiry, so a claim can never be both
    /// cancelled and redeemed, and a unit is returned at most once.
    pub async fn cancel(&self, claim_id: Uuid) -> Result<CancelOutcome, Error> {
        let now = self.clock.now();

        let outcome = self
            .ledger
            .transition(
                claim_id,
                ClaimStatus::Reserved,
                ClaimStatus::Cancelled,
                TransitionExtra::default(),
            )
            .await?;

        match outcome {
            TransitionOutcome::Applied(claim) => {
                if let Err(e) = self.inventory.restock(claim.slot_id, 1).await {
                    error!(
                        "Failed to restock slot {} after cancelling claim {}: {:?}",
                        claim.slot_id, claim_id, e
                    );
                }
                self.event_bus
                    .publish(DealEvent::ClaimCancelled {
                        claim_id,
                        slot_id: claim.slot_id,
                        cancelled_at: now,
                    })
                    .await;
                Ok(CancelOutcome::Cancelled(claim))
            }
            TransitionOutcome::Conflict { actual } => {
                Ok(CancelOutcome::AlreadyFinalized { status: actual })
            }
        }
    }

    /// Put a unit back after a post-decrement failure. Phantom oversell
    /// protection: losing this restock would silently shrink the slot.
    async fn compensate(&self, slot_id: Uuid) {
        if let Err(e) = self.inventory.restock(slot_id, 1).await {
            error!(
                "COMPENSATION FAILED: slot {} is short one unit: {:?}",
                slot_id, e
            );
        }
    }
}
