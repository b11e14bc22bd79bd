// File: dealdrop-common/src/traits/repository_traits.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::error::Error;
use crate::models::claim::{Claim, ClaimStatus, TransitionExtra, TransitionOutcome};
use crate::models::slot::{OfferSlot, ReserveOutcome};

/// Owns `qty_remaining` and the merchant-controlled slot flags. All
/// mutations are atomic per slot; operations on distinct slots never
/// contend with each other.
#[async_trait]
pub trait SlotInventoryRepository: Send + Sync {
    async fn create_slot(&self, slot: &OfferSlot) -> Result<(), Error>;
    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<OfferSlot>, Error>;

    /// Atomically take `quantity` units from the slot if it is live at `now`
    /// and its claimable ceiling (drip-aware) covers the request. Two
    /// concurrent calls for the last unit must not both succeed.
    async fn try_reserve(
        &self,
        slot_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, Error>;

    /// Atomically return `quantity` units, clamped so `qty_remaining` never
    /// exceeds `qty_total`. Returns the new remaining count.
    async fn restock(&self, slot_id: Uuid, quantity: i32) -> Result<i32, Error>;

    /// Units claimable right now: 0 unless live; for drip slots the released
    /// tranche minus what was already claimed, capped by `qty_remaining`.
    async fn current_claimable(&self, slot_id: Uuid, now: DateTime<Utc>) -> Result<i32, Error>;

    async fn set_paused(&self, slot_id: Uuid, paused: bool) -> Result<(), Error>;
    async fn end_slot(&self, slot_id: Uuid) -> Result<(), Error>;

    /// Slots whose remaining quantity has dropped to `threshold` or below,
    /// for merchant low-stock alerts.
    async fn list_low_stock(&self, threshold: i32) -> Result<Vec<OfferSlot>, Error>;
}

/// System of record for claims. The guarded `transition` compare-and-set is
/// the sole mutation path for `status`; that is what makes the
/// redemption-vs-expiry race safe.
#[async_trait]
pub trait ClaimLedgerRepository: Send + Sync {
    async fn insert_claim(&self, claim: &Claim) -> Result<(), Error>;
    async fn get_claim(&self, claim_id: Uuid) -> Result<Option<Claim>, Error>;

    /// Look up a claim by either of its redemption codes.
    async fn find_by_code(&self, code: &str) -> Result<Option<Claim>, Error>;

    /// Whether either code is already attached to some claim. Used for
    /// collision checks at generation time.
    async fn code_in_use(&self, qr_token: &str, six_code: &str) -> Result<bool, Error>;

    /// Compare-and-set: succeeds only if the claim's current status equals
    /// `from`. On conflict the actual status is reported and nothing is
    /// written.
    async fn transition(
        &self,
        claim_id: Uuid,
        from: ClaimStatus,
        to: ClaimStatus,
        extra: TransitionExtra,
    ) -> Result<TransitionOutcome, Error>;

    /// Reserved claims with `expires_at < now`, oldest first, at most
    /// `limit` rows. The bounded page keeps reaper sweeps from starving
    /// reservation traffic.
    async fn find_overdue(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Claim>, Error>;

    /// The user's claims against an offer that still count toward the
    /// per-user limit: reserved and redeemed ones. Expiry and cancellation
    /// free the user's slot; redemption does not.
    async fn find_active_for_user(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
    ) -> Result<Vec<Claim>, Error>;

    /// When the user last reserved against this offer (cancelled claims do
    /// not count). Drives the cooldown check.
    async fn last_claim_at(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, Error>;
}
