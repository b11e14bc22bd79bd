// File: dealdrop-core/tests/reaper_tests.rs

use std::sync::Arc;
use chrono::{Duration, Utc};
use uuid::Uuid;

use dealdrop_common::models::claim::ClaimStatus;
use dealdrop_common::models::offer::OfferPolicy;
use dealdrop_common::traits::repository_traits::{
    ClaimLedgerRepository, SlotInventoryRepository,
};
use dealdrop_core::services::{RedemptionOutcome, ReservationOutcome, ReserveRequest};
use dealdrop_core::tasks::{ExpiryReaper, SweepSummary, spawn_expiry_reaper};
use dealdrop_core::test_utils::helpers::EngineHarness;
use dealdrop_core::{Clock, EngineConfig, Error};

async fn reserve_one(fx: &EngineHarness, slot_id: Uuid, offer_id: Uuid) -> Result<Uuid, Error> {
    let outcome = fx
        .reservations
        .reserve(ReserveRequest {
            user_id: Uuid::new_v4(),
            offer_id,
            slot_id,
            policy: OfferPolicy::default(),
        })
        .await?;
    match outcome {
        ReservationOutcome::Reserved(claim) => Ok(claim.claim_id),
        other => panic!("expected a reservation, got {:?}", other),
    }
}

#[tokio::test]
async fn sweep_expires_overdue_claims_and_restocks() -> Result<(), Error> {
    let fx = EngineHarness::new(Utc::now());
    let slot = fx.seed_flash_slot(3).await?;

    let claim_id = reserve_one(&fx, slot.slot_id, slot.offer_id).await?;
    let _second = reserve_one(&fx, slot.slot_id, slot.offer_id).await?;

    // only the TTL window passes, not the slot window
    fx.clock
        .advance(fx.config.reservation_ttl() + Duration::minutes(1));

    let summary = fx.reaper.sweep(fx.clock.now()).await?;
    assert_eq!(
        summary,
        SweepSummary {
            scanned: 2,
            expired: 2,
            restocked: 2,
        }
    );

    let claim = fx.ledger.get_claim(claim_id).await?.unwrap();
    assert_eq!(claim.status, ClaimStatus::Expired);

    let final_slot = fx.inventory.get_slot(slot.slot_id).await?.unwrap();
    assert_eq!(final_slot.qty_remaining, 3);

    // nothing left to do: the next sweep is a no-op
    let again = fx.reaper.sweep(fx.clock.now()).await?;
    assert_eq!(again, SweepSummary::default());
    Ok(())
}

#[tokio::test]
async fn overlapping_sweeps_restock_a_claim_at_most_once() -> Result<(), Error> {
    let fx = Arc::new(EngineHarness::new(Utc::now()));
    let slot = fx.seed_flash_slot(1).await?;
    reserve_one(&fx, slot.slot_id, slot.offer_id).await?;

    fx.clock
        .advance(fx.config.reservation_ttl() + Duration::minutes(1));
    let now = fx.clock.now();

    let (a, b) = tokio::join!(fx.reaper.sweep(now), fx.reaper.sweep(now));
    let (a, b) = (a?, b?);

    // both sweeps may see the claim, but only one wins the transition
    assert_eq!(a.expired + b.expired, 1);
    assert_eq!(a.restocked + b.restocked, 1);

    let final_slot = fx.inventory.get_slot(slot.slot_id).await?.unwrap();
    assert_eq!(final_slot.qty_remaining, 1);
    Ok(())
}

#[tokio::test]
async fn redemption_racing_a_sweep_has_exactly_one_winner() -> Result<(), Error> {
    // Run the race repeatedly; both interleavings must leave consistent
    // state.
    for _ in 0..20 {
        let fx = Arc::new(EngineHarness::new(Utc::now()));
        let slot = fx.seed_flash_slot(1).await?;
        let claim_id = reserve_one(&fx, slot.slot_id, slot.offer_id).await?;
        let claim = fx.ledger.get_claim(claim_id).await?.unwrap();

        // The sweep is told the claim is overdue while the redemption's
        // clock still finds it fresh, so both sides race for the guarded
        // transition.
        let sweep_now = claim.expires_at + Duration::seconds(1);

        let sweep_fx = fx.clone();
        let sweep = tokio::spawn(async move { sweep_fx.reaper.sweep(sweep_now).await.unwrap() });
        let redeem_fx = fx.clone();
        let six_code = claim.six_code.clone();
        let redeem = tokio::spawn(async move {
            redeem_fx
                .redemptions
                .redeem(&six_code, Uuid::new_v4(), None)
                .await
                .unwrap()
        });

        let summary = sweep.await.unwrap();
        let redemption = redeem.await.unwrap();

        let final_claim = fx.ledger.get_claim(claim_id).await?.unwrap();
        let final_slot = fx.inventory.get_slot(slot.slot_id).await?.unwrap();

        match final_claim.status {
            ClaimStatus::Redeemed => {
                assert!(matches!(redemption, RedemptionOutcome::Redeemed(_)));
                assert_eq!(summary.restocked, 0);
                assert_eq!(final_slot.qty_remaining, 0);
            }
            ClaimStatus::Expired => {
                assert!(matches!(redemption, RedemptionOutcome::Rejected(_)));
                assert_eq!(summary.restocked, 1);
                assert_eq!(final_slot.qty_remaining, 1);
            }
            other => panic!("claim ended in impossible state {:?}", other),
        }
    }
    Ok(())
}

#[tokio::test]
async fn sweep_pages_are_bounded_and_drain_across_sweeps() -> Result<(), Error> {
    let config = EngineConfig {
        sweep_page_size: 2,
        ..Default::default()
    };
    let fx = EngineHarness::with_config(Utc::now(), config);
    let slot = fx.seed_flash_slot(5).await?;

    for _ in 0..5 {
        reserve_one(&fx, slot.slot_id, slot.offer_id).await?;
    }
    fx.clock
        .advance(fx.config.reservation_ttl() + Duration::minutes(1));

    let first = fx.reaper.sweep(fx.clock.now()).await?;
    assert_eq!(first.expired, 2);
    let second = fx.reaper.sweep(fx.clock.now()).await?;
    assert_eq!(second.expired, 2);
    let third = fx.reaper.sweep(fx.clock.now()).await?;
    assert_eq!(third.expired, 1);

    let final_slot = fx.inventory.get_slot(slot.slot_id).await?.unwrap();
    assert_eq!(final_slot.qty_remaining, 5);
    Ok(())
}

#[tokio::test]
async fn spawned_reaper_sweeps_until_shutdown() -> Result<(), Error> {
    let fx = EngineHarness::new(Utc::now());
    let slot = fx.seed_flash_slot(1).await?;
    reserve_one(&fx, slot.slot_id, slot.offer_id).await?;
    fx.clock
        .advance(fx.config.reservation_ttl() + Duration::minutes(1));

    let reaper = Arc::new(ExpiryReaper::new(
        fx.inventory.clone(),
        fx.ledger.clone(),
        fx.event_bus.clone(),
        fx.config.sweep_page_size,
    ));
    // hand the loop the harness clock, which already sits past the TTL
    let handle = spawn_expiry_reaper(
        reaper,
        fx.clock.clone(),
        std::time::Duration::from_millis(20),
        fx.event_bus.shutdown_rx.clone(),
    );

    // give the loop a couple of ticks to do its work
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;

    let final_slot = fx.inventory.get_slot(slot.slot_id).await?.unwrap();
    assert_eq!(final_slot.qty_remaining, 1);

    fx.event_bus.shutdown();
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("reaper should exit after shutdown")
        .expect("reaper task should not panic");
    Ok(())
}

/// Ledger wrapper that refuses to transition one poisoned claim, standing
/// in for a transient store failure on a single row.
struct PoisonedLedger {
    inner: Arc<dealdrop_core::repositories::memory::InMemoryClaimLedgerRepository>,
    poisoned: Uuid,
}

#[async_trait::async_trait]
impl dealdrop_common::traits::repository_traits::ClaimLedgerRepository for PoisonedLedger {
    async fn insert_claim(
        &self,
        claim: &dealdrop_common::models::claim::Claim,
    ) -> Result<(), Error> {
        self.inner.insert_claim(claim).await
    }
    async fn get_claim(
        &self,
        claim_id: Uuid,
    ) -> Result<Option<dealdrop_common::models::claim::Claim>, Error> {
        self.inner.get_claim(claim_id).await
    }
    async fn find_by_code(
        &self,
        code: &str,
    ) -> Result<Option<dealdrop_common::models::claim::Claim>, Error> {
        self.inner.find_by_code(code).await
    }
    async fn code_in_use(&self, qr_token: &str, six_code: &str) -> Result<bool, Error> {
        self.inner.code_in_use(qr_token, six_code).await
    }
    async fn transition(
        &self,
        claim_id: Uuid,
        from: ClaimStatus,
        to: ClaimStatus,
        extra: dealdrop_common::models::claim::TransitionExtra,
    ) -> Result<dealdrop_common::models::claim::TransitionOutcome, Error> {
        if claim_id == self.poisoned {
            return Err(Error::Parse("transient row failure".to_string()));
        }
        self.inner.transition(claim_id, from, to, extra).await
    }
    async fn find_overdue(
        &self,
        now: chrono::DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<dealdrop_common::models::claim::Claim>, Error> {
        self.inner.find_overdue(now, limit).await
    }
    async fn find_active_for_user(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
    ) -> Result<Vec<dealdrop_common::models::claim::Claim>, Error> {
        self.inner.find_active_for_user(user_id, offer_id).await
    }
    async fn last_claim_at(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
    ) -> Result<Option<chrono::DateTime<Utc>>, Error> {
        self.inner.last_claim_at(user_id, offer_id).await
    }
}

#[tokio::test]
async fn one_bad_claim_does_not_abort_the_sweep() -> Result<(), Error> {
    let fx = EngineHarness::new(Utc::now());
    let slot = fx.seed_flash_slot(3).await?;

    let poisoned = reserve_one(&fx, slot.slot_id, slot.offer_id).await?;
    let _healthy_a = reserve_one(&fx, slot.slot_id, slot.offer_id).await?;
    let _healthy_b = reserve_one(&fx, slot.slot_id, slot.offer_id).await?;
    fx.clock
        .advance(fx.config.reservation_ttl() + Duration::minutes(1));

    let reaper = ExpiryReaper::new(
        fx.inventory.clone(),
        Arc::new(PoisonedLedger {
            inner: fx.ledger.clone(),
            poisoned,
        }),
        fx.event_bus.clone(),
        fx.config.sweep_page_size,
    );

    let summary = reaper.sweep(fx.clock.now()).await?;
    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.expired, 2);
    assert_eq!(summary.restocked, 2);

    // the poisoned claim stays Reserved, ready for the next sweep
    let stuck = fx.ledger.get_claim(poisoned).await?.unwrap();
    assert_eq!(stuck.status, ClaimStatus::Reserved);
    Ok(())
}
