// File: dealdrop-core/tests/scenario_tests.rs
//
// End-to-end walk through a full flash-drop lifecycle: two users race for
// the last unit, the winner sits on the reservation until it lapses, the
// sweep returns the unit, and the loser claims and redeems it.

use chrono::{Duration, Utc};
use uuid::Uuid;

use dealdrop_common::models::claim::ClaimStatus;
use dealdrop_common::models::offer::OfferPolicy;
use dealdrop_common::traits::repository_traits::{
    ClaimLedgerRepository, SlotInventoryRepository,
};
use dealdrop_core::Clock;
use dealdrop_core::Error;
use dealdrop_core::services::{
    RedeemRejectReason, RedemptionOutcome, RejectReason, ReservationOutcome, ReserveRequest,
};
use dealdrop_core::test_utils::helpers::EngineHarness;

fn request(fx_slot: (Uuid, Uuid), user_id: Uuid) -> ReserveRequest {
    ReserveRequest {
        user_id,
        offer_id: fx_slot.1,
        slot_id: fx_slot.0,
        policy: OfferPolicy::default(),
    }
}

#[tokio::test]
async fn flash_drop_full_lifecycle() -> Result<(), Error> {
    let fx = EngineHarness::new(Utc::now());
    let slot = fx.seed_flash_slot(1).await?;
    let key = (slot.slot_id, slot.offer_id);

    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();

    // Both users go for the single unit.
    let (a, b) = tokio::join!(
        fx.reservations.reserve(request(key, user_a)),
        fx.reservations.reserve(request(key, user_b)),
    );
    let (a, b) = (a?, b?);

    let (winner_claim, loser_user) = match (a, b) {
        (ReservationOutcome::Reserved(claim), ReservationOutcome::Rejected(reason)) => {
            assert_eq!(reason, RejectReason::OutOfStock);
            (claim, user_b)
        }
        (ReservationOutcome::Rejected(reason), ReservationOutcome::Reserved(claim)) => {
            assert_eq!(reason, RejectReason::OutOfStock);
            (claim, user_a)
        }
        other => panic!("exactly one reservation should win, got {:?}", other),
    };

    let drained = fx.inventory.get_slot(slot.slot_id).await?.unwrap();
    assert_eq!(drained.qty_remaining, 0);

    // The winner never shows up. Their reservation lapses...
    fx.clock
        .advance(fx.config.reservation_ttl() + Duration::minutes(1));
    let summary = fx.reaper.sweep(fx.clock.now()).await?;
    assert_eq!(summary.expired, 1);
    assert_eq!(summary.restocked, 1);

    let expired = fx.ledger.get_claim(winner_claim.claim_id).await?.unwrap();
    assert_eq!(expired.status, ClaimStatus::Expired);

    // ...and the expired codes are dead.
    let dead_code = fx
        .redemptions
        .redeem(&winner_claim.six_code, Uuid::new_v4(), None)
        .await?;
    assert!(matches!(
        dead_code,
        RedemptionOutcome::Rejected(RedeemRejectReason::AlreadyUsed)
    ));

    // The loser now gets the restocked unit.
    let retry = fx.reservations.reserve(request(key, loser_user)).await?;
    let ReservationOutcome::Reserved(claim_b) = retry else {
        panic!("restocked unit should be claimable, got {:?}", retry);
    };

    // And redeems it, once.
    let staff = Uuid::new_v4();
    let redeemed = fx.redemptions.redeem(&claim_b.qr_token, staff, Some(42.0)).await?;
    let RedemptionOutcome::Redeemed(final_claim) = redeemed else {
        panic!("redemption should succeed, got {:?}", redeemed);
    };
    assert_eq!(final_claim.staff_id, Some(staff));

    let replay = fx.redemptions.redeem(&claim_b.qr_token, staff, None).await?;
    assert!(matches!(
        replay,
        RedemptionOutcome::Rejected(RedeemRejectReason::AlreadyUsed)
    ));

    // Inventory stays spent: redemption never restocks.
    let final_slot = fx.inventory.get_slot(slot.slot_id).await?.unwrap();
    assert_eq!(final_slot.qty_remaining, 0);
    Ok(())
}

#[tokio::test]
async fn per_user_limit_is_enforced_through_the_full_stack() -> Result<(), Error> {
    let fx = EngineHarness::new(Utc::now());
    let slot = fx.seed_flash_slot(10).await?;
    let key = (slot.slot_id, slot.offer_id);
    let user = Uuid::new_v4();

    let first = fx.reservations.reserve(request(key, user)).await?;
    let ReservationOutcome::Reserved(claim) = first else {
        panic!("first reserve should succeed");
    };

    let second = fx.reservations.reserve(request(key, user)).await?;
    assert!(matches!(
        second,
        ReservationOutcome::Rejected(RejectReason::PerUserLimitReached)
    ));

    // Redeemed claims still count toward the limit; only cancellation or
    // expiry frees the user's slot.
    fx.redemptions
        .redeem(&claim.six_code, Uuid::new_v4(), None)
        .await?;
    let third = fx.reservations.reserve(request(key, user)).await?;
    assert!(matches!(
        third,
        ReservationOutcome::Rejected(RejectReason::PerUserLimitReached)
    ));

    // A cancelled claim does free it.
    let other_user = Uuid::new_v4();
    let ReservationOutcome::Reserved(cancellable) =
        fx.reservations.reserve(request(key, other_user)).await?
    else {
        panic!("fresh user should be able to reserve");
    };
    fx.reservations.cancel(cancellable.claim_id).await?;
    let after_cancel = fx.reservations.reserve(request(key, other_user)).await?;
    assert!(matches!(after_cancel, ReservationOutcome::Reserved(_)));
    Ok(())
}
