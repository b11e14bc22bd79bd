// File: dealdrop-core/src/drip.rs
//
// Drip release is a pure function of elapsed time, never a stored counter:
// recomputing from `now` is self-healing, so there is no periodic release
// job that can fall behind, double-release, or skip a tick.

use chrono::{DateTime, Utc};
use dealdrop_common::models::slot::{OfferSlot, SlotMode};

/// Cumulative quantity released as of `now`.
///
/// For drip slots: `min(qty_total, drip_qty * floor(elapsed / cadence))`,
/// floored at 0 before `starts_at`. Flash slots release everything at once.
/// Monotonically non-decreasing in `now`.
pub fn released(slot: &OfferSlot, now: DateTime<Utc>) -> i32 {
    match slot.mode {
        SlotMode::Flash => slot.qty_total,
        SlotMode::Drip => {
            let (Some(every), Some(qty)) = (slot.drip_every_minutes, slot.drip_qty) else {
                return 0;
            };
            if every <= 0 || qty <= 0 || now < slot.starts_at {
                return 0;
            }
            let elapsed_minutes = (now - slot.starts_at).num_minutes();
            let tranches = elapsed_minutes / i64::from(every);
            i64::from(qty)
                .saturating_mul(tranches)
                .min(i64::from(slot.qty_total)) as i32
        }
    }
}

/// Units claimable from the slot right now, ignoring liveness: the released
/// tranche minus what was already claimed, capped by `qty_remaining`.
/// Callers gate on the slot state separately.
pub fn claimable(slot: &OfferSlot, now: DateTime<Utc>) -> i32 {
    let unclaimed_release = released(slot, now) - slot.qty_claimed();
    unclaimed_release.clamp(0, slot.qty_remaining)
}
