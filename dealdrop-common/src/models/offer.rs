// File: dealdrop-common/src/models/offer.rs

use serde::{Deserialize, Serialize};

/// Per-offer eligibility knobs, supplied by the catalog collaborator with
/// each reservation request. The engine enforces these against its own
/// ledger; it does not store or manage offers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct OfferPolicy {
    /// Maximum simultaneous non-terminal claims a user may hold against the
    /// offer. `1` means one active claim at a time.
    pub per_user_limit: i32,
    /// Minimum gap since the user's previous (non-cancelled) claim on this
    /// offer before a new one is allowed.
    pub cooldown_minutes: Option<i64>,
}

impl Default for OfferPolicy {
    fn default() -> Self {
        Self {
            per_user_limit: 1,
            cooldown_minutes: None,
        }
    }
}
