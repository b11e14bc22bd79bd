// File: dealdrop-common/src/models/mod.rs
pub mod claim;
pub mod offer;
pub mod slot;

pub use claim::{Claim, ClaimStatus, TransitionExtra, TransitionOutcome};
pub use offer::OfferPolicy;
pub use slot::{OfferSlot, ReserveOutcome, SlotMode, SlotState};
