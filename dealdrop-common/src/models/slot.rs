// File: dealdrop-common/src/models/slot.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a slot's quantity becomes claimable once the slot is live.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum SlotMode {
    /// The full quantity is claimable the moment the slot goes live.
    Flash,
    /// Quantity is released in fixed tranches on a fixed cadence.
    Drip,
}

impl fmt::Display for SlotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotMode::Flash => write!(f, "flash"),
            SlotMode::Drip => write!(f, "drip"),
        }
    }
}

impl FromStr for SlotMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flash" => Ok(SlotMode::Flash),
            "drip" => Ok(SlotMode::Drip),
            _ => Err(format!("Unknown slot mode: {}", s)),
        }
    }
}

/// Where a slot currently sits in its lifecycle.
///
/// Never stored: it is computed from the slot's time window plus the two
/// merchant-controlled flags (`is_paused`, `is_ended`), so there is no
/// transition job that can run late or be skipped.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SlotState {
    Scheduled,
    Live,
    Paused,
    Ended,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Scheduled => write!(f, "scheduled"),
            SlotState::Live => write!(f, "live"),
            SlotState::Paused => write!(f, "paused"),
            SlotState::Ended => write!(f, "ended"),
        }
    }
}

/// One claimable inventory window for an offer.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct OfferSlot {
    pub slot_id: Uuid,
    pub offer_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Immutable after creation.
    pub qty_total: i32,
    /// Invariant: `0 <= qty_remaining <= qty_total`. Only the inventory
    /// repository mutates this, through its atomic operations.
    pub qty_remaining: i32,
    pub mode: SlotMode,
    /// Set (and positive) for drip slots.
    pub drip_every_minutes: Option<i32>,
    /// Set for drip slots; at most `qty_total`.
    pub drip_qty: Option<i32>,
    pub is_paused: bool,
    pub is_ended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OfferSlot {
    pub fn new_flash(
        offer_id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        qty_total: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            slot_id: Uuid::new_v4(),
            offer_id,
            starts_at,
            ends_at,
            qty_total,
            qty_remaining: qty_total,
            mode: SlotMode::Flash,
            drip_every_minutes: None,
            drip_qty: None,
            is_paused: false,
            is_ended: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_drip(
        offer_id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        qty_total: i32,
        drip_every_minutes: i32,
        drip_qty: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            slot_id: Uuid::new_v4(),
            offer_id,
            starts_at,
            ends_at,
            qty_total,
            qty_remaining: qty_total,
            mode: SlotMode::Drip,
            drip_every_minutes: Some(drip_every_minutes),
            drip_qty: Some(drip_qty),
            is_paused: false,
            is_ended: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lifecycle state as of `now`. Merchant force-end wins over everything,
    /// then the time window, then pause.
    pub fn state_at(&self, now: DateTime<Utc>) -> SlotState {
        if self.is_ended || now >= self.ends_at {
            SlotState::Ended
        } else if self.is_paused {
            SlotState::Paused
        } else if now < self.starts_at {
            SlotState::Scheduled
        } else {
            SlotState::Live
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == SlotState::Live
    }

    /// Units already committed to claims (reserved or redeemed, and not yet
    /// returned by expiry or cancellation).
    pub fn qty_claimed(&self) -> i32 {
        self.qty_total - self.qty_remaining
    }
}

/// Result of an atomic reservation attempt against one slot.
///
/// `OutOfStock` is an expected, frequent outcome under contention, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved { remaining: i32 },
    OutOfStock,
    SlotNotLive,
}
