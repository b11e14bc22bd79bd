// File: dealdrop-common/src/models/claim.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a claim. `Reserved` is the only non-terminal state;
/// the others never revert.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum ClaimStatus {
    Reserved,
    Redeemed,
    Expired,
    Cancelled,
}

impl ClaimStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClaimStatus::Reserved)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimStatus::Reserved => write!(f, "reserved"),
            ClaimStatus::Redeemed => write!(f, "redeemed"),
            ClaimStatus::Expired => write!(f, "expired"),
            ClaimStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ClaimStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reserved" => Ok(ClaimStatus::Reserved),
            "redeemed" => Ok(ClaimStatus::Redeemed),
            "expired" => Ok(ClaimStatus::Expired),
            "cancelled" => Ok(ClaimStatus::Cancelled),
            _ => Err(format!("Unknown claim status: {}", s)),
        }
    }
}

/// One user's hold on a unit of a slot, from reservation until a terminal
/// state. The redemption codes are generated once at reservation and are
/// single-use by construction: a claim whose status has left `Reserved` can
/// never be redeemed again.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Claim {
    pub claim_id: Uuid,
    pub user_id: Uuid,
    pub offer_id: Uuid,
    pub slot_id: Uuid,
    pub status: ClaimStatus,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
    /// Opaque token rendered as a QR code by the presentation layer.
    pub qr_token: String,
    /// Six-digit fallback code for manual staff entry.
    pub six_code: String,
    /// Staff member who completed the redemption, if any.
    pub staff_id: Option<Uuid>,
    /// Informational basket value recorded at redemption.
    pub basket_total: Option<f64>,
}

impl Claim {
    pub fn new(
        user_id: Uuid,
        offer_id: Uuid,
        slot_id: Uuid,
        qr_token: String,
        six_code: String,
        reserved_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            claim_id: Uuid::new_v4(),
            user_id,
            offer_id,
            slot_id,
            status: ClaimStatus::Reserved,
            reserved_at,
            expires_at,
            redeemed_at: None,
            qr_token,
            six_code,
            staff_id: None,
            basket_total: None,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ClaimStatus::Reserved && self.expires_at < now
    }
}

/// Optional fields applied together with a successful status transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionExtra {
    pub redeemed_at: Option<DateTime<Utc>>,
    pub staff_id: Option<Uuid>,
    pub basket_total: Option<f64>,
}

/// Result of a guarded compare-and-set on a claim's status.
///
/// A `Conflict` is not an error: it is how a lost race (redeem vs expire,
/// overlapping sweeps) resolves. The loser observes the actual status and
/// reports a terminal-state rejection.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied(Claim),
    Conflict { actual: ClaimStatus },
}
