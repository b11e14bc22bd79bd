// File: dealdrop-core/src/repositories/memory/claim_ledger.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;
use dealdrop_common::error::Error;
use dealdrop_common::models::claim::{Claim, ClaimStatus, TransitionExtra, TransitionOutcome};
use dealdrop_common::traits::repository_traits::ClaimLedgerRepository;

#[derive(Default)]
pub struct InMemoryClaimLedgerRepository {
    claims: DashMap<Uuid, Claim>,
}

impl InMemoryClaimLedgerRepository {
    pub fn new() -> Self {
        Self {
            claims: DashMap::new(),
        }
    }
}

#[async_trait]
impl ClaimLedgerRepository for InMemoryClaimLedgerRepository {
    async fn insert_claim(&self, claim: &Claim) -> Result<(), Error> {
        if self.claims.contains_key(&claim.claim_id) {
            return Err(Error::Parse(format!(
                "claim {} already exists",
                claim.claim_id
            )));
        }
        if self.code_in_use(&claim.qr_token, &claim.six_code).await? {
            return Err(Error::Parse(format!(
                "redemption code already in use for claim {}",
                claim.claim_id
            )));
        }
        self.claims.insert(claim.claim_id, claim.clone());
        Ok(())
    }

    async fn get_claim(&self, claim_id: Uuid) -> Result<Option<Claim>, Error> {
        Ok(self.claims.get(&claim_id).map(|c| c.value().clone()))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Claim>, Error> {
        Ok(self
            .claims
            .iter()
            .find(|c| c.qr_token == code || c.six_code == code)
            .map(|c| c.value().clone()))
    }

    async fn code_in_use(&self, qr_token: &str, six_code: &str) -> Result<bool, Error> {
        Ok(self
            .claims
            .iter()
            .any(|c| c.qr_token == qr_token || c.six_code == six_code))
    }

    async fn transition(
        &self,
        claim_id: Uuid,
        from: ClaimStatus,
        to: ClaimStatus,
        extra: TransitionExtra,
    ) -> Result<TransitionOutcome, Error> {
        // get_mut holds the entry's shard lock for the whole check-and-set,
        // which is what makes this a CAS.
        let Some(mut entry) = self.claims.get_mut(&claim_id) else {
            return Err(Error::NotFound(format!("claim {}", claim_id)));
        };

        if entry.status != from {
            return Ok(TransitionOutcome::Conflict {
                actual: entry.status,
            });
        }

        entry.status = to;
        if extra.redeemed_at.is_some() {
            entry.redeemed_at = extra.redeemed_at;
        }
        if extra.staff_id.is_some() {
            entry.staff_id = extra.staff_id;
        }
        if extra.basket_total.is_some() {
            entry.basket_total = extra.basket_total;
        }
        Ok(TransitionOutcome::Applied(entry.clone()))
    }

    async fn find_overdue(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Claim>, Error> {
        let mut overdue: Vec<Claim> = self
            .claims
            .iter()
            .filter(|c| c.is_overdue(now))
            .map(|c| c.value().clone())
            .collect();
        overdue.sort_by_key(|c| c.expires_at);
        overdue.truncate(limit.max(0) as usize);
        Ok(overdue)
    }

    async fn find_active_for_user(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
    ) -> Result<Vec<Claim>, Error> {
        Ok(self
            .claims
            .iter()
            .filter(|c| {
                c.user_id == user_id
                    && c.offer_id == offer_id
                    && matches!(c.status, ClaimStatus::Reserved | ClaimStatus::Redeemed)
            })
            .map(|c| c.value().clone())
            .collect())
    }

    async fn last_claim_at(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self
            .claims
            .iter()
            .filter(|c| {
                c.user_id == user_id
                    && c.offer_id == offer_id
                    && c.status != ClaimStatus::Cancelled
            })
            .map(|c| c.reserved_at)
            .max())
    }
}
