// File: dealdrop-core/src/services/codes.rs

use rand::Rng;
use uuid::Uuid;
use dealdrop_common::error::Error;
use dealdrop_common::traits::repository_traits::ClaimLedgerRepository;

/// A freshly generated, ledger-unique pair of redemption codes.
#[derive(Debug, Clone)]
pub struct CodePair {
    pub qr_token: String,
    pub six_code: String,
}

/// Collision retries before giving up. Collisions are vanishingly rare for
/// the QR token; the six-digit code space is small enough that busy venues
/// can occasionally hit one.
const MAX_ATTEMPTS: u32 = 8;

/// Generate a QR token and six-digit code not yet present in the ledger.
pub async fn generate_code_pair(
    ledger: &dyn ClaimLedgerRepository,
) -> Result<CodePair, Error> {
    for _ in 0..MAX_ATTEMPTS {
        let qr_token = Uuid::new_v4().simple().to_string();
        let six_code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));

        if !ledger.code_in_use(&qr_token, &six_code).await? {
            return Ok(CodePair { qr_token, six_code });
        }
    }
    Err(Error::CodeGeneration(format!(
        "no unique code pair after {} attempts",
        MAX_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use dealdrop_common::models::claim::{Claim, ClaimStatus, TransitionExtra, TransitionOutcome};
    use crate::repositories::memory::InMemoryClaimLedgerRepository;

    /// Ledger stub that reports code collisions for the first `collisions`
    /// checks, then stops colliding.
    struct CollidingLedger {
        collisions: u32,
        checks: AtomicU32,
    }

    #[async_trait]
    impl ClaimLedgerRepository for CollidingLedger {
        async fn insert_claim(&self, _claim: &Claim) -> Result<(), Error> {
            unimplemented!()
        }
        async fn get_claim(&self, _claim_id: uuid::Uuid) -> Result<Option<Claim>, Error> {
            unimplemented!()
        }
        async fn find_by_code(&self, _code: &str) -> Result<Option<Claim>, Error> {
            unimplemented!()
        }
        async fn code_in_use(&self, _qr: &str, _six: &str) -> Result<bool, Error> {
            let seen = self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(seen < self.collisions)
        }
        async fn transition(
            &self,
            _claim_id: uuid::Uuid,
            _from: ClaimStatus,
            _to: ClaimStatus,
            _extra: TransitionExtra,
        ) -> Result<TransitionOutcome, Error> {
            unimplemented!()
        }
        async fn find_overdue(
            &self,
            _now: DateTime<Utc>,
            _limit: i64,
        ) -> Result<Vec<Claim>, Error> {
            unimplemented!()
        }
        async fn find_active_for_user(
            &self,
            _user_id: uuid::Uuid,
            _offer_id: uuid::Uuid,
        ) -> Result<Vec<Claim>, Error> {
            unimplemented!()
        }
        async fn last_claim_at(
            &self,
            _user_id: uuid::Uuid,
            _offer_id: uuid::Uuid,
        ) -> Result<Option<DateTime<Utc>>, Error> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn codes_have_the_expected_shape() {
        let ledger = InMemoryClaimLedgerRepository::new();
        let pair = generate_code_pair(&ledger).await.unwrap();

        assert_eq!(pair.qr_token.len(), 32);
        assert_eq!(pair.six_code.len(), 6);
        assert!(pair.six_code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn generation_retries_past_collisions() {
        let ledger = CollidingLedger {
            collisions: 3,
            checks: AtomicU32::new(0),
        };
        let pair = generate_code_pair(&ledger).await;
        assert!(pair.is_ok());
        assert_eq!(ledger.checks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn generation_gives_up_after_retry_budget() {
        let ledger = CollidingLedger {
            collisions: u32::MAX,
            checks: AtomicU32::new(0),
        };
        let err = generate_code_pair(&ledger).await.unwrap_err();
        assert!(matches!(err, Error::CodeGeneration(_)));
    }
}
