// File: dealdrop-core/src/repositories/postgres/claim_ledger.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;
use dealdrop_common::error::Error;
use dealdrop_common::models::claim::{Claim, ClaimStatus, TransitionExtra, TransitionOutcome};
use dealdrop_common::traits::repository_traits::ClaimLedgerRepository;

pub struct PostgresClaimLedgerRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresClaimLedgerRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const CLAIM_COLUMNS: &str = r#"
    claim_id,
    user_id,
    offer_id,
    slot_id,
    status,
    reserved_at,
    expires_at,
    redeemed_at,
    qr_token,
    six_code,
    staff_id,
    basket_total
"#;

fn row_to_claim(r: &sqlx::postgres::PgRow) -> Result<Claim, Error> {
    Ok(Claim {
        claim_id: r.try_get("claim_id")?,
        user_id: r.try_get("user_id")?,
        offer_id: r.try_get("offer_id")?,
        slot_id: r.try_get("slot_id")?,
        status: r.try_get("status")?,
        reserved_at: r.try_get("reserved_at")?,
        expires_at: r.try_get("expires_at")?,
        redeemed_at: r.try_get("redeemed_at")?,
        qr_token: r.try_get("qr_token")?,
        six_code: r.try_get("six_code")?,
        staff_id: r.try_get("staff_id")?,
        basket_total: r.try_get("basket_total")?,
    })
}

#[async_trait]
impl ClaimLedgerRepository for PostgresClaimLedgerRepository {
    async fn insert_claim(&self, claim: &Claim) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO claims (
                claim_id,
                user_id,
                offer_id,
                slot_id,
                status,
                reserved_at,
                expires_at,
                redeemed_at,
                qr_token,
                six_code,
                staff_id,
                basket_total
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
            "#,
        )
        .bind(claim.claim_id)
        .bind(claim.user_id)
        .bind(claim.offer_id)
        .bind(claim.slot_id)
        .bind(claim.status)
        .bind(claim.reserved_at)
        .bind(claim.expires_at)
        .bind(claim.redeemed_at)
        .bind(&claim.qr_token)
        .bind(&claim.six_code)
        .bind(claim.staff_id)
        .bind(claim.basket_total)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_claim(&self, claim_id: Uuid) -> Result<Option<Claim>, Error> {
        let row_opt = sqlx::query(&format!(
            "SELECT {} FROM claims WHERE claim_id = $1",
            CLAIM_COLUMNS
        ))
        .bind(claim_id)
        .fetch_optional(&self.pool)
        .await?;

        row_opt.as_ref().map(row_to_claim).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Claim>, Error> {
        let row_opt = sqlx::query(&format!(
            "SELECT {} FROM claims WHERE qr_token = $1 OR six_code = $1",
            CLAIM_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row_opt.as_ref().map(row_to_claim).transpose()
    }

    async fn code_in_use(&self, qr_token: &str, six_code: &str) -> Result<bool, Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM claims
                WHERE qr_token = $1 OR six_code = $2
            )
            "#,
        )
        .bind(qr_token)
        .bind(six_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn transition(
        &self,
        claim_id: Uuid,
        from: ClaimStatus,
        to: ClaimStatus,
        extra: TransitionExtra,
    ) -> Result<TransitionOutcome, Error> {
        // Guarded compare-and-set: the WHERE clause only matches while the
        // claim still holds `from`, so exactly one of several racing
        // transitions can ever apply.
        let row_opt = sqlx::query(&format!(
            r#"
            UPDATE claims
            SET status = $3,
                redeemed_at = COALESCE($4, redeemed_at),
                staff_id = COALESCE($5, staff_id),
                basket_total = COALESCE($6, basket_total)
            WHERE claim_id = $1 AND status = $2
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        ))
        .bind(claim_id)
        .bind(from)
        .bind(to)
        .bind(extra.redeemed_at)
        .bind(extra.staff_id)
        .bind(extra.basket_total)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row_opt {
            return Ok(TransitionOutcome::Applied(row_to_claim(&row)?));
        }

        let actual = sqlx::query_scalar::<_, ClaimStatus>(
            "SELECT status FROM claims WHERE claim_id = $1",
        )
        .bind(claim_id)
        .fetch_optional(&self.pool)
        .await?;

        match actual {
            Some(actual) => Ok(TransitionOutcome::Conflict { actual }),
            None => Err(Error::NotFound(format!("claim {}", claim_id))),
        }
    }

    async fn find_overdue(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Claim>, Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM claims
            WHERE status = $1
              AND expires_at < $2
            ORDER BY expires_at ASC
            LIMIT $3
            "#,
            CLAIM_COLUMNS
        ))
        .bind(ClaimStatus::Reserved)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_claim).collect()
    }

    async fn find_active_for_user(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
    ) -> Result<Vec<Claim>, Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM claims
            WHERE user_id = $1
              AND offer_id = $2
              AND status IN ($3, $4)
            ORDER BY reserved_at DESC
            "#,
            CLAIM_COLUMNS
        ))
        .bind(user_id)
        .bind(offer_id)
        .bind(ClaimStatus::Reserved)
        .bind(ClaimStatus::Redeemed)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_claim).collect()
    }

    async fn last_claim_at(
        &self,
        user_id: Uuid,
        offer_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let last = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT MAX(reserved_at)
            FROM claims
            WHERE user_id = $1
              AND offer_id = $2
              AND status <> $3
            "#,
        )
        .bind(user_id)
        .bind(offer_id)
        .bind(ClaimStatus::Cancelled)
        .fetch_one(&self.pool)
        .await?;
        Ok(last)
    }
}
