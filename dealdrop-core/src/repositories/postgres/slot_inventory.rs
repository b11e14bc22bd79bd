// File: dealdrop-core/src/repositories/postgres/slot_inventory.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;
use dealdrop_common::error::Error;
use dealdrop_common::models::slot::{OfferSlot, ReserveOutcome};
use dealdrop_common::traits::repository_traits::SlotInventoryRepository;
use crate::drip;

pub struct PostgresSlotInventoryRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresSlotInventoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_slot(&self, slot_id: Uuid) -> Result<Option<OfferSlot>, Error> {
        let slot = sqlx::query_as::<_, OfferSlot>(
            r#"
            SELECT
                slot_id,
                offer_id,
                starts_at,
                ends_at,
                qty_total,
                qty_remaining,
                mode,
                drip_every_minutes,
                drip_qty,
                is_paused,
                is_ended,
                created_at,
                updated_at
            FROM offer_slots
            WHERE slot_id = $1
            "#,
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(slot)
    }
}

#[async_trait]
impl SlotInventoryRepository for PostgresSlotInventoryRepository {
    async fn create_slot(&self, slot: &OfferSlot) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO offer_slots (
                slot_id,
                offer_id,
                starts_at,
                ends_at,
                qty_total,
                qty_remaining,
                mode,
                drip_every_minutes,
                drip_qty,
                is_paused,
                is_ended,
                created_at,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            "#,
        )
        .bind(slot.slot_id)
        .bind(slot.offer_id)
        .bind(slot.starts_at)
        .bind(slot.ends_at)
        .bind(slot.qty_total)
        .bind(slot.qty_remaining)
        .bind(slot.mode)
        .bind(slot.drip_every_minutes)
        .bind(slot.drip_qty)
        .bind(slot.is_paused)
        .bind(slot.is_ended)
        .bind(slot.created_at)
        .bind(slot.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<OfferSlot>, Error> {
        self.fetch_slot(slot_id).await
    }

    async fn try_reserve(
        &self,
        slot_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, Error> {
        if quantity <= 0 {
            return Err(Error::Parse(format!(
                "try_reserve called with non-positive quantity {}",
                quantity
            )));
        }

        let Some(slot) = self.fetch_slot(slot_id).await? else {
            return Err(Error::NotFound(format!("slot {}", slot_id)));
        };
        if !slot.is_live_at(now) {
            return Ok(ReserveOutcome::SlotNotLive);
        }

        // `released` is recomputed from `now` here; the UPDATE below folds
        // the drip ceiling and the live window into its WHERE clause so the
        // decrement stays a single conditional statement. The row either
        // changes atomically or not at all; no read-modify-write.
        let released = drip::released(&slot, now);

        let updated = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE offer_slots
            SET qty_remaining = qty_remaining - $2,
                updated_at = $3
            WHERE slot_id = $1
              AND is_paused = FALSE
              AND is_ended = FALSE
              AND starts_at <= $3
              AND ends_at > $3
              AND qty_remaining >= $2
              AND (qty_total - qty_remaining) + $2 <= $4
            RETURNING qty_remaining
            "#,
        )
        .bind(slot_id)
        .bind(quantity)
        .bind(now)
        .bind(released)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(remaining) => Ok(ReserveOutcome::Reserved { remaining }),
            None => {
                // Lost to a concurrent claim, or the window moved under us.
                match self.fetch_slot(slot_id).await? {
                    Some(s) if s.is_live_at(now) => Ok(ReserveOutcome::OutOfStock),
                    Some(_) => Ok(ReserveOutcome::SlotNotLive),
                    None => Err(Error::NotFound(format!("slot {}", slot_id))),
                }
            }
        }
    }

    async fn restock(&self, slot_id: Uuid, quantity: i32) -> Result<i32, Error> {
        if quantity <= 0 {
            return Err(Error::Parse(format!(
                "restock called with non-positive quantity {}",
                quantity
            )));
        }

        // Clamped at qty_total: a bug elsewhere must not corrupt stock
        // upward.
        let remaining = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE offer_slots
            SET qty_remaining = LEAST(qty_total, qty_remaining + $2),
                updated_at = $3
            WHERE slot_id = $1
            RETURNING qty_remaining
            "#,
        )
        .bind(slot_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        remaining.ok_or_else(|| Error::NotFound(format!("slot {}", slot_id)))
    }

    async fn current_claimable(&self, slot_id: Uuid, now: DateTime<Utc>) -> Result<i32, Error> {
        let Some(slot) = self.fetch_slot(slot_id).await? else {
            return Err(Error::NotFound(format!("slot {}", slot_id)));
        };
        if !slot.is_live_at(now) {
            return Ok(0);
        }
        Ok(drip::claimable(&slot, now))
    }

    async fn set_paused(&self, slot_id: Uuid, paused: bool) -> Result<(), Error> {
        let res = sqlx::query(
            r#"
            UPDATE offer_slots
            SET is_paused = $2,
                updated_at = $3
            WHERE slot_id = $1
            "#,
        )
        .bind(slot_id)
        .bind(paused)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("slot {}", slot_id)));
        }
        Ok(())
    }

    async fn end_slot(&self, slot_id: Uuid) -> Result<(), Error> {
        let res = sqlx::query(
            r#"
            UPDATE offer_slots
            SET is_ended = TRUE,
                updated_at = $2
            WHERE slot_id = $1
            "#,
        )
        .bind(slot_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("slot {}", slot_id)));
        }
        Ok(())
    }

    async fn list_low_stock(&self, threshold: i32) -> Result<Vec<OfferSlot>, Error> {
        let slots = sqlx::query_as::<_, OfferSlot>(
            r#"
            SELECT
                slot_id,
                offer_id,
                starts_at,
                ends_at,
                qty_total,
                qty_remaining,
                mode,
                drip_every_minutes,
                drip_qty,
                is_paused,
                is_ended,
                created_at,
                updated_at
            FROM offer_slots
            WHERE qty_remaining <= $1
              AND is_ended = FALSE
            ORDER BY qty_remaining ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        Ok(slots)
    }
}
