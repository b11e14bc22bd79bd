// File: dealdrop-core/src/repositories/memory/slot_inventory.rs

use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;
use dealdrop_common::error::Error;
use dealdrop_common::models::slot::{OfferSlot, ReserveOutcome};
use dealdrop_common::traits::repository_traits::SlotInventoryRepository;
use crate::drip;

/// Each slot sits behind its own async mutex, so reservations on one slot
/// serialize while other slots stay untouched.
#[derive(Default)]
pub struct InMemorySlotInventoryRepository {
    slots: DashMap<Uuid, Arc<Mutex<OfferSlot>>>,
}

impl InMemorySlotInventoryRepository {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    fn slot_handle(&self, slot_id: Uuid) -> Result<Arc<Mutex<OfferSlot>>, Error> {
        self.slots
            .get(&slot_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("slot {}", slot_id)))
    }
}

#[async_trait]
impl SlotInventoryRepository for InMemorySlotInventoryRepository {
    async fn create_slot(&self, slot: &OfferSlot) -> Result<(), Error> {
        if slot.qty_remaining < 0 || slot.qty_remaining > slot.qty_total {
            return Err(Error::Parse(format!(
                "slot {} violates 0 <= qty_remaining <= qty_total",
                slot.slot_id
            )));
        }
        if self.slots.contains_key(&slot.slot_id) {
            return Err(Error::Parse(format!("slot {} already exists", slot.slot_id)));
        }
        self.slots
            .insert(slot.slot_id, Arc::new(Mutex::new(slot.clone())));
        Ok(())
    }

    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<OfferSlot>, Error> {
        // clone the handle out so no map guard is held across the await
        let Some(handle) = self.slots.get(&slot_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let slot = handle.lock().await;
        Ok(Some(slot.clone()))
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

        let handle = self.slot_handle(slot_id)?;
        let mut slot = handle.lock().await;

        if !slot.is_live_at(now) {
            return Ok(ReserveOutcome::SlotNotLive);
        }
        if drip::claimable(&slot, now) < quantity {
            return Ok(ReserveOutcome::OutOfStock);
        }

        slot.qty_remaining -= quantity;
        slot.updated_at = now;
        Ok(ReserveOutcome::Reserved {
            remaining: slot.qty_remaining,
        })
    }

    async fn restock(&self, slot_id: Uuid, quantity: i32) -> Result<i32, Error> {
        if quantity <= 0 {
            return Err(Error::Parse(format!(
                "restock called with non-positive quantity {}",
                quantity
            )));
        }

        let handle = self.slot_handle(slot_id)?;
        let mut slot = handle.lock().await;

        slot.qty_remaining = slot.qty_total.min(slot.qty_remaining + quantity);
        slot.updated_at = Utc::now();
        Ok(slot.qty_remaining)
    }

    async fn current_claimable(&self, slot_id: Uuid, now: DateTime<Utc>) -> Result<i32, Error> {
        let handle = self.slot_handle(slot_id)?;
        let slot = handle.lock().await;

        if !slot.is_live_at(now) {
            return Ok(0);
        }
        Ok(drip::claimable(&slot, now))
    }

    async fn set_paused(&self, slot_id: Uuid, paused: bool) -> Result<(), Error> {
        let handle = self.slot_handle(slot_id)?;
        let mut slot = handle.lock().await;
        slot.is_paused = paused;
        slot.updated_at = Utc::now();
        Ok(())
    }

    async fn end_slot(&self, slot_id: Uuid) -> Result<(), Error> {
        let handle = self.slot_handle(slot_id)?;
        let mut slot = handle.lock().await;
        slot.is_ended = true;
        slot.updated_at = Utc::now();
        Ok(())
    }

    async fn list_low_stock(&self, threshold: i32) -> Result<Vec<OfferSlot>, Error> {
        let handles: Vec<Arc<Mutex<OfferSlot>>> = self
            .slots
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut low = Vec::new();
        for handle in handles {
            let slot = handle.lock().await;
            if !slot.is_ended && slot.qty_remaining <= threshold {
                low.push(slot.clone());
            }
        }
        low.sort_by_key(|s| s.qty_remaining);
        Ok(low)
    }
}
