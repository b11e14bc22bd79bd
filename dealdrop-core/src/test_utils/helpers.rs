// File: dealdrop-core/src/test_utils/helpers.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use uuid::Uuid;
use dealdrop_common::models::slot::OfferSlot;
use dealdrop_common::traits::eligibility_traits::NoGeofence;
use dealdrop_common::traits::repository_traits::SlotInventoryRepository;
use crate::clock::{Clock, FixedClock};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::eventbus::EventBus;
use crate::repositories::memory::{
    InMemoryClaimLedgerRepository, InMemorySlotInventoryRepository,
};
use crate::services::{RedemptionService, ReservationService};
use crate::tasks::ExpiryReaper;
use crate::Error;

/// Install a test tracing subscriber (once; later calls are no-ops).
/// Honors RUST_LOG through the env filter.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fully wired engine over the in-memory backend with a manually-driven
/// clock. This is what most scenario tests run against.
pub struct EngineHarness {
    pub inventory: Arc<InMemorySlotInventoryRepository>,
    pub ledger: Arc<InMemoryClaimLedgerRepository>,
    pub clock: Arc<FixedClock>,
    pub event_bus: Arc<EventBus>,
    pub config: EngineConfig,
    pub reservations: ReservationService,
    pub redemptions: RedemptionService,
    pub reaper: ExpiryReaper,
}

impl EngineHarness {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_config(start, EngineConfig::default())
    }

    pub fn with_config(start: DateTime<Utc>, config: EngineConfig) -> Self {
        init_test_tracing();

        let inventory = Arc::new(InMemorySlotInventoryRepository::new());
        let ledger = Arc::new(InMemoryClaimLedgerRepository::new());
        let clock = Arc::new(FixedClock::new(start));
        let event_bus = Arc::new(EventBus::new());

        let reservations = ReservationService::new(
            inventory.clone(),
            ledger.clone(),
            Arc::new(NoGeofence),
            clock.clone(),
            event_bus.clone(),
            config.clone(),
        );
        let redemptions =
            RedemptionService::new(ledger.clone(), clock.clone(), event_bus.clone());
        let reaper = ExpiryReaper::new(
            inventory.clone(),
            ledger.clone(),
            event_bus.clone(),
            config.sweep_page_size,
        );

        Self {
            inventory,
            ledger,
            clock,
            event_bus,
            config,
            reservations,
            redemptions,
            reaper,
        }
    }

    /// Seed a live flash slot starting at the harness clock's current time.
    pub async fn seed_flash_slot(&self, qty_total: i32) -> Result<OfferSlot, Error> {
        let now = self.clock.now();
        let slot = OfferSlot::new_flash(
            Uuid::new_v4(),
            now,
            now + Duration::hours(12),
            qty_total,
            now,
        );
        self.inventory.create_slot(&slot).await?;
        Ok(slot)
    }

    /// Seed a live drip slot starting at the harness clock's current time.
    pub async fn seed_drip_slot(
        &self,
        qty_total: i32,
        drip_every_minutes: i32,
        drip_qty: i32,
    ) -> Result<OfferSlot, Error> {
        let now = self.clock.now();
        let slot = OfferSlot::new_drip(
            Uuid::new_v4(),
            now,
            now + Duration::days(2),
            qty_total,
            drip_every_minutes,
            drip_qty,
            now,
        );
        self.inventory.create_slot(&slot).await?;
        Ok(slot)
    }
}

/// Create a connection pool to the test DB named by `TEST_DATABASE_URL`.
/// Postgres-backed tests call this and skip themselves when the variable
/// is unset.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("TEST_DATABASE_URL")
        .map_err(|_| Error::Config("TEST_DATABASE_URL not set".to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    Ok(pool)
}

/// Wipes out test data so each test can start fresh.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            claims,
            offer_slots
        RESTART IDENTITY CASCADE;
    "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Convenience: a fully migrated, clean `Database` for integration tests.
pub async fn setup_test_database() -> Result<Database, Error> {
    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool);
    db.migrate().await?;
    clean_database(db.pool()).await?;
    Ok(db)
}
