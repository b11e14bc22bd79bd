// src/repositories/mod.rs

pub mod memory;
pub mod postgres;

pub use dealdrop_common::traits::repository_traits::{
    ClaimLedgerRepository, SlotInventoryRepository,
};

pub use memory::{InMemoryClaimLedgerRepository, InMemorySlotInventoryRepository};
pub use postgres::{PostgresClaimLedgerRepository, PostgresSlotInventoryRepository};
