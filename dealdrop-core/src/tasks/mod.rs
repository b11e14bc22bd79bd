// src/tasks/mod.rs

pub mod expiry_reaper;

pub use expiry_reaper::{ExpiryReaper, SweepSummary, spawn_expiry_reaper};
