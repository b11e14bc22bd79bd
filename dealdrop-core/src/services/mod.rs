// src/services/mod.rs

pub mod codes;
pub mod redemption_service;
pub mod reservation_service;

pub use redemption_service::{RedeemRejectReason, RedemptionOutcome, RedemptionService};
pub use reservation_service::{
    CancelOutcome, RejectReason, ReservationOutcome, ReservationService, ReserveRequest,
};
