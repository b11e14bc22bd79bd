// File: dealdrop-common/src/traits/eligibility_traits.rs

use async_trait::async_trait;
use uuid::Uuid;
use crate::error::Error;

/// Collaborator-supplied geofence verdict, evaluated before any inventory
/// is touched. The engine treats this as an opaque predicate; distance and
/// venue-radius math live with the caller.
#[async_trait]
pub trait GeofenceCheck: Send + Sync {
    /// `true` when the user is allowed to claim the offer from where they
    /// are.
    async fn allows(&self, user_id: Uuid, offer_id: Uuid) -> Result<bool, Error>;
}

/// Pass-through verdict for deployments that do not geofence.
pub struct NoGeofence;

#[async_trait]
impl GeofenceCheck for NoGeofence {
    async fn allows(&self, _user_id: Uuid, _offer_id: Uuid) -> Result<bool, Error> {
        Ok(true)
    }
}
