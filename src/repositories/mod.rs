//! Persistence seam for events and registrations.
//!
//! Every state-changing method is one atomic unit: the implementation reads
//! and locks the rows it needs, runs the checks in [`crate::lifecycle`], and
//! writes only when all of them pass. A failed call leaves no partial effect.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRegistrationRepository;
pub use postgres::PgRegistrationRepository;

use crate::error::AppResult;
use crate::models::{
    Event, EventStatus, Principal, ReconcileReport, Registration, RegistrationReceipt,
    RegistrationUpdate, RemovedRegistration,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Insert a fully built event
    async fn create_event(&self, event: Event) -> AppResult<Event>;

    async fn find_event(&self, event_id: Uuid) -> AppResult<Option<Event>>;

    async fn find_registration(&self, registration_id: Uuid) -> AppResult<Option<Registration>>;

    /// All registrations of an event, oldest first
    async fn list_registrations(&self, event_id: Uuid) -> AppResult<Vec<Registration>>;

    /// Claim a seat: insert a PENDING registration and increment the counter
    async fn register(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<RegistrationReceipt>;

    /// Owner cancellation: mark CANCELLED and release the seat
    async fn cancel_registration(
        &self,
        registration_id: Uuid,
        actor: Principal,
        now: DateTime<Utc>,
    ) -> AppResult<Registration>;

    /// Admin status/qualification override
    async fn override_registration(
        &self,
        registration_id: Uuid,
        update: RegistrationUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<Registration>;

    /// Admin hard-delete; releases the seat unless already cancelled
    async fn remove_registration(
        &self,
        registration_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<RemovedRegistration>;

    async fn update_event_status(
        &self,
        event_id: Uuid,
        actor: Principal,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Event>;

    async fn update_event_capacity(
        &self,
        event_id: Uuid,
        actor: Principal,
        max_spots: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Event>;

    /// Delete an event that no registration references; returns the deleted row
    async fn delete_event(&self, event_id: Uuid) -> AppResult<Event>;

    /// Recount non-cancelled registrations and overwrite the counter
    async fn reconcile_event(&self, event_id: Uuid, now: DateTime<Utc>) -> AppResult<ReconcileReport>;
}
