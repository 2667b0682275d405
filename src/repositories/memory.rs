//! In-process registration repository.
//!
//! A single async mutex guards all state, so every operation is serializable.
//! Checks run before any mutation, which keeps failed calls free of partial
//! writes. Used by tests and by `STORE_BACKEND=memory` development runs.

use super::RegistrationRepository;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, SeatChange};
use crate::models::{
    Event, EventStatus, Principal, ReconcileReport, Registration, RegistrationReceipt,
    RegistrationStatus, RegistrationUpdate, RemovedRegistration,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    events: HashMap<Uuid, Event>,
    registrations: HashMap<Uuid, Registration>,
    /// (event_id, player_id) -> registration_id
    by_pair: HashMap<(Uuid, Uuid), Uuid>,
}

impl MemoryState {
    fn event(&self, event_id: Uuid) -> AppResult<&Event> {
        self.events
            .get(&event_id)
            .ok_or_else(|| AppError::NotFound("Event not found".into()))
    }

    fn event_mut(&mut self, event_id: Uuid) -> AppResult<&mut Event> {
        self.events
            .get_mut(&event_id)
            .ok_or_else(|| AppError::NotFound("Event not found".into()))
    }

    fn registration(&self, registration_id: Uuid) -> AppResult<&Registration> {
        self.registrations
            .get(&registration_id)
            .ok_or_else(|| AppError::NotFound("Registration not found".into()))
    }

    fn apply_seat_change(&mut self, event_id: Uuid, change: SeatChange, now: DateTime<Utc>) -> AppResult<i32> {
        let event = self.event_mut(event_id)?;
        let next = event.registered_spots + change.delta();
        // Mirrors the database CHECK constraint
        if next < 0 || next > event.max_spots {
            return Err(AppError::Internal(format!(
                "registered_spots would become {} for event {} (max {})",
                next, event_id, event.max_spots
            )));
        }
        event.registered_spots = next;
        event.updated_at = now;
        Ok(next)
    }

    fn held_seats(&self, event_id: Uuid) -> i32 {
        let held = self
            .registrations
            .values()
            .filter(|r| r.event_id == event_id && r.status.holds_seat())
            .count();
        i32::try_from(held).unwrap_or(i32::MAX)
    }
}

/// Registration repository kept entirely in memory
#[derive(Default)]
pub struct InMemoryRegistrationRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryRegistrationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite an event's counter without touching registrations.
    ///
    /// Simulates counter drift so reconciliation can be exercised. Not part of
    /// the repository contract.
    #[doc(hidden)]
    pub async fn force_registered_spots(&self, event_id: Uuid, registered_spots: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.event_mut(event_id)?.registered_spots = registered_spots;
        Ok(())
    }
}

#[async_trait]
impl RegistrationRepository for InMemoryRegistrationRepository {
    async fn create_event(&self, event: Event) -> AppResult<Event> {
        let mut state = self.state.lock().await;
        if state.events.contains_key(&event.id) {
            return Err(AppError::Conflict(format!("Event {} already exists", event.id)));
        }
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_event(&self, event_id: Uuid) -> AppResult<Option<Event>> {
        let state = self.state.lock().await;
        Ok(state.events.get(&event_id).cloned())
    }

    async fn find_registration(&self, registration_id: Uuid) -> AppResult<Option<Registration>> {
        let state = self.state.lock().await;
        Ok(state.registrations.get(&registration_id).cloned())
    }

    async fn list_registrations(&self, event_id: Uuid) -> AppResult<Vec<Registration>> {
        let state = self.state.lock().await;
        let mut registrations: Vec<Registration> = state
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        registrations.sort_by(|a, b| a.registered_at.cmp(&b.registered_at).then(a.id.cmp(&b.id)));
        Ok(registrations)
    }

    async fn register(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<RegistrationReceipt> {
        let mut state = self.state.lock().await;

        let event = state.event(event_id)?;
        let existing = state
            .by_pair
            .get(&(event_id, player_id))
            .and_then(|id| state.registrations.get(id));
        lifecycle::check_registration(event, existing, now)?;

        let registration = Registration::new(event_id, player_id, event.kind, now);
        state.apply_seat_change(event_id, SeatChange::Claim, now)?;
        state.by_pair.insert((event_id, player_id), registration.id);
        state.registrations.insert(registration.id, registration.clone());

        let event = state.event(event_id)?.clone();
        Ok(RegistrationReceipt {
            registration,
            event,
        })
    }

    async fn cancel_registration(
        &self,
        registration_id: Uuid,
        actor: Principal,
        now: DateTime<Utc>,
    ) -> AppResult<Registration> {
        let mut state = self.state.lock().await;

        let registration = state.registration(registration_id)?;
        let event_id = registration.event_id;
        lifecycle::check_cancellation(registration, state.event(event_id)?, &actor, now)?;

        state.apply_seat_change(event_id, SeatChange::Release, now)?;
        let registration = state
            .registrations
            .get_mut(&registration_id)
            .ok_or_else(|| AppError::NotFound("Registration not found".into()))?;
        registration.status = RegistrationStatus::Cancelled;
        registration.updated_at = now;
        Ok(registration.clone())
    }

    async fn override_registration(
        &self,
        registration_id: Uuid,
        update: RegistrationUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<Registration> {
        let mut state = self.state.lock().await;

        let registration = state.registration(registration_id)?;
        let event_id = registration.event_id;
        let change = lifecycle::check_override(state.event(event_id)?, registration, &update)?;

        if change != SeatChange::Keep {
            state.apply_seat_change(event_id, change, now)?;
        }

        let registration = state
            .registrations
            .get_mut(&registration_id)
            .ok_or_else(|| AppError::NotFound("Registration not found".into()))?;
        registration.status = update.status;
        if let Some(qualified) = update.qualified {
            registration.qualified = Some(qualified);
        }
        registration.updated_at = now;
        Ok(registration.clone())
    }

    async fn remove_registration(
        &self,
        registration_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<RemovedRegistration> {
        let mut state = self.state.lock().await;

        let registration = state.registration(registration_id)?.clone();
        let event_id = registration.event_id;
        let change = lifecycle::removal_change(&registration);

        let registered_spots = if change == SeatChange::Keep {
            state.event(event_id)?.registered_spots
        } else {
            state.apply_seat_change(event_id, change, now)?
        };

        state.registrations.remove(&registration_id);
        state.by_pair.remove(&(event_id, registration.player_id));

        Ok(RemovedRegistration {
            registration,
            released_seat: change == SeatChange::Release,
            registered_spots,
        })
    }

    async fn update_event_status(
        &self,
        event_id: Uuid,
        actor: Principal,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Event> {
        let mut state = self.state.lock().await;

        let event = state.event_mut(event_id)?;
        lifecycle::ensure_can_manage_event(&actor, event)?;
        event.status = status;
        event.updated_at = now;
        Ok(event.clone())
    }

    async fn update_event_capacity(
        &self,
        event_id: Uuid,
        actor: Principal,
        max_spots: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Event> {
        let mut state = self.state.lock().await;

        let event = state.event_mut(event_id)?;
        lifecycle::ensure_can_manage_event(&actor, event)?;
        lifecycle::check_capacity_change(event, max_spots)?;
        event.max_spots = max_spots;
        event.updated_at = now;
        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: Uuid) -> AppResult<Event> {
        let mut state = self.state.lock().await;

        state.event(event_id)?;
        let count = state
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .count();
        lifecycle::check_deletable(i64::try_from(count).unwrap_or(i64::MAX))?;

        state
            .events
            .remove(&event_id)
            .ok_or_else(|| AppError::NotFound("Event not found".into()))
    }

    async fn reconcile_event(&self, event_id: Uuid, now: DateTime<Utc>) -> AppResult<ReconcileReport> {
        let mut state = self.state.lock().await;

        let recomputed = state.held_seats(event_id);
        let event = state.event_mut(event_id)?;
        let previous = event.registered_spots;
        let over_capacity = recomputed > event.max_spots;

        event.registered_spots = recomputed;
        event.max_spots = event.max_spots.max(recomputed);
        event.updated_at = now;

        Ok(ReconcileReport {
            event_id,
            previous,
            recomputed,
            over_capacity,
        })
    }
}
