//! Registration state machine.
//!
//! Pure precondition checks shared by every `RegistrationRepository`. Stores call
//! these inside their transaction, against freshly read and locked rows, and
//! only write once every check has passed.

use crate::error::{AppError, AppResult};
use crate::models::{
    Event, NewEvent, Principal, Registration, RegistrationStatus, RegistrationUpdate, Role,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Effect of a status transition on the event's seat counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatChange {
    Claim,
    Release,
    Keep,
}

impl SeatChange {
    /// Signed delta applied to `registered_spots`
    pub fn delta(&self) -> i32 {
        match self {
            SeatChange::Claim => 1,
            SeatChange::Release => -1,
            SeatChange::Keep => 0,
        }
    }
}

/// Seat effect of moving a registration from one status to another
pub fn seat_change(from: RegistrationStatus, to: RegistrationStatus) -> SeatChange {
    match (from.holds_seat(), to.holds_seat()) {
        (false, true) => SeatChange::Claim,
        (true, false) => SeatChange::Release,
        _ => SeatChange::Keep,
    }
}

/// Self-service registration is only done by players, for themselves
pub fn ensure_player_acts_for_self(principal: &Principal, player_id: Uuid) -> AppResult<()> {
    if principal.role != Role::Player {
        return Err(AppError::Forbidden("Only players can register for events".into()));
    }

    if principal.id != player_id {
        return Err(AppError::Forbidden(
            "Players can only register themselves".into(),
        ));
    }

    Ok(())
}

pub fn ensure_admin(principal: &Principal, action: &str) -> AppResult<()> {
    if !principal.is_admin() {
        return Err(AppError::Forbidden(format!("Only admins can {}", action)));
    }
    Ok(())
}

/// Admins manage any event; coaches only the events they organize
pub fn ensure_can_manage_event(principal: &Principal, event: &Event) -> AppResult<()> {
    match principal.role {
        Role::Admin => Ok(()),
        Role::Coach if event.organizer_id == principal.id => Ok(()),
        Role::Coach => Err(AppError::Forbidden(
            "You are not the organizer of this event".into(),
        )),
        Role::Player => Err(AppError::Forbidden("Players cannot manage events".into())),
    }
}

/// Validates a creation request and resolves who organizes the event
pub fn resolve_organizer(principal: &Principal, new_event: &NewEvent) -> AppResult<Uuid> {
    new_event.validate()?;

    match principal.role {
        Role::Admin => Ok(new_event.organizer_id.unwrap_or(principal.id)),
        Role::Coach => match new_event.organizer_id {
            Some(organizer) if organizer != principal.id => Err(AppError::Forbidden(
                "Coaches can only create events they organize".into(),
            )),
            _ => Ok(principal.id),
        },
        Role::Player => Err(AppError::Forbidden("Players cannot create events".into())),
    }
}

/// Preconditions for claiming a seat, in the order callers observe them
pub fn check_registration(
    event: &Event,
    existing: Option<&Registration>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if event.has_occurred(now) {
        return Err(AppError::InvalidState("This event has already occurred".into()));
    }

    event.kind.gate().check_open(event, now)?;

    if event.is_full() {
        return Err(AppError::CapacityExceeded("This event is full".into()));
    }

    if existing.is_some() {
        return Err(AppError::Conflict(
            "You are already registered for this event".into(),
        ));
    }

    Ok(())
}

/// Preconditions for a player cancelling their own registration
pub fn check_cancellation(
    registration: &Registration,
    event: &Event,
    actor: &Principal,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if !registration.is_owned_by(actor.id) {
        return Err(AppError::Forbidden(
            "You can only cancel your own registration".into(),
        ));
    }

    // A second cancel must not release the seat twice
    if registration.is_cancelled() {
        return Err(AppError::InvalidState(
            "This registration is already cancelled".into(),
        ));
    }

    if event.has_occurred(now) {
        return Err(AppError::InvalidState(
            "Cannot cancel a registration for an event that has already occurred".into(),
        ));
    }

    if event.is_in_progress() {
        return Err(AppError::InvalidState(
            "Cannot cancel a registration while the event is in progress".into(),
        ));
    }

    Ok(())
}

/// Preconditions for an admin status/qualification override; returns the seat effect
pub fn check_override(
    event: &Event,
    registration: &Registration,
    update: &RegistrationUpdate,
) -> AppResult<SeatChange> {
    if update.qualified.is_some() && !event.kind.tracks_qualification() {
        return Err(AppError::InvalidState(
            "Qualification only applies to combine registrations".into(),
        ));
    }

    let change = seat_change(registration.status, update.status);
    if change == SeatChange::Claim && event.is_full() {
        return Err(AppError::CapacityExceeded(
            "Cannot reinstate registration: this event is full".into(),
        ));
    }

    Ok(change)
}

/// Seat effect of hard-deleting a registration
pub fn removal_change(registration: &Registration) -> SeatChange {
    if registration.status.holds_seat() {
        SeatChange::Release
    } else {
        SeatChange::Keep
    }
}

/// Events are only deleted once no registration references them
pub fn check_deletable(registration_count: i64) -> AppResult<()> {
    if registration_count > 0 {
        return Err(AppError::InvalidState(format!(
            "Cannot delete an event with {} registration(s); remove them first",
            registration_count
        )));
    }
    Ok(())
}

pub fn check_capacity_change(event: &Event, max_spots: i32) -> AppResult<()> {
    if max_spots < 1 {
        return Err(AppError::Validation("max_spots must be at least 1".into()));
    }

    if max_spots < event.registered_spots {
        return Err(AppError::InvalidState(format!(
            "Cannot reduce capacity below the {} seats already taken",
            event.registered_spots
        )));
    }

    Ok(())
}
