use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which flavour of event this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Combine,
    Tryout,
}

impl EventKind {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "combine" => Ok(EventKind::Combine),
            "tryout" => Ok(EventKind::Tryout),
            _ => Err(format!("Invalid event kind: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Combine => "combine",
            EventKind::Tryout => "tryout",
        }
    }

    /// Gate deciding whether this kind of event currently accepts self-service registrations
    pub fn gate(&self) -> &'static dyn RegistrationGate {
        match self {
            EventKind::Combine => &CombineGate,
            EventKind::Tryout => &TryoutGate,
        }
    }

    /// Combines assess `qualified` after the event; tryouts have no such flag
    pub fn tracks_qualification(&self) -> bool {
        matches!(self, EventKind::Combine)
    }
}

/// Event status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Upcoming,
    RegistrationOpen,
    RegistrationClosed,
    InProgress,
    Completed,
    Cancelled,
}

impl EventStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "upcoming" => Ok(EventStatus::Upcoming),
            "registration_open" => Ok(EventStatus::RegistrationOpen),
            "registration_closed" => Ok(EventStatus::RegistrationClosed),
            "in_progress" => Ok(EventStatus::InProgress),
            "completed" => Ok(EventStatus::Completed),
            "cancelled" => Ok(EventStatus::Cancelled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::RegistrationOpen => "registration_open",
            EventStatus::RegistrationClosed => "registration_closed",
            EventStatus::InProgress => "in_progress",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl From<EventStatus> for String {
    fn from(status: EventStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A combine or tryout players register for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub kind: EventKind,
    pub title: String,
    pub game: String,
    pub organizer_id: Uuid,
    pub date: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub max_spots: i32,
    pub registered_spots: i32,
    pub status: EventStatus,
    pub invite_only: bool,
    pub min_gpa: Option<Decimal>,
    pub class_years: Vec<String>,
    pub required_roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Build an event from a validated creation request
    pub fn new(new_event: NewEvent, organizer_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: new_event.kind,
            title: new_event.title,
            game: new_event.game,
            organizer_id,
            date: new_event.date,
            registration_deadline: new_event.registration_deadline,
            max_spots: new_event.max_spots,
            registered_spots: 0,
            status: new_event.status.unwrap_or(EventStatus::Upcoming),
            invite_only: new_event.invite_only,
            min_gpa: new_event.min_gpa,
            class_years: new_event.class_years,
            required_roles: new_event.required_roles,
            created_at: now,
            updated_at: now,
        }
    }

    /// Seats still available
    pub fn remaining_spots(&self) -> i32 {
        (self.max_spots - self.registered_spots).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.registered_spots >= self.max_spots
    }

    /// Check if the event date lies in the past
    pub fn has_occurred(&self, now: DateTime<Utc>) -> bool {
        self.date < now
    }

    /// Check if the event is currently running
    pub fn is_in_progress(&self) -> bool {
        self.status == EventStatus::InProgress
    }
}

/// Request to create an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub kind: EventKind,
    pub title: String,
    pub game: String,
    /// Admins may create on behalf of a coach; coaches always organize their own events
    #[serde(default)]
    pub organizer_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub registration_deadline: Option<DateTime<Utc>>,
    pub max_spots: i32,
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub invite_only: bool,
    #[serde(default)]
    pub min_gpa: Option<Decimal>,
    #[serde(default)]
    pub class_years: Vec<String>,
    #[serde(default)]
    pub required_roles: Vec<String>,
}

impl NewEvent {
    /// Validate field-level rules
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".into()));
        }

        if self.game.trim().is_empty() {
            return Err(AppError::Validation("Game is required".into()));
        }

        if self.max_spots < 1 {
            return Err(AppError::Validation("max_spots must be at least 1".into()));
        }

        if let Some(deadline) = self.registration_deadline {
            if deadline >= self.date {
                return Err(AppError::Validation(
                    "Registration deadline must be before the event date".into(),
                ));
            }
        }

        if self.invite_only && self.kind == EventKind::Tryout {
            return Err(AppError::Validation("Tryouts cannot be invite-only".into()));
        }

        if let Some(gpa) = self.min_gpa {
            if gpa < Decimal::ZERO || gpa > Decimal::new(5, 0) {
                return Err(AppError::Validation("min_gpa must be between 0.0 and 5.0".into()));
            }
            // Stored as NUMERIC(3, 2)
            if gpa.scale() > 2 {
                return Err(AppError::Validation(
                    "min_gpa allows at most two decimal places".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Decides whether an event is open for self-service registration.
///
/// The shared registration transaction calls this after the existence and date
/// checks and before the capacity check.
pub trait RegistrationGate: Send + Sync {
    fn check_open(&self, event: &Event, now: DateTime<Utc>) -> AppResult<()>;
}

/// Combines open on `REGISTRATION_OPEN` and may be invite-only
pub struct CombineGate;

impl RegistrationGate for CombineGate {
    fn check_open(&self, event: &Event, _now: DateTime<Utc>) -> AppResult<()> {
        if event.status != EventStatus::RegistrationOpen {
            return Err(AppError::InvalidState(
                "Registration is not open for this combine".into(),
            ));
        }

        if event.invite_only {
            return Err(AppError::Forbidden("This combine is invite-only".into()));
        }

        Ok(())
    }
}

/// Tryouts open on `REGISTRATION_OPEN` until their registration deadline
pub struct TryoutGate;

impl RegistrationGate for TryoutGate {
    fn check_open(&self, event: &Event, now: DateTime<Utc>) -> AppResult<()> {
        if event.status != EventStatus::RegistrationOpen {
            return Err(AppError::InvalidState(
                "Registration is not open for this tryout".into(),
            ));
        }

        if let Some(deadline) = event.registration_deadline {
            if now >= deadline {
                return Err(AppError::InvalidState(
                    "The registration deadline has passed".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use chrono::Duration;

    fn new_event(kind: EventKind) -> NewEvent {
        NewEvent {
            kind,
            title: "Spring Showcase".into(),
            game: "Valorant".into(),
            organizer_id: None,
            date: Utc::now() + Duration::days(30),
            registration_deadline: None,
            max_spots: 10,
            status: Some(EventStatus::RegistrationOpen),
            invite_only: false,
            min_gpa: None,
            class_years: vec![],
            required_roles: vec![],
        }
    }

    #[test]
    fn test_status_round_trips_through_db_strings() {
        for status in [
            EventStatus::Upcoming,
            EventStatus::RegistrationOpen,
            EventStatus::RegistrationClosed,
            EventStatus::InProgress,
            EventStatus::Completed,
            EventStatus::Cancelled,
        ] {
            assert_eq!(EventStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(EventStatus::from_str("open").is_err());
    }

    #[test]
    fn test_validate_rejects_deadline_on_or_after_date() {
        let mut event = new_event(EventKind::Tryout);
        event.registration_deadline = Some(event.date);
        assert_eq!(event.validate().unwrap_err().code(), ErrorCode::Validation);
    }

    #[test]
    fn test_validate_rejects_min_gpa_finer_than_hundredths() {
        let mut request = new_event(EventKind::Combine);
        request.min_gpa = Some(Decimal::new(3456, 3));
        let err = request.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);

        request.min_gpa = Some(Decimal::new(350, 2));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_invite_only_tryout() {
        let mut event = new_event(EventKind::Tryout);
        event.invite_only = true;
        assert!(event.validate().is_err());

        let mut combine = new_event(EventKind::Combine);
        combine.invite_only = true;
        assert!(combine.validate().is_ok());
    }

    #[test]
    fn test_combine_gate_checks_status_before_invite_only() {
        let now = Utc::now();
        let mut event = Event::new(new_event(EventKind::Combine), Uuid::new_v4(), now);
        event.invite_only = true;
        event.status = EventStatus::Upcoming;
        let err = CombineGate.check_open(&event, now).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);

        event.status = EventStatus::RegistrationOpen;
        let err = CombineGate.check_open(&event, now).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[test]
    fn test_tryout_gate_closes_at_deadline() {
        let now = Utc::now();
        let mut event = Event::new(new_event(EventKind::Tryout), Uuid::new_v4(), now);
        event.registration_deadline = Some(now + Duration::hours(1));
        assert!(TryoutGate.check_open(&event, now).is_ok());

        let later = now + Duration::hours(1);
        let err = TryoutGate.check_open(&event, later).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }

    #[test]
    fn test_remaining_spots() {
        let mut event = Event::new(new_event(EventKind::Combine), Uuid::new_v4(), Utc::now());
        event.registered_spots = 9;
        assert_eq!(event.remaining_spots(), 1);
        assert!(!event.is_full());
        event.registered_spots = 10;
        assert!(event.is_full());
    }
}
