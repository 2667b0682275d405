use super::event::{Event, EventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registration status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Waitlisted,
    Declined,
    Cancelled,
}

impl RegistrationStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RegistrationStatus::Pending),
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "waitlisted" => Ok(RegistrationStatus::Waitlisted),
            "declined" => Ok(RegistrationStatus::Declined),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            _ => Err(format!("Invalid registration status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Waitlisted => "waitlisted",
            RegistrationStatus::Declined => "declined",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    /// Every status except CANCELLED holds a seat
    pub fn holds_seat(&self) -> bool {
        !matches!(self, RegistrationStatus::Cancelled)
    }
}

impl From<RegistrationStatus> for String {
    fn from(status: RegistrationStatus) -> Self {
        status.as_str().to_string()
    }
}

/// One player's claim on one event's capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub player_id: Uuid,
    pub status: RegistrationStatus,
    /// `Some` only for combine registrations
    pub qualified: Option<bool>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Create a new PENDING registration
    pub fn new(event_id: Uuid, player_id: Uuid, kind: EventKind, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            player_id,
            status: RegistrationStatus::Pending,
            qualified: kind.tracks_qualification().then_some(false),
            registered_at: now,
            updated_at: now,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RegistrationStatus::Cancelled
    }

    pub fn is_owned_by(&self, player_id: Uuid) -> bool {
        self.player_id == player_id
    }
}

/// Result of a successful registration, with the event for confirmation display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub registration: Registration,
    pub event: Event,
}

/// Admin override of a registration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegistrationUpdate {
    pub status: RegistrationStatus,
    #[serde(default)]
    pub qualified: Option<bool>,
}

/// Outcome of an admin hard-delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedRegistration {
    pub registration: Registration,
    /// False when the registration had already been cancelled
    pub released_seat: bool,
    pub registered_spots: i32,
}

/// Outcome of recounting an event's seats from its registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub event_id: Uuid,
    pub previous: i32,
    pub recomputed: i32,
    pub over_capacity: bool,
}

impl ReconcileReport {
    pub fn drifted(&self) -> bool {
        self.previous != self.recomputed
    }
}
