//! Best-effort notification side-channel.
//!
//! Notifications are sent after the primary transaction has committed. A
//! failing notifier is logged by the caller and never affects the operation.

pub mod audit;
pub mod discord;

pub use audit::AuditLogNotifier;
pub use discord::DiscordWebhookNotifier;

use crate::models::{EventKind, EventStatus, RegistrationStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Something worth telling the outside world about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    EventCreated {
        event_id: Uuid,
        kind: EventKind,
        title: String,
        game: String,
        date: DateTime<Utc>,
        max_spots: i32,
        actor_id: Uuid,
    },
    EventStatusChanged {
        event_id: Uuid,
        title: String,
        status: EventStatus,
        actor_id: Uuid,
    },
    EventCapacityChanged {
        event_id: Uuid,
        title: String,
        max_spots: i32,
        actor_id: Uuid,
    },
    EventDeleted {
        event_id: Uuid,
        title: String,
        actor_id: Uuid,
    },
    RegistrationStatusOverridden {
        registration_id: Uuid,
        event_id: Uuid,
        player_id: Uuid,
        status: RegistrationStatus,
        qualified: Option<bool>,
        actor_id: Uuid,
    },
    RegistrationRemoved {
        registration_id: Uuid,
        event_id: Uuid,
        player_id: Uuid,
        released_seat: bool,
        actor_id: Uuid,
    },
    EventReconciled {
        event_id: Uuid,
        previous: i32,
        recomputed: i32,
        actor_id: Uuid,
    },
}

impl Notification {
    /// Stable name of the notification type
    pub fn name(&self) -> &'static str {
        match self {
            Notification::EventCreated { .. } => "event_created",
            Notification::EventStatusChanged { .. } => "event_status_changed",
            Notification::EventCapacityChanged { .. } => "event_capacity_changed",
            Notification::EventDeleted { .. } => "event_deleted",
            Notification::RegistrationStatusOverridden { .. } => "registration_status_overridden",
            Notification::RegistrationRemoved { .. } => "registration_removed",
            Notification::EventReconciled { .. } => "event_reconciled",
        }
    }

    /// Event the notification is about
    pub fn event_id(&self) -> Uuid {
        match self {
            Notification::EventCreated { event_id, .. }
            | Notification::EventStatusChanged { event_id, .. }
            | Notification::EventCapacityChanged { event_id, .. }
            | Notification::EventDeleted { event_id, .. }
            | Notification::RegistrationStatusOverridden { event_id, .. }
            | Notification::RegistrationRemoved { event_id, .. }
            | Notification::EventReconciled { event_id, .. } => *event_id,
        }
    }

    pub fn actor_id(&self) -> Uuid {
        match self {
            Notification::EventCreated { actor_id, .. }
            | Notification::EventStatusChanged { actor_id, .. }
            | Notification::EventCapacityChanged { actor_id, .. }
            | Notification::EventDeleted { actor_id, .. }
            | Notification::RegistrationStatusOverridden { actor_id, .. }
            | Notification::RegistrationRemoved { actor_id, .. }
            | Notification::EventReconciled { actor_id, .. } => *actor_id,
        }
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        match self {
            Notification::EventCreated {
                kind,
                title,
                game,
                date,
                max_spots,
                ..
            } => {
                let kind = match kind {
                    EventKind::Combine => "combine",
                    EventKind::Tryout => "tryout",
                };
                format!(
                    "New {} \"{}\" ({}) on {} with {} spots",
                    kind,
                    title,
                    game,
                    date.format("%Y-%m-%d"),
                    max_spots
                )
            }
            Notification::EventStatusChanged { title, status, .. } => {
                format!("\"{}\" is now {}", title, status.as_str())
            }
            Notification::EventCapacityChanged { title, max_spots, .. } => {
                format!("\"{}\" capacity set to {} spots", title, max_spots)
            }
            Notification::EventDeleted { title, .. } => format!("\"{}\" was deleted", title),
            Notification::RegistrationStatusOverridden {
                registration_id,
                status,
                ..
            } => format!(
                "Registration {} set to {} by an admin",
                registration_id,
                status.as_str()
            ),
            Notification::RegistrationRemoved {
                registration_id,
                released_seat,
                ..
            } => {
                if *released_seat {
                    format!("Registration {} removed, seat released", registration_id)
                } else {
                    format!("Cancelled registration {} removed", registration_id)
                }
            }
            Notification::EventReconciled {
                previous,
                recomputed,
                ..
            } => format!("Seat count reconciled: {} -> {}", previous, recomputed),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifierError>;
}

/// Notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifierError> {
        Ok(())
    }
}

/// Fans a notification out to several notifiers; reports the first failure after trying all
#[derive(Default, Clone)]
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifierError> {
        let results =
            futures::future::join_all(self.notifiers.iter().map(|n| n.notify(notification))).await;
        results.into_iter().collect::<Result<Vec<_>, _>>().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_serializes_with_type_tag() {
        let n = Notification::EventDeleted {
            event_id: Uuid::nil(),
            title: "Fall Tryout".into(),
            actor_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "event_deleted");
        assert_eq!(n.name(), "event_deleted");
        assert_eq!(n.summary(), "\"Fall Tryout\" was deleted");
    }

    #[tokio::test]
    async fn test_empty_composite_succeeds() {
        let composite = CompositeNotifier::default();
        let n = Notification::EventReconciled {
            event_id: Uuid::nil(),
            previous: 3,
            recomputed: 2,
            actor_id: Uuid::nil(),
        };
        assert!(composite.notify(&n).await.is_ok());
    }
}
