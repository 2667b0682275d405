use crate::clock::Clock;
use crate::config::RetryConfig;
use crate::error::{option_to_result, AppError, AppResult};
use crate::lifecycle;
use crate::models::{
    Event, EventStatus, NewEvent, Principal, ReconcileReport, Registration, RegistrationReceipt,
    RegistrationUpdate, RemovedRegistration,
};
use crate::notifications::{Notification, Notifier};
use crate::repositories::RegistrationRepository;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Owns the registration lifecycle and the seat counter of every event
pub struct RegistrationService {
    repo: Arc<dyn RegistrationRepository>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    retry: RetryConfig,
}

impl RegistrationService {
    pub fn new(
        repo: Arc<dyn RegistrationRepository>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            clock,
            notifier,
            retry: RetryConfig::default(),
        }
    }

    /// Set the contention retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run one store transaction, replaying it whole on contention.
    ///
    /// Internal failures are logged here with their detail and replaced by an
    /// opaque error before reaching the caller.
    async fn run<T, F, Fut>(&self, operation: &'static str, entity_id: Uuid, mut attempt_fn: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        operation,
                        entity_id = %entity_id,
                        attempt,
                        error = %err,
                        "Transaction contention, retrying"
                    );
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) if err.is_connection_error() => {
                    error!(
                        operation,
                        entity_id = %entity_id,
                        attempt,
                        error = %err,
                        "Database unavailable"
                    );
                    return Err(AppError::Internal(format!("{} failed", operation)));
                }
                Err(err) if err.is_internal() => {
                    error!(
                        operation,
                        entity_id = %entity_id,
                        attempt,
                        error = %err,
                        "Registration operation failed"
                    );
                    return Err(AppError::Internal(format!("{} failed", operation)));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Hand a notification to the notifier without waiting on it
    fn notify(&self, notification: Notification) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                warn!(
                    notification = notification.name(),
                    event_id = %notification.event_id(),
                    error = %e,
                    "Notification delivery failed"
                );
            }
        });
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Create a combine or tryout
    pub async fn create_event(&self, principal: &Principal, new_event: NewEvent) -> AppResult<Event> {
        let organizer_id = lifecycle::resolve_organizer(principal, &new_event)?;
        let event = Event::new(new_event, organizer_id, self.clock.now());
        let event_id = event.id;

        let event = self
            .run("create_event", event_id, || self.repo.create_event(event.clone()))
            .await?;

        info!(
            event_id = %event.id,
            kind = event.kind.as_str(),
            max_spots = event.max_spots,
            "Created event"
        );

        self.notify(Notification::EventCreated {
            event_id: event.id,
            kind: event.kind,
            title: event.title.clone(),
            game: event.game.clone(),
            date: event.date,
            max_spots: event.max_spots,
            actor_id: principal.id,
        });

        Ok(event)
    }

    pub async fn get_event(&self, event_id: Uuid) -> AppResult<Event> {
        let event = self
            .run("get_event", event_id, || self.repo.find_event(event_id))
            .await?;
        option_to_result(event, "Event not found")
    }

    /// Pure status update; coaches must organize the event
    pub async fn update_event_status(
        &self,
        principal: &Principal,
        event_id: Uuid,
        status: EventStatus,
    ) -> AppResult<Event> {
        let now = self.clock.now();
        let event = self
            .run("update_event_status", event_id, || {
                self.repo.update_event_status(event_id, *principal, status, now)
            })
            .await?;

        info!(event_id = %event_id, status = status.as_str(), "Updated event status");

        self.notify(Notification::EventStatusChanged {
            event_id,
            title: event.title.clone(),
            status,
            actor_id: principal.id,
        });

        Ok(event)
    }

    pub async fn update_event_capacity(
        &self,
        principal: &Principal,
        event_id: Uuid,
        max_spots: i32,
    ) -> AppResult<Event> {
        let now = self.clock.now();
        let event = self
            .run("update_event_capacity", event_id, || {
                self.repo.update_event_capacity(event_id, *principal, max_spots, now)
            })
            .await?;

        info!(event_id = %event_id, max_spots, "Updated event capacity");

        self.notify(Notification::EventCapacityChanged {
            event_id,
            title: event.title.clone(),
            max_spots,
            actor_id: principal.id,
        });

        Ok(event)
    }

    /// Delete an event that has no registrations left
    pub async fn delete_event(&self, principal: &Principal, event_id: Uuid) -> AppResult<()> {
        lifecycle::ensure_admin(principal, "delete events")?;

        let event = self
            .run("delete_event", event_id, || self.repo.delete_event(event_id))
            .await?;

        info!(event_id = %event_id, "Deleted event");

        self.notify(Notification::EventDeleted {
            event_id,
            title: event.title,
            actor_id: principal.id,
        });

        Ok(())
    }

    /// Recompute the seat counter from the registrations table
    pub async fn reconcile_event(&self, principal: &Principal, event_id: Uuid) -> AppResult<ReconcileReport> {
        lifecycle::ensure_admin(principal, "reconcile events")?;

        let now = self.clock.now();
        let report = self
            .run("reconcile_event", event_id, || self.repo.reconcile_event(event_id, now))
            .await?;

        if report.drifted() {
            warn!(
                event_id = %event_id,
                previous = report.previous,
                recomputed = report.recomputed,
                over_capacity = report.over_capacity,
                "Seat counter drift corrected"
            );
        } else {
            info!(event_id = %event_id, registered_spots = report.recomputed, "Seat counter consistent");
        }

        self.notify(Notification::EventReconciled {
            event_id,
            previous: report.previous,
            recomputed: report.recomputed,
            actor_id: principal.id,
        });

        Ok(report)
    }

    // =========================================================================
    // Registrations
    // =========================================================================

    /// Claim a seat for the calling player
    pub async fn register(
        &self,
        principal: &Principal,
        event_id: Uuid,
        player_id: Uuid,
    ) -> AppResult<RegistrationReceipt> {
        lifecycle::ensure_player_acts_for_self(principal, player_id)?;

        let now = self.clock.now();
        let receipt = self
            .run("register", event_id, || self.repo.register(event_id, player_id, now))
            .await?;

        info!(
            event_id = %event_id,
            player_id = %player_id,
            registration_id = %receipt.registration.id,
            registered_spots = receipt.event.registered_spots,
            max_spots = receipt.event.max_spots,
            "Player registered"
        );

        Ok(receipt)
    }

    /// Owner cancellation; releases the seat exactly once
    pub async fn cancel_registration(
        &self,
        principal: &Principal,
        registration_id: Uuid,
    ) -> AppResult<Registration> {
        let now = self.clock.now();
        let registration = self
            .run("cancel_registration", registration_id, || {
                self.repo.cancel_registration(registration_id, *principal, now)
            })
            .await?;

        info!(
            registration_id = %registration_id,
            event_id = %registration.event_id,
            player_id = %registration.player_id,
            "Registration cancelled"
        );

        Ok(registration)
    }

    /// Admin override of status and, for combines, qualification
    pub async fn update_registration_status(
        &self,
        principal: &Principal,
        registration_id: Uuid,
        update: RegistrationUpdate,
    ) -> AppResult<Registration> {
        lifecycle::ensure_admin(principal, "override registrations")?;

        let now = self.clock.now();
        let registration = self
            .run("update_registration_status", registration_id, || {
                self.repo.override_registration(registration_id, update, now)
            })
            .await?;

        info!(
            registration_id = %registration_id,
            status = registration.status.as_str(),
            qualified = ?registration.qualified,
            "Registration status overridden"
        );

        self.notify(Notification::RegistrationStatusOverridden {
            registration_id,
            event_id: registration.event_id,
            player_id: registration.player_id,
            status: registration.status,
            qualified: registration.qualified,
            actor_id: principal.id,
        });

        Ok(registration)
    }

    /// Admin hard-delete of a registration
    pub async fn remove_registration(
        &self,
        principal: &Principal,
        registration_id: Uuid,
    ) -> AppResult<RemovedRegistration> {
        lifecycle::ensure_admin(principal, "remove registrations")?;

        let now = self.clock.now();
        let removed = self
            .run("remove_registration", registration_id, || {
                self.repo.remove_registration(registration_id, now)
            })
            .await?;

        info!(
            registration_id = %registration_id,
            event_id = %removed.registration.event_id,
            released_seat = removed.released_seat,
            registered_spots = removed.registered_spots,
            "Registration removed"
        );

        self.notify(Notification::RegistrationRemoved {
            registration_id,
            event_id: removed.registration.event_id,
            player_id: removed.registration.player_id,
            released_seat: removed.released_seat,
            actor_id: principal.id,
        });

        Ok(removed)
    }

    pub async fn get_registration(&self, registration_id: Uuid) -> AppResult<Registration> {
        let registration = self
            .run("get_registration", registration_id, || {
                self.repo.find_registration(registration_id)
            })
            .await?;
        option_to_result(registration, "Registration not found")
    }

    /// Registrations of an event, oldest first
    pub async fn list_registrations(&self, event_id: Uuid) -> AppResult<Vec<Registration>> {
        self.get_event(event_id).await?;
        self.run("list_registrations", event_id, || self.repo.list_registrations(event_id))
            .await
    }
}
