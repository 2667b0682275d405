//! Postgres-backed registration repository.
//!
//! Lock order is always event row first, then registration row, so concurrent
//! claims and releases on one event serialize on the event's row lock.

use super::RegistrationRepository;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::lifecycle::{self, SeatChange};
use crate::models::{
    Event, EventKind, EventStatus, Principal, ReconcileReport, Registration, RegistrationReceipt,
    RegistrationStatus, RegistrationUpdate, RemovedRegistration,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

const EVENT_COLUMNS: &str = "id, kind, title, game, organizer_id, date, registration_deadline, \
     max_spots, registered_spots, status, invite_only, min_gpa, class_years, required_roles, \
     created_at, updated_at";

const REGISTRATION_COLUMNS: &str =
    "id, event_id, player_id, status, qualified, registered_at, updated_at";

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    kind: String,
    title: String,
    game: String,
    organizer_id: Uuid,
    date: DateTime<Utc>,
    registration_deadline: Option<DateTime<Utc>>,
    max_spots: i32,
    registered_spots: i32,
    status: String,
    invite_only: bool,
    min_gpa: Option<Decimal>,
    class_years: Vec<String>,
    required_roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = RepositoryError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            kind: EventKind::from_str(&row.kind).map_err(RepositoryError::Decode)?,
            title: row.title,
            game: row.game,
            organizer_id: row.organizer_id,
            date: row.date,
            registration_deadline: row.registration_deadline,
            max_spots: row.max_spots,
            registered_spots: row.registered_spots,
            status: EventStatus::from_str(&row.status).map_err(RepositoryError::Decode)?,
            invite_only: row.invite_only,
            min_gpa: row.min_gpa,
            class_years: row.class_years,
            required_roles: row.required_roles,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RegistrationRow {
    id: Uuid,
    event_id: Uuid,
    player_id: Uuid,
    status: String,
    qualified: Option<bool>,
    registered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = RepositoryError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        Ok(Registration {
            id: row.id,
            event_id: row.event_id,
            player_id: row.player_id,
            status: RegistrationStatus::from_str(&row.status).map_err(RepositoryError::Decode)?,
            qualified: row.qualified,
            registered_at: row.registered_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_event(row: Option<EventRow>) -> AppResult<Option<Event>> {
    Ok(row.map(Event::try_from).transpose()?)
}

fn decode_registration(row: Option<RegistrationRow>) -> AppResult<Option<Registration>> {
    Ok(row.map(Registration::try_from).transpose()?)
}

fn event_not_found() -> AppError {
    AppError::NotFound("Event not found".into())
}

fn registration_not_found() -> AppError {
    AppError::NotFound("Registration not found".into())
}

/// Repository for events and registrations stored in Postgres
pub struct PgRegistrationRepository {
    pool: PgPool,
}

impl PgRegistrationRepository {
    /// Create a new PgRegistrationRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_event(conn: &mut PgConnection, event_id: Uuid) -> AppResult<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = $1 FOR UPDATE", EVENT_COLUMNS);
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_id)
            .fetch_optional(&mut *conn)
            .await?;
        decode_event(row)
    }

    async fn lock_registration(
        conn: &mut PgConnection,
        registration_id: Uuid,
    ) -> AppResult<Option<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE id = $1 FOR UPDATE",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(registration_id)
            .fetch_optional(&mut *conn)
            .await?;
        decode_registration(row)
    }

    /// Lock a registration together with its event, event first
    async fn lock_registration_with_event(
        conn: &mut PgConnection,
        registration_id: Uuid,
    ) -> AppResult<(Registration, Event)> {
        // Unlocked peek to learn the event id
        let event_id: Option<Uuid> =
            sqlx::query_scalar("SELECT event_id FROM registrations WHERE id = $1")
                .bind(registration_id)
                .fetch_optional(&mut *conn)
                .await?;
        let event_id = event_id.ok_or_else(registration_not_found)?;

        let event = Self::lock_event(conn, event_id)
            .await?
            .ok_or_else(event_not_found)?;

        // Re-read under lock; it may have been removed in between
        let registration = Self::lock_registration(conn, registration_id)
            .await?
            .ok_or_else(registration_not_found)?;

        Ok((registration, event))
    }

    async fn adjust_registered_spots(
        conn: &mut PgConnection,
        event_id: Uuid,
        change: SeatChange,
        now: DateTime<Utc>,
    ) -> AppResult<Event> {
        let sql = format!(
            "UPDATE events SET registered_spots = registered_spots + $2, updated_at = $3 \
             WHERE id = $1 RETURNING {}",
            EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_id)
            .bind(change.delta())
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        Ok(Event::try_from(row)?)
    }
}

#[async_trait]
impl RegistrationRepository for PgRegistrationRepository {
    async fn create_event(&self, event: Event) -> AppResult<Event> {
        let sql = format!(
            r#"
            INSERT INTO events
                (id, kind, title, game, organizer_id, date, registration_deadline, max_spots,
                 registered_spots, status, invite_only, min_gpa, class_years, required_roles,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event.id)
            .bind(event.kind.as_str())
            .bind(&event.title)
            .bind(&event.game)
            .bind(event.organizer_id)
            .bind(event.date)
            .bind(event.registration_deadline)
            .bind(event.max_spots)
            .bind(event.registered_spots)
            .bind(event.status.as_str())
            .bind(event.invite_only)
            .bind(event.min_gpa)
            .bind(&event.class_years)
            .bind(&event.required_roles)
            .bind(event.created_at)
            .bind(event.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(Event::try_from(row)?)
    }

    async fn find_event(&self, event_id: Uuid) -> AppResult<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        decode_event(row)
    }

    async fn find_registration(&self, registration_id: Uuid) -> AppResult<Option<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE id = $1",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(registration_id)
            .fetch_optional(&self.pool)
            .await?;
        decode_registration(row)
    }

    async fn list_registrations(&self, event_id: Uuid) -> AppResult<Vec<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE event_id = $1 ORDER BY registered_at ASC, id ASC",
            REGISTRATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| Registration::try_from(row).map_err(AppError::from))
            .collect()
    }

    async fn register(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<RegistrationReceipt> {
        let mut tx = self.pool.begin().await?;

        let event = Self::lock_event(&mut *tx, event_id)
            .await?
            .ok_or_else(event_not_found)?;

        let sql = format!(
            "SELECT {} FROM registrations WHERE event_id = $1 AND player_id = $2",
            REGISTRATION_COLUMNS
        );
        let existing = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(event_id)
            .bind(player_id)
            .fetch_optional(&mut *tx)
            .await?;
        let existing = decode_registration(existing)?;

        lifecycle::check_registration(&event, existing.as_ref(), now)?;

        let registration = Registration::new(event_id, player_id, event.kind, now);
        let insert = sqlx::query(
            r#"
            INSERT INTO registrations (id, event_id, player_id, status, qualified, registered_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(registration.id)
        .bind(registration.event_id)
        .bind(registration.player_id)
        .bind(registration.status.as_str())
        .bind(registration.qualified)
        .bind(registration.registered_at)
        .bind(registration.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = insert {
            return Err(match RepositoryError::from(err) {
                RepositoryError::Duplicate(_) => {
                    AppError::Conflict("You are already registered for this event".into())
                }
                other => other.into(),
            });
        }

        let event = Self::adjust_registered_spots(&mut *tx, event_id, SeatChange::Claim, now).await?;

        tx.commit().await?;

        debug!(
            event_id = %event_id,
            player_id = %player_id,
            registered_spots = event.registered_spots,
            "Seat claimed"
        );

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
        let mut tx = self.pool.begin().await?;

        let (registration, event) =
            Self::lock_registration_with_event(&mut *tx, registration_id).await?;

        lifecycle::check_cancellation(&registration, &event, &actor, now)?;

        let sql = format!(
            "UPDATE registrations SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(registration_id)
            .bind(RegistrationStatus::Cancelled.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        let cancelled = Registration::try_from(row)?;

        Self::adjust_registered_spots(&mut *tx, event.id, SeatChange::Release, now).await?;

        tx.commit().await?;

        Ok(cancelled)
    }

    async fn override_registration(
        &self,
        registration_id: Uuid,
        update: RegistrationUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<Registration> {
        let mut tx = self.pool.begin().await?;

        let (registration, event) =
            Self::lock_registration_with_event(&mut *tx, registration_id).await?;

        let change = lifecycle::check_override(&event, &registration, &update)?;

        let sql = format!(
            "UPDATE registrations SET status = $2, qualified = COALESCE($3, qualified), updated_at = $4 \
             WHERE id = $1 RETURNING {}",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(registration_id)
            .bind(update.status.as_str())
            .bind(update.qualified)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        let updated = Registration::try_from(row)?;

        if change != SeatChange::Keep {
            Self::adjust_registered_spots(&mut *tx, event.id, change, now).await?;
        }

        tx.commit().await?;

        Ok(updated)
    }

    async fn remove_registration(
        &self,
        registration_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<RemovedRegistration> {
        let mut tx = self.pool.begin().await?;

        let (registration, event) =
            Self::lock_registration_with_event(&mut *tx, registration_id).await?;

        sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(registration_id)
            .execute(&mut *tx)
            .await?;

        let change = lifecycle::removal_change(&registration);
        let registered_spots = if change == SeatChange::Keep {
            event.registered_spots
        } else {
            Self::adjust_registered_spots(&mut *tx, event.id, change, now)
                .await?
                .registered_spots
        };

        tx.commit().await?;

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
        let mut tx = self.pool.begin().await?;

        let event = Self::lock_event(&mut *tx, event_id)
            .await?
            .ok_or_else(event_not_found)?;
        lifecycle::ensure_can_manage_event(&actor, &event)?;

        let sql = format!(
            "UPDATE events SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_id)
            .bind(status.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Event::try_from(row)?)
    }

    async fn update_event_capacity(
        &self,
        event_id: Uuid,
        actor: Principal,
        max_spots: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Event> {
        let mut tx = self.pool.begin().await?;

        let event = Self::lock_event(&mut *tx, event_id)
            .await?
            .ok_or_else(event_not_found)?;
        lifecycle::ensure_can_manage_event(&actor, &event)?;
        lifecycle::check_capacity_change(&event, max_spots)?;

        let sql = format!(
            "UPDATE events SET max_spots = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_id)
            .bind(max_spots)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Event::try_from(row)?)
    }

    async fn delete_event(&self, event_id: Uuid) -> AppResult<Event> {
        let mut tx = self.pool.begin().await?;

        let event = Self::lock_event(&mut *tx, event_id)
            .await?
            .ok_or_else(event_not_found)?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await?;
        lifecycle::check_deletable(count)?;

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(event)
    }

    async fn reconcile_event(&self, event_id: Uuid, now: DateTime<Utc>) -> AppResult<ReconcileReport> {
        let mut tx = self.pool.begin().await?;

        let event = Self::lock_event(&mut *tx, event_id)
            .await?
            .ok_or_else(event_not_found)?;

        let held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND status <> $2",
        )
        .bind(event_id)
        .bind(RegistrationStatus::Cancelled.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let recomputed = i32::try_from(held).map_err(|_| {
            AppError::Internal(format!("Seat count {} out of range for event {}", held, event_id))
        })?;
        let over_capacity = recomputed > event.max_spots;

        if over_capacity {
            warn!(
                event_id = %event_id,
                recomputed,
                max_spots = event.max_spots,
                "Event holds more seats than its capacity; raising max_spots to match"
            );
        }

        sqlx::query(
            "UPDATE events SET registered_spots = $2, max_spots = GREATEST(max_spots, $2), \
             updated_at = $3 WHERE id = $1",
        )
        .bind(event_id)
        .bind(recomputed)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReconcileReport {
            event_id,
            previous: event.registered_spots,
            recomputed,
            over_capacity,
        })
    }
}
