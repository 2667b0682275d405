#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use recruit_registrations::clock::ManualClock;
use recruit_registrations::models::*;
use recruit_registrations::notifications::{Notification, Notifier, NotifierError};
use recruit_registrations::repositories::InMemoryRegistrationRepository;
use recruit_registrations::RegistrationService;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Fixed starting instant for every test clock
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Records every notification it receives
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifierError> {
        let _ = self.tx.send(notification.clone());
        Ok(())
    }
}

/// Always fails, like a webhook that is down
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifierError> {
        Err(NotifierError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "webhook unreachable",
        )))
    }
}

/// Service wired to the in-memory store, a manual clock and a recording notifier
pub struct TestHarness {
    pub repo: Arc<InMemoryRegistrationRepository>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<RegistrationService>,
    pub admin: Principal,
    pub coach: Principal,
    notifications: Mutex<mpsc::UnboundedReceiver<Notification>>,
}

impl TestHarness {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::build(Arc::new(RecordingNotifier { tx }), rx)
    }

    /// Harness whose notifier always errors
    pub fn with_failing_notifier() -> Self {
        let (_tx, rx) = mpsc::unbounded_channel();
        Self::build(Arc::new(FailingNotifier), rx)
    }

    fn build(notifier: Arc<dyn Notifier>, rx: mpsc::UnboundedReceiver<Notification>) -> Self {
        let repo = Arc::new(InMemoryRegistrationRepository::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let service = Arc::new(RegistrationService::new(
            repo.clone(),
            clock.clone(),
            notifier,
        ));

        Self {
            repo,
            clock,
            service,
            admin: Principal::admin(Uuid::new_v4()),
            coach: Principal::coach(Uuid::new_v4()),
            notifications: Mutex::new(rx),
        }
    }

    /// Next notification, waiting briefly for the spawned delivery task
    pub async fn next_notification(&self) -> Option<Notification> {
        let mut rx = self.notifications.lock().await;
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn create_open_combine(&self, max_spots: i32) -> Event {
        self.service
            .create_event(&self.coach, combine_request(max_spots))
            .await
            .expect("Failed to create combine")
    }

    pub async fn create_open_tryout(&self, max_spots: i32, deadline: DateTime<Utc>) -> Event {
        self.service
            .create_event(&self.coach, tryout_request(max_spots, deadline))
            .await
            .expect("Failed to create tryout")
    }

    /// Register a fresh player and return them with the receipt
    pub async fn register_new_player(&self, event_id: Uuid) -> (Principal, RegistrationReceipt) {
        let player = Principal::player(Uuid::new_v4());
        let receipt = self
            .service
            .register(&player, event_id, player.id)
            .await
            .expect("Failed to register player");
        (player, receipt)
    }

    pub async fn registered_spots(&self, event_id: Uuid) -> i32 {
        self.service
            .get_event(event_id)
            .await
            .expect("Event should exist")
            .registered_spots
    }
}

pub fn combine_request(max_spots: i32) -> NewEvent {
    NewEvent {
        kind: EventKind::Combine,
        title: "Spring Valorant Combine".to_string(),
        game: "Valorant".to_string(),
        organizer_id: None,
        date: start_time() + Duration::days(30),
        registration_deadline: None,
        max_spots,
        status: Some(EventStatus::RegistrationOpen),
        invite_only: false,
        min_gpa: None,
        class_years: vec!["2027".to_string(), "2028".to_string()],
        required_roles: vec![],
    }
}

pub fn tryout_request(max_spots: i32, deadline: DateTime<Utc>) -> NewEvent {
    NewEvent {
        kind: EventKind::Tryout,
        title: "Varsity League Tryout".to_string(),
        game: "League of Legends".to_string(),
        organizer_id: None,
        date: start_time() + Duration::days(30),
        registration_deadline: Some(deadline),
        max_spots,
        status: Some(EventStatus::RegistrationOpen),
        invite_only: false,
        min_gpa: None,
        class_years: vec![],
        required_roles: vec!["jungle".to_string()],
    }
}
