use super::{Notification, Notifier, NotifierError};
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "event_created", "registration_removed", etc.
    pub event_id: Uuid,
    pub actor_id: Uuid,
    pub details: serde_json::Value,
}

impl AuditLogEntry {
    pub fn from_notification(
        notification: &Notification,
        now: DateTime<Utc>,
    ) -> Result<Self, NotifierError> {
        Ok(Self {
            timestamp: now.timestamp(),
            event_type: notification.name().to_string(),
            event_id: notification.event_id(),
            actor_id: notification.actor_id(),
            details: serde_json::to_value(notification)?,
        })
    }
}

/// File currently open for appending and the day it belongs to
struct OpenLog {
    date: NaiveDate,
    file: std::fs::File,
}

/// Appends every notification as one JSON line to `audit_YYYY-MM-DD.log`,
/// rolling over to a new file when the UTC date changes
pub struct AuditLogNotifier {
    log_directory: PathBuf,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<OpenLog>>,
}

impl AuditLogNotifier {
    /// Create the log directory if needed
    pub fn new(log_directory: impl AsRef<Path>) -> Result<Self, NotifierError> {
        let log_directory = log_directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&log_directory)?;

        info!("Audit trail initialized: {:?}", log_directory);

        Ok(Self {
            log_directory,
            clock: Arc::new(SystemClock),
            current: Mutex::new(None),
        })
    }

    /// Use another clock for timestamps and file dates
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn log_directory(&self) -> &Path {
        &self.log_directory
    }

    /// Path of the file written for the given day
    pub fn log_file_for(&self, date: NaiveDate) -> PathBuf {
        self.log_directory
            .join(format!("audit_{}.log", date.format("%Y-%m-%d")))
    }

    /// Write one entry into the file for the entry's day
    pub async fn log(&self, entry: &AuditLogEntry) -> Result<(), NotifierError> {
        let json = serde_json::to_string(entry)?;
        let date = DateTime::<Utc>::from_timestamp(entry.timestamp, 0)
            .map(|t| t.date_naive())
            .unwrap_or_else(|| self.clock.now().date_naive());

        let mut current = self.current.lock().await;
        let open = match current.take() {
            Some(open) if open.date == date => open,
            _ => OpenLog {
                date,
                file: OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.log_file_for(date))?,
            },
        };
        let open = current.insert(open);

        writeln!(open.file, "{}", json)?;
        open.file.flush()?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for AuditLogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifierError> {
        let entry = AuditLogEntry::from_notification(notification, self.clock.now())?;
        self.log(&entry).await
    }
}
