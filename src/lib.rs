//! Combine and tryout registration backend
//!
//! Seat accounting and registration lifecycle for recruiting events, exposed
//! to tests and to the HTTP binary.

pub mod api;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod notifications;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use api::{router, AppState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorCode};
pub use services::RegistrationService;
