//! Domain models for the registration service.
//!
//! Events (combines and tryouts), the registrations that claim their seats,
//! and the principal performing each operation.

pub mod event;
pub mod principal;
pub mod registration;

// Re-export all models for convenient access
pub use event::{CombineGate, Event, EventKind, EventStatus, NewEvent, RegistrationGate, TryoutGate};
pub use principal::{Principal, Role};
pub use registration::{
    ReconcileReport, Registration, RegistrationReceipt, RegistrationStatus, RegistrationUpdate,
    RemovedRegistration,
};
