//! HealthHub web client core: session lifecycle and role-gated navigation.

pub mod api;
pub mod catalog;
pub mod config;
pub mod devserver;
pub mod error;
pub mod guard;
pub mod models;
pub mod nav;
pub mod registration;
pub mod session;
pub mod storage;

pub use error::AuthError;
pub use guard::{Decision, GuardState, RouteGuard};
pub use models::{Credentials, Role, Session, SessionStatus};
pub use session::SessionManager;
