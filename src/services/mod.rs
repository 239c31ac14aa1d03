//! External service clients
//!
//! The remote authentication / registration service is reached through the
//! [`AuthClient`] trait so tests can substitute a mock.

mod auth;

pub use auth::{AuthClient, HttpAuthClient, ServiceError};
