//! # Login and Consent Challenges
//!
//! The Authz Server delegates login and consent decisions to this service.
//! [`ChallengeBroker`] fetches a pending challenge, decides it using the
//! certificate, password or skip paths and accepts it; [`AuthzServer`] is the
//! admin API it talks to.

pub mod broker;
pub mod client;
pub mod memory;
pub mod types;

pub use broker::{ChallengeBroker, ConsentAction, ConsentOutcome, LoginAttempt, LoginOutcome};
pub use client::{AuthzServer, HydraAdminClient};
pub use memory::InMemoryAuthzServer;
pub use types::{
    AcceptConsentRequest, AcceptLoginRequest, ConsentChallenge, LoginChallenge, RedirectResponse,
};

use thiserror::Error;

/// Result type for Authz Server operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Error, Debug)]
pub enum AuthzError {
    /// Network failure or timeout
    #[error("Authz Server unreachable: {0}")]
    Transport(String),

    /// Non-2xx answer, including unknown, expired or replayed challenges
    #[error("Authz Server {endpoint} returned {status}: {message}")]
    Status { endpoint: &'static str, status: u16, message: String },

    #[error("Authz Server {endpoint} response could not be decoded: {message}")]
    Decode { endpoint: &'static str, message: String },

    /// The challenge names a subject that is not a valid principal
    #[error("Challenge subject is not a valid principal: {0}")]
    InvalidSubject(String),
}

impl AuthzError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}
