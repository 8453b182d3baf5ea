//! HTTP request handlers organized by resource type

pub mod certificates;
pub mod consent;
pub mod health;
pub mod login;

pub use certificates::{issue_certificate, revoke_certificates};
pub use consent::{show_consent, submit_consent};
pub use health::health_handler;
pub use login::{show_login, submit_login};

use axum::{
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
};

/// `302 Found` to the Authz Server's `redirect_to`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}
