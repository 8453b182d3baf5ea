use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use crate::api::{error::ApiError, pages, state::AppState};
use crate::authz::{LoginAttempt, LoginOutcome};
use crate::errors::Error;
use crate::secrets::SecretString;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub login_challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: SecretString,
}

fn challenge(query: LoginQuery) -> Result<String, ApiError> {
    query
        .login_challenge
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::validation("no login challenge provided").into())
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string()
}

fn respond(challenge: &str, outcome: LoginOutcome) -> Response {
    match outcome {
        LoginOutcome::Accepted { redirect_to, .. } => super::found(&redirect_to),
        LoginOutcome::PromptCredentials => Html(pages::login_page(challenge)).into_response(),
    }
}

/// `GET /login`: try the client certificate forwarded by the proxy, fall back
/// to the password form.
pub async fn show_login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let challenge = challenge(query)?;
    let identity = &state.config.identity;
    let attempt = LoginAttempt::Certificate {
        identity_header: header_value(&headers, &identity.identity_header),
        serial_header: header_value(&headers, &identity.serial_header),
    };

    let outcome = state.broker.resolve_login(&challenge, attempt).await?;
    Ok(respond(&challenge, outcome))
}

/// `POST /login`: password form submission.
pub async fn submit_login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let challenge = challenge(query)?;
    let attempt = LoginAttempt::Password { username: form.username, password: form.password };

    let outcome = state.broker.resolve_login(&challenge, attempt).await?;
    Ok(respond(&challenge, outcome))
}
