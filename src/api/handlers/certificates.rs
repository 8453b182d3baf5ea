use std::sync::Arc;

use axum::{
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};

use crate::api::{error::ApiError, state::AppState};
use crate::auth::parse_bearer;
use crate::errors::Error;
use crate::identity::Principal;
use crate::secrets::{SecretStore, SecretsError};

const PKCS12_CONTENT_TYPE: &str = "application/x-pkcs12";
const PKCS12_DISPOSITION: &str = "attachment; filename=cert.p12";

/// Validate the bearer token and exchange it for a Secret Store session
/// scoped to the token's principal.
async fn principal_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Principal, Arc<dyn SecretStore>), ApiError> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let token = parse_bearer(header).map_err(Error::from)?;
    let principal = state.tokens.validate(&token).await.map_err(Error::from)?;
    tracing::Span::current().record("principal", principal.as_str());

    let session = state.store.login_jwt(principal.as_str(), &token).await.map_err(|e| match e {
        SecretsError::AuthenticationFailed { .. } => Error::unauthenticated(e.to_string()),
        other => Error::from(other),
    })?;
    Ok((principal, session))
}

/// `GET /cert`: issue a new client certificate as a password-less PKCS#12.
pub async fn issue_certificate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (principal, session) = principal_session(&state, &headers).await?;
    let issued = state.lifecycle.issue(session.as_ref(), &principal).await.map_err(Error::from)?;

    Ok((
        [(CONTENT_TYPE, PKCS12_CONTENT_TYPE), (CONTENT_DISPOSITION, PKCS12_DISPOSITION)],
        issued.pkcs12,
    )
        .into_response())
}

/// `DELETE /cert`: revoke every certificate of the caller. A partial failure
/// answers 500 with the summary so the caller sees which serials remain.
pub async fn revoke_certificates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (principal, session) = principal_session(&state, &headers).await?;
    let summary =
        state.lifecycle.revoke_all(session.as_ref(), &principal).await.map_err(Error::from)?;

    let status =
        if summary.is_complete() { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    Ok((status, Json(summary)).into_response())
}
