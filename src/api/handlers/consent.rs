use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use url::form_urlencoded;

use crate::api::{error::ApiError, pages, state::AppState};
use crate::authz::{ConsentAction, ConsentOutcome};
use crate::errors::Error;

#[derive(Debug, Deserialize)]
pub struct ConsentQuery {
    pub consent_challenge: Option<String>,
}

fn challenge(query: ConsentQuery) -> Result<String, ApiError> {
    query
        .consent_challenge
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::validation("no consent challenge provided").into())
}

/// Selected scopes from a consent form body.
///
/// The rendered form carries a `scope_selection` marker; without it (an empty
/// or foreign POST) every requested scope is granted.
pub fn selected_scopes(body: &[u8]) -> Option<Vec<String>> {
    let mut marked = false;
    let mut scopes = Vec::new();
    for (key, value) in form_urlencoded::parse(body) {
        match key.as_ref() {
            "scope_selection" => marked = true,
            "grant_scope" => scopes.push(value.into_owned()),
            _ => {}
        }
    }
    marked.then_some(scopes)
}

fn respond(challenge: &str, outcome: ConsentOutcome) -> Response {
    match outcome {
        ConsentOutcome::Granted { redirect_to } => super::found(&redirect_to),
        ConsentOutcome::PromptConsent { subject, requested_scope } => {
            Html(pages::consent_page(challenge, &subject, &requested_scope)).into_response()
        }
    }
}

/// `GET /consent`
pub async fn show_consent(
    State(state): State<AppState>,
    Query(query): Query<ConsentQuery>,
) -> Result<Response, ApiError> {
    let challenge = challenge(query)?;
    let outcome = state.broker.resolve_consent(&challenge, ConsentAction::View).await?;
    Ok(respond(&challenge, outcome))
}

/// `POST /consent`: grant, optionally narrowed to the checked scopes.
pub async fn submit_consent(
    State(state): State<AppState>,
    Query(query): Query<ConsentQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let challenge = challenge(query)?;
    let action = ConsentAction::Submit { scopes: selected_scopes(&body) };
    let outcome = state.broker.resolve_consent(&challenge, action).await?;
    Ok(respond(&challenge, outcome))
}
