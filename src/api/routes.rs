use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
        request::Parts,
        HeaderValue, Method, Request,
    },
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Whether `origin`'s host is `suffix` or a subdomain of it.
pub fn origin_allowed(origin: &HeaderValue, suffix: &str) -> bool {
    let Some(host) = origin
        .to_str()
        .ok()
        .and_then(|o| url::Url::parse(o).ok())
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    let suffix = suffix.trim_start_matches('.').to_ascii_lowercase();
    host == suffix || host.ends_with(&format!(".{}", suffix))
}

fn cors_layer(suffix: &str) -> CorsLayer {
    let suffix = suffix.to_string();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin_allowed(origin, &suffix)
        }))
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::OPTIONS, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, CONTENT_DISPOSITION])
        .allow_credentials(true)
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin_suffix);

    Router::new()
        .route("/login", get(handlers::show_login).post(handlers::submit_login))
        .route("/consent", get(handlers::show_consent).post(handlers::submit_consent))
        .route(
            "/cert",
            get(handlers::issue_certificate).delete(handlers::revoke_certificates),
        )
        .route("/healthz", get(handlers::health_handler))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            crate::request_span!(request.method(), request.uri().path())
        }))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_match_on_host_suffix() {
        let allowed = |o: &str| origin_allowed(&HeaderValue::from_str(o).unwrap(), "fadalax.tech");

        assert!(allowed("https://fadalax.tech"));
        assert!(allowed("https://app.fadalax.tech:4200"));
        assert!(!allowed("https://evilfadalax.tech"));
        assert!(!allowed("https://fadalax.tech.evil.com"));
        assert!(!allowed("null"));
    }
}
