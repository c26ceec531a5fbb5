//! Session guard for the authenticated routes.

use super::handlers::ApiError;
use super::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashSet;

const TOKEN_HEADERS: [&str; 2] = ["X-Emby-Token", "X-MediaBrowser-Token"];
const CLIENT_AUTH_HEADER: &str = "X-Emby-Authorization";

/// Decides whether a request belongs to an authenticated session.
pub trait SessionGuard: Send + Sync {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool;
}

/// Accepts requests carrying one of a fixed set of access tokens.
pub struct ApiKeyGuard {
    keys: HashSet<String>,
}

impl ApiKeyGuard {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        let keys: HashSet<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            log::warn!("[Server] No API keys configured; private scripts will always be refused");
        }
        Self { keys }
    }
}

impl SessionGuard for ApiKeyGuard {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        extract_token(headers).is_some_and(|token| self.keys.contains(&token))
    }
}

/// Pull the access token out of any of the header forms web clients send.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    for name in TOKEN_HEADERS {
        if let Some(value) = header_str(headers, name) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    for name in [AUTHORIZATION.as_str(), CLIENT_AUTH_HEADER] {
        if let Some(token) = header_str(headers, name).and_then(parse_authorization) {
            return Some(token);
        }
    }
    None
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// `Bearer <token>` or `MediaBrowser Client="..", Token="<token>"`.
fn parse_authorization(value: &str) -> Option<String> {
    let (scheme, params) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("Bearer") {
        let token = params.trim();
        return (!token.is_empty()).then(|| token.to_string());
    }
    if scheme.eq_ignore_ascii_case("MediaBrowser") || scheme.eq_ignore_ascii_case("Emby") {
        return params.split(',').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("Token") {
                return None;
            }
            let token = value.trim().trim_matches('"');
            (!token.is_empty()).then(|| token.to_string())
        });
    }
    None
}

pub async fn require_session(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.guard.is_authenticated(request.headers()) {
        next.run(request).await
    } else {
        log::debug!("[Server] Refused unauthenticated request to {}", request.uri().path());
        ApiError::Unauthorized.into_response()
    }
}
