use axum::{
    body::Body,
    extract::State,
    http::{header::COOKIE, header::SET_COOKIE, Request},
    middleware::Next,
    response::Response,
};

use crate::config::AppState;
use crate::session::{mint_cookie, verify_cookie, SESSION_COOKIE_NAME};

/// The resolved session id for this request, injected into request extensions.
/// Mirrors the teacher's `jwt_auth` middleware shape (`from_fn_with_state` +
/// extension-injection) with cookie+session-store lookup standing in for JWT
/// verification (§4.9).
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

/// Parses/verifies the `portal-auth.cookie.sid` cookie and attaches a `SessionId` to
/// the request. A missing or invalid cookie is not rejected — most routes tolerate an
/// absent session; only `CheckSession` in the flow orchestrator treats it as "not
/// logged in" (§4.9). A brand new session id is minted and written back as a
/// `Set-Cookie` header when no valid cookie was presented.
pub async fn session_middleware(State(state): State<AppState>, mut request: Request<Body>, next: Next) -> Response {
    let existing = request
        .headers()
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| find_cookie(raw, SESSION_COOKIE_NAME));

    let verified = existing.and_then(|value| verify_cookie(&value, &state.config.session_secret));

    let (session_id, new_cookie_value) = match verified {
        Some(session_id) => (session_id, None),
        None => {
            let (session_id, cookie_value) = mint_cookie(&state.config.session_secret);
            (session_id, Some(cookie_value))
        }
    };

    request.extensions_mut().insert(SessionId(session_id));

    let mut response = next.run(request).await;

    if let Some(cookie_value) = new_cookie_value {
        let max_age = state.config.session_minutes * 60;
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE_NAME, cookie_value, max_age
        );
        if state.config.is_production() {
            cookie.push_str("; Secure");
        }
        if let Ok(value) = cookie.parse() {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

fn find_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let pair = pair.trim();
        pair.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cookie_among_several() {
        let header = "other=1; portal-auth.cookie.sid=abc.def; another=2";
        assert_eq!(find_cookie(header, SESSION_COOKIE_NAME), Some("abc.def".to_string()));
    }

    #[test]
    fn missing_cookie_returns_none() {
        let header = "other=1";
        assert_eq!(find_cookie(header, SESSION_COOKIE_NAME), None);
    }
}
