use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::middleware as axum_middleware;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Json, Router};

use crate::config::AppState;
use crate::middleware::session_middleware;

/// Assembles the top-level router (§4.9): one `router::build` tree nested at
/// `/{authMethodId}` per enabled auth method, plus the auth-method-agnostic
/// `/profile`, `/logout`, `/failure` endpoints.
pub fn build(state: AppState) -> Router {
    let base_path = state.config.base_path.clone();

    let mut router = Router::new()
        .route("/profile", axum::routing::get(profile))
        .route("/logout", axum::routing::get(logout))
        .route("/failure", axum::routing::get(failure));

    for method in &state.config.auth_methods {
        if !method.enabled {
            continue;
        }
        let mounted = crate::router::build(method.name.clone(), state.clone());
        router = router.nest(&format!("/{}", method.name), mounted);
    }

    let router = router
        .layer(axum_middleware::from_fn_with_state(state.clone(), session_middleware))
        .with_state(state);

    Router::new().nest(&base_path, router)
}

/// `GET /profile` (§6): OIDC userinfo, resolved from the `Authorization: Bearer …`
/// token via the Profile Store.
async fn profile(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Response {
    let token = match headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => return StatusCode::UNAUTHORIZED.into_response(),
    };

    match state.profile_store.retrieve(token).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => StatusCode::UNAUTHORIZED.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "profile store lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(serde::Deserialize)]
struct LogoutQuery {
    redirect_uri: Option<String>,
}

/// `GET /logout?redirect_uri=` (§6): destroys every auth method's session record for
/// this cookie, then redirects or renders a logout page.
async fn logout(
    State(state): State<AppState>,
    axum::Extension(session_id): axum::Extension<crate::middleware::SessionId>,
    Query(query): Query<LogoutQuery>,
) -> Response {
    for method in &state.config.auth_methods {
        let _ = state.session_store.destroy(&session_id.0, &method.name).await;
    }

    match query.redirect_uri {
        Some(uri) => Redirect::to(&uri).into_response(),
        None => Html("<!doctype html><html><body>logged out</body></html>").into_response(),
    }
}

/// `GET /failure` (§6): last-resort error page. There is no OAuth2 contract to honor
/// here (the authorize/token handlers already translate failures into redirects or
/// JSON), so this just acknowledges that something upstream sent the user here.
async fn failure() -> Html<&'static str> {
    Html("<!doctype html><html><body>Something went wrong. Please try again.</body></html>")
}
