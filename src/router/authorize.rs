use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Extension;

use crate::dto::AuthorizeQuery;
use crate::middleware::SessionId;
use crate::orchestrator::AuthorizeOutcome;
use crate::router::RouterState;

/// `GET /api/:apiId/authorize` (§4.5/§4.1 `AuthorizeStart`).
pub async fn authorize(
    State(state): State<RouterState>,
    Path(api_id): Path<String>,
    Extension(session_id): Extension<SessionId>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    let outcome = state
        .app
        .orchestrator
        .start_authorize(&session_id.0, &state.auth_method_id, &api_id, &query)
        .await;
    render_outcome(outcome, &state, &query.redirect_uri, query.state.as_deref())
}

/// Shared by every router continuation (`/register`, `/selectnamespace`, `/grant`) as
/// well as `authorize` itself: turns an `AuthorizeOutcome` into the right HTTP response
/// (§4.1/§7). `NeedsInteraction` locations are mounted-relative (`/login`, `/register`,
/// `/grant`); since the whole OAuth2 Router is nested under `{basePath}/{authMethodId}`
/// (§6), a root-absolute location is rewritten onto that mount point before redirecting.
pub fn render_outcome(outcome: AuthorizeOutcome, state: &RouterState, fallback_redirect_uri: &str, oauth_state: Option<&str>) -> Response {
    match outcome {
        AuthorizeOutcome::NeedsInteraction { location } => Redirect::to(&mount_relative(state, &location)).into_response(),
        AuthorizeOutcome::Minted { redirect_uri } => Redirect::to(&redirect_uri).into_response(),
        AuthorizeOutcome::Failed(e) => {
            if fallback_redirect_uri.is_empty() {
                e.into_json_response()
            } else {
                e.into_redirect_response(fallback_redirect_uri, oauth_state)
            }
        }
    }
}

fn mount_relative(state: &RouterState, location: &str) -> String {
    if let Some(rest) = location.strip_prefix('/') {
        format!("{}/{}/{rest}", state.app.config.base_path.trim_end_matches('/'), state.auth_method_id)
    } else {
        location.to_string()
    }
}
