use std::time::Duration;

use axum::extract::{Form, State};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::AppState;
use crate::error::FlowError;
use crate::middleware::SessionId;

const CSRF_MISMATCH_DELAY: Duration = Duration::from_millis(500);

/// Grant Manager (§4.6): lists and revokes the authenticated user's per-(app, API)
/// scope grants. Mounted at `/grants` under each auth method's router.
pub fn grants_router(app: AppState) -> Router {
    Router::new()
        .route("/", get(list_grants).post(revoke_grant))
        .with_state(app)
}

#[derive(Debug, Serialize)]
struct GrantView {
    application_id: String,
    application_name: String,
    api_id: String,
    api_name: String,
    scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GrantsList {
    csrf_token: String,
    grants: Vec<GrantView>,
}

#[derive(Debug, Deserialize)]
struct RevokeForm {
    csrf_token: String,
    application_id: String,
    api_id: String,
}

/// `GET /grants`: mints a fresh single-use CSRF token alongside the listing, since this
/// capability is API-shaped rather than form-rendered (§4.6).
async fn list_grants(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
) -> Result<Json<GrantsList>, FlowError> {
    let (auth_method_id, user_id) = current_user(&state, &session_id).await?;
    let token = crate::csrf::generate_token();
    state
        .session_store
        .update(&session_id.0, &auth_method_id, |record| record.csrf_token = Some(token.clone()))
        .await?;

    let grants = state.portal.list_grants(&user_id).await?;

    let mut views = Vec::with_capacity(grants.len());
    for grant in grants {
        let application_name = state
            .portal
            .get_application(&grant.application_id)
            .await
            .map(|a| a.name)
            .unwrap_or_else(|_| "(unknown application)".to_string());
        let api_name = state
            .portal
            .get_api(&grant.api_id)
            .await
            .map(|a| a.id)
            .unwrap_or_else(|_| "(unknown api)".to_string());
        views.push(GrantView {
            application_id: grant.application_id,
            application_name,
            api_id: grant.api_id,
            api_name,
            scopes: grant.grant_scopes,
        });
    }

    Ok(Json(GrantsList { csrf_token: token, grants: views }))
}

async fn revoke_grant(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
    Form(form): Form<RevokeForm>,
) -> Result<impl IntoResponse, FlowError> {
    let (auth_method_id, user_id) = current_user(&state, &session_id).await?;

    let record = state.session_store.get(&session_id.0, &auth_method_id).await?;
    if !crate::csrf::tokens_match(record.csrf_token.as_deref(), &form.csrf_token) {
        tokio::time::sleep(CSRF_MISMATCH_DELAY).await;
        return Err(FlowError::Forbidden("csrf token mismatch".to_string()));
    }
    state
        .session_store
        .update(&session_id.0, &auth_method_id, |record| record.csrf_token = None)
        .await?;

    state
        .portal
        .delete_grant(&user_id, &form.application_id, &form.api_id)
        .await?;
    Ok(Redirect::to("grants"))
}

/// Every session holds at most one logged-in user regardless of which auth method
/// authenticated them; the Grant Manager looks across all configured auth methods for
/// one with an active `AuthResponse` bound to this session id, returning the auth method
/// it found so the caller can scope the CSRF token to the right session record.
async fn current_user(state: &AppState, session_id: &SessionId) -> Result<(String, String), FlowError> {
    for method in &state.config.auth_methods {
        let record = state.session_store.get(&session_id.0, &method.name).await?;
        if let Some(auth_response) = record.auth_response {
            if let Some(user_id) = auth_response.user_id {
                return Ok((method.name.clone(), user_id));
            }
        }
    }
    Err(FlowError::Forbidden("not logged in".to_string()))
}
