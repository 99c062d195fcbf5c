use std::time::Duration;

use axum::extract::{Form, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Extension;
use validator::Validate;

use crate::dto::GrantDecisionForm;
use crate::error::FlowError;
use crate::middleware::SessionId;
use crate::router::authorize::render_outcome;
use crate::router::RouterState;

const CSRF_MISMATCH_DELAY: Duration = Duration::from_millis(500);

/// `GET /grant`, reached from `ScopeConsent` when the user has outstanding scopes to
/// approve (§4.1/§4.6).
pub async fn grant_form(State(state): State<RouterState>, Extension(session_id): Extension<SessionId>) -> Response {
    let token = crate::csrf::generate_token();
    let record = match state
        .app
        .session_store
        .update(&session_id.0, &state.auth_method_id, |record| {
            record.csrf_token = Some(token.clone());
        })
        .await
    {
        Ok(record) => record,
        Err(e) => return FlowError::from(e).into_response(),
    };
    let missing = record
        .grant_process
        .map(|g| g.missing_grants.join(", "))
        .unwrap_or_default();

    Html(format!(
        r#"<!doctype html><html><body>
<p>This application is requesting: {missing}</p>
<form method="post" action="grant">
  <input type="hidden" name="csrf_token" value="{token}" />
  <button type="submit" name="_grant" value="allow">Allow</button>
  <button type="submit" name="_grant" value="deny">Deny</button>
</form>
</body></html>"#
    ))
    .into_response()
}

pub async fn grant_submit(
    State(state): State<RouterState>,
    Extension(session_id): Extension<SessionId>,
    Form(form): Form<GrantDecisionForm>,
) -> Response {
    if let Err(e) = form.validate() {
        return FlowError::from(e).into_response();
    }

    let record = match state.app.session_store.get(&session_id.0, &state.auth_method_id).await {
        Ok(record) => record,
        Err(e) => return FlowError::from(e).into_response(),
    };
    let fallback_redirect_uri = record
        .auth_request
        .as_ref()
        .map(|r| r.redirect_uri.clone())
        .unwrap_or_default();

    if !crate::csrf::tokens_match(record.csrf_token.as_deref(), &form.csrf_token) {
        tokio::time::sleep(CSRF_MISMATCH_DELAY).await;
        return FlowError::Forbidden("csrf token mismatch".to_string()).into_response();
    }
    if let Err(e) = state
        .app
        .session_store
        .update(&session_id.0, &state.auth_method_id, |record| record.csrf_token = None)
        .await
    {
        return FlowError::from(e).into_response();
    }

    let outcome = state
        .app
        .orchestrator
        .handle_grant_decision(&session_id.0, &state.auth_method_id, form.allow)
        .await;
    render_outcome(outcome, &state, &fallback_redirect_uri, None)
}
