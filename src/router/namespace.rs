use std::time::Duration;

use axum::extract::{Form, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Extension;
use validator::Validate;

use crate::dto::SelectNamespaceForm;
use crate::error::FlowError;
use crate::middleware::SessionId;
use crate::router::authorize::render_outcome;
use crate::router::RouterState;

const CSRF_MISMATCH_DELAY: Duration = Duration::from_millis(500);

/// `GET /selectnamespace`, reached when a registration exists but requires a namespace
/// the user has not yet picked (§4.1). Mints a fresh single-use CSRF token onto the
/// session so `namespace_submit` can verify it.
pub async fn namespace_form(State(state): State<RouterState>, Extension(session_id): Extension<SessionId>) -> Response {
    let token = crate::csrf::generate_token();
    if let Err(e) = state
        .app
        .session_store
        .update(&session_id.0, &state.auth_method_id, |record| {
            record.csrf_token = Some(token.clone());
        })
        .await
    {
        return FlowError::from(e).into_response();
    }

    Html(format!(
        r#"<!doctype html><html><body>
<form method="post" action="selectnamespace">
  <input type="hidden" name="csrf_token" value="{token}" />
  <input type="text" name="namespace" placeholder="namespace" />
  <button type="submit">Continue</button>
</form>
</body></html>"#
    ))
    .into_response()
}

pub async fn namespace_submit(
    State(state): State<RouterState>,
    Extension(session_id): Extension<SessionId>,
    Form(form): Form<SelectNamespaceForm>,
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
        .handle_select_namespace(&session_id.0, &state.auth_method_id, &form.namespace)
        .await;
    render_outcome(outcome, &state, &fallback_redirect_uri, None)
}
