use axum::extract::{Form, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Extension;

use crate::dto::LoginForm;
use crate::middleware::SessionId;
use crate::router::authorize::render_outcome;
use crate::router::RouterState;

/// `GET /login`, driven by the local/dummy IdPs' `authorize_with_ui` redirect (§4.10).
pub async fn login_form() -> Html<&'static str> {
    Html(
        r#"<!doctype html><html><body>
<form method="post" action="login">
  <input type="text" name="username" placeholder="username" />
  <input type="password" name="password" placeholder="password" />
  <button type="submit">Log in</button>
</form>
</body></html>"#,
    )
}

/// `POST /login`: authenticates the submitted credentials against this auth method's
/// IdP, then re-enters the flow at `UserReconcile` (§4.1).
pub async fn login_submit(
    State(state): State<RouterState>,
    Extension(session_id): Extension<SessionId>,
    Form(form): Form<LoginForm>,
) -> Response {
    let record = match state.app.session_store.get(&session_id.0, &state.auth_method_id).await {
        Ok(record) => record,
        Err(e) => return crate::error::FlowError::from(e).into_response(),
    };
    let fallback_redirect_uri = record
        .auth_request
        .as_ref()
        .map(|r| r.redirect_uri.clone())
        .unwrap_or_default();

    let idp = match state.app.idps.get(&state.auth_method_id) {
        Some(idp) => idp,
        None => {
            return crate::error::FlowError::Internal(anyhow::anyhow!("unknown auth method")).into_response();
        }
    };

    match idp
        .authorize_by_user_pass(&state.app.portal, &form.username, &form.password)
        .await
    {
        Ok(auth_response) => {
            let outcome = state
                .app
                .orchestrator
                .continue_after_login(&session_id.0, &state.auth_method_id, auth_response)
                .await;
            render_outcome(outcome, &state, &fallback_redirect_uri, None)
        }
        Err(_) => Html("<!doctype html><html><body>invalid username or password</body></html>").into_response(),
    }
}
