use std::time::Duration;

use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Response};

use crate::dto::{ForgotPasswordForm, VerifyForm};
use crate::error::FlowError;
use crate::router::RouterState;

const NOT_FOUND_DELAY: Duration = Duration::from_millis(500);

/// `GET /verify/:id` (§4.5/§7): a 404 here is delayed by 500ms like an authentication
/// failure, since a fast/slow response would otherwise leak whether an id is valid.
pub async fn verify_form(State(state): State<RouterState>, Path(id): Path<String>) -> Response {
    match state.app.portal.get_verification(&id).await {
        Ok(Some(_)) => Html(format!(
            r#"<!doctype html><html><body>
<form method="post" action="/verify">
  <input type="hidden" name="id" value="{id}" />
  <button type="submit">Confirm</button>
</form>
</body></html>"#
        ))
        .into_response(),
        Ok(None) => {
            tokio::time::sleep(NOT_FOUND_DELAY).await;
            FlowError::NotFound.into_response()
        }
        Err(e) => FlowError::from(e).into_response(),
    }
}

/// `POST /verify`: consumes a generic (non-email) verification, e.g. account activation.
pub async fn verify_submit(State(state): State<RouterState>, Form(form): Form<VerifyForm>) -> Response {
    match state.app.portal.get_verification(&form.id).await {
        Ok(Some(_)) => match state.app.portal.delete_verification(&form.id).await {
            Ok(()) => Html("<!doctype html><html><body>verified</body></html>").into_response(),
            Err(e) => FlowError::from(e).into_response(),
        },
        Ok(None) => {
            tokio::time::sleep(NOT_FOUND_DELAY).await;
            FlowError::NotFound.into_response()
        }
        Err(e) => FlowError::from(e).into_response(),
    }
}

pub async fn verifyemail_form(State(state): State<RouterState>, Query(form): Query<VerifyForm>) -> Response {
    verify_form(State(state), Path(form.id)).await
}

/// `POST /verifyemail`: same as `/verify` but also flips the user's `email_verified`
/// flag once the verification record is confirmed to belong to a `"email"` kind.
pub async fn verifyemail_submit(State(state): State<RouterState>, Form(form): Form<VerifyForm>) -> Response {
    let record = match state.app.portal.get_verification(&form.id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tokio::time::sleep(NOT_FOUND_DELAY).await;
            return FlowError::NotFound.into_response();
        }
        Err(e) => return FlowError::from(e).into_response(),
    };

    let user_id = match record.get("user_id").and_then(serde_json::Value::as_str) {
        Some(id) => id.to_string(),
        None => return FlowError::Internal(anyhow::anyhow!("verification record missing user_id")).into_response(),
    };

    if let Err(e) = state.app.portal.mark_email_verified(&user_id).await {
        return FlowError::from(e).into_response();
    }
    if let Err(e) = state.app.portal.delete_verification(&form.id).await {
        return FlowError::from(e).into_response();
    }

    Html("<!doctype html><html><body>email verified</body></html>").into_response()
}

/// `GET /forgotpassword`.
pub async fn forgotpassword_form() -> Html<&'static str> {
    Html(
        r#"<!doctype html><html><body>
<form method="post" action="forgotpassword">
  <input type="email" name="email" placeholder="email" />
  <button type="submit">Send reset link</button>
</form>
</body></html>"#,
    )
}

/// `POST /forgotpassword`: always responds the same way regardless of whether `email`
/// belongs to a known user, to avoid account enumeration (§4.5/§7).
pub async fn forgotpassword_submit(State(state): State<RouterState>, Form(form): Form<ForgotPasswordForm>) -> Response {
    if let Ok(Some(user)) = state.app.portal.find_user_by_email(&form.email).await {
        let _ = state.app.portal.create_verification(&user.id, "password", &form.email).await;
    }
    Html("<!doctype html><html><body>if that email is registered, a reset link has been sent</body></html>")
        .into_response()
}
