pub mod authorize;
pub mod grant;
pub mod login;
pub mod namespace;
pub mod register;
pub mod token;
pub mod verify;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::config::AppState;
use crate::dto::OpenIdConfiguration;
use crate::grants::grants_router;

/// Per-(state, auth-method) bundle threaded through every handler in this module, so a
/// single handler function can know which auth method it was mounted under without
/// parsing it back out of the request path (§4.5).
#[derive(Clone)]
pub struct RouterState {
    pub app: AppState,
    pub auth_method_id: String,
}

/// Builds one auth method's OAuth2 Router (§4.5), to be nested at `/{authMethodId}` by
/// the top-level dispatcher.
pub fn build(auth_method_id: String, app: AppState) -> Router {
    let grants = grants_router(app.clone());
    let state = RouterState { app, auth_method_id };

    Router::new()
        .route("/api/:api_id/authorize", get(authorize::authorize))
        .route("/api/:api_id/token", post(token::token))
        .route("/login", get(login::login_form).post(login::login_submit))
        .route("/register", get(register::register_form).post(register::register_submit))
        .route(
            "/selectnamespace",
            get(namespace::namespace_form).post(namespace::namespace_submit),
        )
        .route("/grant", get(grant::grant_form).post(grant::grant_submit))
        .route("/verify/:id", get(verify::verify_form))
        .route("/verify", post(verify::verify_submit))
        .route("/verifyemail", get(verify::verifyemail_form).post(verify::verifyemail_submit))
        .route(
            "/forgotpassword",
            get(verify::forgotpassword_form).post(verify::forgotpassword_submit),
        )
        .route("/.well-known/openid-configuration", get(discovery))
        .nest("/grants", grants)
        .with_state(state)
}

/// `GET /{authMethodId}/.well-known/openid-configuration`: a minimal discovery document
/// so operator tooling can resolve this auth method's endpoints without hardcoding them.
async fn discovery(State(state): State<RouterState>) -> Json<OpenIdConfiguration> {
    let root = format!("{}/{}", state.app.config.external_url.trim_end_matches('/'), state.auth_method_id);
    Json(OpenIdConfiguration {
        issuer: root.clone(),
        authorization_endpoint: format!("{root}/api/{{apiId}}/authorize"),
        token_endpoint: format!("{root}/api/{{apiId}}/token"),
        userinfo_endpoint: format!("{}/profile", state.app.config.external_url.trim_end_matches('/')),
        registration_endpoint_supported: true,
    })
}
