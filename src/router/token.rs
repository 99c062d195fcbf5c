use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};

use crate::dto::TokenRequest;
use crate::error::OAuth2Error;
use crate::router::RouterState;

/// `POST /api/:apiId/token` (§4.2): dispatches on `grant_type` and always responds JSON,
/// unlike the authorize endpoint which may redirect.
pub async fn token(State(state): State<RouterState>, Path(api_id): Path<String>, Form(body): Form<TokenRequest>) -> Response {
    let result = match body.grant_type.as_str() {
        "authorization_code" => {
            let (code, redirect_uri) = match (&body.code, &body.redirect_uri) {
                (Some(c), Some(r)) => (c, r),
                _ => {
                    return OAuth2Error::InvalidRequest("code and redirect_uri are required".to_string())
                        .into_json_response()
                }
            };
            state
                .app
                .orchestrator
                .exchange_authorization_code(&api_id, &body.client_id, body.client_secret.as_deref(), code, redirect_uri)
                .await
        }
        "client_credentials" => {
            let client_secret = match &body.client_secret {
                Some(s) => s,
                None => {
                    return OAuth2Error::InvalidRequest("client_secret is required".to_string()).into_json_response()
                }
            };
            state
                .app
                .orchestrator
                .exchange_client_credentials(&api_id, &body.client_id, client_secret, body.scope.as_deref())
                .await
        }
        "password" => {
            let (username, password) = match (&body.username, &body.password) {
                (Some(u), Some(p)) => (u, p),
                _ => {
                    return OAuth2Error::InvalidRequest("username and password are required".to_string())
                        .into_json_response()
                }
            };
            state
                .app
                .orchestrator
                .password_grant(
                    &state.auth_method_id,
                    &api_id,
                    &body.client_id,
                    body.client_secret.as_deref(),
                    username,
                    password,
                    body.scope.as_deref(),
                )
                .await
        }
        "refresh_token" => {
            let refresh_token = match &body.refresh_token {
                Some(t) => t,
                None => {
                    return OAuth2Error::InvalidRequest("refresh_token is required".to_string()).into_json_response()
                }
            };
            state
                .app
                .orchestrator
                .refresh_grant(&state.auth_method_id, &api_id, &body.client_id, body.client_secret.as_deref(), refresh_token)
                .await
        }
        _ => return OAuth2Error::UnsupportedGrantType.into_json_response(),
    };

    match result {
        Ok(token) => Json(token).into_response(),
        Err(e) => e.into_json_response(),
    }
}
