use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;

/// The standard OAuth2 error vocabulary (RFC 6749 §5.2 / §4.1.2.1), carried through the
/// flow orchestrator and rendered either as JSON (token endpoint) or as a redirect with
/// `error`/`error_description` query params (authorize endpoint with a known redirect_uri).
#[derive(Debug, Clone, thiserror::Error)]
pub enum OAuth2Error {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    InvalidClient(String),
    #[error("{0}")]
    InvalidGrant(String),
    #[error("{0}")]
    InvalidScope(String),
    #[error("unsupported grant_type")]
    UnsupportedGrantType,
    #[error("unsupported response_type")]
    UnsupportedResponseType,
    #[error("client is not authorized for this grant")]
    UnauthorizedClient,
    #[error("access_denied")]
    AccessDenied,
    #[error("login_required")]
    LoginRequired,
    #[error("{0}")]
    ServerError(String),
}

impl OAuth2Error {
    pub fn code(&self) -> &'static str {
        match self {
            OAuth2Error::InvalidRequest(_) => "invalid_request",
            OAuth2Error::InvalidClient(_) => "invalid_client",
            OAuth2Error::InvalidGrant(_) => "invalid_grant",
            OAuth2Error::InvalidScope(_) => "invalid_scope",
            OAuth2Error::UnsupportedGrantType => "unsupported_grant_type",
            OAuth2Error::UnsupportedResponseType => "unsupported_response_type",
            OAuth2Error::UnauthorizedClient => "unauthorized_client",
            OAuth2Error::AccessDenied => "access_denied",
            OAuth2Error::LoginRequired => "login_required",
            OAuth2Error::ServerError(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            OAuth2Error::InvalidClient(_) | OAuth2Error::UnauthorizedClient => StatusCode::UNAUTHORIZED,
            OAuth2Error::AccessDenied => StatusCode::FORBIDDEN,
            OAuth2Error::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Renders this error as the token endpoint's JSON body (§7 "JSON errors").
    pub fn into_json_response(self) -> Response {
        let status = self.status();
        let body = OAuthErrorBody {
            error: self.code().to_string(),
            error_description: self.description(),
        };
        (status, Json(body)).into_response()
    }

    /// Renders this error as a 302 with `error`/`error_description` appended to `redirect_uri`,
    /// preserving `state` when present (§7 "Redirect on error in authorize flow").
    pub fn into_redirect_response(self, redirect_uri: &str, state: Option<&str>) -> Response {
        let mut url = format!(
            "{}{}error={}&error_description={}",
            redirect_uri,
            if redirect_uri.contains('?') { "&" } else { "?" },
            urlencoding::encode(self.code()),
            urlencoding::encode(&self.description()),
        );
        if let Some(state) = state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        Redirect::to(&url).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct OAuthErrorBody {
    pub error: String,
    pub error_description: String,
}

/// Errors surfaced to the browser-driven login/registration/consent UI, rendered as the
/// `/failure` page rather than JSON (§7 "User-facing errors").
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Oauth(#[from] OAuth2Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
pub struct ErrorPage {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            FlowError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m.clone()),
            FlowError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.clone()),
            FlowError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            FlowError::Oauth(e) => (e.status(), e.code(), e.description()),
            FlowError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "internal server error".to_string(),
            ),
        };

        let body = Json(ErrorPage {
            error: error_type.to_string(),
            message,
            status_code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Errors from the Gateway Client / Portal Client transport layer (§4.2/§4.3), mapped into
/// `OAuth2Error::ServerError` at the orchestrator boundary unless the collaborator's own
/// status maps to something more specific.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
}

impl From<validator::ValidationErrors> for FlowError {
    fn from(e: validator::ValidationErrors) -> Self {
        FlowError::BadRequest(e.to_string())
    }
}

impl From<ClientError> for FlowError {
    fn from(e: ClientError) -> Self {
        FlowError::Internal(anyhow::anyhow!(e))
    }
}

impl From<crate::stores::session_store::StoreError> for FlowError {
    fn from(e: crate::stores::session_store::StoreError) -> Self {
        FlowError::Internal(anyhow::anyhow!(e))
    }
}

impl From<crate::stores::profile_store::StoreError> for FlowError {
    fn from(e: crate::stores::profile_store::StoreError) -> Self {
        FlowError::Internal(anyhow::anyhow!(e))
    }
}

impl From<ClientError> for OAuth2Error {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Upstream { status, body } if status == StatusCode::UNAUTHORIZED => {
                OAuth2Error::InvalidClient(body)
            }
            ClientError::Upstream { status, .. } if status == StatusCode::FORBIDDEN => {
                OAuth2Error::UnauthorizedClient
            }
            other => OAuth2Error::ServerError(other.to_string()),
        }
    }
}
