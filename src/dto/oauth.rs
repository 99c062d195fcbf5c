use serde::{Deserialize, Serialize};

fn is_false(b: &bool) -> bool {
    !*b
}

/// Query parameters of `GET /api/:apiId/authorize` (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub prompt: Option<String>,
    pub namespace: Option<String>,
}

/// Body of `POST /api/:apiId/token` (§4.2), one physical shape covering every grant type;
/// unused fields for a given `grant_type` are simply ignored rather than modeled as an enum,
/// matching how the gateway's own token endpoint accepts a flat form body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Request body of `POST /register` (§4.1 RegisterUi).
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1))]
    pub csrf_token: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub fields: std::collections::HashMap<String, String>,
}

/// Request body of `POST /selectnamespace` (§4.1 SelectNamespace).
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct SelectNamespaceForm {
    #[validate(length(min = 1))]
    pub csrf_token: String,
    #[validate(length(min = 1))]
    pub namespace: String,
}

/// Request body of `POST /grant` (§4.1 ScopeConsent).
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct GrantDecisionForm {
    #[validate(length(min = 1))]
    pub csrf_token: String,
    #[serde(default, rename = "_grant", deserialize_with = "deserialize_allow")]
    pub allow: bool,
}

fn deserialize_allow<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw == "allow")
}

/// Body of `POST /login` used by the local IdP (§4.10).
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

/// OpenID-Connect style discovery document, kept minimal: the spec names no discovery
/// endpoint, but the gateway/portal pair this server sits behind expects `/profile` and
/// the authorize/token URLs to be self-describing for operator tooling.
#[derive(Debug, Clone, Serialize)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub registration_endpoint_supported: bool,
}
