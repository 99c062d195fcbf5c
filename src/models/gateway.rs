use serde::{Deserialize, Serialize};

/// Cached gateway oauth2 plugin config for one API (§4.2). Fetched once per API id and
/// held for the process lifetime per §5/§9 — there is no invalidation mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOAuth2Config {
    pub provision_key: String,
    #[serde(default)]
    pub enable_authorization_code: bool,
    #[serde(default)]
    pub enable_implicit_grant: bool,
    #[serde(default)]
    pub enable_client_credentials: bool,
    #[serde(default)]
    pub enable_password_grant: bool,
    #[serde(default)]
    pub uris: Vec<String>,
}

impl GatewayOAuth2Config {
    pub fn api_uri(&self) -> Option<&str> {
        self.uris.first().map(|s| s.as_str())
    }
}
