use serde::{Deserialize, Serialize};

/// `GET /subscriptions/<client_id>` response (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub application_id: String,
    pub api_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub trusted: bool,
    #[serde(default)]
    pub allowed_scopes: Option<Vec<String>>,
}

impl Subscription {
    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub confidential: bool,
}

/// `GET /users/<id>` response (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalUser {
    pub id: String,
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// `GET /apis/<id>` descriptor (§4.1/§4.2/§4.3): carries the settings that drive
/// scope validation, registration, and the refresh-grant dispatch in §4.8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDescriptor {
    pub id: String,
    #[serde(default)]
    pub auth_methods: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub registration_pool: Option<String>,
    #[serde(default)]
    pub passthrough_users: bool,
    #[serde(default)]
    pub passthrough_scope_url: Option<String>,
    #[serde(default)]
    pub disable_register: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationPool {
    pub id: String,
    #[serde(default)]
    pub requires_namespace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub pool_id: String,
    pub user_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub fields: std::collections::HashMap<String, String>,
}

/// `GET /grants/<user>/applications/<app>/apis/<api>` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    pub user_id: String,
    pub application_id: String,
    pub api_id: String,
    #[serde(default)]
    pub grant_scopes: Vec<String>,
}
