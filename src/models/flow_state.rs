use serde::{Deserialize, Serialize};

use crate::dto::OidcProfile;

/// Per-session, per-auth-method authorize request, held in the Session Store for the
/// duration of the login/registration/consent dance (§3). Created at the start of an
/// authorize call, mutated only by the flow orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub api_id: String,
    pub client_id: String,
    pub response_type: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub scope: Vec<String>,
    pub prompt: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub trusted: bool,
    #[serde(default)]
    pub scopes_differ: bool,
    #[serde(default)]
    pub plain: bool,
    pub app_id: Option<String>,
    #[serde(default)]
    pub valid_namespaces: Option<Vec<String>>,
}

impl AuthRequest {
    pub fn new(
        api_id: impl Into<String>,
        client_id: impl Into<String>,
        response_type: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            api_id: api_id.into(),
            client_id: client_id.into(),
            response_type: response_type.into(),
            redirect_uri: redirect_uri.into(),
            state: None,
            scope: Vec::new(),
            prompt: None,
            namespace: None,
            trusted: false,
            scopes_differ: false,
            plain: false,
            app_id: None,
            valid_namespaces: None,
        }
    }

    pub fn wants_implicit(&self) -> bool {
        self.response_type == "token"
    }
}

/// Produced by the IdP on successful authentication, then mutated during user
/// reconciliation and registration (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Option<String>,
    pub custom_id: Option<String>,
    pub default_profile: OidcProfile,
    #[serde(default)]
    pub default_groups: Vec<String>,
    pub registration_pool: Option<String>,
    pub profile: Option<OidcProfile>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl AuthResponse {
    /// Resolves the profile the orchestrator should act on: the reconciled `profile`
    /// once set, falling back to whatever the IdP handed back initially.
    pub fn effective_profile(&self) -> &OidcProfile {
        self.profile.as_ref().unwrap_or(&self.default_profile)
    }

    pub fn is_logged_in(&self) -> bool {
        !self.effective_profile().sub.is_empty()
    }
}

/// Transient scope-consent bookkeeping held alongside the session for the duration of
/// the `ScopeConsent` state (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantProcessInfo {
    pub missing_grants: Vec<String>,
    pub existing_grants: Vec<ExistingGrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingGrant {
    pub scope: String,
}
