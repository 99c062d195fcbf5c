use async_trait::async_trait;

use crate::clients::PortalClient;
use crate::dto::OidcProfile;
use crate::error::FlowError;
use crate::idp::{AuthorizeUiOutcome, IdentityProvider, IdpEndpoints, IdpType};
use crate::models::AuthResponse;

/// Verifies a plaintext password against whatever the portal user record carries.
/// Password hashing/storage is explicitly out of scope for this server (§1) — the
/// orchestration engine only needs somewhere to plug this in, not an implementation of
/// it. The default hook always rejects; a real deployment supplies its own.
pub type PasswordVerifier = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Delegates user lookup to the Portal Client and password verification to an injected
/// hook (§9). Deliberately thin: this crate's job is the OAuth2 orchestration, not
/// credential storage.
pub struct LocalIdentityProvider {
    verify_password: PasswordVerifier,
}

impl LocalIdentityProvider {
    pub fn new(verify_password: PasswordVerifier) -> Self {
        Self { verify_password }
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self {
            verify_password: Box::new(|_stored_hash, _candidate| false),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn get_type(&self) -> IdpType {
        IdpType::Local
    }

    fn endpoints(&self) -> IdpEndpoints {
        IdpEndpoints {
            login_path: "/login".to_string(),
        }
    }

    async fn authorize_with_ui(
        &self,
        _auth_method_id: &str,
        _portal: &PortalClient,
    ) -> Result<AuthorizeUiOutcome, FlowError> {
        Ok(AuthorizeUiOutcome::Redirect {
            location: "/login".to_string(),
        })
    }

    async fn authorize_by_user_pass(
        &self,
        portal: &PortalClient,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, FlowError> {
        let user = portal
            .find_user_by_email(username)
            .await?
            .ok_or_else(|| FlowError::Forbidden("invalid username or password".to_string()))?;

        let stored = user.custom_id.as_deref().unwrap_or_default();
        if !(self.verify_password)(stored, password) {
            return Err(FlowError::Forbidden("invalid username or password".to_string()));
        }

        Ok(AuthResponse {
            user_id: Some(user.id.clone()),
            default_profile: OidcProfile {
                sub: user.id,
                email: user.email,
                email_verified: Some(user.email_verified),
                name: user.name,
                ..Default::default()
            },
            default_groups: user.groups,
            ..Default::default()
        })
    }

    async fn check_refresh_token(&self, portal: &PortalClient, authenticated_userid: &str) -> Result<(), FlowError> {
        let user_id = authenticated_userid.split(';').next().unwrap_or(authenticated_userid);
        portal
            .get_user(user_id)
            .await
            .map(|_| ())
            .map_err(|_| FlowError::Forbidden("user no longer exists".to_string()))
    }
}
