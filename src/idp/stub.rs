use async_trait::async_trait;

use crate::clients::PortalClient;
use crate::error::FlowError;
use crate::idp::{AuthorizeUiOutcome, IdentityProvider, IdpEndpoints, IdpType};
use crate::models::AuthResponse;

/// Stand-in for the social/SAML IdP adapters, which are external collaborators per §1 —
/// this crate only needs to be able to hold and dispatch to *some* value of the
/// `IdentityProvider` capability for these types, not implement OAuth2/SAML/Twitter
/// login itself.
pub struct StubIdentityProvider {
    kind: IdpType,
}

impl StubIdentityProvider {
    pub fn oauth2() -> Self {
        Self { kind: IdpType::OAuth2 }
    }

    pub fn saml() -> Self {
        Self { kind: IdpType::Saml }
    }

    pub fn twitter() -> Self {
        Self { kind: IdpType::Twitter }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    fn get_type(&self) -> IdpType {
        self.kind
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
        Err(FlowError::Internal(anyhow::anyhow!(
            "auth method type {:?} is not implemented by this server",
            self.kind
        )))
    }

    async fn authorize_by_user_pass(
        &self,
        _portal: &PortalClient,
        _username: &str,
        _password: &str,
    ) -> Result<AuthResponse, FlowError> {
        Err(FlowError::Internal(anyhow::anyhow!(
            "auth method type {:?} does not support the password grant",
            self.kind
        )))
    }

    async fn check_refresh_token(&self, _portal: &PortalClient, _authenticated_userid: &str) -> Result<(), FlowError> {
        Err(FlowError::Internal(anyhow::anyhow!(
            "auth method type {:?} does not support refresh token checks",
            self.kind
        )))
    }
}
