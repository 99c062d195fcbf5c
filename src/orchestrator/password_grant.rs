use std::time::Duration;

use crate::dto::{OidcProfile, TokenResponse};
use crate::error::OAuth2Error;
use crate::models::AuthResponse;
use crate::orchestrator::{scope, FlowOrchestrator};

const AUTH_DELAY: Duration = Duration::from_millis(500);

/// Resource-owner-password grant (§4.7). Preconditions: trusted subscription, and a
/// client_secret that matches confidential/non-confidential status. All authentication
/// failures are delayed by ≥500ms to resist timing/enumeration, per §4.7/§7.
impl FlowOrchestrator {
    pub async fn password_grant(
        &self,
        auth_method_id: &str,
        api_id: &str,
        client_id: &str,
        client_secret: Option<&str>,
        username: &str,
        password: &str,
        requested_scope: Option<&str>,
    ) -> Result<TokenResponse, OAuth2Error> {
        match self
            .password_grant_inner(auth_method_id, api_id, client_id, client_secret, username, password, requested_scope)
            .await
        {
            Ok(token) => Ok(token),
            Err(e) => {
                tokio::time::sleep(AUTH_DELAY).await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn password_grant_inner(
        &self,
        auth_method_id: &str,
        api_id: &str,
        client_id: &str,
        client_secret: Option<&str>,
        username: &str,
        password: &str,
        requested_scope: Option<&str>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let subscription = self
            .portal
            .get_subscription_by_client_id(client_id)
            .await
            .map_err(|_| OAuth2Error::InvalidClient("unknown client_id".to_string()))?;
        if subscription.api_id != api_id {
            return Err(OAuth2Error::InvalidClient("client_id not registered for this api".to_string()));
        }
        if !subscription.trusted {
            return Err(OAuth2Error::UnauthorizedClient);
        }
        match (&subscription.client_secret, client_secret) {
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => {}
            _ => return Err(OAuth2Error::InvalidClient("client_secret mismatch".to_string())),
        }

        let api = self.portal.get_api(api_id).await.map_err(OAuth2Error::from)?;
        let idp = self
            .idps
            .get(auth_method_id)
            .ok_or_else(|| OAuth2Error::ServerError(format!("unknown auth method {}", auth_method_id)))?;

        let auth_response = idp
            .authorize_by_user_pass(&self.portal, username, password)
            .await
            .map_err(|_| OAuth2Error::InvalidGrant("invalid username or password".to_string()))?;

        let resolved = self.resolve_password_grant_user(&api, auth_response).await?;

        let requested = scope::parse_scope(requested_scope);
        let (validated, _) = scope::validate(&requested, &api, subscription.trusted)?;
        let merged = scope::merge_groups(&validated, &resolved.1.groups);
        let scope_str = scope::format_scope(&merged);

        let secret = client_secret.unwrap_or_default();
        let token = self
            .gateway
            .token_password(api_id, client_id, secret, &resolved.0, scope_str.as_deref())
            .await?;

        self.profile_store
            .register_pair(
                &token.access_token,
                token.refresh_token.as_deref(),
                resolved.1.effective_profile(),
                token.expires_in,
            )
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        Ok(token)
    }

    /// Resolves the `authenticated_userid` for a password-grant login (§4.1 "Authenticated
    /// user id format" — the password-grant case): when the API's registration pool
    /// requires a namespace, every namespace the user is registered under is listed.
    async fn resolve_password_grant_user(
        &self,
        api: &crate::models::ApiDescriptor,
        mut auth_response: AuthResponse,
    ) -> Result<(String, AuthResponse), OAuth2Error> {
        if api.passthrough_users {
            return Ok((format!("sub={}", auth_response.effective_profile().sub), auth_response));
        }

        if auth_response.user_id.is_none() {
            let custom_id = auth_response
                .custom_id
                .clone()
                .unwrap_or_else(|| auth_response.default_profile.sub.clone());
            let user = match self.portal.find_user_by_custom_id(&custom_id).await.map_err(OAuth2Error::from)? {
                Some(user) => user,
                None => self
                    .portal
                    .create_user(auth_response.default_profile.email.as_deref().unwrap_or(&custom_id), Some(&custom_id))
                    .await
                    .map_err(OAuth2Error::from)?,
            };
            auth_response.user_id = Some(user.id.clone());
            auth_response.groups = user.groups.clone();
            if auth_response.profile.is_none() {
                auth_response.profile = Some(OidcProfile {
                    sub: user.id,
                    email: user.email,
                    email_verified: Some(user.email_verified),
                    name: user.name,
                    ..Default::default()
                });
            }
        }
        let user_id = auth_response.user_id.clone().expect("just resolved above");

        let pool_id = match &api.registration_pool {
            Some(pool_id) => pool_id,
            None => return Ok((format!("sub={}", user_id), auth_response)),
        };

        let pool = self.portal.get_pool(pool_id).await.map_err(OAuth2Error::from)?;
        if !pool.requires_namespace {
            return Ok((format!("sub={}", user_id), auth_response));
        }

        // The Portal Client models one registration per (pool, user) pair, so "every
        // namespace the user is registered under" reduces to that single namespace.
        let registration = self
            .portal
            .get_registration(pool_id, &user_id)
            .await
            .map_err(OAuth2Error::from)?;
        let namespace = registration
            .and_then(|r| r.namespace)
            .ok_or_else(|| OAuth2Error::InvalidGrant("user has no namespace registration for this api".to_string()))?;

        Ok((format!("sub={};namespaces={}", user_id, namespace), auth_response))
    }
}
