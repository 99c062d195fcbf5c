use crate::dto::TokenResponse;
use crate::error::OAuth2Error;
use crate::orchestrator::{scope, FlowOrchestrator};

/// Refresh-token grant (§4.8): looks up the stored profile by refresh token, resolves
/// the API, then dispatches on `(passthroughUsers, passthroughScopeUrl)`.
impl FlowOrchestrator {
    pub async fn refresh_grant(
        &self,
        auth_method_id: &str,
        api_id: &str,
        client_id: &str,
        client_secret: Option<&str>,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuth2Error> {
        let subscription = self
            .portal
            .get_subscription_by_client_id(client_id)
            .await
            .map_err(|_| OAuth2Error::InvalidClient("unknown client_id".to_string()))?;
        if subscription.api_id != api_id {
            return Err(OAuth2Error::InvalidClient("client_id not registered for this api".to_string()));
        }
        match (&subscription.client_secret, client_secret) {
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => {}
            _ => return Err(OAuth2Error::InvalidClient("client_secret mismatch".to_string())),
        }

        let profile = self
            .profile_store
            .retrieve(refresh_token)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?
            .ok_or_else(|| OAuth2Error::InvalidGrant("unknown or expired refresh_token".to_string()))?;

        let api = self.portal.get_api(api_id).await.map_err(OAuth2Error::from)?;
        let secret = client_secret.unwrap_or_default();

        match (api.passthrough_users, api.passthrough_scope_url.as_deref()) {
            // Case 1: ordinary wicked-managed user — re-verify with the IdP, re-mint.
            (false, None) => {
                let idp = self
                    .idps
                    .get(auth_method_id)
                    .ok_or_else(|| OAuth2Error::ServerError(format!("unknown auth method {}", auth_method_id)))?;

                // `authenticated_userid` as minted is `<sub>` or `<sub>;namespace=...`;
                // the IdP check only cares about the leading user id segment.
                idp.check_refresh_token(&self.portal, &profile.sub)
                    .await
                    .map_err(|_| OAuth2Error::InvalidRequest("user is no longer valid".to_string()))?;

                self.gateway.token_refresh(api_id, client_id, secret, refresh_token).await
            }
            // Case 2: passthrough users with no external scope service — unsupported.
            (true, None) => Err(OAuth2Error::ServerError(
                "refresh is not supported for passthrough users without a passthrough scope url".to_string(),
            )),
            // Case 3: wicked-managed users behind a passthrough scope url — unsupported (§9 open question b).
            (false, Some(_)) => Err(OAuth2Error::ServerError(
                "refresh for namespaced users behind a passthrough scope url is not implemented".to_string(),
            )),
            // Case 4: passthrough users behind a passthrough scope url — re-resolve scope
            // externally and reissue as a password grant, then best-effort delete the
            // previous access token.
            (true, Some(passthrough_url)) => {
                self.refresh_via_passthrough(api_id, client_id, secret, passthrough_url, &profile, refresh_token)
                    .await
            }
        }
    }

    async fn refresh_via_passthrough(
        &self,
        api_id: &str,
        client_id: &str,
        client_secret: &str,
        passthrough_url: &str,
        profile: &crate::dto::OidcProfile,
        previous_refresh_token: &str,
    ) -> Result<TokenResponse, OAuth2Error> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            scope: &'a [String],
            profile: &'a crate::dto::OidcProfile,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            allow: bool,
            authenticated_userid: Option<String>,
            authenticated_scope: Option<Vec<String>>,
        }

        let resp = self
            .http
            .post(passthrough_url)
            .json(&Req { scope: &[], profile })
            .send()
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(OAuth2Error::ServerError(format!(
                "passthrough scope service returned {}",
                resp.status()
            )));
        }
        let parsed: Resp = resp.json().await.map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        if !parsed.allow {
            return Err(OAuth2Error::AccessDenied);
        }

        let authenticated_userid = parsed.authenticated_userid.unwrap_or_else(|| profile.sub.clone());
        let resolved_scope = parsed.authenticated_scope.unwrap_or_default();
        let scope_str = scope::format_scope(&scope::strip_group_scopes(&resolved_scope));

        let token = self
            .gateway
            .token_password(api_id, client_id, client_secret, &authenticated_userid, scope_str.as_deref())
            .await?;

        self.profile_store
            .register_pair(&token.access_token, token.refresh_token.as_deref(), profile, token.expires_in)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        let _ = self.profile_store.delete_paired(previous_refresh_token).await;

        Ok(token)
    }
}
