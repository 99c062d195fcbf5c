use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::clients::{GatewayClient, PortalClient};
use crate::dto::{AuthorizeQuery, OidcProfile, TokenResponse};
use crate::error::{FlowError, OAuth2Error};
use crate::idp::{AuthorizeUiOutcome, IdpRegistry};
use crate::models::{ApiDescriptor, AuthRequest, AuthResponse, ExistingGrant, GrantProcessInfo, Registration};
use crate::orchestrator::scope;
use crate::stores::{ProfileStore, SessionStore};

const PASSTHROUGH_TIMEOUT_SECS: u64 = 5;
const PASSTHROUGH_RETRIES: u32 = 10;
const PASSTHROUGH_RETRY_DELAY_MS: u64 = 500;

/// What the caller (the per-auth-method router) should do next after driving one step
/// of the flow (§4.1).
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    /// Send the browser to the IdP's login UI, or to a registration/consent/namespace
    /// form rendered by this server.
    NeedsInteraction { location: String },
    /// The flow reached `MintWithGateway` and a final redirect to the client's
    /// `redirect_uri` (with `code`/`access_token` appended) is ready.
    Minted { redirect_uri: String },
    /// The flow failed; the caller renders this as a redirect-with-error or an error
    /// page per §7, depending on whether a `redirect_uri` is known.
    Failed(OAuth2Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PassthroughRequest<'a> {
    scope: &'a [String],
    profile: &'a OidcProfile,
}

#[derive(Debug, Clone, Deserialize)]
struct PassthroughResponse {
    allow: bool,
    #[serde(default)]
    authenticated_userid: Option<String>,
    #[serde(default)]
    authenticated_scope: Option<Vec<String>>,
}

/// Drives the authorize/token flow state machine (§4.1). Holds the collaborators every
/// state needs; individual states are exposed as methods since several of them
/// (`LoginUi`, `RegisterUi`, `SelectNamespace`, `ScopeConsent`) require a browser
/// round-trip and so cannot be one synchronous function call.
#[derive(Clone)]
pub struct FlowOrchestrator {
    pub gateway: GatewayClient,
    pub portal: PortalClient,
    pub profile_store: ProfileStore,
    pub session_store: SessionStore,
    pub idps: std::sync::Arc<IdpRegistry>,
    pub http: reqwest::Client,
    pub session_ttl_secs: i64,
}

impl FlowOrchestrator {
    pub fn new(
        gateway: GatewayClient,
        portal: PortalClient,
        profile_store: ProfileStore,
        session_store: SessionStore,
        idps: std::sync::Arc<IdpRegistry>,
        session_ttl_secs: i64,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PASSTHROUGH_TIMEOUT_SECS))
            .build()
            .expect("failed to build passthrough-scope http client");
        Self {
            gateway,
            portal,
            profile_store,
            session_store,
            idps,
            http,
            session_ttl_secs,
        }
    }

    /// `AuthorizeStart` → `ValidateScope` → `CheckSession` (§4.1).
    pub async fn start_authorize(
        &self,
        session_id: &str,
        auth_method_id: &str,
        api_id: &str,
        query: &AuthorizeQuery,
    ) -> AuthorizeOutcome {
        match self.start_authorize_inner(session_id, auth_method_id, api_id, query).await {
            Ok(outcome) => outcome,
            Err(e) => AuthorizeOutcome::Failed(e),
        }
    }

    async fn start_authorize_inner(
        &self,
        session_id: &str,
        auth_method_id: &str,
        api_id: &str,
        query: &AuthorizeQuery,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        if query.response_type != "code" && query.response_type != "token" {
            return Err(OAuth2Error::UnsupportedResponseType);
        }

        let subscription = self
            .portal
            .get_subscription_by_client_id(&query.client_id)
            .await
            .map_err(|_| OAuth2Error::InvalidClient("unknown client_id".to_string()))?;
        if subscription.api_id != api_id {
            return Err(OAuth2Error::InvalidClient("client_id not registered for this api".to_string()));
        }

        let api = self.portal.get_api(api_id).await.map_err(OAuth2Error::from)?;

        let requested_scope = scope::parse_scope(query.scope.as_deref());
        let (validated_scope, scopes_differ) = scope::validate(&requested_scope, &api, subscription.trusted)?;

        let mut auth_request = AuthRequest::new(
            api_id.to_string(),
            query.client_id.clone(),
            query.response_type.clone(),
            query.redirect_uri.clone(),
        );
        auth_request.state = query.state.clone();
        auth_request.scope = validated_scope;
        auth_request.prompt = query.prompt.clone();
        auth_request.namespace = query.namespace.clone();
        auth_request.trusted = subscription.trusted;
        auth_request.scopes_differ = scopes_differ;
        auth_request.app_id = Some(subscription.application_id.clone());

        let record = self
            .session_store
            .update(session_id, auth_method_id, |r| {
                r.auth_request = Some(auth_request.clone());
            })
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        // CheckSession (§4.1)
        let logged_in = record.auth_response.as_ref().map(|r| r.is_logged_in()).unwrap_or(false);
        let wants_forced_login = query.prompt.as_deref() == Some("login");

        if query.prompt.as_deref() == Some("none") && !logged_in {
            return Err(OAuth2Error::LoginRequired);
        }

        if wants_forced_login {
            self.session_store
                .update(session_id, auth_method_id, |r| r.auth_response = None)
                .await
                .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        }

        if logged_in && !wants_forced_login {
            let auth_response = record.auth_response.expect("checked above");
            return Ok(self.user_reconcile(session_id, auth_method_id, &auth_request, &api, auth_response).await?);
        }

        let idp = self
            .idps
            .get(auth_method_id)
            .ok_or_else(|| OAuth2Error::ServerError(format!("unknown auth method {}", auth_method_id)))?;

        match idp
            .authorize_with_ui(auth_method_id, &self.portal)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?
        {
            AuthorizeUiOutcome::Redirect { location } => Ok(AuthorizeOutcome::NeedsInteraction { location }),
            AuthorizeUiOutcome::Authenticated(auth_response) => {
                self.session_store
                    .update(session_id, auth_method_id, |r| r.auth_response = Some(auth_response.clone()))
                    .await
                    .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
                Ok(self.user_reconcile(session_id, auth_method_id, &auth_request, &api, auth_response).await?)
            }
        }
    }

    /// Re-enters the flow once an IdP (typically the local login form) has produced an
    /// `AuthResponse`, at `UserReconcile` (§4.1).
    pub async fn continue_after_login(
        &self,
        session_id: &str,
        auth_method_id: &str,
        auth_response: AuthResponse,
    ) -> AuthorizeOutcome {
        match self.continue_after_login_inner(session_id, auth_method_id, auth_response).await {
            Ok(outcome) => outcome,
            Err(e) => AuthorizeOutcome::Failed(e),
        }
    }

    async fn continue_after_login_inner(
        &self,
        session_id: &str,
        auth_method_id: &str,
        auth_response: AuthResponse,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let record = self
            .session_store
            .get(session_id, auth_method_id)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        let auth_request = record
            .auth_request
            .ok_or_else(|| OAuth2Error::InvalidRequest("no authorize request in progress".to_string()))?;
        let api = self.portal.get_api(&auth_request.api_id).await.map_err(OAuth2Error::from)?;

        self.session_store
            .update(session_id, auth_method_id, |r| r.auth_response = Some(auth_response.clone()))
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        self.user_reconcile(session_id, auth_method_id, &auth_request, &api, auth_response).await
    }

    /// `UserReconcile` → `RegistrationDecide`/`RegistrationFlow` → `AuthorizeDecide` (§4.1).
    async fn user_reconcile(
        &self,
        session_id: &str,
        auth_method_id: &str,
        auth_request: &AuthRequest,
        api: &ApiDescriptor,
        mut auth_response: AuthResponse,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        if api.passthrough_users {
            auth_response.user_id = None;
            auth_response.groups.clear();
        } else if auth_response.user_id.is_none() {
            let custom_id = auth_response
                .custom_id
                .clone()
                .unwrap_or_else(|| auth_response.default_profile.sub.clone());
            let existing = self.portal.find_user_by_custom_id(&custom_id).await.map_err(OAuth2Error::from)?;
            let user = match existing {
                Some(user) => user,
                None => self
                    .portal
                    .create_user(
                        auth_response
                            .default_profile
                            .email
                            .as_deref()
                            .unwrap_or(&custom_id),
                        Some(&custom_id),
                    )
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

        self.session_store
            .update(session_id, auth_method_id, |r| r.auth_response = Some(auth_response.clone()))
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        match &api.registration_pool {
            None => self.authorize_decide(session_id, auth_method_id, api, auth_response).await,
            Some(pool_id) => {
                self.registration_flow(session_id, auth_method_id, auth_request, api, pool_id, auth_response)
                    .await
            }
        }
    }

    /// `RegistrationFlow` (§4.1).
    async fn registration_flow(
        &self,
        session_id: &str,
        auth_method_id: &str,
        auth_request: &AuthRequest,
        api: &ApiDescriptor,
        pool_id: &str,
        auth_response: AuthResponse,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let user_id = auth_response
            .user_id
            .clone()
            .ok_or_else(|| OAuth2Error::ServerError("registration pool requires a portal user".to_string()))?;

        let pool = self.portal.get_pool(pool_id).await.map_err(OAuth2Error::from)?;
        let registration = self
            .portal
            .get_registration(pool_id, &user_id)
            .await
            .map_err(OAuth2Error::from)?;

        match registration {
            Some(reg) if pool.requires_namespace && reg.namespace.is_none() => match &auth_request.namespace {
                // The browser already went through `SelectNamespace` and posted a
                // choice back onto the authorize request; persist it onto the
                // existing registration and proceed.
                Some(ns) => {
                    self.portal
                        .put_registration(&Registration {
                            pool_id: pool_id.to_string(),
                            user_id,
                            namespace: Some(ns.clone()),
                            fields: reg.fields,
                        })
                        .await
                        .map_err(OAuth2Error::from)?;
                    self.authorize_decide(session_id, auth_method_id, api, auth_response).await
                }
                None => Ok(AuthorizeOutcome::NeedsInteraction {
                    location: "/selectnamespace".to_string(),
                }),
            },
            Some(_) => self.authorize_decide(session_id, auth_method_id, api, auth_response).await,
            None if api.disable_register => {
                Err(OAuth2Error::ServerError("registration required but disabled for this api".to_string()))
            }
            None => Ok(AuthorizeOutcome::NeedsInteraction {
                location: "/register".to_string(),
            }),
        }
    }

    /// Continuation of `RegisterUi` (§4.1): persists the submitted registration and
    /// re-enters `RegistrationFlow`.
    pub async fn handle_registration(
        &self,
        session_id: &str,
        auth_method_id: &str,
        namespace: Option<String>,
        fields: std::collections::HashMap<String, String>,
    ) -> AuthorizeOutcome {
        match self
            .handle_registration_inner(session_id, auth_method_id, namespace, fields)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => AuthorizeOutcome::Failed(e),
        }
    }

    async fn handle_registration_inner(
        &self,
        session_id: &str,
        auth_method_id: &str,
        namespace: Option<String>,
        fields: std::collections::HashMap<String, String>,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let record = self
            .session_store
            .get(session_id, auth_method_id)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        let auth_request = record
            .auth_request
            .clone()
            .ok_or_else(|| OAuth2Error::InvalidRequest("no authorize request in progress".to_string()))?;
        let auth_response = record
            .auth_response
            .clone()
            .ok_or_else(|| OAuth2Error::LoginRequired)?;
        let api = self.portal.get_api(&auth_request.api_id).await.map_err(OAuth2Error::from)?;
        let pool_id = api
            .registration_pool
            .clone()
            .ok_or_else(|| OAuth2Error::ServerError("api has no registration pool".to_string()))?;
        let user_id = auth_response
            .user_id
            .clone()
            .ok_or_else(|| OAuth2Error::ServerError("registration requires a portal user".to_string()))?;

        self.portal
            .put_registration(&Registration {
                pool_id: pool_id.clone(),
                user_id,
                namespace,
                fields,
            })
            .await
            .map_err(OAuth2Error::from)?;

        self.registration_flow(session_id, auth_method_id, &auth_request, &api, &pool_id, auth_response)
            .await
    }

    /// Continuation of `SelectNamespace` (§4.1).
    pub async fn handle_select_namespace(
        &self,
        session_id: &str,
        auth_method_id: &str,
        namespace: &str,
    ) -> AuthorizeOutcome {
        match self
            .handle_select_namespace_inner(session_id, auth_method_id, namespace)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => AuthorizeOutcome::Failed(e),
        }
    }

    async fn handle_select_namespace_inner(
        &self,
        session_id: &str,
        auth_method_id: &str,
        namespace: &str,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let record = self
            .session_store
            .get(session_id, auth_method_id)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        let mut auth_request = record
            .auth_request
            .clone()
            .ok_or_else(|| OAuth2Error::InvalidRequest("no authorize request in progress".to_string()))?;
        let auth_response = record.auth_response.clone().ok_or(OAuth2Error::LoginRequired)?;
        let api = self.portal.get_api(&auth_request.api_id).await.map_err(OAuth2Error::from)?;
        let pool_id = api
            .registration_pool
            .clone()
            .ok_or_else(|| OAuth2Error::ServerError("api has no registration pool".to_string()))?;

        if !self
            .portal
            .namespace_is_valid(&pool_id, namespace)
            .await
            .map_err(OAuth2Error::from)?
        {
            return Err(OAuth2Error::InvalidRequest("unknown namespace".to_string()));
        }

        auth_request.namespace = Some(namespace.to_string());
        self.session_store
            .update(session_id, auth_method_id, |r| r.auth_request = Some(auth_request.clone()))
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        self.registration_flow(session_id, auth_method_id, &auth_request, &api, &pool_id, auth_response)
            .await
    }

    /// `AuthorizeDecide` (§4.1).
    async fn authorize_decide(
        &self,
        session_id: &str,
        auth_method_id: &str,
        api: &ApiDescriptor,
        auth_response: AuthResponse,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let record = self
            .session_store
            .get(session_id, auth_method_id)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        let auth_request = record
            .auth_request
            .clone()
            .ok_or_else(|| OAuth2Error::InvalidRequest("no authorize request in progress".to_string()))?;

        let groups = auth_response.groups.clone();
        let desired_scope = scope::merge_groups(&auth_request.scope, &groups);

        if auth_request.trusted || (desired_scope.is_empty() && api.passthrough_scope_url.is_none()) {
            return self
                .mint_with_gateway(session_id, auth_method_id, &auth_request, &auth_response, &desired_scope)
                .await;
        }

        if let Some(passthrough_url) = &api.passthrough_scope_url {
            return self
                .passthrough_scope(
                    session_id,
                    auth_method_id,
                    &auth_request,
                    &auth_response,
                    passthrough_url,
                    &desired_scope,
                )
                .await;
        }

        self.scope_consent(session_id, auth_method_id, &auth_request, &auth_response, &desired_scope)
            .await
    }

    /// `PassthroughScope` (§4.1/§5): external scope resolution with retry semantics.
    async fn passthrough_scope(
        &self,
        session_id: &str,
        auth_method_id: &str,
        auth_request: &AuthRequest,
        auth_response: &AuthResponse,
        passthrough_url: &str,
        desired_scope: &[String],
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let body = PassthroughRequest {
            scope: desired_scope,
            profile: auth_response.effective_profile(),
        };

        let mut last_error = None;
        for attempt in 0..=PASSTHROUGH_RETRIES {
            match self.http.post(passthrough_url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: PassthroughResponse = resp
                        .json()
                        .await
                        .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
                    if !parsed.allow {
                        return Err(OAuth2Error::AccessDenied);
                    }
                    let authenticated_userid = parsed
                        .authenticated_userid
                        .unwrap_or_else(|| auth_response.effective_profile().sub.clone());
                    let scope = parsed.authenticated_scope.unwrap_or_else(|| desired_scope.to_vec());
                    return self
                        .mint_with_userid(session_id, auth_method_id, auth_request, auth_response, &authenticated_userid, &scope)
                        .await;
                }
                Ok(resp) => last_error = Some(format!("passthrough scope service returned {}", resp.status())),
                Err(e) => last_error = Some(e.to_string()),
            }
            if attempt < PASSTHROUGH_RETRIES {
                tokio::time::sleep(Duration::from_millis(PASSTHROUGH_RETRY_DELAY_MS)).await;
            }
        }

        Err(OAuth2Error::ServerError(format!(
            "passthrough scope service unreachable: {}",
            last_error.unwrap_or_default()
        )))
    }

    /// `ScopeConsent` (§4.1/§4.6).
    async fn scope_consent(
        &self,
        session_id: &str,
        auth_method_id: &str,
        auth_request: &AuthRequest,
        auth_response: &AuthResponse,
        desired_scope: &[String],
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let user_id = auth_response
            .user_id
            .clone()
            .ok_or_else(|| OAuth2Error::ServerError("scope consent requires a portal user".to_string()))?;
        let app_id = auth_request
            .app_id
            .clone()
            .ok_or_else(|| OAuth2Error::ServerError("no application resolved for this client".to_string()))?;

        let grant = self
            .portal
            .get_grant(&user_id, &app_id, &auth_request.api_id)
            .await
            .map_err(OAuth2Error::from)?;
        let granted_scopes = grant.map(|g| g.grant_scopes).unwrap_or_default();

        let missing = scope::missing_grants(desired_scope, &granted_scopes);
        if missing.is_empty() {
            return self
                .mint_with_gateway(session_id, auth_method_id, auth_request, auth_response, desired_scope)
                .await;
        }

        self.session_store
            .update(session_id, auth_method_id, |r| {
                r.grant_process = Some(GrantProcessInfo {
                    missing_grants: missing,
                    existing_grants: granted_scopes.into_iter().map(|scope| ExistingGrant { scope }).collect(),
                });
            })
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        Ok(AuthorizeOutcome::NeedsInteraction {
            location: "/grant".to_string(),
        })
    }

    /// Continuation of `ScopeConsent` (§4.1/§4.6): the user's allow/deny decision.
    pub async fn handle_grant_decision(&self, session_id: &str, auth_method_id: &str, allow: bool) -> AuthorizeOutcome {
        match self.handle_grant_decision_inner(session_id, auth_method_id, allow).await {
            Ok(outcome) => outcome,
            Err(e) => AuthorizeOutcome::Failed(e),
        }
    }

    async fn handle_grant_decision_inner(
        &self,
        session_id: &str,
        auth_method_id: &str,
        allow: bool,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        if !allow {
            return Err(OAuth2Error::AccessDenied);
        }

        let record = self
            .session_store
            .get(session_id, auth_method_id)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        let auth_request = record
            .auth_request
            .clone()
            .ok_or_else(|| OAuth2Error::InvalidRequest("no authorize request in progress".to_string()))?;
        let auth_response = record.auth_response.clone().ok_or(OAuth2Error::LoginRequired)?;
        let grant_process = record.grant_process.clone().unwrap_or_default();

        let user_id = auth_response
            .user_id
            .clone()
            .ok_or_else(|| OAuth2Error::ServerError("scope consent requires a portal user".to_string()))?;
        let app_id = auth_request
            .app_id
            .clone()
            .ok_or_else(|| OAuth2Error::ServerError("no application resolved for this client".to_string()))?;

        let union: Vec<String> = grant_process
            .existing_grants
            .iter()
            .map(|g| g.scope.clone())
            .chain(grant_process.missing_grants.iter().cloned())
            .collect();

        self.portal
            .put_grant(&crate::models::Grant {
                user_id,
                application_id: app_id,
                api_id: auth_request.api_id.clone(),
                grant_scopes: union.clone(),
            })
            .await
            .map_err(OAuth2Error::from)?;

        self.mint_with_gateway(session_id, auth_method_id, &auth_request, &auth_response, &union)
            .await
    }

    async fn mint_with_gateway(
        &self,
        session_id: &str,
        auth_method_id: &str,
        auth_request: &AuthRequest,
        auth_response: &AuthResponse,
        scope: &[String],
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let authenticated_userid = authenticated_userid_for(auth_request, auth_response);
        self.mint_with_userid(session_id, auth_method_id, auth_request, auth_response, &authenticated_userid, scope)
            .await
    }

    /// `MintWithGateway` (§4.1): calls the gateway, registers the issued code/token in
    /// the profile store, and builds the final redirect back to the client.
    async fn mint_with_userid(
        &self,
        _session_id: &str,
        _auth_method_id: &str,
        auth_request: &AuthRequest,
        auth_response: &AuthResponse,
        authenticated_userid: &str,
        scope: &[String],
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let scope_str = scope::format_scope(scope);
        let redirect_uri = self
            .gateway
            .authorize(
                &auth_request.api_id,
                &auth_request.response_type,
                &auth_request.client_id,
                &auth_request.redirect_uri,
                authenticated_userid,
                scope_str.as_deref(),
            )
            .await?;

        let code_or_token = extract_code_or_token(&redirect_uri, auth_request.wants_implicit());
        if let Some(key) = code_or_token {
            self.profile_store
                .register(&key, auth_response.effective_profile(), self.session_ttl_secs)
                .await
                .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
        }

        let final_uri = append_state(&redirect_uri, auth_request.state.as_deref(), auth_request.namespace.as_deref());

        Ok(AuthorizeOutcome::Minted { redirect_uri: final_uri })
    }

    /// Exchanges an authorization code for a token (§4.2/§4.4): retrieves the code's
    /// profile, mints via the gateway, re-registers the profile under the issued
    /// access/refresh tokens, and deletes the code entry.
    pub async fn exchange_authorization_code(
        &self,
        api_id: &str,
        client_id: &str,
        client_secret: Option<&str>,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuth2Error> {
        let subscription = self
            .portal
            .get_subscription_by_client_id(client_id)
            .await
            .map_err(OAuth2Error::from)?;
        check_client_secret(&subscription, client_secret)?;

        let profile = self
            .profile_store
            .take(code)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?
            .ok_or_else(|| OAuth2Error::InvalidGrant("unknown or expired code".to_string()))?;

        let secret = client_secret.unwrap_or_default();
        let token = self
            .gateway
            .token_authorization_code(api_id, client_id, secret, code, redirect_uri)
            .await?;

        self.profile_store
            .register_pair(&token.access_token, token.refresh_token.as_deref(), &profile, token.expires_in)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        Ok(token)
    }

    pub async fn exchange_client_credentials(
        &self,
        api_id: &str,
        client_id: &str,
        client_secret: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let subscription = self
            .portal
            .get_subscription_by_client_id(client_id)
            .await
            .map_err(OAuth2Error::from)?;
        check_client_secret(&subscription, Some(client_secret))?;

        self.gateway
            .token_client_credentials(api_id, client_id, client_secret, scope)
            .await
    }
}

/// Computes the gateway-facing `authenticated_userid` (§4.1 "Authenticated user id
/// format"): `sub=<userId>`, or `sub=<userId>;namespace=<ns>` once a namespace is
/// selected. The password-grant case (`sub=<userId>;namespaces=<ns1>,<ns2>,…`) is
/// handled separately in `password_grant.rs`.
pub(crate) fn authenticated_userid_for(auth_request: &AuthRequest, auth_response: &AuthResponse) -> String {
    let user_id = auth_response
        .user_id
        .clone()
        .unwrap_or_else(|| auth_response.effective_profile().sub.clone());
    match &auth_request.namespace {
        Some(ns) => format!("sub={};namespace={}", user_id, ns),
        None => format!("sub={}", user_id),
    }
}

fn check_client_secret(subscription: &crate::models::Subscription, provided: Option<&str>) -> Result<(), OAuth2Error> {
    match (&subscription.client_secret, provided) {
        (Some(expected), Some(actual)) if expected == actual => Ok(()),
        (Some(_), _) => Err(OAuth2Error::InvalidClient("client_secret mismatch".to_string())),
        (None, Some(_)) => Err(OAuth2Error::InvalidClient(
            "non-confidential client must not present a client_secret".to_string(),
        )),
        (None, None) => Ok(()),
    }
}

fn extract_code_or_token(redirect_uri: &str, implicit: bool) -> Option<String> {
    let param = if implicit { "access_token" } else { "code" };
    let query_part = redirect_uri.split_once('#').map(|(_, f)| f).or_else(|| redirect_uri.split_once('?').map(|(_, q)| q))?;
    query_part
        .split('&')
        .find_map(|pair| pair.split_once('=').filter(|(k, _)| *k == param).map(|(_, v)| v.to_string()))
}

fn append_state(redirect_uri: &str, state: Option<&str>, namespace: Option<&str>) -> String {
    let mut uri = redirect_uri.to_string();
    if let Some(state) = state {
        let sep = if uri.contains('?') || uri.contains('#') { "&" } else { "?" };
        uri.push_str(&format!("{}state={}", sep, urlencoding::encode(state)));
    }
    if let Some(ns) = namespace {
        uri.push_str(&format!("&namespace={}", urlencoding::encode(ns)));
    }
    uri
}

/// Debug helper used by tests and logging to describe a minted redirect without
/// leaking the full token value.
pub fn describe_outcome(outcome: &AuthorizeOutcome) -> serde_json::Value {
    match outcome {
        AuthorizeOutcome::NeedsInteraction { location } => json!({ "state": "needs_interaction", "location": location }),
        AuthorizeOutcome::Minted { .. } => json!({ "state": "minted" }),
        AuthorizeOutcome::Failed(e) => json!({ "state": "failed", "error": e.code() }),
    }
}
