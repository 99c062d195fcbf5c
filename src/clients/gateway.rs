use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::dto::TokenResponse;
use crate::error::{ClientError, OAuth2Error};
use crate::models::GatewayOAuth2Config;

/// Typed client over the upstream gateway's oauth2 plugin endpoints (§4.2). Holds a
/// process-lifetime cache of each API's oauth2 plugin config, mirroring the teacher's
/// `OAuthService` shape (struct wrapping a shared handle plus async `Result`-returning
/// methods) but against HTTP instead of a local database pool.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: Arc<Config>,
    oauth2_configs: Arc<RwLock<HashMap<String, GatewayOAuth2Config>>>,
}

#[derive(Serialize)]
struct AuthorizePayload<'a> {
    response_type: &'a str,
    provision_key: &'a str,
    client_id: &'a str,
    redirect_uri: &'a str,
    authenticated_userid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum TokenPayload<'a> {
    ClientCredentials {
        grant_type: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<&'a str>,
    },
    AuthorizationCode {
        grant_type: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
        code: &'a str,
        redirect_uri: &'a str,
    },
    Password {
        grant_type: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
        provision_key: &'a str,
        authenticated_userid: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<&'a str>,
    },
    RefreshToken {
        grant_type: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
        refresh_token: &'a str,
    },
}

impl GatewayClient {
    pub fn new(config: Arc<Config>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build gateway http client");
        Self {
            http,
            config,
            oauth2_configs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fetches and caches the oauth2 plugin config + API descriptor for `api_id`.
    /// Cached for the process lifetime (§5/§9 — no invalidation).
    pub async fn oauth2_config(&self, api_id: &str) -> Result<GatewayOAuth2Config, ClientError> {
        if let Some(cached) = self.oauth2_configs.read().await.get(api_id) {
            return Ok(cached.clone());
        }

        let url = format!("{}/apis/{}/plugins", self.config.gateway_api_url, api_id);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Upstream { status, body });
        }
        let plugins: Vec<Value> = resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))?;
        let oauth2_plugin = plugins
            .into_iter()
            .find(|p| p.get("name").and_then(Value::as_str) == Some("oauth2"))
            .ok_or_else(|| ClientError::Decode("no oauth2 plugin configured for api".into()))?;

        let config_value = oauth2_plugin
            .get("config")
            .cloned()
            .ok_or_else(|| ClientError::Decode("oauth2 plugin missing config".into()))?;
        let config: GatewayOAuth2Config =
            serde_json::from_value(config_value).map_err(|e| ClientError::Decode(e.to_string()))?;

        self.oauth2_configs
            .write()
            .await
            .insert(api_id.to_string(), config.clone());
        Ok(config)
    }

    fn api_base_url(&self, cfg: &GatewayOAuth2Config, api_id: &str) -> String {
        let uri = cfg.api_uri().unwrap_or(api_id);
        format!("{}/{}", self.config.gateway_api_url, uri.trim_start_matches('/'))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn authorize(
        &self,
        api_id: &str,
        response_type: &str,
        client_id: &str,
        redirect_uri: &str,
        authenticated_userid: &str,
        scope: Option<&str>,
    ) -> Result<String, OAuth2Error> {
        let cfg = self.oauth2_config(api_id).await?;
        let grant_enabled = match response_type {
            "code" => cfg.enable_authorization_code,
            "token" => cfg.enable_implicit_grant,
            _ => false,
        };
        if !grant_enabled {
            return Err(OAuth2Error::UnauthorizedClient);
        }

        let payload = AuthorizePayload {
            response_type,
            provision_key: &cfg.provision_key,
            client_id,
            redirect_uri,
            authenticated_userid,
            scope,
        };
        let url = format!("{}/oauth2/authorize", self.api_base_url(&cfg, api_id));
        let resp = self
            .http
            .post(&url)
            .header("X-Forwarded-Proto", self.config.network_schema.clone())
            .json(&payload)
            .send()
            .await
            .map_err(ClientError::from)?;

        let status = resp.status();
        let body: Value = resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))?;
        if !status.is_success() {
            return Err(gateway_error_body(status, &body));
        }
        body.get("redirect_uri")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| OAuth2Error::ServerError("gateway did not return redirect_uri".into()))
    }

    pub async fn token_client_credentials(
        &self,
        api_id: &str,
        client_id: &str,
        client_secret: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let cfg = self.oauth2_config(api_id).await?;
        if !cfg.enable_client_credentials {
            return Err(OAuth2Error::UnauthorizedClient);
        }
        let payload = TokenPayload::ClientCredentials {
            grant_type: "client_credentials",
            client_id,
            client_secret,
            scope,
        };
        self.post_token(&cfg, api_id, &payload).await
    }

    pub async fn token_authorization_code(
        &self,
        api_id: &str,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuth2Error> {
        let cfg = self.oauth2_config(api_id).await?;
        if !cfg.enable_authorization_code {
            return Err(OAuth2Error::UnauthorizedClient);
        }
        let payload = TokenPayload::AuthorizationCode {
            grant_type: "authorization_code",
            client_id,
            client_secret,
            code,
            redirect_uri,
        };
        self.post_token(&cfg, api_id, &payload).await
    }

    pub async fn token_password(
        &self,
        api_id: &str,
        client_id: &str,
        client_secret: &str,
        authenticated_userid: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let cfg = self.oauth2_config(api_id).await?;
        if !cfg.enable_password_grant {
            return Err(OAuth2Error::UnauthorizedClient);
        }
        let payload = TokenPayload::Password {
            grant_type: "password",
            client_id,
            client_secret,
            provision_key: &cfg.provision_key,
            authenticated_userid,
            scope,
        };
        self.post_token(&cfg, api_id, &payload).await
    }

    pub async fn token_refresh(
        &self,
        api_id: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuth2Error> {
        let cfg = self.oauth2_config(api_id).await?;
        let payload = TokenPayload::RefreshToken {
            grant_type: "refresh_token",
            client_id,
            client_secret,
            refresh_token,
        };
        self.post_token(&cfg, api_id, &payload).await
    }

    async fn post_token(
        &self,
        cfg: &GatewayOAuth2Config,
        api_id: &str,
        payload: &TokenPayload<'_>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let url = format!("{}/oauth2/token", self.api_base_url(cfg, api_id));
        let resp = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(ClientError::from)?;
        let status = resp.status();
        let body: Value = resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))?;
        if !status.is_success() {
            return Err(gateway_error_body(status, &body));
        }
        serde_json::from_value(body).map_err(|e| OAuth2Error::ServerError(e.to_string()))
    }
}

fn gateway_error_body(status: reqwest::StatusCode, body: &Value) -> OAuth2Error {
    let description = body
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or("gateway request failed")
        .to_string();
    match body.get("error").and_then(Value::as_str) {
        Some("invalid_scope") => OAuth2Error::InvalidScope(description),
        Some("invalid_grant") => OAuth2Error::InvalidGrant(description),
        Some("invalid_client") => OAuth2Error::InvalidClient(description),
        Some("unauthorized_client") => OAuth2Error::UnauthorizedClient,
        _ if status.as_u16() >= 500 => OAuth2Error::ServerError(description),
        _ => OAuth2Error::InvalidRequest(description),
    }
}
