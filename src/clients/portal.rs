use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::ClientError;
use crate::models::{ApiDescriptor, Application, Grant, PortalUser, Registration, RegistrationPool, Subscription};

/// Typed client over the back-office portal API (§4.3): subscriptions, users,
/// applications, APIs, registrations/pools, grants, verifications. API descriptors are
/// cached process-wide like the gateway client's oauth2 config (§5/§9).
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    config: Arc<Config>,
    api_descriptors: Arc<RwLock<HashMap<String, ApiDescriptor>>>,
}

#[derive(Serialize)]
struct CreateUser<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_id: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateVerification<'a> {
    user_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    email: &'a str,
}

impl PortalClient {
    pub fn new(config: Arc<Config>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build portal http client");
        Self {
            http,
            config,
            api_descriptors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.portal_api_url, path)
    }

    pub async fn get_api(&self, api_id: &str) -> Result<ApiDescriptor, ClientError> {
        if let Some(cached) = self.api_descriptors.read().await.get(api_id) {
            return Ok(cached.clone());
        }
        let descriptor: ApiDescriptor = self.get(&format!("/apis/{}", api_id)).await?;
        self.api_descriptors
            .write()
            .await
            .insert(api_id.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    pub async fn get_subscription_by_client_id(&self, client_id: &str) -> Result<Subscription, ClientError> {
        self.get(&format!("/subscriptions/by-client-id?client_id={}", client_id))
            .await
    }

    pub async fn get_application(&self, app_id: &str) -> Result<Application, ClientError> {
        self.get(&format!("/applications/{}", app_id)).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<PortalUser, ClientError> {
        self.get(&format!("/users/{}", user_id)).await
    }

    pub async fn find_user_by_custom_id(&self, custom_id: &str) -> Result<Option<PortalUser>, ClientError> {
        self.get_optional(&format!("/users?customId={}", custom_id)).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<PortalUser>, ClientError> {
        self.get_optional(&format!("/users?email={}", urlencoding::encode(email)))
            .await
    }

    pub async fn create_user(&self, email: &str, custom_id: Option<&str>) -> Result<PortalUser, ClientError> {
        let resp = self
            .http
            .post(self.url("/users"))
            .json(&CreateUser { email, custom_id })
            .send()
            .await?;
        self.decode(resp).await
    }

    pub async fn get_registration(&self, pool_id: &str, user_id: &str) -> Result<Option<Registration>, ClientError> {
        self.get_optional(&format!("/registrations/pools/{}/users/{}", pool_id, user_id))
            .await
    }

    pub async fn put_registration(&self, registration: &Registration) -> Result<(), ClientError> {
        let resp = self
            .http
            .put(self.url(&format!(
                "/registrations/pools/{}/users/{}",
                registration.pool_id, registration.user_id
            )))
            .json(registration)
            .send()
            .await?;
        self.ensure_success(resp).await
    }

    pub async fn get_pool(&self, pool_id: &str) -> Result<RegistrationPool, ClientError> {
        self.get(&format!("/pools/{}", pool_id)).await
    }

    pub async fn namespace_is_valid(&self, pool_id: &str, namespace: &str) -> Result<bool, ClientError> {
        Ok(self
            .get_optional::<serde_json::Value>(&format!("/pools/{}/namespaces/{}", pool_id, namespace))
            .await?
            .is_some())
    }

    pub async fn get_grant(&self, user_id: &str, app_id: &str, api_id: &str) -> Result<Option<Grant>, ClientError> {
        self.get_optional(&format!(
            "/grants/{}/applications/{}/apis/{}",
            user_id, app_id, api_id
        ))
        .await
    }

    pub async fn put_grant(&self, grant: &Grant) -> Result<(), ClientError> {
        let resp = self
            .http
            .put(self.url(&format!(
                "/grants/{}/applications/{}/apis/{}",
                grant.user_id, grant.application_id, grant.api_id
            )))
            .json(grant)
            .send()
            .await?;
        self.ensure_success(resp).await
    }

    pub async fn delete_grant(&self, user_id: &str, app_id: &str, api_id: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!(
                "/grants/{}/applications/{}/apis/{}",
                user_id, app_id, api_id
            )))
            .send()
            .await?;
        self.ensure_success(resp).await
    }

    pub async fn list_grants(&self, user_id: &str) -> Result<Vec<Grant>, ClientError> {
        self.get(&format!("/grants/{}", user_id)).await
    }

    /// Marks a user's email verified (`PATCH /users/<id>`), used by the `verifyemail`
    /// continuation once its verification record is consumed.
    pub async fn mark_email_verified(&self, user_id: &str) -> Result<(), ClientError> {
        #[derive(Serialize)]
        struct Patch {
            email_verified: bool,
        }
        let resp = self
            .http
            .patch(self.url(&format!("/users/{}", user_id)))
            .json(&Patch { email_verified: true })
            .send()
            .await?;
        self.ensure_success(resp).await
    }

    pub async fn create_verification(&self, user_id: &str, kind: &str, email: &str) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(self.url("/verifications"))
            .json(&CreateVerification { user_id, kind, email })
            .send()
            .await?;
        let value: serde_json::Value = self.decode(resp).await?;
        value
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode("verification response missing id".into()))
    }

    pub async fn get_verification(&self, id: &str) -> Result<Option<serde_json::Value>, ClientError> {
        self.get_optional(&format!("/verifications/{}", id)).await
    }

    pub async fn delete_verification(&self, id: &str) -> Result<(), ClientError> {
        let resp = self.http.delete(self.url(&format!("/verifications/{}", id))).send().await?;
        self.ensure_success(resp).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.http.get(self.url(path)).send().await?;
        self.decode(resp).await
    }

    async fn get_optional<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ClientError> {
        let resp = self.http.get(self.url(path)).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(self.decode(resp).await?))
    }

    async fn decode<T: serde::de::DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Upstream { status, body });
        }
        resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn ensure_success(&self, resp: reqwest::Response) -> Result<(), ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Upstream { status, body });
        }
        Ok(())
    }
}
