use async_trait::async_trait;
use std::collections::HashMap;

use crate::clients::PortalClient;
use crate::dto::OidcProfile;
use crate::error::FlowError;
use crate::idp::{AuthorizeUiOutcome, IdentityProvider, IdpEndpoints, IdpType};
use crate::models::AuthResponse;

struct DummyUser {
    password: &'static str,
    email: &'static str,
    name: &'static str,
}

/// Reference IdP implementation (§1/§9): authenticates against a fixed in-memory table
/// rather than any external system. This is the vehicle the integration tests drive —
/// no network calls, no UI round-trip needed for `authorize_with_ui`.
pub struct DummyIdentityProvider {
    users: HashMap<&'static str, DummyUser>,
}

impl Default for DummyIdentityProvider {
    fn default() -> Self {
        let mut users = HashMap::new();
        users.insert(
            "alice",
            DummyUser {
                password: "alice-password",
                email: "alice@example.com",
                name: "Alice Example",
            },
        );
        users.insert(
            "bob",
            DummyUser {
                password: "bob-password",
                email: "bob@example.com",
                name: "Bob Example",
            },
        );
        Self { users }
    }
}

#[async_trait]
impl IdentityProvider for DummyIdentityProvider {
    fn get_type(&self) -> IdpType {
        IdpType::Dummy
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
        _portal: &PortalClient,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, FlowError> {
        let user = self
            .users
            .get(username)
            .filter(|u| u.password == password)
            .ok_or_else(|| FlowError::Forbidden("invalid username or password".to_string()))?;

        Ok(AuthResponse {
            custom_id: Some(format!("dummy:{}", username)),
            default_profile: OidcProfile {
                sub: username.to_string(),
                email: Some(user.email.to_string()),
                email_verified: Some(true),
                name: Some(user.name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn check_refresh_token(&self, _portal: &PortalClient, authenticated_userid: &str) -> Result<(), FlowError> {
        let username = authenticated_userid.split(';').next().unwrap_or(authenticated_userid);
        if self.users.contains_key(username) {
            Ok(())
        } else {
            Err(FlowError::Forbidden("user no longer exists".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn test_portal() -> PortalClient {
        let config = Arc::new(Config {
            server_host: "127.0.0.1".into(),
            server_port: 0,
            base_path: "/auth".into(),
            external_url: "http://localhost".into(),
            network_schema: "http".into(),
            portal_api_url: "http://localhost".into(),
            gateway_api_url: "http://localhost".into(),
            redis_url: "redis://localhost".into(),
            session_secret: "secret".into(),
            session_minutes: 60,
            auth_methods: vec![],
        });
        PortalClient::new(config)
    }

    #[tokio::test]
    async fn correct_credentials_authenticate() {
        let idp = DummyIdentityProvider::default();
        let resp = idp
            .authorize_by_user_pass(&test_portal(), "alice", "alice-password")
            .await
            .unwrap();
        assert_eq!(resp.default_profile.sub, "alice");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let idp = DummyIdentityProvider::default();
        let result = idp.authorize_by_user_pass(&test_portal(), "alice", "wrong").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let idp = DummyIdentityProvider::default();
        let result = idp
            .authorize_by_user_pass(&test_portal(), "nobody", "whatever")
            .await;
        assert!(result.is_err());
    }
}
