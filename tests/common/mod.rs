use wicked_auth_server::config::{AppState, AuthMethodConfig, Config};
use wicked_auth_server::stores::ProfileStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One spawned instance of the auth server (grounded on `mtergel-nevermind`'s
/// `spawn_app()` helper pattern), with its own randomized Redis-backed state and two
/// wiremock servers standing in for the Portal API and the Gateway API (§4.2/§4.3).
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub portal: MockServer,
    pub gateway: MockServer,
    pub profile_store: ProfileStore,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

pub fn query_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let query = url.split_once('?').map(|(_, q)| q)?;
    query.split('&').find_map(|pair| pair.split_once('=').filter(|(k, _)| *k == key).map(|(_, v)| v))
}

pub async fn spawn_app() -> TestApp {
    let portal = MockServer::start().await;
    let gateway = MockServer::start().await;

    let config = Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        base_path: "/auth".to_string(),
        external_url: "http://localhost".to_string(),
        network_schema: "http".to_string(),
        portal_api_url: portal.uri(),
        gateway_api_url: gateway.uri(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        session_secret: format!("test-secret-{}", uuid::Uuid::new_v4()),
        session_minutes: 60,
        auth_methods: vec![AuthMethodConfig {
            name: "default".to_string(),
            kind: "dummy".to_string(),
            enabled: true,
        }],
    };

    let state = AppState::new(config).await.expect("failed to build AppState against mock collaborators");
    let profile_store = state.profile_store.clone();
    let app = wicked_auth_server::dispatcher::build(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("failed to bind test listener");
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server crashed");
    });

    let api_client = reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build test http client");

    TestApp {
        address,
        api_client,
        portal,
        gateway,
        profile_store,
    }
}

/// Stubs `GET /apis/:id` with a minimal descriptor. Pass `None` for fields the scenario
/// doesn't exercise.
pub async fn stub_api(
    server: &MockServer,
    api_id: &str,
    scopes: &[&str],
    registration_pool: Option<&str>,
    passthrough_users: bool,
    passthrough_scope_url: Option<&str>,
) {
    Mock::given(method("GET"))
        .and(path(format!("/apis/{api_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": api_id,
            "auth_methods": ["default"],
            "scopes": scopes,
            "registration_pool": registration_pool,
            "passthrough_users": passthrough_users,
            "passthrough_scope_url": passthrough_scope_url,
            "disable_register": false,
        })))
        .mount(server)
        .await;
}

#[allow(clippy::too_many_arguments)]
pub async fn stub_subscription(
    server: &MockServer,
    client_id: &str,
    api_id: &str,
    app_id: &str,
    trusted: bool,
    client_secret: Option<&str>,
) {
    Mock::given(method("GET"))
        .and(path("/subscriptions/by-client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": format!("sub-{client_id}"),
            "application_id": app_id,
            "api_id": api_id,
            "client_id": client_id,
            "client_secret": client_secret,
            "trusted": trusted,
            "allowed_scopes": null,
        })))
        .mount(server)
        .await;
}

/// Stubs the oauth2 plugin lookup (`GET /apis/:id/plugins`) the gateway client caches
/// process-wide (§4.2/§5).
pub async fn stub_gateway_oauth2_config(server: &MockServer, api_id: &str, enable_authorization_code: bool, enable_implicit_grant: bool, enable_password_grant: bool) {
    Mock::given(method("GET"))
        .and(path(format!("/apis/{api_id}/plugins")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "name": "oauth2",
                "config": {
                    "provision_key": "test-provision-key",
                    "enable_authorization_code": enable_authorization_code,
                    "enable_implicit_grant": enable_implicit_grant,
                    "enable_client_credentials": false,
                    "enable_password_grant": enable_password_grant,
                    "uris": [],
                }
            }
        ])))
        .mount(server)
        .await;
}

pub async fn stub_gateway_authorize(server: &MockServer, api_id: &str, redirect_uri: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/{api_id}/oauth2/authorize")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "redirect_uri": redirect_uri })))
        .mount(server)
        .await;
}

pub async fn stub_gateway_token(server: &MockServer, api_id: &str, access_token: &str, refresh_token: Option<&str>) {
    Mock::given(method("POST"))
        .and(path(format!("/{api_id}/oauth2/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": refresh_token,
        })))
        .mount(server)
        .await;
}

pub async fn stub_user_lookup_miss(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

pub async fn stub_create_user(server: &MockServer, user_id: &str, email: &str) {
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": user_id,
            "custom_id": null,
            "email": email,
            "email_verified": true,
            "name": null,
            "groups": [],
        })))
        .mount(server)
        .await;
}

pub async fn stub_grant_lookup_miss(server: &MockServer) {
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/grants/.+/applications/.+/apis/.+$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

pub async fn stub_put_grant(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(wiremock::matchers::path_regex(r"^/grants/.+/applications/.+/apis/.+$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

pub async fn stub_pool(server: &MockServer, pool_id: &str, requires_namespace: bool) {
    Mock::given(method("GET"))
        .and(path(format!("/pools/{pool_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": pool_id,
            "requires_namespace": requires_namespace,
        })))
        .mount(server)
        .await;
}

pub async fn stub_registration_miss(server: &MockServer, pool_id: &str, user_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/registrations/pools/{pool_id}/users/{user_id}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

pub async fn stub_registration(server: &MockServer, pool_id: &str, user_id: &str, namespace: Option<&str>) {
    Mock::given(method("GET"))
        .and(path(format!("/registrations/pools/{pool_id}/users/{user_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pool_id": pool_id,
            "user_id": user_id,
            "namespace": namespace,
            "fields": {},
        })))
        .mount(server)
        .await;
}

pub async fn stub_put_registration(server: &MockServer, pool_id: &str, user_id: &str) {
    Mock::given(method("PUT"))
        .and(path(format!("/registrations/pools/{pool_id}/users/{user_id}")))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

pub async fn stub_namespace_valid(server: &MockServer, pool_id: &str, namespace: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/pools/{pool_id}/namespaces/{namespace}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "namespace": namespace })))
        .mount(server)
        .await;
}

/// Stubs the external passthrough-scope service a `passthrough_scope_url` API points
/// at (§4.6/§4.8 case 4): it decides `allow`/`authenticated_userid`/`authenticated_scope`
/// out of band from the Portal/Gateway.
pub async fn stub_passthrough_scope(server: &MockServer, path_str: &str, authenticated_userid: &str) {
    Mock::given(method("POST"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "allow": true,
            "authenticated_userid": authenticated_userid,
            "authenticated_scope": [],
        })))
        .mount(server)
        .await;
}
