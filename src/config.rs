use std::sync::Arc;

use crate::clients::{GatewayClient, PortalClient};
use crate::idp::IdpRegistry;
use crate::orchestrator::FlowOrchestrator;
use crate::stores::{ProfileStore, SessionStore};

/// One configured auth method mount point, e.g. `{name: "default", type: "local", enabled: true}`.
#[derive(Clone, Debug)]
pub struct AuthMethodConfig {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,

    pub base_path: String,
    pub external_url: String,
    pub network_schema: String,

    pub portal_api_url: String,
    pub gateway_api_url: String,

    pub redis_url: String,

    pub session_secret: String,
    pub session_minutes: i64,

    pub auth_methods: Vec<AuthMethodConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let session_secret = std::env::var("AUTH_SERVER_SESSION_SECRET")
            .map_err(|_| anyhow::anyhow!("AUTH_SERVER_SESSION_SECRET is required"))?;

        Ok(Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            base_path: std::env::var("AUTH_SERVER_BASE_PATH").unwrap_or_else(|_| "/auth".to_string()),
            external_url: std::env::var("PORTAL_EXTERNAL_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            network_schema: std::env::var("PORTAL_NETWORK_SCHEMA").unwrap_or_else(|_| "http".to_string()),
            portal_api_url: std::env::var("PORTAL_API_URL")
                .unwrap_or_else(|_| "http://portal-api:3001".to_string()),
            gateway_api_url: std::env::var("PORTAL_GATEWAY_URL")
                .unwrap_or_else(|_| "http://kong:8001".to_string()),
            redis_url: std::env::var("AUTH_SERVER_REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            session_secret,
            session_minutes: std::env::var("AUTH_SERVER_SESSION_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            auth_methods: parse_auth_methods(
                &std::env::var("AUTH_SERVER_AUTH_METHODS")
                    .unwrap_or_else(|_| "default:local:true".to_string()),
            ),
        })
    }

    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.server_host, self.server_port)
            .parse()
            .expect("invalid socket address")
    }

    pub fn is_production(&self) -> bool {
        std::env::var("NODE_ENV").map(|v| v == "production").unwrap_or(false)
    }
}

/// Parses `name:type:enabled,name:type:enabled,...` into auth method configs.
fn parse_auth_methods(raw: &str) -> Vec<AuthMethodConfig> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let name = parts.next()?.trim().to_string();
            let kind = parts.next()?.trim().to_string();
            let enabled = parts.next().map(|v| v.trim() == "true").unwrap_or(true);
            Some(AuthMethodConfig { name, kind, enabled })
        })
        .collect()
}

/// Shared application state passed to every router and middleware layer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: GatewayClient,
    pub portal: PortalClient,
    pub profile_store: ProfileStore,
    pub session_store: SessionStore,
    pub idps: Arc<IdpRegistry>,
    pub orchestrator: FlowOrchestrator,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let gateway = GatewayClient::new(config.clone());
        let portal = PortalClient::new(config.clone());
        let profile_store = ProfileStore::connect(&config.redis_url).await?;
        let session_store = SessionStore::connect(&config.redis_url, config.session_minutes).await?;
        let idps = Arc::new(IdpRegistry::from_config(&config));
        let orchestrator = FlowOrchestrator::new(
            gateway.clone(),
            portal.clone(),
            profile_store.clone(),
            session_store.clone(),
            idps.clone(),
            config.session_minutes * 60,
        );

        Ok(Self {
            config,
            gateway,
            portal,
            profile_store,
            session_store,
            idps,
            orchestrator,
        })
    }
}
