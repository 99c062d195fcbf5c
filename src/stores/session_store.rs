use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::models::{AuthRequest, AuthResponse, GrantProcessInfo};

const KEY_PREFIX: &str = "auth:session:";

/// Per-`(sessionId, authMethodId)` record (§3/§9): the `AuthRequest` in flight, the
/// `AuthResponse` once the IdP has authenticated the user, transient grant-consent
/// bookkeeping, and a single-use registration/CSRF nonce. Held together under one Redis
/// key since they always change together within one flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    pub auth_request: Option<AuthRequest>,
    pub auth_response: Option<AuthResponse>,
    pub grant_process: Option<GrantProcessInfo>,
    pub csrf_token: Option<String>,
}

/// Session Store (§4.9 / §9): KV store keyed by cookie session id, read-modify-write per
/// session. Grounded on `mtergel-nevermind/src/app/session.rs`'s
/// `get_multiplexed_tokio_connection` + pipelined `SET`+`EXPIRE` shape.
#[derive(Clone)]
pub struct SessionStore {
    manager: redis::aio::ConnectionManager,
    ttl_secs: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SessionStore {
    pub async fn connect(redis_url: &str, session_minutes: i64) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager,
            ttl_secs: session_minutes.max(1) * 60,
        })
    }

    fn key(session_id: &str, auth_method_id: &str) -> String {
        format!("{}{}:{}", KEY_PREFIX, session_id, auth_method_id)
    }

    pub async fn get(&self, session_id: &str, auth_method_id: &str) -> Result<SessionRecord, StoreError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(Self::key(session_id, auth_method_id)).await?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(SessionRecord::default()),
        }
    }

    pub async fn set(
        &self,
        session_id: &str,
        auth_method_id: &str,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(record)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::key(session_id, auth_method_id), serialized, self.ttl_secs as u64)
            .await?;
        Ok(())
    }

    /// Read-modify-write helper used by every state in the flow orchestrator: load the
    /// record, let the caller mutate it, persist it back with a refreshed TTL.
    pub async fn update<F>(&self, session_id: &str, auth_method_id: &str, f: F) -> Result<SessionRecord, StoreError>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let mut record = self.get(session_id, auth_method_id).await?;
        f(&mut record);
        self.set(session_id, auth_method_id, &record).await?;
        Ok(record)
    }

    pub async fn destroy(&self, session_id: &str, auth_method_id: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(Self::key(session_id, auth_method_id)).await?;
        Ok(())
    }
}
