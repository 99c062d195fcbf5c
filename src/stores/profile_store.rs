use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::dto::OidcProfile;

const KEY_PREFIX: &str = "auth:profile:";

/// What's actually stored under each key: the profile, plus (for an access/refresh
/// pair minted together) the other key in the pair, so a lookup by either token can
/// find and delete its partner (§4.8 case 4 — "the previous access token is deleted
/// from the profile store" when a refresh re-mints).
#[derive(Serialize, Deserialize)]
struct StoredProfile {
    profile: OidcProfile,
    #[serde(default)]
    paired_key: Option<String>,
}

/// Ephemeral code/token → user profile binding (§3/§4.4), backed by a shared Redis
/// instance with TTL. Grounded on `mtergel-nevermind`'s session store, which pairs the
/// same `axum`+`redis`+`reqwest` stack, but uses plain `SET`/`GETDEL` here instead of
/// `JSON.SET` since RedisJSON is not assumed to be available.
#[derive(Clone)]
pub struct ProfileStore {
    manager: redis::aio::ConnectionManager,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ProfileStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    fn key(token_or_code: &str) -> String {
        format!("{}{}", KEY_PREFIX, token_or_code)
    }

    /// Registers `profile` under a single key (an authorization code, or a bare access
    /// token) with the given TTL in seconds.
    pub async fn register(&self, key: &str, profile: &OidcProfile, ttl_secs: i64) -> Result<(), StoreError> {
        let stored = StoredProfile { profile: profile.clone(), paired_key: None };
        let serialized = serde_json::to_string(&stored)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::key(key), serialized, ttl_secs.max(1) as u64)
            .await?;
        Ok(())
    }

    /// Registers the same profile under both an access token and its paired refresh
    /// token (§4.4 "both keys map to the same profile"), each pointing back at the
    /// other so either one can be used to delete the pair together.
    pub async fn register_pair(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        profile: &OidcProfile,
        ttl_secs: i64,
    ) -> Result<(), StoreError> {
        let ttl = ttl_secs.max(1) as u64;
        let access_entry = StoredProfile {
            profile: profile.clone(),
            paired_key: refresh_token.map(str::to_string),
        };
        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(Self::key(access_token), serde_json::to_string(&access_entry)?, ttl);
        if let Some(refresh_token) = refresh_token {
            let refresh_entry = StoredProfile {
                profile: profile.clone(),
                paired_key: Some(access_token.to_string()),
            };
            pipe.set_ex(Self::key(refresh_token), serde_json::to_string(&refresh_entry)?, ttl);
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    pub async fn retrieve(&self, key: &str) -> Result<Option<OidcProfile>, StoreError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(Self::key(key)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str::<StoredProfile>(&raw)?.profile)),
            None => Ok(None),
        }
    }

    /// Retrieves and deletes the entry under `code`, used to turn a code into an
    /// access-token binding on token exchange (§4.4). A miss is not fatal — expired
    /// entries surface as `invalid_grant` to the caller, never a server error.
    pub async fn take(&self, code: &str) -> Result<Option<OidcProfile>, StoreError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GETDEL").arg(Self::key(code)).query_async(&mut conn).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str::<StoredProfile>(&raw)?.profile)),
            None => Ok(None),
        }
    }

    /// Best-effort delete; failures are logged by the caller and otherwise ignored,
    /// matching the teacher's `.ok()` pattern for non-critical cleanup.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(Self::key(key)).await?;
        Ok(())
    }

    /// Deletes the entry under `key` along with its paired access/refresh token, if
    /// any (§4.8 case 4: re-minting behind a passthrough scope url deletes the
    /// previous access token, not just the refresh token it was looked up by).
    pub async fn delete_paired(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(Self::key(key)).await?;
        if let Some(raw) = raw {
            let stored: StoredProfile = serde_json::from_str(&raw)?;
            if let Some(paired_key) = stored.paired_key {
                conn.del::<_, ()>(Self::key(&paired_key)).await?;
            }
        }
        conn.del::<_, ()>(Self::key(key)).await?;
        Ok(())
    }
}
