//! Valkey backend of the run store, through a Fred client.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fred::error::Error as FredError;
use fred::interfaces::LuaInterface;
use fred::prelude::*;
use reclaim_common::{RunRecord, RunUpdate, run_key, ttl};

use crate::store::{DISPATCH_FAILED, InsertOutcome, RunStore, StoreError};

/// Swap the value at KEYS[1] to ARGV[2] when it still equals ARGV[1],
/// leaving the TTL in place. Answers 1 on a swap, 0 otherwise.
const COMPARE_AND_SET: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  redis.call('SET', KEYS[1], ARGV[2], 'KEEPTTL')
  return 1
end
return 0
";

/// Read-modify-write retries before an update gives up on a hot row.
const UPDATE_ATTEMPTS: usize = 16;

#[derive(Clone)]
pub struct ValkeyRunStore {
    client: Client,
}

impl ValkeyRunStore {
    /// Connect and verify connectivity with a PING.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str, user: Option<&str>, password: Option<&str>) -> Result<Self> {
        let mut config = Config::from_url(url).context("invalid Valkey URL")?;
        if let Some(user) = user {
            config.username = Some(user.to_string());
        }
        if let Some(password) = password {
            config.password = Some(password.to_string());
        }

        let client = Builder::from_config(config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(5);
                conn_config.internal_command_timeout = Duration::from_secs(10);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 5000, 5))
            .build()?;

        client.init().await.context("Valkey connection failed")?;
        client
            .ping::<String>(None)
            .await
            .context("Valkey startup PING failed")?;

        tracing::info!(url = %redact_url(url), "Valkey run store ready");
        Ok(Self { client })
    }

    async fn raw(&self, run_id: &str) -> Result<Option<String>, StoreError> {
        self.client.get(run_key(run_id)).await.map_err(backend)
    }

    async fn compare_and_set(
        &self,
        run_id: &str,
        expected: String,
        replacement: String,
    ) -> Result<bool, StoreError> {
        let swapped: i64 = self
            .client
            .eval(COMPARE_AND_SET, vec![run_key(run_id)], vec![expected, replacement])
            .await
            .map_err(backend)?;
        Ok(swapped == 1)
    }
}

/// Drop any user and password from a connection URL before it is logged.
fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Err(_) => "<invalid>".to_string(),
    }
}

fn backend(err: FredError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn encode(record: &RunRecord) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
        run_id: record.run_id.clone(),
        message: e.to_string(),
    })
}

fn decode(run_id: &str, json: &str) -> Result<RunRecord, StoreError> {
    serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
        run_id: run_id.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl RunStore for ValkeyRunStore {
    async fn insert_if_absent(&self, record: &RunRecord) -> Result<InsertOutcome, StoreError> {
        let key = run_key(&record.run_id);
        let expiry = Expiration::EX(i64::try_from(ttl::RUN_RECORD_SECS).unwrap_or(i64::MAX));
        // SET NX answers nil when the key already exists.
        let set: Option<String> = self
            .client
            .set(&key, encode(record)?, Some(expiry), Some(SetOptions::NX), false)
            .await
            .map_err(backend)?;
        if set.is_some() {
            return Ok(InsertOutcome::Inserted);
        }
        match self.get(&record.run_id).await? {
            Some(existing) => Ok(InsertOutcome::Exists(existing)),
            // Expired between the two commands.
            None => self.insert_if_absent(record).await,
        }
    }

    async fn get(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError> {
        self.raw(run_id)
            .await?
            .map(|json| decode(run_id, &json))
            .transpose()
    }

    async fn reclaim_failed(&self, record: &RunRecord) -> Result<bool, StoreError> {
        let Some(current) = self.raw(&record.run_id).await? else {
            return Ok(false);
        };
        if decode(&record.run_id, &current)?.status != DISPATCH_FAILED {
            return Ok(false);
        }
        self.compare_and_set(&record.run_id, current, encode(record)?)
            .await
    }

    async fn apply_update(
        &self,
        run_id: &str,
        update: &RunUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<RunRecord>, StoreError> {
        for _ in 0..UPDATE_ATTEMPTS {
            let Some(current) = self.raw(run_id).await? else {
                return Ok(None);
            };
            let mut record = decode(run_id, &current)?;
            record.apply(update, now);
            if self.compare_and_set(run_id, current, encode(&record)?).await? {
                return Ok(Some(record));
            }
            tracing::debug!(run_id, "run row changed underneath an update, retrying");
        }
        Err(StoreError::Backend(format!(
            "run {run_id} kept changing during {UPDATE_ATTEMPTS} update attempts"
        )))
    }
}
