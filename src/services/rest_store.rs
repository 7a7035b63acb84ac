//! Shared counters and token ledger over a Redis REST endpoint.
//!
//! Commands are posted as JSON arrays with a bearer token, the protocol used
//! by Upstash. Replies are `{"result": ...}` or `{"error": "..."}`.

use crate::{
    error::StoreError,
    services::{
        lead::TokenLedger,
        rate_limit::{RateLimitDecision, RateLimitStore},
    },
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::{fmt, time::Duration};
use tracing::debug;
use url::Url;

/// Weighted two-bucket sliding window, evaluated atomically on the server.
///
/// Returns the remaining budget after counting the request, or -1 when the
/// request is denied and nothing was counted.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local limit = tonumber(ARGV[1])
local now = tonumber(ARGV[2])
local window = tonumber(ARGV[3])
local current = tonumber(redis.call("GET", KEYS[1]) or "0")
local previous = tonumber(redis.call("GET", KEYS[2]) or "0")
local weighted = math.floor((1 - (now % window) / window) * previous)
if weighted + current >= limit then
  return -1
end
current = redis.call("INCR", KEYS[1])
if current == 1 then
  redis.call("PEXPIRE", KEYS[1], window * 2 + 1000)
end
return limit - (current + weighted)
"#;

const LEDGER_PREFIX: &str = "verification:used";

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

/// Counter and ledger store backed by a Redis REST API
#[derive(Clone)]
pub struct RestRateLimitStore {
    client: Client,
    url: Url,
    token: String,
}

impl fmt::Debug for RestRateLimitStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestRateLimitStore")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl RestRateLimitStore {
    pub fn new(url: Url, token: String, timeout_ms: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self { client, url, token })
    }

    async fn command(&self, args: Value) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        let reply: RestReply = response
            .json()
            .await
            .map_err(|e| StoreError::Protocol(format!("HTTP {status}: {e}")))?;

        match reply.error {
            Some(error) => Err(StoreError::Protocol(error)),
            None if !status.is_success() => Err(StoreError::Unavailable(format!("HTTP {status}"))),
            None => Ok(reply.result),
        }
    }
}

fn decode_hit(result: &Value, reset_at: i64) -> Result<RateLimitDecision, StoreError> {
    let remaining = result
        .as_i64()
        .ok_or_else(|| StoreError::Protocol(format!("expected integer, got {result}")))?;

    Ok(if remaining < 0 {
        RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at,
        }
    } else {
        RateLimitDecision {
            allowed: true,
            remaining,
            reset_at,
        }
    })
}

/// `SET NX` answers `"OK"` when the key was written and `null` when it existed
fn decode_set_nx(result: &Value) -> Result<bool, StoreError> {
    match result {
        Value::String(s) if s == "OK" => Ok(true),
        Value::Null => Ok(false),
        other => Err(StoreError::Protocol(format!("unexpected SET reply {other}"))),
    }
}

#[async_trait]
impl RateLimitStore for RestRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<RateLimitDecision, StoreError> {
        if window_ms <= 0 {
            return Err(StoreError::Protocol(format!(
                "window must be positive, got {window_ms}ms"
            )));
        }

        let bucket = now_ms.div_euclid(window_ms);
        let result = self
            .command(json!([
                "EVAL",
                SLIDING_WINDOW_SCRIPT,
                "2",
                format!("{key}:{bucket}"),
                format!("{key}:{}", bucket - 1),
                limit.to_string(),
                now_ms.to_string(),
                window_ms.to_string(),
            ]))
            .await?;

        debug!(key, %result, "Sliding window hit");
        decode_hit(&result, (bucket + 1) * window_ms)
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }
}

#[async_trait]
impl TokenLedger for RestRateLimitStore {
    async fn redeem(
        &self,
        token: &str,
        expires_at_ms: i64,
        now_ms: i64,
    ) -> Result<bool, StoreError> {
        let ttl_ms = (expires_at_ms - now_ms).max(1);
        let result = self
            .command(json!([
                "SET",
                format!("{LEDGER_PREFIX}:{token}"),
                "1",
                "NX",
                "PX",
                ttl_ms.to_string(),
            ]))
            .await?;

        decode_set_nx(&result)
    }
}
