//! Redis-over-REST cache backend (Upstash wire format).
//!
//! Each command is a JSON array POSTed to the endpoint root with a bearer
//! token; replies are `{"result": ...}` or `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{CacheBackend, CacheError};
use crate::redact::RedactedString;

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

pub struct RestBackend {
    client: reqwest::Client,
    url: String,
    token: RedactedString,
}

impl RestBackend {
    pub fn new(client: reqwest::Client, url: impl Into<String>, token: RedactedString) -> Self {
        Self {
            client,
            url: url.into().trim_end_matches('/').to_owned(),
            token,
        }
    }

    async fn command(&self, args: Value) -> Result<Value, CacheError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.token.as_str())
            .json(&args)
            .send()
            .await
            .map_err(|e| CacheError::Unavailable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::Unavailable(format!("HTTP {}", status.as_u16())));
        }

        let reply: RestReply = response
            .json()
            .await
            .map_err(|e| CacheError::Protocol(e.without_url().to_string()))?;
        match reply.error {
            Some(error) => Err(CacheError::Protocol(error)),
            None => Ok(reply.result),
        }
    }
}

#[async_trait]
impl CacheBackend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.command(json!(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(value) => Ok(Some(value)),
            other => Err(CacheError::Protocol(format!("unexpected GET reply: {other}"))),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        // EX takes whole seconds and rejects 0.
        let seconds = ttl.as_secs().max(1);
        self.command(json!(["SET", key, value, "EX", seconds])).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.command(json!(["PING"])).await.map(|_| ())
    }
}
