//! Production [`RemoteApi`] implementation over reqwest.
//!
//! The remote API speaks JSON envelopes of the form
//! `{ code, msg, data }` with `code == 0` meaning success. The stored
//! credential is a cookie-pair string and rides on every call in the
//! `Cookie` header.

use async_trait::async_trait;
use serde_json::Value;

use autorelay_core::config::RemoteConfig;

use crate::workflow::{RemoteApi, RemoteError};

pub struct HttpRemoteApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteApi {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::transport(format!("client error: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call(&self, method: reqwest::Method, path: &str, token: &str) -> Result<Value, RemoteError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .request(method, &url)
            .header("Cookie", token)
            .send()
            .await
            .map_err(|e| RemoteError::transport(format!("request failed: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::transport(format!("read body failed: {e}")))?;

        let code = body.get("code").and_then(|v| v.as_i64()).unwrap_or(-1);
        if !status.is_success() || code != 0 {
            let message = body
                .get("msg")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let code = if code != 0 { code } else { status.as_u16() as i64 };
            return Err(RemoteError::new(code, message));
        }
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn fetch_profile(&self, token: &str) -> Result<Value, RemoteError> {
        self.call(reqwest::Method::GET, "/user/profile", token).await
    }

    async fn claim_reward(&self, token: &str) -> Result<Value, RemoteError> {
        self.call(reqwest::Method::POST, "/reward/claim", token).await
    }

    async fn claim_bonus(&self, token: &str) -> Result<Value, RemoteError> {
        self.call(reqwest::Method::POST, "/bonus/claim", token).await
    }

    async fn fetch_status(&self, token: &str) -> Result<Value, RemoteError> {
        self.call(reqwest::Method::GET, "/user/status", token).await
    }
}
