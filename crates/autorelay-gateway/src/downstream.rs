//! Downstream HTTP capability injected into route handlers.
//!
//! Handlers never build their own client: they get a [`Downstream`] scoped
//! to the calling request, which forwards the caller's IP (mapped-IPv6
//! prefix already stripped) on every proxied call.

use serde_json::Value;

use autorelay_core::config::RemoteConfig;
use autorelay_core::error::{AutorelayError, Result};

use crate::context::strip_mapped_prefix;
use crate::dispatch::{HandlerError, ModuleResponse};

#[derive(Clone)]
pub struct Downstream {
    client: reqwest::Client,
    base_url: String,
    caller_ip: Option<String>,
}

impl Downstream {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AutorelayError::Http(format!("client error: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            caller_ip: None,
        })
    }

    /// Scope this capability to one caller.
    pub fn for_caller(&self, ip: &str) -> Self {
        let mut scoped = self.clone();
        scoped.caller_ip = Some(strip_mapped_prefix(ip).to_string());
        scoped
    }

    /// Perform one proxied call. A transport failure has no upstream body
    /// and maps to the canonical empty-body (not found) error; a non-2xx
    /// upstream response is forwarded with its own status and body.
    pub async fn call(
        &self,
        method: &str,
        path: &str,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> std::result::Result<ModuleResponse, HandlerError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = match method.to_uppercase().as_str() {
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "DELETE" => self.client.delete(&url),
            _ => self.client.get(&url),
        };

        if let Some(ip) = &self.caller_ip {
            request = request.header("X-Forwarded-For", ip);
        }
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("downstream call {method} {url} failed: {e}");
            HandlerError::not_found()
        })?;

        let status = response.status();
        let cookies: Vec<String> = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            // keep the bare name=value; the dispatcher re-tags attributes
            .filter_map(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .collect();

        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            if body.is_null() {
                return Err(HandlerError::not_found());
            }
            return Err(HandlerError::upstream(status.as_u16(), body));
        }

        Ok(ModuleResponse {
            status: status.as_u16(),
            headers: Vec::new(),
            body,
            cookies,
        })
    }
}
