//! Route dispatcher — the immutable route table and response mapping.
//!
//! Handler modules are registered explicitly at startup. A module's route
//! path derives from its name (underscores become path separators) unless
//! an override mapping supplies an explicit path. When two modules derive
//! the same path, the later registration wins — an explicit tie-break rule,
//! not an accident of iteration order.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use autorelay_core::envelope;

use crate::context::RequestContext;
use crate::downstream::Downstream;

/// What a handler returns on success.
#[derive(Debug, Clone)]
pub struct ModuleResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    /// `name=value` strings; transport-dependent attributes are appended
    /// by the dispatcher, not the handler.
    pub cookies: Vec<String>,
}

impl ModuleResponse {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
            cookies: Vec::new(),
        }
    }
}

/// What a handler returns on failure. An absent body is the canonical
/// "route recognized but resource not found" signal and maps to the 404
/// envelope; a present body is forwarded verbatim (upstream failure).
#[derive(Debug)]
pub struct HandlerError {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HandlerError {
    /// Empty-body failure: responds with the fixed 404 envelope.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Forward an upstream failure's status and body unchanged.
    pub fn upstream(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Some(body),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(_) => write!(f, "handler failed with status {}", self.status),
            None => write!(f, "handler signalled not found"),
        }
    }
}

impl std::error::Error for HandlerError {}

/// One route's business logic. Implementations proxy to the remote API via
/// the injected [`Downstream`] capability.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: RequestContext,
        api: Downstream,
    ) -> Result<ModuleResponse, HandlerError>;
}

/// A named handler module awaiting registration.
pub struct RouteModule {
    pub name: String,
    pub handler: Arc<dyn RouteHandler>,
}

impl RouteModule {
    pub fn new(name: &str, handler: Arc<dyn RouteHandler>) -> Self {
        Self {
            name: name.to_string(),
            handler,
        }
    }
}

/// A resolved route.
#[derive(Clone)]
pub struct RouteEntry {
    pub name: String,
    pub path: String,
    pub handler: Arc<dyn RouteHandler>,
}

/// Immutable route table, resolved once at startup.
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build the table from modules in registration order. Overrides map a
    /// module name to an explicit path; collisions on a derived path are
    /// resolved in favor of the later registration.
    pub fn build(modules: Vec<RouteModule>, overrides: &HashMap<String, String>) -> Self {
        let mut entries: Vec<RouteEntry> = Vec::new();
        let mut by_path: HashMap<String, usize> = HashMap::new();

        for module in modules {
            let path = overrides
                .get(&module.name)
                .cloned()
                .unwrap_or_else(|| derive_path(&module.name));
            let entry = RouteEntry {
                name: module.name,
                path: path.clone(),
                handler: module.handler,
            };
            match by_path.get(&path) {
                Some(&idx) => {
                    tracing::warn!(
                        "route {path} collides: '{}' replaces '{}'",
                        entry.name,
                        entries[idx].name
                    );
                    entries[idx] = entry;
                }
                None => {
                    by_path.insert(path, entries.len());
                    entries.push(entry);
                }
            }
        }
        Self { entries }
    }

    pub fn find(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}

/// Derive a route path from a module name: underscores become separators.
pub fn derive_path(name: &str) -> String {
    format!("/{}", name.replace('_', "/"))
}

/// Map a successful handler result onto an HTTP response. Cookie attributes
/// depend on transport: secure gets `SameSite=None; Secure` for cross-site
/// session continuity, plain transport gets a bare path attribute.
pub fn success_response(resp: ModuleResponse, secure: bool, no_cookie: bool) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::builder()
        .status(status)
        .body(Body::from(resp.body.to_string()))
        .unwrap_or_default();

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    for (name, value) in &resp.headers {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(n, v);
        }
    }
    if !no_cookie {
        for cookie in &resp.cookies {
            let tagged = if secure {
                format!("{cookie}; SameSite=None; Secure")
            } else {
                format!("{cookie}; Path=/")
            };
            if let Ok(v) = HeaderValue::from_str(&tagged) {
                headers.append(header::SET_COOKIE, v);
            }
        }
    }
    response
}

/// Map a handler failure onto an HTTP response: no body means the fixed 404
/// envelope; otherwise the error's own status/headers/body pass through.
pub fn failure_response(err: HandlerError) -> Response {
    let (status, body) = match err.body {
        None => (StatusCode::NOT_FOUND, envelope::not_found()),
        Some(body) => (
            StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        ),
    };
    let mut response = Response::builder()
        .status(status)
        .body(Body::from(body.to_string()))
        .unwrap_or_default();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    for (name, value) in &err.headers {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(n, v);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NullHandler;

    #[async_trait]
    impl RouteHandler for NullHandler {
        async fn handle(
            &self,
            _ctx: RequestContext,
            _api: Downstream,
        ) -> Result<ModuleResponse, HandlerError> {
            Ok(ModuleResponse::json(Value::Null))
        }
    }

    fn module(name: &str) -> RouteModule {
        RouteModule::new(name, Arc::new(NullHandler))
    }

    #[test]
    fn path_derivation() {
        assert_eq!(derive_path("user_profile"), "/user/profile");
        assert_eq!(derive_path("health"), "/health");
    }

    #[test]
    fn overrides_beat_derivation() {
        let overrides = HashMap::from([("legacy".to_string(), "/v1/legacy/info".to_string())]);
        let table = RouteTable::build(vec![module("legacy"), module("user_profile")], &overrides);
        assert!(table.find("/v1/legacy/info").is_some());
        assert!(table.find("/legacy").is_none());
        assert!(table.find("/user/profile").is_some());
    }

    #[test]
    fn later_registration_wins_collision() {
        // Same derived path from two module names: the later one is kept.
        let overrides = HashMap::from([("second".to_string(), "/user/profile".to_string())]);
        let table = RouteTable::build(vec![module("user_profile"), module("second")], &overrides);
        let entry = table.find("/user/profile").unwrap();
        assert_eq!(entry.name, "second");
        assert_eq!(table.entries().len(), 1);
    }

    #[tokio::test]
    async fn cookie_attributes_by_transport() {
        let resp = ModuleResponse {
            status: 200,
            headers: Vec::new(),
            body: json!({"ok": true}),
            cookies: vec!["sid=abc".to_string()],
        };
        let plain = success_response(resp.clone(), false, false);
        assert_eq!(
            plain.headers().get(header::SET_COOKIE).unwrap(),
            "sid=abc; Path=/"
        );

        let secure = success_response(resp.clone(), true, false);
        assert_eq!(
            secure.headers().get(header::SET_COOKIE).unwrap(),
            "sid=abc; SameSite=None; Secure"
        );

        let opted_out = success_response(resp, false, true);
        assert!(opted_out.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn empty_body_failure_is_404_envelope() {
        let response = failure_response(HandlerError::not_found());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, envelope::not_found());
    }

    #[tokio::test]
    async fn upstream_failure_passes_through() {
        let response = failure_response(HandlerError::upstream(503, json!({"code": 503})));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], 503);
    }
}
