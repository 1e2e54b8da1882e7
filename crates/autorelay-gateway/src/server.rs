//! HTTP server implementation using Axum.

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::{any, get, post};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use autorelay_core::config::AutorelayConfig;
use autorelay_core::error::{AutorelayError, Result};
use autorelay_scheduler::{
    BackoffPolicy, HttpRemoteApi, JobRegistry, RemoteApi, WorkflowExecutor,
};
use autorelay_store::{CredentialStore, ResponseCache};

use crate::context::RequestContext;
use crate::dispatch::{self, RouteModule, RouteTable};
use crate::downstream::Downstream;
use crate::handlers;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state for the gateway server.
pub struct AppState {
    pub cache: Arc<ResponseCache>,
    pub store: Arc<CredentialStore>,
    pub registry: Arc<JobRegistry>,
    pub routes: Arc<RouteTable>,
    pub downstream: Downstream,
    pub secure_cookies: bool,
    pub start_time: std::time::Instant,
}

/// Assemble the shared state from config and a module list.
pub fn build_state(
    config: &AutorelayConfig,
    modules: Vec<RouteModule>,
    overrides: &HashMap<String, String>,
) -> Result<Arc<AppState>> {
    let cache = Arc::new(ResponseCache::new());
    let store = Arc::new(CredentialStore::new(cache.clone()));

    let remote: Arc<dyn RemoteApi> = Arc::new(
        HttpRemoteApi::new(&config.remote).map_err(|e| AutorelayError::Http(e.to_string()))?,
    );
    let executor = Arc::new(WorkflowExecutor::new(
        remote,
        BackoffPolicy::new(
            std::time::Duration::from_secs(config.workflow.backoff_min_secs),
            std::time::Duration::from_secs(config.workflow.backoff_max_secs),
        ),
        config.workflow.bonus_attempts,
    ));
    let registry = Arc::new(JobRegistry::new(store.clone(), executor));

    let routes = Arc::new(RouteTable::build(modules, overrides));
    for entry in routes.entries() {
        tracing::info!("route registered: {} -> {}", entry.name, entry.path);
    }

    Ok(Arc::new(AppState {
        cache,
        store,
        registry,
        routes: routes.clone(),
        downstream: Downstream::new(&config.remote)?,
        secure_cookies: config.gateway.secure_cookies,
        start_time: std::time::Instant::now(),
    }))
}

/// Build the Axum router: management API + dynamic proxy routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/saveLogin", post(super::routes::save_login))
        .route("/api/getLogins", get(super::routes::get_logins))
        .route("/api/deleteLogin", post(super::routes::delete_login))
        .route("/api/clearLogins", post(super::routes::clear_logins))
        .route("/api/getCronStatus", get(super::routes::get_cron_status))
        .route("/api/startAutoCron", post(super::routes::start_auto_cron))
        .route("/api/stopAutoCron", post(super::routes::stop_auto_cron))
        .route("/api/clearCache", post(super::routes::clear_cache));

    // Dynamic routes all funnel into the dispatcher; anything unregistered
    // falls through to Axum's own 404.
    for entry in state.routes.entries() {
        router = router.route(&entry.path, any(dynamic_route));
    }

    router
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .max_age(std::time::Duration::from_secs(3600));

            // Restrict CORS origins in production via env var
            // Example: AUTORELAY_CORS_ORIGINS=https://panel.example.com
            if let Ok(origins_str) = std::env::var("AUTORELAY_CORS_ORIGINS") {
                let origins: Vec<_> = origins_str
                    .split(',')
                    .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins)
            } else {
                cors.allow_origin(Any)
            }
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// One handler for every dynamic route: normalize the request, dispatch to
/// the matching module, map its result back onto HTTP.
pub async fn dynamic_route(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let path = req.uri().path().to_string();
    let Some(entry) = state.routes.find(&path) else {
        return dispatch::failure_response(dispatch::HandlerError::not_found());
    };
    let handler = entry.handler.clone();

    let caller_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let query = parse_query(req.uri().query());
    let cookie_header = header_string(&req, header::COOKIE);
    let authorization = header_string(&req, header::AUTHORIZATION);

    let body_value: Option<Value> = match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await
    {
        Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes).ok(),
        _ => None,
    };

    let ctx = RequestContext::build(
        cookie_header.as_deref(),
        &query,
        body_value.as_ref(),
        authorization.as_deref(),
        &caller_ip,
    );
    let no_cookie = ctx.no_cookie;

    tracing::debug!("dispatching {path} for caller {}", ctx.caller_ip);
    match handler.handle(ctx, state.downstream.for_caller(&caller_ip)).await {
        Ok(resp) => dispatch::success_response(resp, state.secure_cookies, no_cookie),
        Err(err) => dispatch::failure_response(err),
    }
}

/// Percent-decoded query parameters. An embedded cookie string arrives as
/// `cookie=sid%3Dabc%3B%20uid%3D42` — it must be decoded here or the
/// context can never re-parse it into pairs.
fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    let Some(raw) = raw else {
        return HashMap::new();
    };
    form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn header_string(req: &Request<Body>, name: header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Start the HTTP server. Blocks until shutdown, then cancels all jobs.
pub async fn start(config: &AutorelayConfig) -> Result<()> {
    let state = build_state(
        config,
        handlers::builtin_modules(),
        &handlers::builtin_overrides(),
    )?;
    let app = build_router(state.clone());

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AutorelayError::Http(format!("bind {addr} failed: {e}")))?;

    tracing::info!("gateway listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AutorelayError::Http(format!("server error: {e}")))?;

    tracing::info!("shutting down, cancelling all jobs");
    state.registry.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
