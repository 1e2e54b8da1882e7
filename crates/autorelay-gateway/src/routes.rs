//! Management API route handlers.
//!
//! Every endpoint here answers HTTP 200; failures are `{status: 0}`
//! envelopes. Only the dynamic proxy routes (see `server::dynamic_route`)
//! ever produce a non-2xx status.

use axum::body::Bytes;
use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;

use autorelay_core::envelope;
use autorelay_core::error::AutorelayError;
use autorelay_scheduler::DEFAULT_SCHEDULE;

use crate::server::AppState;

/// Cache key for the login listing endpoint.
pub const GET_LOGINS_CACHE_KEY: &str = "/api/getLogins";

/// Lenient management-body parse: a missing or malformed body becomes an
/// empty object, so field validation answers `{status: 0}` instead of the
/// extractor rejecting with an HTTP-level 4xx.
fn lenient_json(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| json!({}))
}

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "autorelay-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/saveLogin — store a user's session credential.
pub async fn save_login(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let req = lenient_json(&body);
    let user_id = req["userId"].as_str().unwrap_or("");
    let token = req["token"].as_str().unwrap_or("");
    match state.store.save(user_id, token) {
        Ok(()) => Json(envelope::ok("login saved")),
        Err(e) => Json(envelope::fail(&e.to_string())),
    }
}

/// GET /api/getLogins — list stored credentials, served through the cache.
pub async fn get_logins(State(state): State<Arc<AppState>>) -> Json<Value> {
    if let Some(cached) = state.cache.get(GET_LOGINS_CACHE_KEY) {
        return Json(cached);
    }
    let data = serde_json::to_value(state.store.list()).unwrap_or_default();
    let response = envelope::ok_data(data);
    state.cache.put(GET_LOGINS_CACHE_KEY, response.clone());
    Json(response)
}

/// POST /api/deleteLogin — remove one credential. Idempotent.
pub async fn delete_login(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let req = lenient_json(&body);
    let user_id = req["userId"].as_str().unwrap_or("");
    if user_id.trim().is_empty() {
        return Json(envelope::fail("userId is required"));
    }
    state.store.delete(user_id);
    Json(envelope::ok("login deleted"))
}

/// POST /api/clearLogins — remove every credential.
pub async fn clear_logins(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.store.clear_all();
    Json(envelope::ok("logins cleared"))
}

/// GET /api/getCronStatus — live state of every registered job.
pub async fn get_cron_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status: serde_json::Map<String, Value> = state
        .registry
        .status()
        .into_iter()
        .map(|(user, job_state)| (user, Value::String(job_state.to_string())))
        .collect();
    Json(envelope::ok_data(Value::Object(status)))
}

/// POST /api/startAutoCron — start (or restart) a user's scheduled job.
pub async fn start_auto_cron(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let req = lenient_json(&body);
    let user_id = req["userId"].as_str().unwrap_or("");
    if user_id.trim().is_empty() {
        return Json(envelope::fail("userId is required"));
    }
    let schedule = match req["time"].as_str() {
        Some(t) if !t.trim().is_empty() => t,
        _ => DEFAULT_SCHEDULE,
    };
    match state.registry.start(user_id, schedule) {
        Ok(()) => Json(envelope::ok(&format!("job scheduled ({schedule})"))),
        Err(AutorelayError::UserNotLoggedIn(_)) => Json(envelope::fail("用户不存在或未登录")),
        Err(e) => Json(envelope::fail(&e.to_string())),
    }
}

/// POST /api/stopAutoCron — stop a user's scheduled job.
pub async fn stop_auto_cron(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let req = lenient_json(&body);
    let user_id = req["userId"].as_str().unwrap_or("");
    if user_id.trim().is_empty() {
        return Json(envelope::fail("userId is required"));
    }
    match state.registry.stop(user_id) {
        Ok(()) => Json(envelope::ok("job stopped")),
        Err(e) => Json(envelope::fail(&e.to_string())),
    }
}

/// POST /api/clearCache — manual cache invalidation, optionally scoped to
/// keys containing `target`. Reports what was removed.
pub async fn clear_cache(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let req = lenient_json(&body);
    match req["target"].as_str().filter(|t| !t.trim().is_empty()) {
        Some(target) => {
            let keys = state.cache.invalidate_matching(target);
            Json(json!({
                "status": 1,
                "msg": format!("removed {} cache key(s)", keys.len()),
                "keys": keys,
            }))
        }
        None => {
            let cleared = state.cache.clear();
            Json(json!({
                "status": 1,
                "msg": "cache cleared",
                "cleared": cleared,
            }))
        }
    }
}
