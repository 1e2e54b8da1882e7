//! Built-in proxy-handler modules.
//!
//! Each module is one route's remote-API call pattern: authenticate with
//! the caller's reassembled session cookie, proxy the call, hand back
//! whatever the remote answered. Module names derive the route path
//! (`user_profile` -> `/user/profile`).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::dispatch::{HandlerError, ModuleResponse, RouteHandler, RouteModule};
use crate::downstream::Downstream;

/// Proxy the caller's profile lookup.
pub struct UserProfileHandler;

#[async_trait]
impl RouteHandler for UserProfileHandler {
    async fn handle(
        &self,
        ctx: RequestContext,
        api: Downstream,
    ) -> Result<ModuleResponse, HandlerError> {
        let headers = cookie_headers(&ctx)?;
        api.call("GET", "/user/profile", &headers, None).await
    }
}

/// Proxy the caller's account status lookup.
pub struct UserStatusHandler;

#[async_trait]
impl RouteHandler for UserStatusHandler {
    async fn handle(
        &self,
        ctx: RequestContext,
        api: Downstream,
    ) -> Result<ModuleResponse, HandlerError> {
        let headers = cookie_headers(&ctx)?;
        api.call("GET", "/user/status", &headers, None).await
    }
}

fn cookie_headers(ctx: &RequestContext) -> Result<Vec<(String, String)>, HandlerError> {
    // No session cookie from any source: nothing to proxy on behalf of.
    let cookie = ctx.auth_cookie().ok_or_else(HandlerError::not_found)?;
    Ok(vec![("Cookie".to_string(), cookie)])
}

/// The default module set, in registration order.
pub fn builtin_modules() -> Vec<RouteModule> {
    vec![
        RouteModule::new("user_profile", Arc::new(UserProfileHandler)),
        RouteModule::new("user_status", Arc::new(UserStatusHandler)),
    ]
}

/// Explicit path overrides for modules whose derived path is not wanted.
pub fn builtin_overrides() -> HashMap<String, String> {
    HashMap::new()
}
