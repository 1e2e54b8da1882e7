//! # Autorelay Gateway
//!
//! The HTTP surface: management endpoints for credentials and jobs, plus
//! the dynamic dispatcher that normalizes inbound requests and routes them
//! to registered proxy-handler modules.

pub mod context;
pub mod dispatch;
pub mod downstream;
pub mod handlers;
pub mod routes;
pub mod server;

pub use context::RequestContext;
pub use dispatch::{HandlerError, ModuleResponse, RouteHandler, RouteModule, RouteTable};
pub use downstream::Downstream;
pub use server::{AppState, build_router, start};
