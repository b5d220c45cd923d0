//! Route-level permission gates.
//!
//! Wiring a gate declares its code into the [`PermissionRegistry`], so every
//! code the router enforces is one a role may reference.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    routing::MethodRouter,
};

use keystone_auth::{PermissionRegistry, require_permission};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Require `code` for every method on `route`.
#[track_caller]
pub fn gated(registry: &PermissionRegistry, code: &'static str, route: MethodRouter) -> MethodRouter {
    registry.register(code);
    route.route_layer(axum::middleware::from_fn_with_state(code, enforce))
}

async fn enforce(State(code): State<&'static str>, req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<PrincipalContext>() else {
        return errors::unauthorized("no authenticated principal");
    };

    if let Err(e) = require_permission(ctx.principal(), code) {
        tracing::info!(
            principal_id = %ctx.principal_id(),
            permission = code,
            "permission denied"
        );
        return errors::domain_error_to_response(e);
    }

    next.run(req).await
}
