//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: in-memory stores and the authorization services over them
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use keystone_auth::{PermissionRegistry, permissions::builtin};
use keystone_core::DomainError;

use crate::config::ApiConfig;
use crate::jwt::Hs256JwtValidator;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Route gates declare their permission codes while the router is assembled;
/// the registry is frozen once assembly is done, before any role write.
pub fn build_app(config: &ApiConfig) -> Result<Router, DomainError> {
    let registry = Arc::new(PermissionRegistry::new());
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt: jwt.clone() };

    let services = Arc::new(services::build_services(config, registry.clone(), jwt)?);

    // Protected routes: require a valid bearer token.
    let protected = declare_and_freeze(&registry)?
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .route("/menus/public", get(routes::menus::public_menus))
        .layer(Extension(services))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id_middleware)),
        ))
}

/// Assemble the gated routes, declare the built-in codes the seeded system
/// roles hold, and freeze `registry`.
pub fn declare_and_freeze(registry: &PermissionRegistry) -> Result<Router, DomainError> {
    let protected = routes::router(registry);
    registry.register_all(builtin::ALL.iter().copied());
    registry.freeze_and_validate()?;
    Ok(protected)
}
