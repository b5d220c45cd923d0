use axum::{
    routing::{get, post},
    Router,
};

use keystone_auth::{PermissionRegistry, permissions::builtin};

use crate::authz::gated;

pub mod groups;
pub mod menus;
pub mod principals;
pub mod roles;
pub mod system;

/// Router for all authenticated endpoints.
///
/// Assembling it declares every gated permission code into `registry`.
pub fn router(registry: &PermissionRegistry) -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/explain", get(system::explain))
        .route("/auth/refresh", post(system::refresh_token))
        .route("/menus/me", get(menus::my_menus))
        .route(
            "/permissions",
            gated(registry, builtin::SYSTEM_READ, get(system::list_permissions)),
        )
        .nest(
            "/admin",
            Router::new()
                .merge(roles::router(registry))
                .merge(principals::router(registry))
                .merge(groups::router(registry))
                .merge(menus::router(registry)),
        )
}
