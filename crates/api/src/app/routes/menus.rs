use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::Utc;

use keystone_auth::permissions::builtin::{MENU_READ, MENU_WRITE, MENU_PUBLISH};
use keystone_auth::{PermissionCheck, PermissionRegistry};
use keystone_core::MenuItemId;
use keystone_menus::{MenuChanges, NewMenuItem};

use crate::app::{dto, errors, services::AppServices};
use crate::authz::gated;
use crate::context::PrincipalContext;


pub fn router(registry: &PermissionRegistry) -> Router {
    Router::new()
        .route(
            "/menus",
            gated(registry, MENU_READ, get(list_menus))
                .merge(gated(registry, MENU_WRITE, post(create_menu))),
        )
        .route(
            "/menus/:id",
            gated(registry, MENU_READ, get(get_menu))
                .merge(gated(registry, MENU_WRITE, patch(update_menu)))
                .merge(gated(registry, MENU_WRITE, delete(delete_menu))),
        )
        .route("/menus/:id/publish", gated(registry, MENU_PUBLISH, post(publish_menu)))
        .route("/menus/:id/restore", gated(registry, MENU_WRITE, post(restore_menu)))
        .route("/menus/:id/purge", gated(registry, MENU_WRITE, delete(purge_menu)))
}

/// GET /menus/me - the published tree pruned to the caller's token
pub async fn my_menus(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    let viewer: &dyn PermissionCheck = ctx.principal();
    errors::respond(services.menus.my_tree(Some(viewer)))
}

/// GET /menus/public - items without permission constraints, no token needed
pub async fn public_menus(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond(services.menus.my_tree(None))
}

pub async fn list_menus(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListMenusQuery>,
) -> axum::response::Response {
    errors::respond(services.menus.list(query.include_deleted))
}

pub async fn create_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewMenuItem>,
) -> axum::response::Response {
    match services.menus.create(body, Utc::now()) {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<MenuItemId>,
) -> axum::response::Response {
    errors::respond(services.menus.get(id))
}

pub async fn update_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<MenuItemId>,
    Json(body): Json<MenuChanges>,
) -> axum::response::Response {
    errors::respond(services.menus.update(id, body, Utc::now()))
}

pub async fn delete_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<MenuItemId>,
) -> axum::response::Response {
    match services.menus.delete(id, Utc::now()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn publish_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<MenuItemId>,
    Json(body): Json<dto::PublishRequest>,
) -> axum::response::Response {
    errors::respond(services.menus.publish(id, body.published, Utc::now()))
}

pub async fn restore_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<MenuItemId>,
) -> axum::response::Response {
    errors::respond(services.menus.restore(id, Utc::now()))
}

pub async fn purge_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<MenuItemId>,
) -> axum::response::Response {
    match services.menus.purge(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
