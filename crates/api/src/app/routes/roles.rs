use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::Utc;

use keystone_auth::permissions::builtin::{ROLE_READ, ROLE_WRITE, ROLE_DELETE};
use keystone_auth::{NewRole, PermissionRegistry, RoleChanges};
use keystone_core::{PrincipalId, RoleId};

use crate::app::{dto, errors, services::AppServices};
use crate::authz::gated;

pub fn router(registry: &PermissionRegistry) -> Router {
    Router::new()
        .route(
            "/roles",
            gated(registry, ROLE_READ, get(list_roles))
                .merge(gated(registry, ROLE_WRITE, post(create_role))),
        )
        .route(
            "/roles/:id",
            gated(registry, ROLE_READ, get(get_role))
                .merge(gated(registry, ROLE_WRITE, patch(update_role)))
                .merge(gated(registry, ROLE_DELETE, delete(delete_role))),
        )
        .route("/roles/:id/purge", gated(registry, ROLE_DELETE, delete(purge_role)))
        .route("/roles/:id/clone", gated(registry, ROLE_WRITE, post(clone_role)))
        .route("/roles/:id/activate", gated(registry, ROLE_WRITE, post(activate_role)))
        .route("/roles/:id/deactivate", gated(registry, ROLE_WRITE, post(deactivate_role)))
        .route("/roles/:id/permissions", gated(registry, ROLE_WRITE, post(add_permission)))
        .route("/roles/:id/assignments", gated(registry, ROLE_WRITE, post(batch_assign)))
        .route("/active-roles", gated(registry, ROLE_READ, get(active_roles)))
        .route("/role-search", gated(registry, ROLE_READ, get(search_roles)))
        .route("/role-statistics", gated(registry, ROLE_READ, get(role_statistics)))
        .route(
            "/roles/:id/permissions/:code",
            gated(registry, ROLE_WRITE, delete(remove_permission)),
        )
        .route("/principals/:id/roles", gated(registry, ROLE_READ, get(roles_of)))
        .route(
            "/principals/:id/roles/:role_id",
            gated(registry, ROLE_WRITE, put(assign_role))
                .merge(gated(registry, ROLE_WRITE, delete(revoke_role))),
        )
        .route(
            "/principals/:id/check/:code",
            gated(registry, ROLE_READ, get(check_permission)),
        )
}

pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond(services.roles.list())
}

pub async fn active_roles(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond(services.roles.active_roles())
}

pub async fn search_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::RoleSearchQuery>,
) -> axum::response::Response {
    errors::respond(services.roles.search(&query.q, query.limit))
}

pub async fn role_statistics(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond(services.roles.statistics())
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewRole>,
) -> axum::response::Response {
    match services.roles.create(body, Utc::now()) {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> axum::response::Response {
    errors::respond(services.roles.get(id))
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
    Json(body): Json<RoleChanges>,
) -> axum::response::Response {
    errors::respond(services.roles.update(id, body, Utc::now()))
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> axum::response::Response {
    match services.roles.delete(id, Utc::now()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn purge_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> axum::response::Response {
    match services.roles.purge(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn clone_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
    Json(body): Json<dto::CloneRoleRequest>,
) -> axum::response::Response {
    match services.roles.clone_role(id, &body.name, Utc::now()) {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn activate_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> axum::response::Response {
    errors::respond(services.roles.activate(id, Utc::now()))
}

pub async fn deactivate_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> axum::response::Response {
    errors::respond(services.roles.deactivate(id, Utc::now()))
}

pub async fn add_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
    Json(body): Json<dto::AddPermissionRequest>,
) -> axum::response::Response {
    errors::respond(services.roles.add_permission(id, &body.code, Utc::now()))
}

pub async fn remove_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, code)): Path<(RoleId, String)>,
) -> axum::response::Response {
    errors::respond(services.roles.remove_permission(id, &code, Utc::now()))
}

pub async fn roles_of(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<PrincipalId>,
) -> axum::response::Response {
    errors::respond(services.roles.roles_of(id))
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path((principal, role)): Path<(PrincipalId, RoleId)>,
) -> axum::response::Response {
    match services.roles.assign(principal, role) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /admin/roles/:id/assignments - assign one role to many principals
pub async fn batch_assign(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
    Json(body): Json<dto::PrincipalIdsRequest>,
) -> axum::response::Response {
    errors::respond(services.roles.batch_assign(id, &body.principal_ids))
}

pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path((principal, role)): Path<(PrincipalId, RoleId)>,
) -> axum::response::Response {
    match services.roles.revoke(principal, role) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /admin/principals/:id/check/:code - evaluate current assignments, not the token
pub async fn check_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path((principal, code)): Path<(PrincipalId, String)>,
) -> axum::response::Response {
    errors::respond(
        services
            .roles
            .check_permission(principal, &code)
            .map(|granted| dto::PermissionCheckResponse {
                principal_id: principal,
                permission: code.clone(),
                granted,
            }),
    )
}
