use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::Utc;

use keystone_auth::permissions::builtin::{GROUP_READ, GROUP_WRITE, GROUP_DELETE};
use keystone_auth::PermissionRegistry;
use keystone_core::{GroupId, PrincipalId, RoleId};
use keystone_groups::{GroupChanges, NewGroup};

use crate::app::{dto, errors, services::AppServices};
use crate::authz::gated;

pub fn router(registry: &PermissionRegistry) -> Router {
    Router::new()
        .route(
            "/groups",
            gated(registry, GROUP_READ, get(group_tree))
                .merge(gated(registry, GROUP_WRITE, post(create_group))),
        )
        .route(
            "/groups/:id",
            gated(registry, GROUP_READ, get(get_group))
                .merge(gated(registry, GROUP_WRITE, patch(update_group)))
                .merge(gated(registry, GROUP_DELETE, delete(delete_group))),
        )
        .route("/groups/:id/parent", gated(registry, GROUP_WRITE, put(set_parent)))
        .route("/groups/:id/ancestors", gated(registry, GROUP_READ, get(ancestors)))
        .route("/groups/:id/descendants", gated(registry, GROUP_READ, get(descendants)))
        .route(
            "/groups/:id/members",
            gated(registry, GROUP_READ, get(members))
                .merge(gated(registry, GROUP_WRITE, post(batch_add_members))),
        )
        .route(
            "/groups/:id/members/:principal_id",
            gated(registry, GROUP_WRITE, put(add_member))
                .merge(gated(registry, GROUP_WRITE, delete(remove_member))),
        )
        .route("/groups/:id/roles", gated(registry, GROUP_READ, get(default_roles)))
        .route(
            "/groups/:id/roles/:role_id",
            gated(registry, GROUP_WRITE, put(add_default_role))
                .merge(gated(registry, GROUP_WRITE, delete(remove_default_role))),
        )
        .route("/group-roots", gated(registry, GROUP_READ, get(roots)))
        .route("/group-levels", gated(registry, GROUP_READ, get(statistics)))
        .route("/group-levels/:level", gated(registry, GROUP_READ, get(at_level)))
        .route("/group-names/available", gated(registry, GROUP_READ, get(name_available)))
}

pub async fn group_tree(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond(services.groups.tree())
}

pub async fn create_group(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewGroup>,
) -> axum::response::Response {
    match services.groups.create(body, Utc::now()) {
        Ok(group) => (StatusCode::CREATED, Json(group)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
) -> axum::response::Response {
    errors::respond(services.groups.get(id))
}

pub async fn update_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
    Json(body): Json<GroupChanges>,
) -> axum::response::Response {
    errors::respond(services.groups.update(id, body, Utc::now()))
}

pub async fn delete_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
) -> axum::response::Response {
    match services.groups.delete(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn set_parent(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
    Json(body): Json<dto::SetParentRequest>,
) -> axum::response::Response {
    errors::respond(services.groups.set_parent(id, body.parent_id, Utc::now()))
}

pub async fn ancestors(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
) -> axum::response::Response {
    errors::respond(services.groups.ancestors(id))
}

pub async fn descendants(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
) -> axum::response::Response {
    errors::respond(services.groups.descendants(id))
}

pub async fn members(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
) -> axum::response::Response {
    errors::respond(services.groups.members(id))
}

pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path((group, principal)): Path<(GroupId, PrincipalId)>,
) -> axum::response::Response {
    match services.groups.add_member(group, principal) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path((group, principal)): Path<(GroupId, PrincipalId)>,
) -> axum::response::Response {
    match services.groups.remove_member(group, principal) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn batch_add_members(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
    Json(body): Json<dto::PrincipalIdsRequest>,
) -> axum::response::Response {
    errors::respond(services.groups.batch_add_members(id, &body.principal_ids))
}

pub async fn default_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<GroupId>,
) -> axum::response::Response {
    errors::respond(
        services
            .groups
            .default_roles(id)
            .and_then(|ids| services.roles.get_many(&ids)),
    )
}

pub async fn add_default_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path((group, role)): Path<(GroupId, RoleId)>,
) -> axum::response::Response {
    let bound = services
        .roles
        .get(role)
        .and_then(|role| services.groups.add_default_role(group, &role));
    match bound {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn remove_default_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path((group, role)): Path<(GroupId, RoleId)>,
) -> axum::response::Response {
    match services.groups.remove_default_role(group, role) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn roots(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond(services.groups.roots())
}

pub async fn statistics(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond(services.groups.statistics())
}

pub async fn at_level(
    Extension(services): Extension<Arc<AppServices>>,
    Path(level): Path<u32>,
) -> axum::response::Response {
    errors::respond(services.groups.at_level(level))
}

pub async fn name_available(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::NameAvailableQuery>,
) -> axum::response::Response {
    let name = query.name.trim().to_string();
    errors::respond(
        services
            .groups
            .name_unique_at_sibling(&name, query.parent_id, query.except)
            .map(|available| dto::NameAvailableResponse {
                name: name.clone(),
                available,
            }),
    )
}
