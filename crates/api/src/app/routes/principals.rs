use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, put},
    Json, Router,
};

use keystone_auth::permissions::builtin::{USER_READ, USER_WRITE};
use keystone_auth::{PermissionRegistry, PrincipalAccount};
use keystone_core::{DomainError, PrincipalId};

use crate::app::{dto, errors, services::AppServices};
use crate::authz::gated;

pub fn router(registry: &PermissionRegistry) -> Router {
    Router::new()
        .route("/principals", gated(registry, USER_READ, get(list_principals)))
        .route("/principals/:id", gated(registry, USER_WRITE, put(upsert_principal)))
        .route(
            "/principals/:id/effective",
            gated(registry, USER_READ, get(effective_permissions)),
        )
}

pub async fn list_principals(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond(services.directory.list())
}

pub async fn upsert_principal(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<PrincipalId>,
    Json(body): Json<dto::UpsertPrincipalRequest>,
) -> axum::response::Response {
    let username = body.username.trim();
    if username.is_empty() {
        return errors::domain_error_to_response(DomainError::validation("username is required"));
    }

    let account = PrincipalAccount {
        id,
        username: username.to_string(),
        status: body.status,
    };
    tracing::info!(principal_id = %id, status = %account.status, "principal upserted");
    errors::respond(services.directory.upsert(account.clone()).map(|()| account))
}

/// GET /admin/principals/:id/effective - grants a fresh token would carry
pub async fn effective_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<PrincipalId>,
) -> axum::response::Response {
    errors::respond(services.resolver.effective_permissions(id))
}
