use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use keystone_auth::{AuthClaims, explain_authorization};

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<PrincipalContext>) -> Json<dto::WhoAmIResponse> {
    let principal = ctx.principal();
    Json(dto::WhoAmIResponse {
        principal_id: principal.id(),
        roles: principal.roles().to_vec(),
        permissions: principal.permissions().to_vec(),
        is_system_admin: principal.is_system_admin(),
        expires_at: ctx.expires_at(),
    })
}

/// GET /explain?permission=... - why the caller's token does or does not grant a code
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Query(query): Query<dto::ExplainQuery>,
) -> axum::response::Response {
    let roles = match services.roles.list() {
        Ok(roles) => roles,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let explanation = explain_authorization(ctx.principal(), query.permission.trim(), &roles);
    errors::respond(Ok(explanation))
}

/// POST /auth/refresh - re-resolve the caller's grants and issue a new token
pub async fn refresh_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> axum::response::Response {
    let principal = match services.resolver.snapshot(ctx.principal_id()) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let issued = AuthClaims::issue(&principal, Utc::now(), services.token_ttl)
        .and_then(|claims| services.jwt.issue(&claims).map(|token| (token, claims)));
    match issued {
        Ok((token, claims)) => {
            tracing::info!(principal_id = %principal.id(), "token refreshed");
            errors::respond(Ok(dto::TokenResponse::new(token, claims)))
        }
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "token_error",
            e.to_string(),
        ),
    }
}

/// GET /permissions - the declared permission catalogue
pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
) -> Json<dto::PermissionCatalogResponse> {
    let permissions = services
        .registry
        .redacted_declarations()
        .into_iter()
        .map(|(code, declared_at)| dto::PermissionEntry { code, declared_at })
        .collect();
    Json(dto::PermissionCatalogResponse {
        frozen: services.registry.is_frozen(),
        permissions,
    })
}
