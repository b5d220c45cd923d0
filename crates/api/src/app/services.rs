use std::sync::Arc;

use chrono::{Duration, Utc};

use keystone_auth::{
    PermissionRegistry, PermissionResolver, PrincipalAccount, RoleAdmin, RoleRepository,
    SYSTEM_ADMIN_ROLE,
};
use keystone_core::{DomainError, PrincipalId};
use keystone_groups::HierarchyStore;
use keystone_infra::{
    InMemoryGroupStore, InMemoryMenuStore, InMemoryPrincipalDirectory, InMemoryRoleStore,
};
use keystone_menus::MenuCatalog;

use crate::config::ApiConfig;
use crate::jwt::Hs256JwtValidator;

/// Principal seeded with `system_admin` so a fresh process can be administered.
pub const BOOTSTRAP_ADMIN_ID: PrincipalId = PrincipalId::new(1);
pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

type Directory = Arc<InMemoryPrincipalDirectory>;
type Roles = Arc<InMemoryRoleStore>;

pub struct AppServices {
    pub registry: Arc<PermissionRegistry>,
    pub jwt: Arc<Hs256JwtValidator>,
    pub token_ttl: Duration,
    pub directory: Directory,
    pub roles: RoleAdmin<Roles, Directory>,
    pub resolver: PermissionResolver<Directory, Roles>,
    pub groups: HierarchyStore<Arc<InMemoryGroupStore>, Directory>,
    pub menus: MenuCatalog<Arc<InMemoryMenuStore>>,
}

/// Wire in-memory stores and seed the system roles plus the bootstrap admin.
pub fn build_services(
    config: &ApiConfig,
    registry: Arc<PermissionRegistry>,
    jwt: Arc<Hs256JwtValidator>,
) -> Result<AppServices, DomainError> {
    let now = Utc::now();
    let directory = Arc::new(InMemoryPrincipalDirectory::new());
    let role_store = Arc::new(InMemoryRoleStore::with_system_roles(now)?);

    directory.upsert(PrincipalAccount::new(BOOTSTRAP_ADMIN_ID, BOOTSTRAP_ADMIN_USERNAME))?;
    let admin_role = role_store
        .find_by_name(SYSTEM_ADMIN_ROLE)?
        .ok_or_else(|| DomainError::internal("system_admin role was not seeded"))?;
    role_store.assign(BOOTSTRAP_ADMIN_ID, admin_role.id)?;

    let groups = HierarchyStore::new(Arc::new(InMemoryGroupStore::new()), directory.clone())
        .with_max_depth(config.max_group_depth);

    tracing::info!(
        governance = ?config.governance,
        max_group_depth = groups.max_depth(),
        "services wired"
    );

    Ok(AppServices {
        roles: RoleAdmin::new(
            role_store.clone(),
            directory.clone(),
            registry.clone(),
            config.governance,
        ),
        resolver: PermissionResolver::new(directory.clone(), role_store),
        groups,
        menus: MenuCatalog::new(Arc::new(InMemoryMenuStore::new())),
        directory,
        registry,
        jwt,
        token_ttl: config.token_ttl,
    })
}
