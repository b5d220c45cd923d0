//! `keystone-auth` — permission governance and RBAC resolution.
//!
//! Decoupled from HTTP and storage: persistence is reached through the
//! collaborator traits defined here.

pub mod admin;
pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod registry;
pub mod resolver;
pub mod roles;

pub use admin::{GovernanceMode, NewRole, RoleAdmin, RoleChanges, RoleRepository, RoleStatistics};
pub use authorize::{
    AuthorizationExplanation, explain_authorization, has_permission, require_any_role,
    require_permission,
};
pub use claims::{AuthClaims, JwtValidator, TokenValidationError, validate_claims};
pub use permissions::{Permission, is_valid_permission_code};
pub use principal::{PermissionCheck, Principal, PrincipalAccount, PrincipalDirectory, PrincipalStatus};
pub use registry::PermissionRegistry;
pub use resolver::{
    EffectiveGrants, PermissionResolver, RoleAssignments, effective_grants, resolve_active,
};
pub use roles::{DEFAULT_USER_ROLE, Role, RoleStatus, SYSTEM_ADMIN_ROLE, system_roles};
