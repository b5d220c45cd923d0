//! Integration tests for the authorization core over the in-memory stores.
//!
//! Tests: RoleAdmin → RoleStore → PermissionResolver → Principal → menus
//!
//! Verifies:
//! - Governance rejects malformed, undeclared and pre-freeze permission codes
//! - Effective permissions follow role status, soft deletion and account status
//! - Group moves keep the materialized paths consistent
//! - Menu visibility follows the resolved principal

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use keystone_auth::{
        AuthClaims, GovernanceMode, NewRole, PermissionCheck, PermissionRegistry,
        PermissionResolver, PrincipalAccount, PrincipalStatus, RoleAdmin, RoleChanges,
        RoleRepository, RoleStatus, SYSTEM_ADMIN_ROLE, explain_authorization, validate_claims,
    };
    use keystone_core::{DomainError, GroupId, PrincipalId};
    use keystone_groups::{HierarchyStore, NewGroup};
    use keystone_menus::{MenuCatalog, MenuKind, NewMenuItem};

    use crate::store::{
        InMemoryGroupStore, InMemoryMenuStore, InMemoryPrincipalDirectory, InMemoryRoleStore,
    };

    struct Harness {
        roles: Arc<InMemoryRoleStore>,
        directory: Arc<InMemoryPrincipalDirectory>,
        registry: Arc<PermissionRegistry>,
        admin: RoleAdmin<Arc<InMemoryRoleStore>, Arc<InMemoryPrincipalDirectory>>,
        resolver: PermissionResolver<Arc<InMemoryPrincipalDirectory>, Arc<InMemoryRoleStore>>,
    }

    const ALICE: PrincipalId = PrincipalId::new(1);
    const BOB: PrincipalId = PrincipalId::new(2);

    fn harness(mode: GovernanceMode, declared: &[&str]) -> Harness {
        let roles = Arc::new(InMemoryRoleStore::with_system_roles(Utc::now()).unwrap());
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        directory.upsert(PrincipalAccount::new(ALICE, "alice")).unwrap();
        directory.upsert(PrincipalAccount::new(BOB, "bob")).unwrap();

        let registry = Arc::new(PermissionRegistry::new());
        registry.register_all(declared.iter().copied());

        Harness {
            admin: RoleAdmin::new(roles.clone(), directory.clone(), registry.clone(), mode),
            resolver: PermissionResolver::new(directory.clone(), roles.clone()),
            roles,
            directory,
            registry,
        }
    }

    fn new_role(name: &str, perms: &[&str]) -> NewRole {
        NewRole {
            name: name.to_string(),
            description: String::new(),
            permissions: perms.iter().map(|p| p.to_string()).collect(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Governance
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn malformed_code_is_validation_even_before_freeze() {
        let h = harness(GovernanceMode::Strict, &[]);
        let err = h.admin.create(new_role("r", &["not-a-code"]), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_registry_is_internal() {
        let h = harness(GovernanceMode::Strict, &[]);
        let err = h.admin.create(new_role("r", &["report:read"]), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
        assert!(!h.registry.is_frozen());
    }

    #[test]
    fn undeclared_code_is_forbidden_under_strict_mode() {
        let h = harness(GovernanceMode::Strict, &["report:read"]);
        let err = h
            .admin
            .create(new_role("r", &["report:read", "report:delete"]), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert!(h.admin.create(new_role("r", &["report:read"]), Utc::now()).is_ok());
        assert!(h.registry.is_frozen());
    }

    #[test]
    fn syntax_mode_accepts_undeclared_codes() {
        let h = harness(GovernanceMode::Syntax, &["menu:read"]);
        assert!(h.admin.create(new_role("r", &["report:delete"]), Utc::now()).is_ok());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Role lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn system_roles_are_protected() {
        let h = harness(GovernanceMode::Strict, &["report:read"]);
        let admin_role = h.roles.find_by_name(SYSTEM_ADMIN_ROLE).unwrap().unwrap();
        let now = Utc::now();

        let changes = RoleChanges {
            description: Some("tampered".into()),
            ..RoleChanges::default()
        };
        assert!(matches!(h.admin.update(admin_role.id, changes, now), Err(DomainError::Forbidden(_))));
        assert!(matches!(h.admin.delete(admin_role.id, now), Err(DomainError::Forbidden(_))));
        assert!(matches!(h.admin.deactivate(admin_role.id, now), Err(DomainError::Forbidden(_))));
        assert!(matches!(h.admin.purge(admin_role.id), Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn role_names_and_permissions_are_checked() {
        let h = harness(GovernanceMode::Strict, &["report:read"]);
        let now = Utc::now();
        assert!(matches!(
            h.admin.create(new_role("empty", &[]), now),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            h.admin.create(new_role(&"n".repeat(51), &["report:read"]), now),
            Err(DomainError::Validation(_))
        ));
        h.admin.create(new_role("auditor", &["report:read"]), now).unwrap();
        assert!(matches!(
            h.admin.create(new_role("auditor", &["report:read"]), now),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn role_in_use_cannot_be_deleted() {
        let h = harness(GovernanceMode::Strict, &["report:read"]);
        let now = Utc::now();
        let role = h.admin.create(new_role("auditor", &["report:read"]), now).unwrap();
        h.admin.assign(ALICE, role.id).unwrap();

        assert!(matches!(h.admin.delete(role.id, now), Err(DomainError::Validation(_))));
        h.admin.revoke(ALICE, role.id).unwrap();
        h.admin.delete(role.id, now).unwrap();
        assert!(matches!(h.admin.get(role.id), Err(DomainError::NotFound(_))));
        // The name stays reserved until purge.
        assert!(h.admin.create(new_role("auditor", &["report:read"]), now).is_err());
        h.admin.purge(role.id).unwrap();
        assert!(h.admin.create(new_role("auditor", &["report:read"]), now).is_ok());
    }

    #[test]
    fn only_active_roles_are_assignable() {
        let h = harness(GovernanceMode::Strict, &["report:read"]);
        let now = Utc::now();
        let role = h.admin.create(new_role("auditor", &["report:read"]), now).unwrap();
        h.admin.deactivate(role.id, now).unwrap();
        assert!(matches!(h.admin.assign(ALICE, role.id), Err(DomainError::Validation(_))));
        assert!(matches!(
            h.admin.assign(PrincipalId::new(99), role.id),
            Err(DomainError::NotFound(_))
        ));
        h.admin.activate(role.id, now).unwrap();
        h.admin.assign(ALICE, role.id).unwrap();
    }

    #[test]
    fn clone_copies_permissions_under_new_name() {
        let h = harness(GovernanceMode::Strict, &["report:read", "report:export"]);
        let now = Utc::now();
        let role = h
            .admin
            .create(
                NewRole {
                    description: "Reads reports".into(),
                    ..new_role("auditor", &["report:read", "report:export"])
                },
                now,
            )
            .unwrap();
        let copy = h.admin.clone_role(role.id, "auditor_eu", now).unwrap();
        assert_ne!(copy.id, role.id);
        assert_eq!(copy.permissions, role.permissions);
        assert!(copy.description.starts_with("Reads reports"));
    }

    #[test]
    fn last_permission_cannot_be_removed() {
        let h = harness(GovernanceMode::Strict, &["report:read", "report:export"]);
        let now = Utc::now();
        let role = h.admin.create(new_role("auditor", &["report:read"]), now).unwrap();
        let role = h.admin.add_permission(role.id, "report:export", now).unwrap();
        assert_eq!(role.permissions.len(), 2);
        h.admin.remove_permission(role.id, "report:read", now).unwrap();
        assert!(matches!(
            h.admin.remove_permission(role.id, "report:export", now),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            h.admin.add_permission(role.id, "report:purge", now),
            Err(DomainError::Forbidden(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn deactivating_a_role_removes_its_codes() {
        let h = harness(GovernanceMode::Strict, &["doc:read", "doc:write"]);
        let now = Utc::now();
        let r = h.admin.create(new_role("reader", &["doc:read"]), now).unwrap();
        let s = h.admin.create(new_role("writer", &["doc:write"]), now).unwrap();
        h.admin.assign(ALICE, r.id).unwrap();
        h.admin.assign(ALICE, s.id).unwrap();

        let before = h.resolver.effective_permissions(ALICE).unwrap();
        assert_eq!(before.permissions, vec!["doc:read", "doc:write"]);

        h.admin.deactivate(s.id, now).unwrap();
        let after = h.resolver.effective_permissions(ALICE).unwrap();
        assert_eq!(after.permissions, vec!["doc:read"]);
        assert_eq!(after.roles, vec!["reader"]);
        assert!(!h.admin.check_permission(ALICE, "doc:write").unwrap());
    }

    #[test]
    fn locked_principal_cannot_be_resolved() {
        let h = harness(GovernanceMode::Strict, &["doc:read"]);
        h.directory.set_status(BOB, PrincipalStatus::Locked).unwrap();
        assert!(matches!(h.resolver.effective_permissions(BOB), Err(DomainError::Forbidden(_))));
        assert!(matches!(
            h.admin.check_permission(BOB, "doc:read"),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            h.admin.check_permission(PrincipalId::new(404), "doc:read"),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn system_admin_passes_every_check() {
        let h = harness(GovernanceMode::Strict, &["doc:read"]);
        let admin_role = h.roles.find_by_name(SYSTEM_ADMIN_ROLE).unwrap().unwrap();
        h.admin.assign(BOB, admin_role.id).unwrap();

        let bob = h.resolver.snapshot(BOB).unwrap();
        assert!(bob.has_permission("anything:whatsoever"));
        assert!(h.admin.check_permission(BOB, "doc:purge").unwrap());
    }

    #[test]
    fn claims_carry_a_snapshot() {
        let h = harness(GovernanceMode::Strict, &["doc:read"]);
        let now = Utc::now();
        let r = h.admin.create(new_role("reader", &["doc:read"]), now).unwrap();
        h.admin.assign(ALICE, r.id).unwrap();

        let principal = h.resolver.snapshot(ALICE).unwrap();
        let claims = AuthClaims::issue(&principal, now, Duration::minutes(10)).unwrap();
        assert_eq!(validate_claims(&claims, now), Ok(()));

        // Later role changes do not reach an already issued token.
        h.admin.revoke(ALICE, r.id).unwrap();
        assert!(claims.clone().into_principal().has_permission("doc:read"));
        assert!(!h.resolver.snapshot(ALICE).unwrap().has_permission("doc:read"));
    }

    #[test]
    fn explanation_names_granting_roles_from_the_store() {
        let h = harness(GovernanceMode::Strict, &["doc:read", "doc:write"]);
        let now = Utc::now();
        h.admin.create(new_role("writer", &["doc:write"]), now).unwrap();
        let alice = h.resolver.snapshot(ALICE).unwrap();

        let explanation = explain_authorization(&alice, "doc:write", &h.admin.list().unwrap());
        assert!(!explanation.granted);
        let denial = explanation.denial_reason.unwrap();
        assert!(denial.suggestions[0].contains("writer"));
    }

    #[test]
    fn role_catalogue_queries() {
        let h = harness(GovernanceMode::Strict, &["doc:read", "doc:write"]);
        let now = Utc::now();
        let mut reader = new_role("reader", &["doc:read"]);
        reader.description = "Reads documents".into();
        h.admin.create(reader, now).unwrap();
        let writer = h.admin.create(new_role("writer", &["doc:write"]), now).unwrap();
        h.admin.deactivate(writer.id, now).unwrap();
        let temp = h.admin.create(new_role("temp", &["doc:read"]), now).unwrap();
        h.admin.delete(temp.id, now).unwrap();

        let stats = h.admin.statistics().unwrap();
        assert_eq!(stats.total_roles, 4);
        assert_eq!(stats.active_roles, 3);
        assert_eq!(stats.system_roles, 2);
        assert_eq!(stats.deleted_roles, 1);
        assert_eq!(stats.roles_by_status[&RoleStatus::Inactive], 1);

        let names = |roles: Vec<keystone_auth::Role>| roles.into_iter().map(|r| r.name).collect::<Vec<_>>();
        assert_eq!(names(h.admin.active_roles().unwrap()), vec!["reader", SYSTEM_ADMIN_ROLE, "user"]);
        assert_eq!(names(h.admin.search("DOCUMENTS", 0).unwrap()), vec!["reader"]);
        assert_eq!(names(h.admin.search("  user ", 0).unwrap()), vec!["user"]);
        assert_eq!(names(h.admin.search("", 2).unwrap()), vec!["reader", SYSTEM_ADMIN_ROLE]);
        assert!(h.admin.search("temp", 0).unwrap().is_empty());
    }

    #[test]
    fn batch_assign_reports_each_principal() {
        let h = harness(GovernanceMode::Strict, &["doc:read"]);
        let now = Utc::now();
        let reader = h.admin.create(new_role("reader", &["doc:read"]), now).unwrap();

        let outcome = h
            .admin
            .batch_assign(reader.id, &[ALICE, PrincipalId::new(404), BOB])
            .unwrap();
        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.failures[0].id, PrincipalId::new(404));
        assert_eq!(outcome.failures[0].error, "not_found");
        assert!(h.resolver.snapshot(BOB).unwrap().has_permission("doc:read"));

        h.admin.deactivate(reader.id, now).unwrap();
        assert!(matches!(
            h.admin.batch_assign(reader.id, &[ALICE]),
            Err(DomainError::Validation(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hierarchy
    // ─────────────────────────────────────────────────────────────────────────

    fn group(store: &HierarchyStore<Arc<InMemoryGroupStore>, Arc<InMemoryPrincipalDirectory>>, name: &str, parent: Option<GroupId>) -> GroupId {
        store
            .create(
                NewGroup {
                    name: name.into(),
                    description: String::new(),
                    parent_id: parent,
                },
                Utc::now(),
            )
            .unwrap()
            .id
    }

    #[test]
    fn groups_keep_paths_consistent_across_moves() {
        let h = harness(GovernanceMode::Strict, &["doc:read"]);
        let groups = Arc::new(InMemoryGroupStore::new());
        let store = HierarchyStore::new(groups.clone(), h.directory.clone());

        let hq = group(&store, "hq", None);
        let eu = group(&store, "eu", Some(hq));
        let de = group(&store, "de", Some(eu));
        let us = group(&store, "us", Some(hq));

        store.set_parent(eu, Some(us), Utc::now()).unwrap();
        for g in [hq, eu, de, us] {
            let g = store.get(g).unwrap();
            let expected_path = match g.parent_id {
                None => format!("/{}", g.id),
                Some(p) => format!("{}/{}", store.get(p).unwrap().path, g.id),
            };
            assert_eq!(g.path, expected_path);
            assert_eq!(g.level as usize, g.path_ids().len());
        }

        let chain: Vec<GroupId> = store.ancestors(de).unwrap().iter().map(|g| g.id).collect();
        assert_eq!(chain, vec![hq, us, eu]);

        store.add_member(de, ALICE).unwrap();
        assert!(matches!(store.add_member(de, PrincipalId::new(77)), Err(DomainError::NotFound(_))));
        assert_eq!(store.members(de).unwrap(), vec![ALICE]);
    }

    #[test]
    fn group_default_roles_follow_role_lifecycle() {
        let h = harness(GovernanceMode::Strict, &["doc:read"]);
        let now = Utc::now();
        let store = HierarchyStore::new(Arc::new(InMemoryGroupStore::new()), h.directory.clone());
        let ops = group(&store, "ops", None);
        let reader = h.admin.create(new_role("reader", &["doc:read"]), now).unwrap();

        store.add_default_role(ops, &h.admin.get(reader.id).unwrap()).unwrap();
        let bound = h.admin.get_many(&store.default_roles(ops).unwrap()).unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].name, "reader");

        // Bindings grant nothing on their own.
        store.add_member(ops, ALICE).unwrap();
        assert!(!h.resolver.snapshot(ALICE).unwrap().has_permission("doc:read"));

        h.admin.delete(reader.id, now).unwrap();
        assert!(h.admin.get_many(&store.default_roles(ops).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn imported_loop_does_not_hang_reads() {
        let h = harness(GovernanceMode::Strict, &["doc:read"]);
        let groups = Arc::new(InMemoryGroupStore::new());
        let store = HierarchyStore::new(groups.clone(), h.directory.clone());

        let a = group(&store, "a", None);
        let b = group(&store, "b", Some(a));
        let mut a_row = store.get(a).unwrap();
        a_row.parent_id = Some(b);
        groups.import(a_row).unwrap();

        assert_eq!(store.ancestors(b).unwrap().len(), 1);
        assert_eq!(store.descendants(a).unwrap().len(), 1);
        assert!(store.tree().unwrap().is_empty());
        assert_eq!(store.statistics().unwrap().total_groups, 2);
        assert!(matches!(store.set_parent(a, Some(b), Utc::now()), Err(DomainError::Validation(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Menus
    // ─────────────────────────────────────────────────────────────────────────

    fn menu(code: &str, parent: Option<keystone_core::MenuItemId>, any_of: &[&str], all_of: &[&str]) -> NewMenuItem {
        NewMenuItem {
            code: code.into(),
            parent_id: parent,
            title: code.to_uppercase(),
            path: String::new(),
            icon: String::new(),
            kind: MenuKind::Page,
            order: 0,
            route: format!("/{code}"),
            component: String::new(),
            hidden: false,
            disabled: false,
            published: true,
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
            all_of: all_of.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn menu_tree_follows_resolved_permissions() {
        let h = harness(GovernanceMode::Strict, &["doc:read", "doc:write", "x:admin"]);
        let now = Utc::now();
        let r = h.admin.create(new_role("reader", &["doc:read"]), now).unwrap();
        h.admin.assign(ALICE, r.id).unwrap();
        let alice = h.resolver.snapshot(ALICE).unwrap();

        let catalog = MenuCatalog::new(Arc::new(InMemoryMenuStore::new()));
        let admin = catalog.create(menu("admin", None, &[], &["x:admin"]), now).unwrap();
        let docs = catalog
            .create(menu("docs", Some(admin.id), &["doc:read", "doc:write"], &[]), now)
            .unwrap();
        catalog.create(menu("settings", Some(admin.id), &[], &["x:admin"]), now).unwrap();

        let tree = catalog.my_tree(Some(&alice)).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, admin.id);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].id, docs.id);

        assert!(catalog.my_tree(None).unwrap().is_empty());

        catalog.publish(docs.id, false, now).unwrap();
        assert!(catalog.my_tree(Some(&alice)).unwrap().is_empty());
    }
}
