//! Permission evaluator tests
//!
//! Role inheritance, wildcard matching in both directions, and failing closed
//! on anything that does not parse as a role.

use proptest::prelude::*;
use shared::permissions::{
    capabilities, capability_matches, caps, has_capability, has_capability_str,
    ADMIN_CAPABILITIES, BASE_CAPABILITIES, MANAGER_CAPABILITIES,
};
use shared::Role;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_team_lead_capabilities() {
        let role = Some(Role::Caposquadra);
        assert!(has_capability(role, caps::DASHBOARD_VIEW));
        assert!(has_capability(role, caps::WAREHOUSE_VIEW));
        assert!(has_capability(role, caps::REQUESTS_CREATE));
        assert!(has_capability(role, caps::REQUESTS_VIEW_OWN));
        assert!(!has_capability(role, caps::MOVEMENTS_VIEW));
        assert!(!has_capability(role, caps::CATEGORIES_MANAGE));
        assert!(!has_capability(role, caps::REPORTS_VIEW));
        assert!(!has_capability(role, caps::AUDIT_VIEW));
    }

    #[test]
    fn test_manager_capabilities() {
        let role = Some(Role::Manager);
        assert!(has_capability(role, caps::REQUESTS_MANAGE));
        assert!(has_capability(role, caps::INVENTORY_MANAGE));
        assert!(has_capability(role, caps::REPORTS_VIEW));
        assert!(has_capability(role, caps::REPORTS_EXPORT));
        assert!(!has_capability(role, caps::AUDIT_VIEW));
        assert!(!has_capability(role, "users.delete"));
    }

    #[test]
    fn test_admin_has_everything_named() {
        let role = Some(Role::Admin);
        for cap in [
            caps::DASHBOARD_VIEW,
            caps::NOTIFICATIONS_VIEW,
            caps::WAREHOUSE_VIEW,
            caps::REQUESTS_CREATE,
            caps::REQUESTS_VIEW_OWN,
            caps::REQUESTS_MANAGE,
            caps::MOVEMENTS_VIEW,
            caps::INVENTORY_MANAGE,
            caps::CATEGORIES_MANAGE,
            caps::REPORTS_VIEW,
            caps::REPORTS_EXPORT,
            caps::AUDIT_VIEW,
        ] {
            assert!(has_capability(role, cap), "admin lacks {}", cap);
        }
    }

    #[test]
    fn test_legacy_role_strings() {
        assert!(has_capability_str(Some("UserRole.MANAGER"), caps::INVENTORY_MANAGE));
        assert!(has_capability_str(Some("role.caposquadra"), caps::REQUESTS_CREATE));
        assert!(!has_capability_str(Some("UserRole."), caps::DASHBOARD_VIEW));
        assert!(!has_capability_str(Some("manager_x"), caps::DASHBOARD_VIEW));
    }

    #[test]
    fn test_role_display_round_trips() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_capability_tables_have_no_overlap() {
        for cap in MANAGER_CAPABILITIES.iter().chain(ADMIN_CAPABILITIES) {
            assert!(!BASE_CAPABILITIES.contains(cap), "{} listed twice", cap);
        }
        for cap in ADMIN_CAPABILITIES {
            assert!(!MANAGER_CAPABILITIES.contains(cap), "{} listed twice", cap);
        }
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Admin),
            Just(Role::Manager),
            Just(Role::Caposquadra),
        ]
    }

    fn capability_strategy() -> impl Strategy<Value = String> {
        "[a-z]{2,10}(\\.[a-z_]{2,10}){0,2}(\\.\\*)?"
    }

    proptest! {
        /// Anything a lower role can do, the roles above it can do too
        #[test]
        fn prop_inheritance_is_monotonic(cap in capability_strategy()) {
            let lead = has_capability(Some(Role::Caposquadra), &cap);
            let manager = has_capability(Some(Role::Manager), &cap);
            let admin = has_capability(Some(Role::Admin), &cap);
            prop_assert!(!lead || manager);
            prop_assert!(!manager || admin);
        }

        /// No role grants nothing
        #[test]
        fn prop_no_role_fails_closed(cap in capability_strategy()) {
            prop_assert!(!has_capability(None, &cap));
        }

        /// Strings outside the role set grant nothing
        #[test]
        fn prop_unknown_role_fails_closed(role in "[a-z]{1,12}", cap in capability_strategy()) {
            prop_assume!(role.parse::<Role>().is_err());
            prop_assert!(!has_capability_str(Some(role.as_str()), &cap));
        }

        /// Every granted capability matches itself
        #[test]
        fn prop_granted_capabilities_pass(role in role_strategy()) {
            for cap in capabilities(role) {
                prop_assert!(has_capability(Some(role), cap));
            }
        }

        /// A granted wildcard covers every child capability
        #[test]
        fn prop_granted_wildcard_covers_children(child in "[a-z_]{1,12}") {
            let requested = format!("users.{}", child);
            prop_assert!(capability_matches("users.*", &requested));
            prop_assert!(has_capability(Some(Role::Admin), &requested));
        }
    }
}
