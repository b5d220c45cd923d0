use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use keystone_core::DomainError;

/// Maximum length of a permission code.
pub const MAX_PERMISSION_CODE_LEN: usize = 128;

static PERMISSION_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+:[A-Za-z0-9_]+$").expect("permission code pattern is valid")
});

/// Whether `code` has the `resource:action` shape.
///
/// This is checked before any registry lookup.
pub fn is_valid_permission_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_PERMISSION_CODE_LEN
        && PERMISSION_CODE_PATTERN.is_match(code)
}

/// Permission identifier in `resource:action` form (e.g. `"role:write"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Parse a code, rejecting anything that is not `resource:action`.
    pub fn parse(code: impl Into<Cow<'static, str>>) -> Result<Self, DomainError> {
        let code = code.into();
        if !is_valid_permission_code(&code) {
            return Err(DomainError::validation(format!("invalid permission: {code}")));
        }
        Ok(Self(code))
    }

    /// Build a permission from a code known to be well formed.
    ///
    /// Only used for the built-in constants below.
    pub const fn from_static(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resource(&self) -> &str {
        self.0.split_once(':').map(|(r, _)| r).unwrap_or(&self.0)
    }

    pub fn action(&self) -> &str {
        self.0.split_once(':').map(|(_, a)| a).unwrap_or("")
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Permission {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0.into_owned()
    }
}

/// Validate every code in `codes`, reporting the first malformed one.
pub fn validate_permission_codes<'a, I>(codes: I) -> Result<(), DomainError>
where
    I: IntoIterator<Item = &'a str>,
{
    for code in codes {
        if !is_valid_permission_code(code) {
            return Err(DomainError::validation(format!("invalid permission: {code}")));
        }
    }
    Ok(())
}

/// Permission codes enforced by the built-in administration surface.
///
/// Route gates and the seeded system roles both read these, and the API
/// declares [`builtin::ALL`] before the registry is frozen.
pub mod builtin {
    use super::Permission;

    pub const SYSTEM_READ: &str = "system:read";
    pub const SYSTEM_WRITE: &str = "system:write";

    pub const USER_READ: &str = "user:read";
    pub const USER_WRITE: &str = "user:write";
    pub const USER_READ_SELF: &str = "user:read_self";
    pub const USER_UPDATE_SELF: &str = "user:update_self";

    pub const GROUP_READ: &str = "group:read";
    pub const GROUP_WRITE: &str = "group:write";
    pub const GROUP_DELETE: &str = "group:delete";

    pub const ROLE_READ: &str = "role:read";
    pub const ROLE_WRITE: &str = "role:write";
    pub const ROLE_DELETE: &str = "role:delete";

    pub const MENU_READ: &str = "menu:read";
    pub const MENU_WRITE: &str = "menu:write";
    pub const MENU_PUBLISH: &str = "menu:publish";

    /// Every built-in code, in declaration order.
    pub const ALL: &[&str] = &[
        SYSTEM_READ,
        SYSTEM_WRITE,
        USER_READ,
        USER_WRITE,
        USER_READ_SELF,
        USER_UPDATE_SELF,
        GROUP_READ,
        GROUP_WRITE,
        GROUP_DELETE,
        ROLE_READ,
        ROLE_WRITE,
        ROLE_DELETE,
        MENU_READ,
        MENU_WRITE,
        MENU_PUBLISH,
    ];

    pub fn all() -> Vec<Permission> {
        ALL.iter().copied().map(Permission::from_static).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_resource_action_codes() {
        assert!(is_valid_permission_code("role:write"));
        assert!(is_valid_permission_code("User_2:read_self"));
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in ["", "role", "role:", ":write", "role:write:x", "role.write", "ro le:write", "*"] {
            assert!(!is_valid_permission_code(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_codes_over_length_limit() {
        let long = format!("{}:{}", "a".repeat(100), "b".repeat(28));
        assert_eq!(long.len(), 129);
        assert!(!is_valid_permission_code(&long));

        let fits = format!("{}:{}", "a".repeat(100), "b".repeat(27));
        assert!(is_valid_permission_code(&fits));
    }

    #[test]
    fn parse_splits_resource_and_action() {
        let p = Permission::parse("menu:publish").unwrap();
        assert_eq!(p.resource(), "menu");
        assert_eq!(p.action(), "publish");
    }

    #[test]
    fn deserialization_enforces_syntax() {
        let ok: Result<Permission, _> = serde_json::from_str("\"group:read\"");
        assert!(ok.is_ok());
        let bad: Result<Permission, _> = serde_json::from_str("\"group.read\"");
        assert!(bad.is_err());
    }

    #[test]
    fn builtin_codes_are_well_formed() {
        for p in builtin::all() {
            assert!(is_valid_permission_code(p.as_str()), "{p}");
        }
    }
}
