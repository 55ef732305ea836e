use std::borrow::Borrow;
use std::fmt;

use crate::model::{Grant, GrantScope};

pub const ADMIN: &str = "Admin";
pub const EVERYONE: &str = "system.Everyone";
pub const AUTHENTICATED: &str = "system.Authenticated";

/// Persisted rendering of the override flag in principal strings.
const OVERRIDE_VALUE: &str = "True";

/// Canonical string form of a held grant, compared against ACL principals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrincipalToken(String);

impl PrincipalToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn admin() -> Self {
        Self(ADMIN.to_string())
    }

    pub fn everyone() -> Self {
        Self(EVERYONE.to_string())
    }

    pub fn authenticated() -> Self {
        Self(AUTHENTICATED.to_string())
    }

    pub fn for_grant(grant: &Grant) -> Self {
        let token = match grant.scope {
            GrantScope::Override => {
                format!("{}:{}:{OVERRIDE_VALUE}", grant.action, grant.subject)
            }
            GrantScope::Object(object_id) => {
                format!("{}:{}:{object_id}", grant.action, grant.subject)
            }
            GrantScope::Composite(id) => format!(
                "{}:{}:{}:{}",
                grant.action, grant.subject, id.client_id, id.object_id
            ),
        };
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PrincipalToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
