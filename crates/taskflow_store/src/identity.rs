//! Tenant and principal context.
//!
//! The engine does no authorization of its own. Identity only scopes cache keys
//! and store queries; the store decides what a principal may do.

use std::fmt;

use serde::{Deserialize, Serialize};
use taskflow_core::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
}

/// Who is acting, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub principal_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Identity {
    /// Identity with read and write permissions.
    pub fn new(principal_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            tenant_id: tenant_id.into(),
            permissions: vec![Permission::Read, Permission::Write],
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn can_write(&self) -> bool {
        self.permissions.contains(&Permission::Write)
    }

    pub fn scope(&self) -> Scope {
        Scope {
            tenant_id: self.tenant_id.clone(),
            principal_id: self.principal_id.clone(),
            can_write: self.can_write(),
        }
    }
}

/// Namespace for cache keys and store queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub tenant_id: String,
    pub principal_id: String,
    #[serde(default)]
    pub can_write: bool,
}

/// Escapes the key separator so that no tenant or principal id can forge another scope's key.
fn escape_segment(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}

impl Scope {
    pub fn new(tenant_id: impl Into<String>, principal_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            principal_id: principal_id.into(),
            can_write: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.can_write = false;
        self
    }

    /// `resource:tenant:principal`, with both ids escaped.
    pub fn cache_key(&self, resource: Resource) -> String {
        format!(
            "{}:{}:{}",
            resource.as_str(),
            escape_segment(&self.tenant_id),
            escape_segment(&self.principal_id)
        )
    }

    /// Glob matching every resource key of this scope.
    pub fn cache_pattern(&self) -> String {
        format!(
            "*:{}:{}",
            glob::Pattern::escape(&escape_segment(&self.tenant_id)),
            glob::Pattern::escape(&escape_segment(&self.principal_id))
        )
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.principal_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_scope() {
        let identity = Identity::new("p1", "acme");
        let scope = identity.scope();
        assert_eq!(scope.tenant_id, "acme");
        assert!(scope.can_write);

        let reader = Identity::new("p2", "acme").with_permissions(vec![Permission::Read]);
        assert!(!reader.scope().can_write);
    }

    #[test]
    fn test_cache_key_layout() {
        let scope = Scope::new("acme", "p1");
        assert_eq!(scope.cache_key(Resource::Tasks), "tasks:acme:p1");
    }

    #[test]
    fn test_separator_in_ids_cannot_collide() {
        let a = Scope::new("a:b", "c");
        let b = Scope::new("a", "b:c");
        assert_ne!(a.cache_key(Resource::Tasks), b.cache_key(Resource::Tasks));
    }

    #[test]
    fn test_pattern_matches_only_own_scope() {
        let scope = Scope::new("ac*me", "p1");
        let pattern = glob::Pattern::new(&scope.cache_pattern()).unwrap();
        assert!(pattern.matches(&scope.cache_key(Resource::Actions)));
        assert!(!pattern.matches(&Scope::new("acXme", "p1").cache_key(Resource::Actions)));
    }
}
