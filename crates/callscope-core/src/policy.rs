//! Tenant isolation and role policy.
//!
//! A single evaluation point decides, for a principal and the tenant that
//! owns a resource, whether access is allowed and which organization
//! filter list queries must apply. HTTP concerns stay in the server.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{CallscopeError, CallscopeResult};
use crate::models::user::Role;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// `None` when authenticated with an API key.
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub role: Role,
    pub is_master_admin: bool,
    /// The caller's organization carries the `is_master` flag.
    pub organization_is_master: bool,
}

impl Principal {
    pub fn has_global_access(&self) -> bool {
        self.is_master_admin || self.organization_is_master
    }

    /// The caller's own organization, required for tenant-scoped writes.
    pub fn own_organization(&self) -> CallscopeResult<Uuid> {
        self.organization_id
            .ok_or_else(|| CallscopeError::validation("no organization associated with caller"))
    }
}

/// Organization filter to apply to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// No filter.
    All,
    Organization(Uuid),
}

impl TenantScope {
    pub fn organization_id(&self) -> Option<Uuid> {
        match self {
            TenantScope::All => None,
            TenantScope::Organization(id) => Some(*id),
        }
    }

    pub fn permits(&self, organization_id: Uuid) -> bool {
        match self {
            TenantScope::All => true,
            TenantScope::Organization(id) => *id == organization_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(TenantScope),
    Deny(String),
}

impl Decision {
    pub fn into_result(self) -> CallscopeResult<TenantScope> {
        match self {
            Decision::Allow(scope) => Ok(scope),
            Decision::Deny(reason) => Err(CallscopeError::denied(reason)),
        }
    }
}

/// Decide access to a resource owned by `resource_tenant`.
///
/// `None` as the resource tenant asks for the caller's default scope
/// (used for list queries).
pub fn evaluate(principal: &Principal, resource_tenant: Option<Uuid>) -> Decision {
    if principal.has_global_access() {
        return Decision::Allow(TenantScope::All);
    }
    let Some(own) = principal.organization_id else {
        return Decision::Deny("caller does not belong to an organization".into());
    };
    match resource_tenant {
        Some(tenant) if tenant != own => {
            Decision::Deny("resource belongs to another organization".into())
        }
        _ => Decision::Allow(TenantScope::Organization(own)),
    }
}

/// Scope for list queries. Global principals may narrow to a requested
/// organization; everyone else is pinned to their own regardless of what
/// they ask for.
pub fn list_scope(principal: &Principal, requested: Option<Uuid>) -> CallscopeResult<TenantScope> {
    let scope = evaluate(principal, None).into_result()?;
    Ok(match (scope, requested) {
        (TenantScope::All, Some(org)) => TenantScope::Organization(org),
        (scope, _) => scope,
    })
}

/// Check access to a single resource owned by `organization_id`.
pub fn authorize(principal: &Principal, organization_id: Uuid) -> CallscopeResult<()> {
    evaluate(principal, Some(organization_id))
        .into_result()
        .map(|_| ())
}

/// Require at least `minimum` role. Global principals always pass.
pub fn require_role(principal: &Principal, minimum: Role) -> CallscopeResult<()> {
    if principal.has_global_access() || principal.role >= minimum {
        Ok(())
    } else {
        Err(CallscopeError::denied(format!(
            "{} role required",
            minimum.as_str()
        )))
    }
}

pub fn require_global(principal: &Principal) -> CallscopeResult<()> {
    if principal.has_global_access() {
        Ok(())
    } else {
        Err(CallscopeError::denied("master admin access required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(org: Uuid, role: Role) -> Principal {
        Principal {
            user_id: Some(Uuid::new_v4()),
            organization_id: Some(org),
            role,
            is_master_admin: false,
            organization_is_master: false,
        }
    }

    #[test]
    fn member_is_pinned_to_own_organization() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        let p = member(own, Role::Admin);

        assert_eq!(evaluate(&p, None), Decision::Allow(TenantScope::Organization(own)));
        assert_eq!(list_scope(&p, Some(other)).unwrap(), TenantScope::Organization(own));
        assert!(authorize(&p, own).is_ok());
        assert!(matches!(
            authorize(&p, other),
            Err(CallscopeError::AuthorizationDenied { .. })
        ));
    }

    #[test]
    fn master_admin_sees_everything_and_may_narrow() {
        let other = Uuid::new_v4();
        let p = Principal {
            is_master_admin: true,
            ..member(Uuid::new_v4(), Role::User)
        };

        assert_eq!(evaluate(&p, Some(other)), Decision::Allow(TenantScope::All));
        assert_eq!(list_scope(&p, None).unwrap(), TenantScope::All);
        assert_eq!(list_scope(&p, Some(other)).unwrap(), TenantScope::Organization(other));
        assert!(require_role(&p, Role::Admin).is_ok());
    }

    #[test]
    fn master_organization_members_have_global_access() {
        let p = Principal {
            organization_is_master: true,
            ..member(Uuid::new_v4(), Role::User)
        };
        assert!(p.has_global_access());
        assert!(authorize(&p, Uuid::new_v4()).is_ok());
        assert!(require_global(&p).is_ok());
    }

    #[test]
    fn orphan_user_is_denied() {
        let p = Principal {
            organization_id: None,
            ..member(Uuid::nil(), Role::Admin)
        };
        assert!(matches!(evaluate(&p, None), Decision::Deny(_)));
        assert!(list_scope(&p, None).is_err());
    }

    #[test]
    fn roles_are_hierarchical() {
        let org = Uuid::new_v4();
        assert!(require_role(&member(org, Role::Manager), Role::User).is_ok());
        assert!(require_role(&member(org, Role::Manager), Role::Manager).is_ok());
        assert!(require_role(&member(org, Role::Manager), Role::Admin).is_err());
        assert!(require_global(&member(org, Role::Admin)).is_err());
    }

    #[test]
    fn scope_permits_only_its_tenant() {
        let org = Uuid::new_v4();
        assert!(TenantScope::All.permits(org));
        assert!(TenantScope::Organization(org).permits(org));
        assert!(!TenantScope::Organization(org).permits(Uuid::new_v4()));
    }
}
