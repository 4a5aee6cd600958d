//! HTTP handlers, one module per resource.

pub mod agents;
pub mod auth;
pub mod call_types;
pub mod health;
pub mod master_admin;
pub mod organizations;
pub mod transcripts;
pub mod users;

use callscope_core::policy::{self, Principal, TenantScope};
use callscope_core::repository::{PaginatedResult, Pagination};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// `?page=&limit=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_page(self.page, self.limit)
    }
}

#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

/// List response: `{data, pagination: {total, page, limit, pages}}`.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> From<PaginatedResult<T>> for Paginated<T> {
    fn from(result: PaginatedResult<T>) -> Self {
        let pagination = PageInfo {
            total: result.total,
            page: result.offset / result.limit.max(1) + 1,
            limit: result.limit,
            pages: result.pages(),
        };
        Self {
            data: result.items,
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

/// For `Option<Option<T>>` fields: absent → `None`, `null` →
/// `Some(None)`, value → `Some(Some(v))`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Reject blank required strings.
pub(crate) fn require(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

/// Scope for reading or writing a single record.
pub(crate) fn record_scope(principal: &Principal) -> ApiResult<TenantScope> {
    Ok(policy::evaluate(principal, None).into_result()?)
}

/// Organization that a create request targets: global principals may name
/// one, everyone else writes into their own.
pub(crate) fn target_organization(
    principal: &Principal,
    requested: Option<Uuid>,
) -> ApiResult<Uuid> {
    match requested {
        Some(org) if principal.has_global_access() => Ok(org),
        _ => Ok(principal.own_organization()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callscope_core::models::user::Role;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        team: Option<Option<String>>,
    }

    #[test]
    fn nullable_distinguishes_absent_and_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"team": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"team": "blue"}"#).unwrap();
        assert_eq!(absent.team, None);
        assert_eq!(null.team, Some(None));
        assert_eq!(set.team, Some(Some("blue".into())));
    }

    #[test]
    fn pagination_envelope() {
        let page: Paginated<u32> = PaginatedResult {
            items: vec![1, 2],
            total: 45,
            offset: 40,
            limit: 20,
        }
        .into();
        assert_eq!(page.pagination.page, 3);
        assert_eq!(page.pagination.pages, 3);
        assert_eq!(page.data, vec![1, 2]);
    }

    #[test]
    fn members_cannot_target_other_organizations() {
        let own = Uuid::new_v4();
        let member = Principal {
            user_id: Some(Uuid::new_v4()),
            organization_id: Some(own),
            role: Role::Admin,
            is_master_admin: false,
            organization_is_master: false,
        };
        assert_eq!(target_organization(&member, Some(Uuid::new_v4())).unwrap(), own);

        let other = Uuid::new_v4();
        let master = Principal {
            is_master_admin: true,
            ..member
        };
        assert_eq!(target_organization(&master, Some(other)).unwrap(), other);
    }
}
