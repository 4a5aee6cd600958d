//! SurrealDB repository implementations.

mod agent;
mod agent_performance;
mod api_key;
mod call_type;
mod organization;
mod transcript;
mod user;

pub use agent::SurrealAgentRepository;
pub use agent_performance::SurrealAgentPerformanceRepository;
pub use api_key::SurrealApiKeyRepository;
pub use call_type::SurrealCallTypeRepository;
pub use organization::SurrealOrganizationRepository;
pub use transcript::SurrealTranscriptRepository;
pub use user::SurrealUserRepository;

use callscope_core::policy::TenantScope;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

impl CountRow {
    pub(crate) fn total(rows: &[CountRow]) -> u64 {
        rows.first().map(|r| r.total).unwrap_or(0)
    }
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(field: &str, value: Option<String>) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(field, &v)).transpose()
}

/// Condition restricting a query to the scope's organization. Pair with
/// [`scope_binding`] bound as `$scope_org`.
pub(crate) fn scope_condition(scope: TenantScope) -> &'static str {
    match scope {
        TenantScope::All => "true",
        TenantScope::Organization(_) => "organization_id = $scope_org",
    }
}

pub(crate) fn scope_binding(scope: TenantScope) -> String {
    scope
        .organization_id()
        .map(|id| id.to_string())
        .unwrap_or_default()
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::Query(format!("serialize: {e}")))
}

/// Decode a stored document. `null` and missing documents fall back to
/// the type's default.
pub(crate) fn from_json<T>(field: &str, value: serde_json::Value) -> Result<T, DbError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| DbError::Decode(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_condition_is_open_for_global_scope() {
        assert_eq!(scope_condition(TenantScope::All), "true");
        assert_eq!(scope_binding(TenantScope::All), "");
    }

    #[test]
    fn scope_binding_carries_organization() {
        let org = Uuid::new_v4();
        let scope = TenantScope::Organization(org);
        assert_eq!(scope_condition(scope), "organization_id = $scope_org");
        assert_eq!(scope_binding(scope), org.to_string());
    }

    #[test]
    fn from_json_defaults_on_null() {
        let v: Vec<String> = from_json("list", serde_json::Value::Null).unwrap();
        assert!(v.is_empty());
        assert!(parse_uuid("id", "nope").is_err());
    }
}
