//! Organization-scoped API key.
//!
//! Keys are presented as `<prefix>_<secret>`. Only the SHA-256 of the
//! secret is stored; the raw secret is returned once at issuance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub prefix: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApiKey {
    pub organization_id: Uuid,
    pub name: String,
    pub prefix: String,
    pub secret_hash: String,
    pub created_by: Option<Uuid>,
}
