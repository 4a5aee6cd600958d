//! Call-center agent domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::performance::PerformanceMetrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    /// Unique within the organization when present.
    pub employee_id: Option<String>,
    pub team: Option<String>,
    pub is_active: bool,
    pub performance_metrics: PerformanceMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgent {
    pub organization_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub employee_id: Option<String>,
    pub team: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAgent {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub employee_id: Option<Option<String>>,
    pub team: Option<Option<String>>,
    pub is_active: Option<bool>,
}
