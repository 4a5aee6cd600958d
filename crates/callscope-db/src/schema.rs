//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as strings, enums as
//! strings with ASSERT constraints. Free-form documents (transcript
//! analysis, agent performance, bucket totals) are FLEXIBLE objects.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organizations (tenant boundary)
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD name ON TABLE organization TYPE string;
DEFINE FIELD code ON TABLE organization TYPE string;
DEFINE FIELD subscription_tier ON TABLE organization TYPE string \
    ASSERT $value IN ['Free', 'Basic', 'Professional', 'Enterprise'];
DEFINE FIELD max_users ON TABLE organization TYPE int DEFAULT 0;
DEFINE FIELD max_calls ON TABLE organization TYPE int DEFAULT 0;
DEFINE FIELD api_access ON TABLE organization TYPE bool DEFAULT false;
DEFINE FIELD user_count ON TABLE organization TYPE int DEFAULT 0;
DEFINE FIELD call_count ON TABLE organization TYPE int DEFAULT 0;
DEFINE FIELD is_master ON TABLE organization TYPE bool DEFAULT false;
DEFINE FIELD is_active ON TABLE organization TYPE bool DEFAULT true;
DEFINE FIELD metadata ON TABLE organization TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_code ON TABLE organization \
    COLUMNS code UNIQUE;

-- =======================================================================
-- Users (organization scope; email unique across tenants)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE user TYPE option<string>;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['admin', 'manager', 'user'];
DEFINE FIELD is_master_admin ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD reset_token_hash ON TABLE user TYPE option<string>;
DEFINE FIELD reset_token_expires_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD last_login_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_org ON TABLE user COLUMNS organization_id;
DEFINE INDEX idx_user_reset_token ON TABLE user \
    COLUMNS reset_token_hash;

-- =======================================================================
-- Agents (organization scope)
-- =======================================================================
DEFINE TABLE agent SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE agent TYPE string;
DEFINE FIELD name ON TABLE agent TYPE string;
DEFINE FIELD email ON TABLE agent TYPE option<string>;
DEFINE FIELD employee_id ON TABLE agent TYPE option<string>;
DEFINE FIELD team ON TABLE agent TYPE option<string>;
DEFINE FIELD is_active ON TABLE agent TYPE bool DEFAULT true;
DEFINE FIELD performance_metrics ON TABLE agent TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE agent TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE agent TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_agent_org ON TABLE agent COLUMNS organization_id;
DEFINE INDEX idx_agent_org_employee ON TABLE agent \
    COLUMNS organization_id, employee_id;

-- =======================================================================
-- Call types (organization scope)
-- =======================================================================
DEFINE TABLE call_type SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE call_type TYPE string;
DEFINE FIELD name ON TABLE call_type TYPE string;
DEFINE FIELD description ON TABLE call_type TYPE option<string>;
DEFINE FIELD is_active ON TABLE call_type TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE call_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE call_type TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_call_type_org_name ON TABLE call_type \
    COLUMNS organization_id, name UNIQUE;

-- =======================================================================
-- Transcripts (organization scope)
-- =======================================================================
DEFINE TABLE transcript SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE transcript TYPE string;
DEFINE FIELD agent_id ON TABLE transcript TYPE option<string>;
DEFINE FIELD created_by ON TABLE transcript TYPE option<string>;
DEFINE FIELD call_type_id ON TABLE transcript TYPE option<string>;
DEFINE FIELD title ON TABLE transcript TYPE string;
DEFINE FIELD text ON TABLE transcript TYPE string;
DEFINE FIELD analysis ON TABLE transcript TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD metadata ON TABLE transcript TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE transcript TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE transcript TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_transcript_org_time ON TABLE transcript \
    COLUMNS organization_id, created_at;
DEFINE INDEX idx_transcript_agent_time ON TABLE transcript \
    COLUMNS agent_id, created_at;

-- =======================================================================
-- API keys (organization scope)
-- =======================================================================
DEFINE TABLE api_key SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE api_key TYPE string;
DEFINE FIELD name ON TABLE api_key TYPE string;
DEFINE FIELD prefix ON TABLE api_key TYPE string;
DEFINE FIELD secret_hash ON TABLE api_key TYPE string;
DEFINE FIELD is_active ON TABLE api_key TYPE bool DEFAULT true;
DEFINE FIELD last_used_at ON TABLE api_key TYPE option<datetime>;
DEFINE FIELD created_by ON TABLE api_key TYPE option<string>;
DEFINE FIELD created_at ON TABLE api_key TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_api_key_prefix ON TABLE api_key COLUMNS prefix UNIQUE;

-- =======================================================================
-- Agent performance buckets (derived rollups)
-- =======================================================================
DEFINE TABLE agent_performance SCHEMAFULL;
DEFINE FIELD agent_id ON TABLE agent_performance TYPE string;
DEFINE FIELD organization_id ON TABLE agent_performance TYPE string;
DEFINE FIELD period_type ON TABLE agent_performance TYPE string \
    ASSERT $value IN ['daily', 'weekly', 'monthly', 'quarterly'];
DEFINE FIELD period_key ON TABLE agent_performance TYPE string;
DEFINE FIELD period_start ON TABLE agent_performance TYPE string;
DEFINE FIELD period_end ON TABLE agent_performance TYPE string;
DEFINE FIELD call_count ON TABLE agent_performance TYPE int DEFAULT 0;
DEFINE FIELD totals ON TABLE agent_performance TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD averages ON TABLE agent_performance TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE agent_performance TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE agent_performance TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_perf_bucket ON TABLE agent_performance \
    COLUMNS agent_id, period_type, period_key UNIQUE;
DEFINE INDEX idx_perf_org ON TABLE agent_performance \
    COLUMNS organization_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn bucket_natural_key_is_unique() {
        assert!(SCHEMA_V1.contains(
            "idx_perf_bucket ON TABLE agent_performance \
             COLUMNS agent_id, period_type, period_key UNIQUE"
        ));
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
