//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    callscope_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "organization",
        "user",
        "agent",
        "call_type",
        "transcript",
        "api_key",
        "agent_performance",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    callscope_db::run_migrations(&db).await.unwrap();
    callscope_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_codes() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    callscope_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE organization SET name = 'ACME', code = 'ACME', \
         subscription_tier = 'Free'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let second = db
        .query(
            "CREATE organization SET name = 'Other', code = 'ACME', \
             subscription_tier = 'Free'",
        )
        .await
        .unwrap()
        .check();
    assert!(second.is_err(), "duplicate code should be rejected");
}

#[tokio::test]
async fn tier_assertion_rejects_unknown_values() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    callscope_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE organization SET name = 'X', code = 'X', \
             subscription_tier = 'Platinum'",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err());
}
