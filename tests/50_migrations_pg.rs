mod common;

use forum_core::database::migrations::{MigrationError, MigrationRegistry, MigrationRunner, SqlMigration};
use sqlx::PgPool;

use common::{drop_tables, table_exists, test_pool, unique_table};

async fn ledger_names(pool: &PgPool, ledger: &str) -> Vec<String> {
    sqlx::query_scalar(&format!("SELECT name FROM \"{}\" ORDER BY name", ledger))
        .fetch_all(pool)
        .await
        .unwrap()
}

fn create(table: &str) -> String {
    format!("CREATE TABLE \"{}\" (id INT PRIMARY KEY)", table)
}

#[tokio::test]
async fn test_run_twice_applies_each_migration_once() {
    let Some(pool) = test_pool().await else { return };
    let ledger = unique_table("ledger");
    let users = unique_table("users");
    let posts = unique_table("posts");

    let mut registry = MigrationRegistry::new();
    // Registered out of order; names decide application order
    registry
        .register(SqlMigration::new("0002_posts", create(&posts)))
        .unwrap()
        .register(SqlMigration::new("0001_users", create(&users)))
        .unwrap();
    let runner = MigrationRunner::new(pool.clone(), registry)
        .with_ledger_table(&ledger)
        .unwrap();

    let status = runner.status().await.unwrap();
    assert!(status.applied.is_empty());
    assert_eq!(status.pending, vec!["0001_users", "0002_posts"]);

    let first = runner.run().await.unwrap();
    assert_eq!(first.applied, vec!["0001_users", "0002_posts"]);
    assert!(table_exists(&pool, &users).await);
    assert!(table_exists(&pool, &posts).await);

    // A second run would fail on CREATE TABLE if it reapplied anything
    let second = runner.run().await.unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(ledger_names(&pool, &ledger).await, vec!["0001_users", "0002_posts"]);

    let status = runner.status().await.unwrap();
    assert_eq!(status.applied.len(), 2);
    assert!(status.pending.is_empty());

    drop_tables(&pool, &[&users, &posts, &ledger]).await;
}

#[tokio::test]
async fn test_failure_rolls_back_unit_and_stops_run() {
    let Some(pool) = test_pool().await else { return };
    let ledger = unique_table("ledger");
    let boards = unique_table("boards");
    let threads = unique_table("threads");
    let posts = unique_table("posts");

    let mut registry = MigrationRegistry::new();
    registry
        .register(SqlMigration::new("0001_boards", create(&boards)))
        .unwrap()
        // Creates a table, then fails in the same unit
        .register(SqlMigration::new(
            "0002_threads",
            format!("{}; SELECT * FROM definitely_missing_table", create(&threads)),
        ))
        .unwrap()
        .register(SqlMigration::new("0003_posts", create(&posts)))
        .unwrap();
    let runner = MigrationRunner::new(pool.clone(), registry)
        .with_ledger_table(&ledger)
        .unwrap();

    let err = runner.run().await.unwrap_err();
    assert!(matches!(err, MigrationError::Apply { ref name, .. } if name == "0002_threads"));

    assert_eq!(ledger_names(&pool, &ledger).await, vec!["0001_boards"]);
    assert!(table_exists(&pool, &boards).await);
    assert!(!table_exists(&pool, &threads).await, "failed unit must roll back");
    assert!(!table_exists(&pool, &posts).await, "later units must not run");

    let status = runner.status().await.unwrap();
    assert_eq!(status.pending, vec!["0002_threads", "0003_posts"]);

    drop_tables(&pool, &[&boards, &threads, &posts, &ledger]).await;
}

#[tokio::test]
async fn test_new_units_apply_after_earlier_run() {
    let Some(pool) = test_pool().await else { return };
    let ledger = unique_table("ledger");
    let first_table = unique_table("first");
    let second_table = unique_table("second");

    let mut registry = MigrationRegistry::new();
    registry
        .register(SqlMigration::new("0001_first", create(&first_table)))
        .unwrap();
    MigrationRunner::new(pool.clone(), registry.clone())
        .with_ledger_table(&ledger)
        .unwrap()
        .run()
        .await
        .unwrap();

    registry
        .register(SqlMigration::new("0002_second", create(&second_table)))
        .unwrap();
    let report = MigrationRunner::new(pool.clone(), registry)
        .with_ledger_table(&ledger)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.applied, vec!["0002_second"]);

    drop_tables(&pool, &[&first_table, &second_table, &ledger]).await;
}
