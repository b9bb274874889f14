use sqlx::SqlitePool;

use scanforge::adapters::sqlite::{create_test_pool, run_migrations};

/// Fresh in-memory database with the full schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = create_test_pool().await.expect("failed to create test pool");
    run_migrations(&pool).await.expect("failed to run migrations");
    pool
}

pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}
