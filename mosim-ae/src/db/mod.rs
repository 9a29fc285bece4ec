//! Session store for mosim-ae
//!
//! One row per completed analysis in the shared `mosim.db`. Summary scores
//! are stored as columns for listing; the full session is kept as JSON in
//! `artifacts` for re-sampling and export.

pub mod retry;
pub mod sessions;

use std::path::Path;

use mosim_common::Result;
use sqlx::SqlitePool;

/// Open the database and create mosim-ae tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = mosim_common::db::init_database_pool(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the session table and its list index if missing
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_sessions (
            session_id TEXT PRIMARY KEY,
            test_type TEXT NOT NULL,
            patient_id TEXT,
            model TEXT NOT NULL,
            created_at TEXT NOT NULL,
            frames_seen INTEGER NOT NULL,
            frames_dropped INTEGER NOT NULL,
            live_len INTEGER NOT NULL,
            ref_len INTEGER NOT NULL,
            position_distance REAL NOT NULL,
            amplitude_distance REAL NOT NULL,
            speed_distance REAL NOT NULL,
            position_similarity REAL NOT NULL,
            amplitude_similarity REAL NOT NULL,
            speed_similarity REAL NOT NULL,
            overall_similarity REAL NOT NULL,
            artifacts TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_sessions_test_type \
         ON analysis_sessions (test_type, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
