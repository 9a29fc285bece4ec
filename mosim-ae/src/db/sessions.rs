//! Analysis session persistence
//!
//! Sessions are written once, in a single INSERT, after analysis has
//! finished. Readers never see a partial session.

use chrono::{DateTime, SecondsFormat, Utc};
use mosim_common::{Error, Result, TestType};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT};
use crate::analysis::{AnalysisSession, PerChannel, SessionSummary};

/// Which test type a session id belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub test_type: TestType,
    pub session_id: String,
}

/// Fixed-width UTC timestamps, so text order is time order
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp '{}' in session store: {}", raw, e)))
}

/// Persist a completed session.
///
/// Returns `Error::Conflict` when the session id already exists.
pub async fn insert_session(pool: &SqlitePool, session: &AnalysisSession) -> Result<()> {
    // Serialize before touching the database
    let artifacts = serde_json::to_string(session)?;
    let created_at = format_timestamp(session.created_at);
    let distances = session.channels.map(|c| c.dtw.distance);
    let similarities = session.channels.map(|c| c.similarity);

    retry_on_lock("insert_session", DEFAULT_MAX_LOCK_WAIT, || async {
        let result = sqlx::query(
            r#"
            INSERT INTO analysis_sessions (
                session_id, test_type, patient_id, model, created_at,
                frames_seen, frames_dropped, live_len, ref_len,
                position_distance, amplitude_distance, speed_distance,
                position_similarity, amplitude_similarity, speed_similarity,
                overall_similarity, artifacts
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.session_id)
        .bind(session.test_type.as_str())
        .bind(&session.patient_id)
        .bind(session.model.as_str())
        .bind(&created_at)
        .bind(session.frames_seen as i64)
        .bind(session.frames_dropped as i64)
        .bind(session.live_len as i64)
        .bind(session.ref_len as i64)
        .bind(distances.position)
        .bind(distances.amplitude)
        .bind(distances.speed)
        .bind(similarities.position)
        .bind(similarities.amplitude)
        .bind(similarities.speed)
        .bind(session.overall_similarity)
        .bind(&artifacts)
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                Error::Conflict(format!("Session '{}' already exists", session.session_id)),
            ),
            Err(err) => Err(Error::Database(err)),
        }
    })
    .await?;

    tracing::debug!(
        session_id = %session.session_id,
        test_type = %session.test_type,
        "Session stored"
    );
    Ok(())
}

fn summary_from_row(row: &SqliteRow) -> Result<SessionSummary> {
    let test_type: String = row.get("test_type");
    let created_at: String = row.get("created_at");
    let frames_seen: i64 = row.get("frames_seen");
    let frames_dropped: i64 = row.get("frames_dropped");
    let live_len: i64 = row.get("live_len");
    let ref_len: i64 = row.get("ref_len");

    Ok(SessionSummary {
        session_id: row.get("session_id"),
        test_type: TestType::parse(&test_type)?,
        patient_id: row.get("patient_id"),
        created_at: parse_timestamp(&created_at)?,
        frames_seen: frames_seen as usize,
        frames_dropped: frames_dropped as usize,
        live_len: live_len as usize,
        ref_len: ref_len as usize,
        channel_distances: PerChannel {
            position: row.get("position_distance"),
            amplitude: row.get("amplitude_distance"),
            speed: row.get("speed_distance"),
        },
        channel_similarities: PerChannel {
            position: row.get("position_similarity"),
            amplitude: row.get("amplitude_similarity"),
            speed: row.get("speed_similarity"),
        },
        overall_similarity: row.get("overall_similarity"),
    })
}

/// Sessions of one test type, newest first
pub async fn list_sessions(pool: &SqlitePool, test_type: &TestType) -> Result<Vec<SessionSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT session_id, test_type, patient_id, created_at,
               frames_seen, frames_dropped, live_len, ref_len,
               position_distance, amplitude_distance, speed_distance,
               position_similarity, amplitude_similarity, speed_similarity,
               overall_similarity
        FROM analysis_sessions
        WHERE test_type = ?
        ORDER BY created_at DESC, session_id DESC
        "#,
    )
    .bind(test_type.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

/// Resolve a bare session id to its test type
pub async fn lookup_session(pool: &SqlitePool, session_id: &str) -> Result<Option<SessionRef>> {
    let test_type: Option<String> =
        sqlx::query_scalar("SELECT test_type FROM analysis_sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(pool)
            .await?;

    test_type
        .map(|t| {
            Ok(SessionRef {
                test_type: TestType::parse(&t)?,
                session_id: session_id.to_string(),
            })
        })
        .transpose()
}

/// Full-resolution session, if it exists under `test_type`
pub async fn load_session(
    pool: &SqlitePool,
    test_type: &TestType,
    session_id: &str,
) -> Result<Option<AnalysisSession>> {
    let artifacts: Option<String> = sqlx::query_scalar(
        "SELECT artifacts FROM analysis_sessions WHERE session_id = ? AND test_type = ?",
    )
    .bind(session_id)
    .bind(test_type.as_str())
    .fetch_optional(pool)
    .await?;

    artifacts
        .map(|json| serde_json::from_str(&json).map_err(Error::from))
        .transpose()
}

/// Test types with at least one stored session, sorted
pub async fn list_test_types(pool: &SqlitePool) -> Result<Vec<TestType>> {
    let names: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT test_type FROM analysis_sessions ORDER BY test_type")
            .fetch_all(pool)
            .await?;

    names.iter().map(|n| TestType::parse(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_round_trip() {
        let early = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);

        let (a, b) = (format_timestamp(early), format_timestamp(late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&a).unwrap(), early);
    }

    #[test]
    fn bad_timestamp_is_internal_error() {
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Internal(_))));
    }
}
