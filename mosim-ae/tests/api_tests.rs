//! HTTP API integration tests
//!
//! Each test builds the router over a fresh SQLite file and a small
//! in-memory reference library, then drives it with `oneshot`.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mosim_ae::analysis::{AnalysisEngine, Dtw, Normalization, SimilarityScorer};
use mosim_ae::templates::ReferenceLibrary;
use mosim_ae::{build_router, AppState};
use mosim_common::{LandmarkFrame, Sequence, SequenceRole, TestType, TrackingModel};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Three generic landmarks rising and falling along y
fn reference_frames() -> Vec<LandmarkFrame> {
    [0.0, 0.2, 0.5, 0.8, 1.0, 0.8, 0.5, 0.2, 0.0]
        .iter()
        .map(|&h| LandmarkFrame::from_xy(&[(0.4, h), (0.5, h + 0.1), (0.6, h)]))
        .collect()
}

fn frames_json(heights: &[f64]) -> Value {
    Value::Array(
        heights
            .iter()
            .map(|&h| {
                json!([
                    { "x": 0.4, "y": h },
                    { "x": 0.5, "y": h + 0.1 },
                    { "x": 0.6, "y": h }
                ])
            })
            .collect(),
    )
}

async fn test_app(library: ReferenceLibrary) -> (TempDir, Router) {
    test_app_with_timeout(library, Duration::from_secs(120)).await
}

async fn test_app_with_timeout(library: ReferenceLibrary, timeout: Duration) -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let db = mosim_ae::db::init_database_pool(&dir.path().join("mosim.db"))
        .await
        .unwrap();
    let engine = AnalysisEngine::new(
        library,
        Dtw::unconstrained(),
        SimilarityScorer::default(),
        Normalization::None,
    );
    let state = AppState::new(db, engine).with_analysis_timeout(timeout);
    (dir, build_router(state))
}

async fn stand_and_sit_app() -> (TempDir, Router) {
    let mut library = ReferenceLibrary::new();
    library.insert(Sequence::new(
        SequenceRole::Reference,
        TestType::parse("stand-and-sit").unwrap(),
        TrackingModel::Generic,
        reference_frames(),
    ));
    test_app(library).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_recording(app: &Router, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri("/dtw/recordings")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

fn recording(test_type: &str, session_id: &str, heights: &[f64]) -> Value {
    json!({
        "testType": test_type,
        "sessionId": session_id,
        "patientId": "patient-1",
        "fps": 30.0,
        "liveSequence": frames_json(heights)
    })
}

const LIVE: [f64; 12] = [0.0, 0.1, 0.2, 0.4, 0.6, 0.9, 1.0, 0.9, 0.6, 0.3, 0.1, 0.0];

#[tokio::test]
async fn test_submit_recording_creates_session() {
    let (_dir, app) = stand_and_sit_app().await;

    let (status, body) = post_recording(&app, recording("Stand & Sit", "s-1", &LIVE)).await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["sessionId"], "s-1");
    assert_eq!(body["testType"], "stand-and-sit");
    assert_eq!(body["liveLen"], 12);
    assert_eq!(body["refLen"], 9);
    let overall = body["overallSimilarity"].as_f64().unwrap();
    assert!(overall > 0.0 && overall <= 1.0);
    for channel in ["position", "amplitude", "speed"] {
        assert!(body["channelDistances"][channel].as_f64().unwrap() >= 0.0);
    }
}

#[tokio::test]
async fn test_generated_session_id_is_returned() {
    let (_dir, app) = stand_and_sit_app().await;
    let body = json!({ "testType": "stand-and-sit", "liveSequence": frames_json(&LIVE) });

    let (status, created) = post_recording(&app, body).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["sessionId"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, found) = get(&app, &format!("/dtw/lookup/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["testType"], "stand-and-sit");
}

#[tokio::test]
async fn test_duplicate_session_is_conflict() {
    let (_dir, app) = stand_and_sit_app().await;
    let (status, _) = post_recording(&app, recording("stand-and-sit", "dup", &LIVE)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_recording(&app, recording("stand-and-sit", "dup", &LIVE)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_missing_template_is_server_error() {
    let (_dir, app) = stand_and_sit_app().await;
    let (status, body) = post_recording(&app, recording("finger-tapping", "s-1", &LIVE)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "MISSING_REFERENCE_TEMPLATE");

    let (status, _) = get(&app, "/dtw/lookup/s-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, health) = get(&app, "/health").await;
    assert!(health["last_error"].as_str().unwrap().contains("finger-tapping"));
}

#[tokio::test]
async fn test_short_or_malformed_recordings_are_rejected() {
    let (_dir, app) = stand_and_sit_app().await;

    let (status, body) = post_recording(&app, recording("stand-and-sit", "s-1", &[0.5])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "UNPROCESSABLE");

    let ragged = json!({
        "testType": "stand-and-sit",
        "sessionId": "s-2",
        "liveSequence": [
            [{ "x": 0.4, "y": 0.0 }, { "x": 0.5, "y": 0.1 }, { "x": 0.6, "y": 0.0 }],
            [{ "x": 0.4, "y": 0.1 }, { "x": 0.5, "y": 0.2 }]
        ]
    });
    let (status, _) = post_recording(&app, ragged).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post_recording(&app, recording("stand-and-sit", "../bad", &LIVE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_sessions_and_tests() {
    let (_dir, app) = stand_and_sit_app().await;

    let (status, body) = get(&app, "/dtw/tests").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    for id in ["first", "second"] {
        let (status, _) = post_recording(&app, recording("stand-and-sit", id, &LIVE)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = get(&app, "/dtw/tests").await;
    assert_eq!(body, json!(["stand-and-sit"]));

    let (status, body) = get(&app, "/dtw/sessions/stand_sit").await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    // Second was created later
    assert_eq!(listed[0]["sessionId"], "second");

    let (status, body) = get(&app, "/dtw/sessions/finger-tapping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_lookup_unknown_session_is_not_found() {
    let (_dir, app) = stand_and_sit_app().await;
    let (status, body) = get(&app, "/dtw/lookup/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_series_view_respects_point_budget() {
    let (_dir, app) = stand_and_sit_app().await;
    post_recording(&app, recording("stand-and-sit", "s-1", &LIVE)).await;

    let (status, body) = get(
        &app,
        "/dtw/sessions/stand-and-sit/s-1/series?channel=speed&max_points=5",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["channel"], "speed");

    let path_len = body["pathLen"].as_u64().unwrap() as usize;
    assert!(path_len >= 12 && path_len <= 12 + 9 - 1);

    let cost = &body["perStepCost"];
    assert!(cost["y"].as_array().unwrap().len() <= 5);
    assert_eq!(cost["x"][0], 0.0);

    let progress = body["cumulativeProgress"]["y"].as_array().unwrap();
    assert_eq!(progress.last().unwrap().as_f64().unwrap(), 1.0);

    // Alignment map ends on the last reference frame
    let alignment = body["alignmentMap"]["y"].as_array().unwrap();
    assert_eq!(alignment.last().unwrap().as_f64().unwrap(), 8.0);
}

#[tokio::test]
async fn test_series_view_unknown_session() {
    let (_dir, app) = stand_and_sit_app().await;
    let (status, _) = get(&app, "/dtw/sessions/stand-and-sit/missing/series").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_axis_aggregate_view() {
    let (_dir, app) = stand_and_sit_app().await;
    post_recording(&app, recording("stand-and-sit", "s-1", &LIVE)).await;

    let (status, body) = get(
        &app,
        "/dtw/sessions/stand-and-sit/s-1/axis_agg?axis=y&reduce=median&landmarks=0,2",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["landmarks"], json!([0, 2]));
    assert_eq!(body["reduce"], "median");

    // Landmarks 0 and 2 both sit at the raw height
    let live: Vec<f64> = body["live"]["y"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert_eq!(live, LIVE.to_vec());

    let path = &body["path"];
    assert_eq!(path["live"][0], 0);
    assert_eq!(path["reference"][0], 0);
    let aligned = &body["aligned"];
    assert_eq!(
        aligned["live"].as_array().unwrap().len(),
        aligned["reference"].as_array().unwrap().len()
    );
}

#[tokio::test]
async fn test_axis_aggregate_rejects_bad_selection() {
    let (_dir, app) = stand_and_sit_app().await;
    post_recording(&app, recording("stand-and-sit", "s-1", &LIVE)).await;
    let base = "/dtw/sessions/stand-and-sit/s-1/axis_agg";

    let (status, _) = get(&app, &format!("{}?landmarks=0,x", base)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, &format!("{}?landmarks=7", base)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Recordings are 2D
    let (status, _) = get(&app, &format!("{}?axis=z", base)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, &format!("{}?reduce=pca1&landmarks=all", base)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_export_is_attachment_with_full_session() {
    let (_dir, app) = stand_and_sit_app().await;
    post_recording(&app, recording("stand-and-sit", "s-1", &LIVE)).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/dtw/sessions/stand-and-sit/s-1/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"stand-and-sit_s-1.json\"");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["formatVersion"], 1);
    assert_eq!(body["session"]["sessionId"], "s-1");
    assert_eq!(body["session"]["liveLen"], 12);
}

#[tokio::test]
async fn test_references_and_health() {
    let (_dir, app) = stand_and_sit_app().await;

    let (status, body) = get(&app, "/dtw/references").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["testType"], "stand-and-sit");
    assert_eq!(body[0]["frames"], 9);
    assert_eq!(body[0]["landmarks"], 3);

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "mosim-ae");
    assert_eq!(body["templates"], 1);
    assert_eq!(body["in_flight"], 0);
}

#[tokio::test]
async fn test_health_reports_degraded_and_last_error() {
    let (_dir, app) = test_app(ReferenceLibrary::new()).await;

    let (_, body) = get(&app, "/health").await;
    assert_eq!(body["status"], "degraded");
    assert!(body.get("last_error").is_none());

    let (status, _) = post_recording(&app, recording("stand-and-sit", "s-1", &LIVE)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, body) = get(&app, "/health").await;
    assert_eq!(body["status"], "degraded");
    assert!(body["last_error"].is_string());
}

#[tokio::test]
async fn test_timed_out_analysis_keeps_session_id_reserved() {
    let heights: Vec<f64> = (0..3000).map(|i| ((i as f64) * 0.01).sin()).collect();
    let mut library = ReferenceLibrary::new();
    library.insert(Sequence::new(
        SequenceRole::Reference,
        TestType::parse("stand-and-sit").unwrap(),
        TrackingModel::Generic,
        heights
            .iter()
            .map(|&h| LandmarkFrame::from_xy(&[(0.4, h), (0.5, h + 0.1), (0.6, h)]))
            .collect(),
    ));
    let (_dir, app) = test_app_with_timeout(library, Duration::from_millis(1)).await;

    let (status, body) = post_recording(&app, recording("stand-and-sit", "slow-1", &heights)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT, "body: {}", body);

    // The first analysis is still running on the blocking pool
    let (status, body) = post_recording(&app, recording("stand-and-sit", "slow-1", &heights)).await;
    assert_eq!(status, StatusCode::CONFLICT, "body: {}", body);

    let (_, health) = get(&app, "/health").await;
    assert_eq!(health["in_flight"], 1);
    assert!(health["last_error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_landmark_free_frames_are_dropped_and_reported() {
    let (_dir, app) = stand_and_sit_app().await;
    let mut body = recording("stand-and-sit", "gaps", &LIVE);
    let frames = body["liveSequence"].as_array_mut().unwrap();
    frames.insert(3, json!([]));
    frames.insert(7, json!([]));

    let (status, created) = post_recording(&app, body).await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", created);
    assert_eq!(created["framesSeen"], 14);
    assert_eq!(created["framesDropped"], 2);
    assert_eq!(created["liveLen"], 12);

    let (_, listed) = get(&app, "/dtw/sessions/stand-and-sit").await;
    assert_eq!(listed[0]["framesDropped"], 2);
}
