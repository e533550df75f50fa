//! Router-level tests driving the real request pipeline with a stubbed
//! generator and pre-seeded alignment caches, so no external binaries run.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use revoice::aligner::{AlignerConfig, ForcedAligner};
use revoice::{GeneratedAudio, InferenceRequest, ModelStore, SpeechGenerator};
use revoice_cli::server::routes::create_router;
use revoice_cli::server::state::AppState;

const BOUNDARY: &str = "revoice-test-boundary";

const ALIGNMENT_CSV: &str = "\
Begin,End,Label,Type,Speaker
0.0,0.5,hello,words,s
0.5,1.2,world,words,s
";

struct StubGenerator;

impl SpeechGenerator for StubGenerator {
    fn generate(&self, _request: &InferenceRequest) -> revoice::Result<GeneratedAudio> {
        Ok(GeneratedAudio {
            samples: vec![0.0, 0.25, -0.25, 0.5],
            sample_rate: 16_000,
        })
    }
}

fn test_app(root: &Path) -> Router {
    let voices_dir = root.join("voices");
    let models_dir = root.join("pretrained_models");
    std::fs::create_dir_all(&voices_dir).unwrap();
    std::fs::create_dir_all(&models_dir).unwrap();

    // The aligner command is deliberately bogus: every test either hits the
    // alignment cache or fails before alignment, and a cache miss would show
    // up as a generic pipeline failure.
    let aligner = ForcedAligner::new(AlignerConfig {
        command: "definitely-not-a-real-aligner".to_string(),
        ..AlignerConfig::default()
    });
    let state = AppState::new(
        Arc::new(StubGenerator),
        aligner,
        ModelStore::new(models_dir),
        voices_dir,
        1,
    );
    create_router(state)
}

fn seed_alignment_cache(root: &Path, stem: &str) {
    let mfa_dir = root.join("voices").join(stem).join("mfa");
    std::fs::create_dir_all(&mfa_dir).unwrap();
    std::fs::write(mfa_dir.join(format!("{stem}.csv")), ALIGNMENT_CSV).unwrap();
}

fn seed_local_model(root: &Path, name: &str) {
    let model_dir = root.join("pretrained_models").join(name);
    std::fs::create_dir_all(&model_dir).unwrap();
    std::fs::write(model_dir.join("config.json"), b"{}").unwrap();
    std::fs::write(model_dir.join("model.safetensors"), b"").unwrap();
}

fn multipart_body(fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_generate(
    app: Router,
    fields: &[(&str, Option<&str>, &[u8])],
) -> (StatusCode, Option<String>, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields)))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, bytes.to_vec())
}

fn message_of(body: &[u8]) -> String {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap();
    value["message"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn models_endpoint_lists_sorted_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path());
    let models_dir = tmp.path().join("pretrained_models");
    std::fs::create_dir(models_dir.join("zeta")).unwrap();
    std::fs::create_dir(models_dir.join("alpha")).unwrap();
    std::fs::write(models_dir.join("stray.txt"), b"not a model").unwrap();

    let response = app
        .oneshot(Request::builder().uri("/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["models"], serde_json::json!(["alpha", "zeta"]));
}

#[tokio::test]
async fn missing_model_name_is_reported_in_the_body() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path());

    let (status, _, body) = post_generate(
        app,
        &[
            ("time", None, b"1.0".as_slice()),
            ("audio", Some("sample.wav"), b"fake-wav".as_slice()),
            ("transcript", Some("sample.txt"), b"hello world".as_slice()),
        ],
    )
    .await;
    // Application-level failures keep a 200 status; the body carries the
    // reason.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message_of(&body), "No model name provided.");
}

#[tokio::test]
async fn early_cutoff_fails_via_cached_alignment() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path());
    seed_alignment_cache(tmp.path(), "sample");

    // The bogus aligner command would fail if the cache were ignored, which
    // would surface as the generic pipeline message instead of this one.
    let (status, _, body) = post_generate(
        app,
        &[
            ("time", None, b"0.1".as_slice()),
            ("audio", Some("sample.wav"), b"fake-wav".as_slice()),
            ("transcript", Some("sample.txt"), b"hello world there".as_slice()),
            ("model_name", None, b"LocalOnly".as_slice()),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        message_of(&body),
        "No suitable word found within the desired time frame."
    );
}

#[tokio::test]
async fn generate_streams_wav_bytes_when_not_saving() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path());
    seed_alignment_cache(tmp.path(), "sample");
    seed_local_model(tmp.path(), "LocalOnly");

    let (status, content_type, body) = post_generate(
        app,
        &[
            ("time", None, b"1.3".as_slice()),
            ("target_text", None, b"entirely new words".as_slice()),
            ("audio", Some("sample.wav"), b"fake-wav".as_slice()),
            ("transcript", Some("sample.txt"), b"hello world there".as_slice()),
            ("model_name", None, b"LocalOnly".as_slice()),
            ("save_to_file", None, b"false".as_slice()),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("audio/wav"));
    assert_eq!(&body[..4], b"RIFF");
}

#[tokio::test]
async fn generate_saves_wav_file_by_default() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path());
    seed_alignment_cache(tmp.path(), "sample");
    seed_local_model(tmp.path(), "LocalOnly");
    let output_dir = tmp.path().join("out");
    std::fs::create_dir_all(&output_dir).unwrap();

    let (status, _, body) = post_generate(
        app,
        &[
            ("time", None, b"1.3".as_slice()),
            ("target_text", None, b"entirely new words".as_slice()),
            ("audio", Some("sample.wav"), b"fake-wav".as_slice()),
            ("transcript", Some("sample.txt"), b"hello world there".as_slice()),
            ("model_name", None, b"LocalOnly".as_slice()),
            (
                "output_path",
                None,
                output_dir.to_str().unwrap().as_bytes(),
            ),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["message"], "Audio generated successfully.");

    let output_file = output_dir.join("sample_generated.wav");
    assert_eq!(
        value["output_file"].as_str().unwrap(),
        output_file.to_str().unwrap()
    );
    assert!(output_file.is_file());
}

#[tokio::test]
async fn second_request_reuses_uploaded_voice_directory() {
    let tmp = tempfile::tempdir().unwrap();
    seed_alignment_cache(tmp.path(), "sample");
    seed_local_model(tmp.path(), "LocalOnly");
    let output_dir = tmp.path().join("out");
    std::fs::create_dir_all(&output_dir).unwrap();

    let fields: Vec<(&str, Option<&str>, &[u8])> = vec![
        ("time", None, b"1.3".as_slice()),
        ("audio", Some("sample.wav"), b"fake-wav".as_slice()),
        ("transcript", Some("sample.txt"), b"hello world".as_slice()),
        ("model_name", None, b"LocalOnly".as_slice()),
        (
            "output_path",
            None,
            output_dir.to_str().unwrap().as_bytes(),
        ),
    ];

    // Same basename twice: both requests must ride the seeded alignment
    // cache (the bogus aligner would otherwise fail the second as much as
    // the first).
    for _ in 0..2 {
        let app = test_app(tmp.path());
        let (status, _, body) = post_generate(app, &fields).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message_of(&body), "Audio generated successfully.");
    }
}
