//! HTTP request handlers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use revoice::{alignment, audio, DecodeConfig, Device, Error, InferenceRequest};

use crate::server::state::AppState;

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Model listing
// ============================================================================

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Every application-level failure answers with a 200 JSON body carrying a
/// `message` field; callers distinguish success by the body shape, not the
/// status code.
fn message_response(message: impl Into<String>) -> Response {
    Json(MessageResponse {
        message: message.into(),
    })
    .into_response()
}

pub async fn list_models(State(state): State<AppState>) -> Response {
    match state.models.available_models() {
        Ok(models) => Json(ModelsResponse { models }).into_response(),
        Err(e) => {
            tracing::error!(error = ?e, "failed to list models");
            message_response("Failed to list available models.")
        }
    }
}

// ============================================================================
// Generation
// ============================================================================

struct GenerateForm {
    time: f64,
    target_text: String,
    audio_filename: String,
    audio_bytes: Vec<u8>,
    transcript_bytes: Vec<u8>,
    save_to_file: bool,
    output_path: PathBuf,
    device: Option<String>,
    model_name: String,
    decode: DecodeConfig,
}

#[derive(Default)]
struct PartialForm {
    time: Option<f64>,
    target_text: String,
    audio: Option<(String, Vec<u8>)>,
    transcript: Option<Vec<u8>>,
    save_to_file: Option<bool>,
    output_path: Option<PathBuf>,
    device: Option<String>,
    model_name: Option<String>,
    decode: DecodeConfig,
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, String> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| format!("Invalid value for field '{name}'."))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("Invalid value for field '{name}'.")),
    }
}

/// Keep only the final path component of an uploaded filename so a crafted
/// name cannot escape the voices directory.
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = Path::new(raw).file_name()?.to_string_lossy().into_owned();
    if name.is_empty() || name == ".." {
        None
    } else {
        Some(name)
    }
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

impl GenerateForm {
    async fn from_multipart(multipart: &mut Multipart) -> Result<Self, String> {
        let mut form = PartialForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| format!("Malformed multipart request: {e}."))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "audio" => {
                    let filename = field
                        .file_name()
                        .and_then(sanitize_filename)
                        .ok_or_else(|| "Audio upload is missing a filename.".to_string())?;
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| format!("Failed to read audio upload: {e}."))?;
                    form.audio = Some((filename, bytes.to_vec()));
                }
                "transcript" => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| format!("Failed to read transcript upload: {e}."))?;
                    form.transcript = Some(bytes.to_vec());
                }
                other => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| format!("Failed to read field '{other}': {e}."))?;
                    match other {
                        "time" => form.time = Some(parse_number("time", &text)?),
                        "target_text" => form.target_text = text,
                        "save_to_file" => {
                            form.save_to_file = Some(parse_bool("save_to_file", &text)?)
                        }
                        "output_path" => form.output_path = Some(PathBuf::from(text)),
                        "device" => form.device = Some(text),
                        "model_name" => form.model_name = Some(text),
                        "top_k" => form.decode.top_k = parse_number("top_k", &text)?,
                        "top_p" => form.decode.top_p = parse_number("top_p", &text)?,
                        "temperature" => {
                            form.decode.temperature = parse_number("temperature", &text)?
                        }
                        "stop_repetition" => {
                            form.decode.stop_repetition = parse_number("stop_repetition", &text)?
                        }
                        "kvcache" => form.decode.kvcache = parse_number("kvcache", &text)?,
                        "sample_batch_size" => {
                            form.decode.sample_batch_size =
                                parse_number("sample_batch_size", &text)?
                        }
                        _ => {}
                    }
                }
            }
        }

        let time = form.time.ok_or("Missing required field: time.")?;
        let (audio_filename, audio_bytes) =
            form.audio.ok_or("Missing required field: audio.")?;
        let transcript_bytes = form
            .transcript
            .ok_or("Missing required field: transcript.")?;
        let model_name = match form.model_name {
            Some(name) if !name.is_empty() => name,
            _ => return Err("No model name provided.".to_string()),
        };

        Ok(GenerateForm {
            time,
            target_text: form.target_text,
            audio_filename,
            audio_bytes,
            transcript_bytes,
            save_to_file: form.save_to_file.unwrap_or(true),
            output_path: form.output_path.unwrap_or_else(|| PathBuf::from(".")),
            device: form.device,
            model_name,
            decode: form.decode,
        })
    }
}

struct PreparedRequest {
    request: InferenceRequest,
    stem: String,
}

/// RECEIVED -> FILES_SAVED -> ALIGNED -> PROMPT_BUILT. Everything here is
/// blocking (file writes, the aligner subprocess, a possible first-use model
/// download) and runs inside `spawn_blocking`.
fn prepare_request(state: &AppState, form: &GenerateForm) -> Result<PreparedRequest, Error> {
    let stem = file_stem(&form.audio_filename);
    let voice_dir = state.voices_dir.join(&stem);
    std::fs::create_dir_all(&voice_dir).map_err(io_error("create voice directory"))?;
    tracing::debug!(voice_dir = %voice_dir.display(), "created voice folder");

    // Voice identity is keyed by the uploaded filename: a repeated upload
    // under the same name overwrites the previous recording and transcript.
    let audio_path = voice_dir.join(&form.audio_filename);
    std::fs::write(&audio_path, &form.audio_bytes).map_err(io_error("save uploaded audio"))?;
    let transcript_path = voice_dir.join(format!("{stem}.txt"));
    std::fs::write(&transcript_path, &form.transcript_bytes)
        .map_err(io_error("save uploaded transcript"))?;

    let alignment_file = state.aligner.ensure_alignment(&voice_dir, &stem)?;
    let entries = alignment::read_alignment(&alignment_file)?;

    let transcript_text = String::from_utf8_lossy(&form.transcript_bytes);
    let splice = revoice::splice_prompt(
        &entries,
        transcript_text.trim(),
        form.time,
        &form.target_text,
    )?;
    tracing::info!(prompt = %splice.prompt_text, frame = splice.prompt_end_frame, "final prompt built");

    let model = state.models.ensure_model(&form.model_name)?;

    Ok(PreparedRequest {
        request: InferenceRequest {
            audio_path,
            prompt: splice.prompt_text,
            prompt_end_frame: splice.prompt_end_frame,
            model,
            encodec_signature: state.models.encodec_signature(),
            device: Device::parse(form.device.as_deref()),
            decode: form.decode.clone(),
        },
        stem,
    })
}

/// Map a pipeline error onto the response contract: caller-recoverable
/// failures surface their exact message, infrastructure failures are logged
/// in full and answered generically.
fn error_response(error: Error) -> Response {
    if error.is_caller_recoverable() {
        tracing::error!("{error}");
        message_response(error.to_string())
    } else {
        tracing::error!(error = ?error, "generation pipeline failed");
        message_response("An error occurred during audio generation.")
    }
}

fn io_error(context: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |source| Error::Io { context, source }
}

pub async fn generate(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    tracing::info!("received request to generate audio");

    let form = match GenerateForm::from_multipart(&mut multipart).await {
        Ok(form) => form,
        Err(message) => {
            tracing::error!("{message}");
            return message_response(message);
        }
    };

    // Files, alignment, prompt splicing, and model resolution.
    let prep_state = state.clone();
    let (prepared, form) = match tokio::task::spawn_blocking(move || {
        let prepared = prepare_request(&prep_state, &form)?;
        Ok::<_, Error>((prepared, form))
    })
    .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => return error_response(e),
        Err(e) => {
            tracing::error!(error = ?e, "preparation task panicked");
            return message_response("An error occurred during audio generation.");
        }
    };

    // Admission gate: inference is compute-bound and blocking, so requests
    // queue for a permit instead of all hitting the device at once.
    let permit = match state.inference_permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return message_response("Server is shutting down."),
    };

    let generator = Arc::clone(&state.generator);
    let request = prepared.request;
    tracing::info!(device = request.device.as_str(), "calling inference");
    let generated = match tokio::task::spawn_blocking(move || {
        let _permit = permit;
        generator.generate(&request)
    })
    .await
    {
        Ok(Ok(audio)) => audio,
        Ok(Err(e)) => return error_response(e),
        Err(e) => {
            tracing::error!(error = ?e, "inference task panicked");
            return message_response("An error occurred during audio generation.");
        }
    };

    if form.save_to_file {
        let output_file = form
            .output_path
            .join(format!("{}_generated.wav", prepared.stem));
        if let Err(e) = audio::write_wav(&output_file, &generated.samples, generated.sample_rate) {
            return error_response(e);
        }
        tracing::info!(path = %output_file.display(), "generated audio saved");
        Json(serde_json::json!({
            "message": "Audio generated successfully.",
            "output_file": output_file.to_string_lossy(),
        }))
        .into_response()
    } else {
        let bytes = match audio::wav_bytes(&generated.samples, generated.sample_rate) {
            Ok(bytes) => bytes,
            Err(e) => return error_response(e),
        };
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "audio/wav".parse().unwrap());
        (StatusCode::OK, headers, Body::from(bytes)).into_response()
    }
}
