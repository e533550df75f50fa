//! Seam to the external generative model.
//!
//! Token generation, the neural codec, and the phonemizer all live in a
//! pre-built inference tool outside this repository. The server talks to it
//! through [`SpeechGenerator`]; production uses [`ProcessGenerator`], tests
//! inject stubs.

use std::path::PathBuf;
use std::process::Command;

use crate::error::Error;
use crate::model::ModelDir;
use crate::prompt::CODEC_AUDIO_SAMPLE_RATE;
use crate::Result;

/// Codec token rate, frames per second.
pub const CODEC_FRAME_RATE: u32 = 50;

/// Codec token ids the sampler treats as silence.
pub const SILENCE_TOKENS: [u32; 3] = [1388, 1898, 131];

/// Compute device for the external inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    /// Parse the request's device field, case-insensitively. Invalid values
    /// fall back to CPU with a warning; an absent field defaults to CPU
    /// (the external tool owns GPU discovery).
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None => Self::Cpu,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "cpu" => Self::Cpu,
                "cuda" => Self::Cuda,
                other => {
                    tracing::warn!(device = other, "invalid device specified, defaulting to CPU");
                    Self::Cpu
                }
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }
}

/// Sampling options forwarded to the external sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
    pub top_k: i64,
    pub top_p: f64,
    pub temperature: f64,
    pub stop_repetition: i64,
    pub kvcache: i64,
    pub sample_batch_size: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            top_k: 0,
            top_p: 0.8,
            temperature: 1.0,
            stop_repetition: 3,
            kvcache: 1,
            sample_batch_size: 4,
        }
    }
}

/// Everything one inference call needs.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// The uploaded reference audio on disk.
    pub audio_path: PathBuf,
    /// Verified transcript prefix plus target text.
    pub prompt: String,
    /// Sample offset of the prompt's end at the codec rate.
    pub prompt_end_frame: usize,
    /// Resolved model artifacts.
    pub model: ModelDir,
    /// Codec signature file for the audio tokenizer.
    pub encodec_signature: PathBuf,
    pub device: Device,
    pub decode: DecodeConfig,
}

/// Mono audio returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// The external model's sampling routine. One blocking, compute-bound call
/// per request; no timeout and no retry (the original pipeline has neither).
pub trait SpeechGenerator: Send + Sync {
    fn generate(&self, request: &InferenceRequest) -> Result<GeneratedAudio>;
}

/// Production generator: shells out to the pre-built inference tool and
/// reads back the WAV it produces.
#[derive(Debug, Clone)]
pub struct ProcessGenerator {
    command: String,
}

impl ProcessGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl SpeechGenerator for ProcessGenerator {
    fn generate(&self, request: &InferenceRequest) -> Result<GeneratedAudio> {
        let workdir = tempfile::tempdir().map_err(|e| Error::io("create inference tempdir", e))?;
        let output_path = workdir.path().join("generated.wav");

        let silence_tokens = SILENCE_TOKENS
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut command = Command::new(&self.command);
        command
            .arg("--model-dir")
            .arg(&request.model.dir)
            .arg("--codec-signature")
            .arg(&request.encodec_signature)
            .arg("--audio")
            .arg(&request.audio_path)
            .arg("--prompt")
            .arg(&request.prompt)
            .arg("--prompt-end-frame")
            .arg(request.prompt_end_frame.to_string())
            .arg("--device")
            .arg(request.device.as_str())
            .arg("--top-k")
            .arg(request.decode.top_k.to_string())
            .arg("--top-p")
            .arg(request.decode.top_p.to_string())
            .arg("--temperature")
            .arg(request.decode.temperature.to_string())
            .arg("--stop-repetition")
            .arg(request.decode.stop_repetition.to_string())
            .arg("--kvcache")
            .arg(request.decode.kvcache.to_string())
            .arg("--sample-batch-size")
            .arg(request.decode.sample_batch_size.to_string())
            .arg("--codec-audio-sr")
            .arg(CODEC_AUDIO_SAMPLE_RATE.to_string())
            .arg("--codec-sr")
            .arg(CODEC_FRAME_RATE.to_string())
            .arg("--silence-tokens")
            .arg(silence_tokens)
            .arg("--output")
            .arg(&output_path);

        tracing::info!(command = %self.command, model = %request.model.name, "calling external inference");
        let output = command
            .output()
            .map_err(|e| Error::Inference(format!("failed to spawn {}: {e}", self.command)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Inference(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let (samples, sample_rate) = crate::audio::read_wav(&output_path)?;
        tracing::info!(samples = samples.len(), sample_rate, "inference completed");
        Ok(GeneratedAudio {
            samples,
            sample_rate,
        })
    }
}
