//! Serving-side glue for the VoiceCraft speech editing model.
//!
//! The generative model, the neural audio codec, the phonemizer-based text
//! tokenizer, and the forced aligner are all external, pre-built components.
//! This crate provides everything around them: parsing the aligner's word
//! table, splicing a generation prompt out of a verified transcript prefix,
//! mapping timestamps to codec sample frames, resolving pretrained artifacts
//! from Hugging Face, and driving the external binaries.

pub mod aligner;
pub mod alignment;
pub mod audio;
pub mod error;
pub mod generator;
pub mod model;
pub mod prompt;

pub use alignment::AlignmentEntry;
pub use error::Error;
pub use generator::{DecodeConfig, Device, GeneratedAudio, InferenceRequest, SpeechGenerator};
pub use model::ModelStore;
pub use prompt::{prompt_end_frame, splice_prompt, PromptResult, CODEC_AUDIO_SAMPLE_RATE};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
