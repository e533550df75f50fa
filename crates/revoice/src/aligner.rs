//! Driver for the external forced-aligner binary.
//!
//! The aligner is invoked once per voice directory and its CSV output is
//! cached by presence: if the file exists it is trusted, regardless of
//! whether the transcript has changed since (a filename-keyed cache, kept
//! from the original pipeline).

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::Error;
use crate::Result;

/// Configuration for one aligner invocation.
///
/// Platform quirks such as the phonemizer's espeak library location are
/// expressed here and applied to the spawned process only; the server never
/// mutates its own environment.
#[derive(Debug, Clone)]
pub struct AlignerConfig {
    /// The aligner executable, e.g. `mfa`.
    pub command: String,
    /// Pronunciation dictionary name passed to the aligner.
    pub dictionary: String,
    /// Acoustic model name passed to the aligner.
    pub acoustic_model: String,
    /// Worker count for the aligner's own parallelism.
    pub num_jobs: usize,
    /// espeak shared library for the phonemizer, when the default lookup
    /// does not apply (Windows installs).
    pub espeak_library: Option<PathBuf>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            command: "mfa".to_string(),
            dictionary: "english_us_arpa".to_string(),
            acoustic_model: "english_us_arpa".to_string(),
            num_jobs: 1,
            espeak_library: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForcedAligner {
    config: AlignerConfig,
}

impl ForcedAligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }

    /// Path of the cached alignment table for a voice.
    pub fn alignment_path(voice_dir: &Path, base_name: &str) -> PathBuf {
        voice_dir.join("mfa").join(format!("{base_name}.csv"))
    }

    /// Ensure an alignment table exists for the voice directory, running the
    /// aligner if it does not. Returns the table's path.
    pub fn ensure_alignment(&self, voice_dir: &Path, base_name: &str) -> Result<PathBuf> {
        let mfa_dir = voice_dir.join("mfa");
        std::fs::create_dir_all(&mfa_dir).map_err(|e| Error::io("create mfa directory", e))?;

        let alignment_file = Self::alignment_path(voice_dir, base_name);
        if alignment_file.is_file() {
            tracing::info!(path = %alignment_file.display(), "alignment file already exists, skipping alignment");
            return Ok(alignment_file);
        }

        tracing::info!(voice_dir = %voice_dir.display(), "preparing alignment");
        let mut command = Command::new(&self.config.command);
        command
            .arg("align")
            .arg("-v")
            .arg("--clean")
            .arg("-j")
            .arg(self.config.num_jobs.to_string())
            .arg("--output_format")
            .arg("csv")
            .arg(voice_dir)
            .arg(&self.config.dictionary)
            .arg(&self.config.acoustic_model)
            .arg(&mfa_dir);
        if let Some(espeak) = &self.config.espeak_library {
            // Scoped to the child process, not the server.
            command.env("PHONEMIZER_ESPEAK_LIBRARY", espeak);
        }

        let status = command
            .status()
            .map_err(|e| Error::Aligner(format!("failed to spawn {}: {e}", self.config.command)))?;
        if !status.success() {
            return Err(Error::Aligner(format!(
                "{} exited with {status}",
                self.config.command
            )));
        }
        if !alignment_file.is_file() {
            return Err(Error::MissingAlignment(alignment_file));
        }

        tracing::info!("alignment completed");
        Ok(alignment_file)
    }
}
