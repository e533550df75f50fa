use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the serving pipeline.
///
/// The first two variants are caller-recoverable: the cutoff or the
/// transcript needs adjusting. Their display strings are part of the HTTP
/// contract and must stay stable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No suitable word found within the desired time frame.")]
    NoWordInTimeFrame,

    #[error("Prompt end word not found in the transcript.")]
    PromptEndWordNotFound,

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("invalid alignment row {line}: {message}")]
    InvalidAlignment { line: usize, message: String },

    #[error("alignment table error while {context}: {source}")]
    Csv {
        context: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("download failed for {file}: {source}")]
    Download {
        file: String,
        #[source]
        source: hf_hub::api::sync::ApiError,
    },

    #[error("WAV error while {context}: {source}")]
    Wav {
        context: &'static str,
        #[source]
        source: hound::Error,
    },

    #[error("forced aligner failed: {0}")]
    Aligner(String),

    #[error("aligner produced no output at {}", .0.display())]
    MissingAlignment(PathBuf),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl Error {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn csv(context: &'static str, source: csv::Error) -> Self {
        Self::Csv { context, source }
    }

    pub(crate) fn wav(context: &'static str, source: hound::Error) -> Self {
        Self::Wav { context, source }
    }

    /// Whether the failure is fixable by the caller adjusting the request,
    /// as opposed to an infrastructure problem.
    pub fn is_caller_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoWordInTimeFrame | Self::PromptEndWordNotFound | Self::UnsupportedModel(_)
        )
    }
}
