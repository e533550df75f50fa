use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use revoice::aligner::{AlignerConfig, ForcedAligner};
use revoice::generator::ProcessGenerator;
use revoice::ModelStore;

use revoice_cli::server::routes::create_router;
use revoice_cli::server::state::AppState;

#[derive(Parser)]
#[command(name = "revoice")]
#[command(about = "HTTP serving layer for the VoiceCraft speech editing model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the generation server.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 8245)]
        port: u16,
        /// Root of the per-voice upload directories.
        #[arg(long, default_value = "./voices")]
        voices_dir: PathBuf,
        /// Root of the pretrained model store.
        #[arg(long, default_value = "./pretrained_models")]
        models_dir: PathBuf,
        /// Forced-aligner executable.
        #[arg(long, default_value = "mfa")]
        aligner_cmd: String,
        #[arg(long, default_value = "english_us_arpa")]
        dictionary: String,
        #[arg(long, default_value = "english_us_arpa")]
        acoustic_model: String,
        #[arg(long, default_value_t = 1)]
        aligner_jobs: usize,
        /// espeak shared library passed to the aligner's phonemizer
        /// (Windows installs ship their own copy).
        #[arg(long)]
        espeak_library: Option<PathBuf>,
        /// External inference executable.
        #[arg(long, default_value = "voicecraft-infer")]
        inference_cmd: String,
        /// How many inference calls may run at once.
        #[arg(long, default_value_t = 1)]
        max_concurrent_inferences: usize,
    },
    /// List locally available models.
    Models {
        #[arg(long, default_value = "./pretrained_models")]
        models_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            host,
            port,
            voices_dir,
            models_dir,
            aligner_cmd,
            dictionary,
            acoustic_model,
            aligner_jobs,
            espeak_library,
            inference_cmd,
            max_concurrent_inferences,
        } => {
            std::fs::create_dir_all(&voices_dir)?;
            std::fs::create_dir_all(&models_dir)?;

            let aligner = ForcedAligner::new(AlignerConfig {
                command: aligner_cmd,
                dictionary,
                acoustic_model,
                num_jobs: aligner_jobs,
                espeak_library,
            });
            let state = AppState::new(
                Arc::new(ProcessGenerator::new(inference_cmd)),
                aligner,
                ModelStore::new(models_dir),
                voices_dir,
                max_concurrent_inferences,
            );

            let app = create_router(state);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(addr, "revoice server listening");
            axum::serve(listener, app).await?;
        }
        Commands::Models { models_dir } => {
            let store = ModelStore::new(models_dir);
            for model in store.available_models()? {
                println!("{model}");
            }
        }
    }

    Ok(())
}
