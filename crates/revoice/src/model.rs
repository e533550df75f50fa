//! Resolution of pretrained model artifacts.
//!
//! Models live under a local store directory, one subdirectory per model
//! holding `config.json` and `model.safetensors`. Known model names are
//! fetched from their Hugging Face repos on first use; nothing is
//! re-validated once the files exist on disk (no checksums — a partial
//! download looks present on the next run, matching the original pipeline).

use std::fs;
use std::path::{Path, PathBuf};

use hf_hub::api::sync::Api;

use crate::error::Error;
use crate::Result;

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Neural codec signature file expected alongside the model directories.
pub const ENCODEC_SIGNATURE_FILE: &str = "encodec_4cb2048_giga.th";

/// Allow-list of model names the server knows how to download.
fn remote_repo(name: &str) -> Option<&'static str> {
    match name {
        "VoiceCraft_830M_TTSEnhanced" => Some("pyp1/VoiceCraft_830M_TTSEnhanced"),
        "VoiceCraft_gigaHalfLibri330M_TTSEnhanced_max16s" => {
            Some("pyp1/VoiceCraft_gigaHalfLibri330M_TTSEnhanced_max16s")
        }
        _ => None,
    }
}

/// A resolved model directory with both artifact files present.
#[derive(Debug, Clone)]
pub struct ModelDir {
    pub name: String,
    pub dir: PathBuf,
    pub config_path: PathBuf,
    pub weights_path: PathBuf,
}

/// Local store of pretrained models, typically `./pretrained_models`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the codec signature file used by the audio tokenizer.
    pub fn encodec_signature(&self) -> PathBuf {
        self.root.join(ENCODEC_SIGNATURE_FILE)
    }

    /// List locally present models: subdirectory names of the store root,
    /// lexicographically sorted. Plain files are never listed.
    pub fn available_models(&self) -> Result<Vec<String>> {
        let mut models = Vec::new();
        let entries =
            fs::read_dir(&self.root).map_err(|e| Error::io("list models directory", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("list models directory", e))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| Error::io("stat model entry", e))?
                .is_dir();
            if is_dir {
                models.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        models.sort();
        Ok(models)
    }

    /// Resolve a model by name, downloading `config.json` and
    /// `model.safetensors` on first use. Unknown names fail before any
    /// network traffic.
    pub fn ensure_model(&self, name: &str) -> Result<ModelDir> {
        let dir = self.root.join(name);
        let config_path = dir.join(CONFIG_FILE);
        let weights_path = dir.join(WEIGHTS_FILE);

        if !(config_path.is_file() && weights_path.is_file()) {
            let repo_id =
                remote_repo(name).ok_or_else(|| Error::UnsupportedModel(name.to_string()))?;
            fs::create_dir_all(&dir).map_err(|e| Error::io("create model directory", e))?;

            tracing::info!(model = name, repo = repo_id, "downloading model artifacts");
            let api = Api::new().map_err(|e| Error::Download {
                file: name.to_string(),
                source: e,
            })?;
            let repo = api.model(repo_id.to_string());
            for (file, target) in [(CONFIG_FILE, &config_path), (WEIGHTS_FILE, &weights_path)] {
                if target.is_file() {
                    continue;
                }
                let cached = repo.get(file).map_err(|e| Error::Download {
                    file: format!("{repo_id}/{file}"),
                    source: e,
                })?;
                fs::copy(&cached, target).map_err(|e| Error::io("copy model artifact", e))?;
            }
        }

        Ok(ModelDir {
            name: name.to_string(),
            dir,
            config_path,
            weights_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn available_models_sorted_directories_only() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("zeta")).unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::write(dir.path().join("stray.txt"), b"not a model").unwrap();

        let store = ModelStore::new(dir.path());
        let models = store.available_models().unwrap();
        assert_eq!(models, vec!["alpha", "zeta"]);
    }

    #[test]
    fn unknown_model_fails_without_touching_network() {
        let dir = tempdir().expect("tempdir");
        let store = ModelStore::new(dir.path());
        let err = store.ensure_model("NotARealModel").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported model: NotARealModel");
    }

    #[test]
    fn present_artifacts_skip_resolution() {
        // A directory with both files is accepted even for names outside the
        // allow-list: presence is the only check.
        let dir = tempdir().expect("tempdir");
        let model_dir = dir.path().join("LocalOnly");
        fs::create_dir(&model_dir).unwrap();
        fs::write(model_dir.join(CONFIG_FILE), b"{}").unwrap();
        fs::write(model_dir.join(WEIGHTS_FILE), b"").unwrap();

        let store = ModelStore::new(dir.path());
        let resolved = store.ensure_model("LocalOnly").unwrap();
        assert_eq!(resolved.name, "LocalOnly");
        assert!(resolved.config_path.is_file());
        assert!(resolved.weights_path.is_file());
    }
}
