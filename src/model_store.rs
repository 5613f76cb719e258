use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::http_cache::app_cache_dir;
use crate::train::TrainedModelSet;

pub const ARTIFACT_VERSION: u32 = 1;
const MODELS_DIR: &str = "models";

/// Serialised `TrainedModelSet` with enough context to tell artifacts apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub generated_at: String,
    #[serde(default)]
    pub player_id: Option<u32>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    pub models: TrainedModelSet,
}

impl ModelArtifact {
    pub fn new(models: TrainedModelSet) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            player_id: None,
            player_name: None,
            season: None,
            models,
        }
    }
}

/// `<cache>/propcast/models/player_<id>.json`
pub fn default_model_path(player_id: u32) -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(MODELS_DIR).join(format!("player_{player_id}.json")))
}

pub fn save_artifact(path: &Path, artifact: &ModelArtifact) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(artifact).context("serialize model artifact")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, raw).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

pub fn load_artifact(path: &Path) -> Result<ModelArtifact> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let artifact: ModelArtifact =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    if artifact.version != ARTIFACT_VERSION {
        return Err(anyhow!(
            "unsupported model artifact version {} in {}",
            artifact.version,
            path.display()
        ));
    }
    Ok(artifact)
}
