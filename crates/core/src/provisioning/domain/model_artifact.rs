use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, EXPRESSION_MODEL_NAME, EXPRESSION_MODEL_URL,
    LANDMARK_MODEL_NAME, LANDMARK_MODEL_URL,
};

/// A named model file and where to download it from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    #[serde(alias = "url")]
    pub source_uri: String,
}

impl ModelArtifact {
    pub fn new(name: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_uri: source_uri.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The models the default capability set needs, in download order.
pub fn default_artifacts() -> Vec<ModelArtifact> {
    vec![
        ModelArtifact::new(DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL),
        ModelArtifact::new(LANDMARK_MODEL_NAME, LANDMARK_MODEL_URL),
        ModelArtifact::new(EXPRESSION_MODEL_NAME, EXPRESSION_MODEL_URL),
    ]
}

/// Read a JSON array of `{ "name": ..., "source_uri": ... }` objects.
pub fn read_manifest(path: &Path) -> Result<Vec<ModelArtifact>, ManifestError> {
    let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ManifestError::Parse {
        path: path.display().to_string(),
        source,
    })
}
