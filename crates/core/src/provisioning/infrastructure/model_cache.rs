use std::path::PathBuf;

use crate::provisioning::provision_models_use_case::ProvisioningError;

const APP_DIR: &str = "facelens";

/// Platform-specific model directory.
///
/// - macOS: `~/Library/Application Support/facelens/models/`
/// - Linux: `$XDG_CACHE_HOME/facelens/models/` or `~/.cache/facelens/models/`
/// - Windows: `%LOCALAPPDATA%/facelens/models/`
pub fn model_cache_dir() -> Result<PathBuf, ProvisioningError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR).join("models"))
            .ok_or(ProvisioningError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR).join("models"))
            .ok_or(ProvisioningError::NoCacheDir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_cache_dir_returns_path() {
        // Headless CI images may lack a home directory entirely
        if let Ok(path) = model_cache_dir() {
            assert!(path.ends_with("facelens/models"));
        }
    }
}
