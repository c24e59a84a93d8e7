use anyhow::{Context, Result};
use std::path::Path;

use hydra_classifiers::config::ClassificationConfig;

pub fn validate_tsv_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") => {}
        _ => anyhow::bail!("File must have a .tsv extension: {}", path.display()),
    }

    if !path.is_file() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    Ok(())
}

/// Load a classification configuration from a JSON file.
pub fn load_classification_config<P: AsRef<Path>>(path: P) -> Result<ClassificationConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: ClassificationConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}
