//! Config and structure files in the working directory.

use anyhow::{Context, Result};
use orchestrator::{Config, Structure};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "cubewright.toml";
pub const STRUCTURE_FILE: &str = "structure.toml";

/// Load the config at `path`, or `cubewright.toml` in `dir`. A missing
/// default file means defaults; a missing explicit file is an error.
pub async fn load_config(dir: &Path, path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (dir.join(CONFIG_FILE), false),
    };

    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }

    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}

pub async fn load_structure(path: &Path) -> Result<Structure> {
    let content = tokio::fs::read_to_string(path).await.with_context(|| {
        format!(
            "Failed to read structure {} (run 'cubewright init' to create one)",
            path.display()
        )
    })?;
    let structure: Structure = toml::from_str(&content)
        .with_context(|| format!("Failed to parse structure {}", path.display()))?;
    structure
        .validate()
        .with_context(|| format!("Invalid structure {}", path.display()))?;
    Ok(structure)
}

/// Write the default config and the demo structure into `dir`. Existing
/// files are left alone unless `force` is set. Returns the files written.
pub async fn write_defaults(dir: &Path, force: bool) -> Result<Vec<PathBuf>> {
    let files = [
        (
            dir.join(CONFIG_FILE),
            toml::to_string_pretty(&Config::default())?,
        ),
        (
            dir.join(STRUCTURE_FILE),
            toml::to_string_pretty(&Structure::demo())?,
        ),
    ];

    let mut written = Vec::new();
    for (path, content) in files {
        if path.exists() && !force {
            println!("  {} already exists, skipped", path.display());
            continue;
        }
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
