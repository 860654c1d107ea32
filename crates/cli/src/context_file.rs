//! YAML persistence for the shared context.
//!
//! The core keeps the shared context in memory only. Between CLI runs it is saved to a
//! single YAML file so that the next form can be prefilled from the last one.

use anyhow::Context;
use medrec_core::SharedContext;
use std::fs;
use std::path::Path;

/// Loads the shared context, returning an empty one if the file does not exist yet.
pub fn load(path: &Path) -> anyhow::Result<SharedContext> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no saved shared context, starting empty");
        return Ok(SharedContext::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read shared context {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse shared context {}", path.display()))
}

/// Saves the shared context, replacing the file atomically.
pub fn save(path: &Path, ctx: &SharedContext) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(ctx).context("failed to serialise shared context")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, yaml).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
