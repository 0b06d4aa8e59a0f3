//! Init command for writing a starter config file.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use att_core::Secret;
use att_core::zone::DEFAULT_ZONE;
use serde::Serialize;

/// Settings written by `att init`. Everything else keeps its default.
#[derive(Debug, Serialize)]
struct StarterConfig {
    totp_secret: String,
    timezone: String,
}

/// Writes a config file at `path` holding a freshly generated secret.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn run<W: Write>(writer: &mut W, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists. Pass --force to replace it.",
            path.display()
        );
    }

    let starter = StarterConfig {
        totp_secret: Secret::generate().to_base32(),
        timezone: DEFAULT_ZONE.name().to_string(),
    };
    let content = toml::to_string_pretty(&starter).context("failed to serialize config")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "config written");

    writeln!(writer, "Config written to {}", path.display())?;
    writeln!(writer, "Run 'att totp show' to see the current code.")?;
    Ok(())
}
