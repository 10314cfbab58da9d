use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Default deskforge data directory: ~/.deskforge
pub fn data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".deskforge"))
}

/// Load configuration.
///
/// Priority: `~/.deskforge/config.toml`, then `./config.toml`, then
/// built-in defaults; `DESKFORGE_*` environment variables override the file
/// on top.
pub fn load_default() -> anyhow::Result<AppConfig> {
    let data_dir = data_dir()?;
    let home_config = data_dir.join("config.toml");
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if home_config.exists() {
        toml::from_str(&std::fs::read_to_string(&home_config)?)?
    } else if local_config.exists() {
        toml::from_str(&std::fs::read_to_string(local_config)?)?
    } else {
        AppConfig::default()
    };

    if cfg.queue.checkpoint_path.is_none() {
        cfg.queue.checkpoint_path = Some(data_dir.join("queue.json").to_string_lossy().to_string());
    }
    if cfg.library.store_path.is_none() {
        cfg.library.store_path =
            Some(data_dir.join("library.json").to_string_lossy().to_string());
    }
    if cfg
        .logging
        .directory
        .as_ref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }

    // Environment overrides (highest priority).
    if let Ok(v) = std::env::var("DESKFORGE_WORKSPACE_ROOT") {
        if !v.trim().is_empty() {
            cfg.workspace.root = v;
        }
    }
    if let Ok(v) = std::env::var("DESKFORGE_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }
    if let Ok(v) = std::env::var("DESKFORGE_EMBEDDING_URL") {
        if !v.trim().is_empty() {
            cfg.library.embedding.base_url = v;
        }
    }

    cfg.workspace.root = shellexpand::tilde(&cfg.workspace.root).to_string();

    Ok(cfg)
}
