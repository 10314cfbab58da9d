//! Deskforge provider implementations.
//!
//! Concrete backends for the trait seams in `deskforge-core`: a local
//! filesystem workspace, a shell command runner, a git CLI wrapper, a
//! file-backed knowledge/checkpoint store, and an embedding-indexed
//! developer library.

pub mod library;
pub mod shell;
pub mod store;
pub mod vcs;
pub mod workspace;

use std::sync::Arc;
use std::time::Duration;

use deskforge_core::config::AppConfig;
use deskforge_core::tools::ToolRegistry;
use deskforge_core::tools::validator::CommandValidator;
use deskforge_core::tools::RetryConfig;

use library::{LocalLibrary, OllamaEmbedding};
use shell::ShellRunner;
use store::FileStore;
use vcs::GitVcs;
use workspace::LocalWorkspace;

/// Wire the default local providers into a [`ToolRegistry`] from config.
pub fn build_registry(cfg: &AppConfig) -> anyhow::Result<(ToolRegistry, Arc<FileStore>)> {
    let root = cfg.workspace.root.clone();

    let store_path = cfg
        .library
        .store_path
        .clone()
        .unwrap_or_else(|| "library.json".to_string());
    let embedder = Arc::new(OllamaEmbedding::new(
        cfg.library.embedding.base_url.clone(),
        cfg.library.embedding.model.clone(),
        cfg.library.embedding.dimension,
    ));
    let library = Arc::new(LocalLibrary::open(store_path, embedder, cfg.library.min_score)?);

    let data_dir = deskforge_core::config::data_dir()?;
    let store = match &cfg.queue.checkpoint_path {
        Some(path) => Arc::new(FileStore::new(data_dir).with_checkpoint_path(path)),
        None => Arc::new(FileStore::new(data_dir)),
    };

    let validator = CommandValidator::with_extra_patterns(&cfg.command.blocked_patterns)?;

    let registry = ToolRegistry::new(
        Arc::new(LocalWorkspace::new(root.clone())),
        Arc::new(ShellRunner::new(Duration::from_secs(cfg.command.timeout_secs))),
        Arc::new(GitVcs::new(root)),
        store.clone(),
        library,
    )
    .with_validator(validator)
    .with_retry_config(RetryConfig::default());

    Ok((registry, store))
}
