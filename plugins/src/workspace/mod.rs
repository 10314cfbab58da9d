//! Local filesystem workspace.
//!
//! All paths are resolved against a single project root; attempts to escape
//! it are rejected before touching the filesystem. Search results are capped
//! to bound latency on large trees.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use deskforge_core::providers::{DirEntry, SearchHit, WorkspaceProvider};

pub const MAX_SEARCH_RESULTS: usize = 100;

const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules", ".cache"];

pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a project-relative path, rejecting absolute paths and any
    /// `..` traversal.
    fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(path);
        if rel.is_absolute() {
            anyhow::bail!("absolute paths are not allowed: {path}");
        }
        for component in rel.components() {
            if matches!(component, Component::ParentDir) {
                anyhow::bail!("path escapes the project root: {path}");
            }
        }
        Ok(self.root.join(rel))
    }

    fn relative_display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

/// Decided on the entry's own name only. Ancestors above the project root
/// are none of our business: a root living under a hidden directory must
/// still be walkable.
fn is_skipped(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .map(|s| SKIPPED_DIRS.contains(&s) || (s.starts_with('.') && s.len() > 1))
        .unwrap_or(false)
}

fn walk_files(dir: &Path, out: &mut Vec<PathBuf>, cap: usize) -> std::io::Result<()> {
    if out.len() >= cap {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if is_skipped(&entry.file_name()) {
            continue;
        }
        if path.is_dir() {
            walk_files(&path, out, cap)?;
        } else {
            out.push(path);
        }
        if out.len() >= cap {
            return Ok(());
        }
    }
    Ok(())
}

#[async_trait]
impl WorkspaceProvider for LocalWorkspace {
    async fn read_dir(&self, path: &str) -> anyhow::Result<Vec<DirEntry>> {
        let dir = self.resolve(path)?;
        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("cannot list directory: {path}"))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let meta = entry.metadata().await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: self.relative_display(&entry.path()),
                is_directory: meta.is_dir(),
            });
        }
        entries.sort_by(|a, b| (b.is_directory, &a.name).cmp(&(a.is_directory, &b.name)));
        Ok(entries)
    }

    async fn read_file(&self, path: &str) -> anyhow::Result<String> {
        let file = self.resolve(path)?;
        tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("cannot read file: {path}"))
    }

    async fn write_file(&self, path: &str, content: &str) -> anyhow::Result<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, content)
            .await
            .with_context(|| format!("cannot write file: {path}"))
    }

    async fn create_dir(&self, path: &str) -> anyhow::Result<()> {
        let dir = self.resolve(path)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("cannot create directory: {path}"))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let target = self.resolve(path)?;
        let meta = tokio::fs::metadata(&target)
            .await
            .with_context(|| format!("cannot delete, no such path: {path}"))?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&target).await?;
        } else {
            tokio::fs::remove_file(&target).await?;
        }
        Ok(())
    }

    async fn find_files(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let root = self.root.clone();
        let matcher = glob::Pattern::new(pattern)
            .with_context(|| format!("invalid glob pattern: {pattern}"))?;

        // Directory walking is synchronous; keep it off the runtime threads.
        let matches = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<String>> {
            let mut files = Vec::new();
            walk_files(&root, &mut files, usize::MAX)?;
            let mut matches: Vec<String> = files
                .iter()
                .filter_map(|p| p.strip_prefix(&root).ok())
                .map(|p| p.to_string_lossy().to_string())
                .filter(|rel| {
                    matcher.matches(rel)
                        || Path::new(rel)
                            .file_name()
                            .map(|n| matcher.matches(&n.to_string_lossy()))
                            .unwrap_or(false)
                })
                .collect();
            matches.sort();
            matches.truncate(MAX_SEARCH_RESULTS);
            Ok(matches)
        })
        .await??;

        Ok(matches)
    }

    async fn search_code(&self, query: &str) -> anyhow::Result<Vec<SearchHit>> {
        let root = self.root.clone();
        let query = query.to_string();

        let hits = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<SearchHit>> {
            let mut files = Vec::new();
            walk_files(&root, &mut files, usize::MAX)?;
            files.sort();

            let mut hits = Vec::new();
            'outer: for file in files {
                // Binary and non-UTF-8 files are skipped, not errors.
                let Ok(content) = std::fs::read_to_string(&file) else {
                    continue;
                };
                let rel = file
                    .strip_prefix(&root)
                    .unwrap_or(&file)
                    .to_string_lossy()
                    .to_string();
                for (i, line) in content.lines().enumerate() {
                    if line.contains(&query) {
                        hits.push(SearchHit {
                            path: rel.clone(),
                            line: i + 1,
                            text: line.trim_end().to_string(),
                        });
                        if hits.len() >= MAX_SEARCH_RESULTS {
                            break 'outer;
                        }
                    }
                }
            }
            Ok(hits)
        })
        .await??;

        Ok(hits)
    }
}
