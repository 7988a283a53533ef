//! File-backed conversation repository.
//!
//! Each conversation is stored as `{dir}/{session_id}.json`.
//!
//! - **Atomic writes**: uniquely named tmp file + fsync + atomic rename
//! - **Safe names**: session IDs are limited to `[A-Za-z0-9_-]`, so an ID can
//!   never escape the storage directory

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use talktab_core::conversation::{ConversationRepository, ConversationState};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const EXTENSION: &str = "json";

pub struct JsonConversationRepository {
    dir: PathBuf,
}

impl JsonConversationRepository {
    /// Creates a repository rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.{EXTENSION}")))
    }
}

/// Checks that a session ID is non-empty and uses only `[A-Za-z0-9_-]`.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty() {
        bail!("Session ID must not be empty");
    }
    if !session_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        bail!("Invalid session ID '{session_id}': only letters, digits, '_' and '-' are allowed");
    }
    Ok(())
}

#[async_trait]
impl ConversationRepository for JsonConversationRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<ConversationState>> {
        let path = self.path_for(session_id)?;
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read conversation '{}'", path.display()));
            }
        };

        let state: ConversationState = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse conversation '{}'", path.display()))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        let path = self.path_for(state.session_id())?;
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create directory '{}'", self.dir.display()))?;

        let json = serde_json::to_vec_pretty(state).context("Failed to serialize conversation")?;

        // Write to a temporary file in the same directory, unique per write
        let tmp_path = self.dir.join(format!(
            ".{}.{}.tmp",
            state.session_id(),
            uuid::Uuid::new_v4().simple()
        ));
        let mut tmp_file = fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("Failed to create temp file '{}'", tmp_path.display()))?;
        tmp_file
            .write_all(&json)
            .await
            .with_context(|| format!("Failed to write temp file '{}'", tmp_path.display()))?;

        // Ensure data is written to disk
        tmp_file
            .sync_all()
            .await
            .with_context(|| format!("Failed to sync temp file '{}'", tmp_path.display()))?;
        drop(tmp_file);

        // Atomic rename
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| {
                format!(
                    "Failed to rename temp file '{}' to '{}'",
                    tmp_path.display(),
                    path.display()
                )
            });
        }

        tracing::debug!(path = %path.display(), "Saved conversation");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.path_for(session_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to delete conversation '{}'", path.display())),
        }
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to list '{}'", self.dir.display()));
            }
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_session_id(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
