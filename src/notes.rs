//! Note-creation collaborator: the handoff target for conversation notes.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

/// Accepts a draft note from the conversation and stores it somewhere the
/// note-taking app will pick it up.
#[async_trait::async_trait]
pub trait NoteSink: Send + Sync {
    /// Create a draft note; returns a short human-readable description of
    /// where it landed.
    async fn create_note(&self, title: Option<String>, content: Option<String>) -> Result<String>;
}

/// Writes drafts as markdown files with a small front-matter header into a
/// configurable directory.
pub struct FileNoteStore {
    drafts_dir: PathBuf,
}

impl FileNoteStore {
    pub fn new(drafts_dir: impl Into<PathBuf>) -> Result<Self> {
        let drafts_dir = drafts_dir.into();
        std::fs::create_dir_all(&drafts_dir).context("Failed to create drafts directory")?;
        Ok(Self { drafts_dir })
    }

    fn draft_path(&self, title: Option<&str>) -> PathBuf {
        let stem = match title {
            Some(t) if !slugify(t).is_empty() => slugify(t),
            _ => format!("voice-note-{}", Utc::now().format("%Y%m%d-%H%M%S")),
        };

        let mut path = self.drafts_dir.join(format!("{stem}.md"));
        if path.exists() {
            let suffix = uuid::Uuid::new_v4().to_string();
            path = self
                .drafts_dir
                .join(format!("{stem}-{}.md", &suffix[..8]));
        }
        path
    }
}

#[async_trait::async_trait]
impl NoteSink for FileNoteStore {
    async fn create_note(&self, title: Option<String>, content: Option<String>) -> Result<String> {
        let path = self.draft_path(title.as_deref());
        let title = title.unwrap_or_else(|| "Voice note".to_string());
        let content = content.unwrap_or_default();

        let draft = format!(
            "---\ntitle: {title}\ncreated: {}\nsource: voice-session\n---\n\n{content}\n",
            Utc::now().to_rfc3339()
        );

        tokio::fs::write(&path, draft)
            .await
            .with_context(|| format!("Failed to write draft: {path:?}"))?;

        info!("note draft written to {}", path.display());
        Ok(format!("draft saved as {}", display_name(&path)))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug.truncate(64);
    slug
}
