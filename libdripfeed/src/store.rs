//! Post persistence
//!
//! Each (source, target) pair owns exactly one JSON document, stored inside
//! the source folder as `_<target>.json`. The leading underscore keeps the
//! record out of the file catalog's listing. Writes go through a temp file
//! and an atomic rename so a crash never leaves a half-written record.
//!
//! No locking guards the store: at-most-one-scheduled-per-target is a
//! cooperative, process-local invariant (see the scheduling module).

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::FolderCatalog;
use crate::error::{Result, StoreError};
use crate::types::Post;

#[derive(Clone)]
pub struct PostStore {
    content_root: PathBuf,
}

impl PostStore {
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
        }
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Path of the record for a (source, target) pair.
    pub fn record_path(&self, source_id: &str, target_id: &str) -> PathBuf {
        self.content_root
            .join(source_id)
            .join(format!("_{}.json", target_id))
    }

    /// A file catalog over one source folder.
    pub fn catalog(&self, source_id: &str) -> FolderCatalog {
        FolderCatalog::new(self.content_root.join(source_id))
    }

    /// Enumerate source folders (subdirectories of the content root,
    /// excluding names starting with `_` or `.`), in alphabetical order.
    pub fn list_sources(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.content_root).map_err(StoreError::IoError)?;
        let mut sources = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::IoError)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('_') || name.starts_with('.') {
                continue;
            }
            if entry.file_type().map_err(StoreError::IoError)?.is_dir() {
                sources.push(name);
            }
        }
        sources.sort();
        Ok(sources)
    }

    /// Load the record for a (source, target) pair, if one exists.
    pub fn load(&self, source_id: &str, target_id: &str) -> Result<Option<Post>> {
        let path = self.record_path(source_id, target_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::IoError(e).into()),
        };
        let post: Post = serde_json::from_str(&content).map_err(|e| StoreError::DecodeError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Some(post))
    }

    /// Persist a post record atomically (write to temp, then rename).
    pub fn save(&self, post: &Post) -> Result<()> {
        let path = self.record_path(&post.source_id, &post.target_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        let json =
            serde_json::to_vec_pretty(post).map_err(StoreError::EncodeError)?;

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp).map_err(StoreError::IoError)?;
            file.write_all(&json).map_err(StoreError::IoError)?;
            file.sync_all().map_err(StoreError::IoError)?;
        }
        std::fs::rename(&tmp, &path).map_err(StoreError::IoError)?;

        debug!(post = %post.id, path = %path.display(), "saved post record");
        Ok(())
    }

    /// Load all existing records for a target across the given sources,
    /// preserving source order. Sources without a record are skipped.
    pub fn load_for_target(&self, target_id: &str, sources: &[String]) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        for source_id in sources {
            if let Some(post) = self.load(source_id, target_id)? {
                posts.push(post);
            }
        }
        Ok(posts)
    }
}
