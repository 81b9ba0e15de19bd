//! File catalog: the source-folder collaborator boundary
//!
//! A source folder holds the media and text files of one potential post.
//! The core only ever sees it through [`FileCatalog`]: a listing of files
//! with immutable metadata, plus the few accessors transforms need to read
//! and write actual bytes. Names starting with `_` or `.` are never listed,
//! which is also how derivative storage (`_<target>/...`) and persisted post
//! records (`_<target>.json`) stay out of re-ingestion.

use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};
use crate::types::{mime_for_extension, FileGroup, FileInfo};

/// Read access to one source folder.
pub trait FileCatalog: Send + Sync {
    /// Identifier of this source (the folder name).
    fn source_id(&self) -> &str;

    /// List top-level files, excluding names starting with `_` or `.`,
    /// in alphabetical order.
    fn list_files(&self) -> Result<Vec<FileInfo>>;

    /// Fresh metadata for any relative path inside the folder, including
    /// derivative paths that `list_files` does not report.
    fn file_info(&self, name: &str) -> Result<FileInfo>;

    /// Whether a relative path currently exists.
    fn exists(&self, name: &str) -> bool;

    /// Read a text file's contents.
    fn read_text(&self, name: &str) -> Result<String>;

    /// Absolute path for a relative name, for transforms that read or
    /// write file bytes.
    fn resolve(&self, name: &str) -> PathBuf;

    /// Create a subdirectory (asset storage for derivatives).
    fn ensure_dir(&self, name: &str) -> Result<()>;
}

/// Filesystem-backed catalog over one content folder.
pub struct FolderCatalog {
    root: PathBuf,
    source_id: String,
}

impl FolderCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let source_id = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { root, source_id }
    }

    fn read_error(&self, path: &Path, source: std::io::Error) -> CatalogError {
        CatalogError::ReadError {
            path: path.display().to_string(),
            source,
        }
    }

    fn build_file_info(&self, name: &str) -> Result<FileInfo> {
        let path = self.resolve(name);
        let meta = std::fs::metadata(&path).map_err(|e| self.read_error(&path, e))?;

        let basename = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = Path::new(name)
            .extension()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let group = FileGroup::from_extension(&extension);

        // Pixel dimensions come from the image header only; an unreadable
        // image simply has no dimensions and is caught later by transforms.
        let (width, height) = if group == FileGroup::Image {
            match image::image_dimensions(&path) {
                Ok((w, h)) => (Some(w), Some(h)),
                Err(_) => (None, None),
            }
        } else {
            (None, None)
        };

        Ok(FileInfo {
            name: name.to_string(),
            basename,
            mime_type: mime_for_extension(&extension).to_string(),
            extension,
            group,
            size_bytes: meta.len(),
            order: 0,
            width,
            height,
            original_name: None,
        })
    }
}

impl FileCatalog for FolderCatalog {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn list_files(&self) -> Result<Vec<FileInfo>> {
        let entries =
            std::fs::read_dir(&self.root).map_err(|e| self.read_error(&self.root, e))?;

        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.read_error(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('_') || name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| self.read_error(&self.root, e))?;
            if !file_type.is_file() {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut files = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let mut info = self.build_file_info(name)?;
            info.order = i as u32;
            files.push(info);
        }
        Ok(files)
    }

    fn file_info(&self, name: &str) -> Result<FileInfo> {
        if !self.exists(name) {
            return Err(CatalogError::NotFound(name.to_string()).into());
        }
        self.build_file_info(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    fn read_text(&self, name: &str) -> Result<String> {
        let path = self.resolve(name);
        std::fs::read_to_string(&path)
            .map_err(|e| self.read_error(&path, e).into())
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn ensure_dir(&self, name: &str) -> Result<()> {
        let path = self.resolve(name);
        std::fs::create_dir_all(&path).map_err(|e| self.read_error(&path, e))?;
        Ok(())
    }
}
