//! Core types for Dripfeed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DripfeedError, Result};

/// Coarse file classification used by the constraint pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileGroup {
    Video,
    Image,
    Text,
    Other,
}

impl FileGroup {
    /// Classify a file by its extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp4" | "mov" | "m4v" | "webm" | "avi" | "mkv" => Self::Video,
            "jpg" | "jpeg" | "png" | "gif" | "webp" => Self::Image,
            "txt" | "md" => Self::Text,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for FileGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Image => write!(f, "image"),
            Self::Text => write!(f, "text"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// MIME type for a file extension.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "txt" => "text/plain",
        "md" => "text/markdown",
        _ => "application/octet-stream",
    }
}

/// Immutable metadata for one file within a post.
///
/// `name` is the path relative to the source folder. `order` defines the
/// presentation order within the post and is unique after `reorder_files`.
/// `original_name` links a derived file back to the source file it replaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub basename: String,
    pub extension: String,
    pub group: FileGroup,
    pub mime_type: String,
    pub size_bytes: u64,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

/// Lifecycle status of a post.
///
/// `Unknown → Unscheduled → Scheduled → {Published | Failed}`, with
/// `Failed → Unscheduled` on re-preparation. `Published` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostStatus {
    Unknown,
    Unscheduled,
    Scheduled,
    Published,
    Failed,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Unscheduled => write!(f, "unscheduled"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Published => write!(f, "published"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Append-only record of one publish attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResult {
    pub date: DateTime<Utc>,
    pub dry_run: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub response: serde_json::Value,
}

impl PostResult {
    pub fn success(response: serde_json::Value, dry_run: bool) -> Self {
        Self {
            date: Utc::now(),
            dry_run,
            success: true,
            error: None,
            response,
        }
    }

    pub fn failure(error: String, dry_run: bool) -> Self {
        Self {
            date: Utc::now(),
            dry_run,
            success: false,
            error: Some(error),
            response: serde_json::Value::Null,
        }
    }
}

/// The central record: one (source folder × target) pairing.
///
/// A post is uniquely keyed by `(source_id, target_id)` and is durable
/// state — the core never deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub valid: bool,
    pub skip: bool,
    pub status: PostStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<String>,
    #[serde(default)]
    pub files: Vec<FileInfo>,
    #[serde(default)]
    pub ignore_files: Vec<String>,
    #[serde(default)]
    pub results: Vec<PostResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Post {
    /// Compose the unique post id for a (source, target) pair.
    pub fn compose_id(source_id: &str, target_id: &str) -> String {
        format!("{}:{}", source_id, target_id)
    }

    /// Create a fresh post in the `Unknown` state.
    pub fn new(source_id: &str, target_id: &str) -> Self {
        Self {
            id: Self::compose_id(source_id, target_id),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            valid: false,
            skip: false,
            status: PostStatus::Unknown,
            scheduled_at: None,
            published_at: None,
            title: String::new(),
            body: String::new(),
            tags: Vec::new(),
            mentions: Vec::new(),
            geo: None,
            files: Vec::new(),
            ignore_files: Vec::new(),
            results: Vec::new(),
            remote_id: None,
            link: None,
        }
    }

    /// Files of one group, in presentation order.
    pub fn files_of(&self, group: FileGroup) -> Vec<&FileInfo> {
        let mut files: Vec<&FileInfo> = self.files.iter().filter(|f| f.group == group).collect();
        files.sort_by_key(|f| f.order);
        files
    }

    fn next_order(&self) -> u32 {
        self.files.iter().map(|f| f.order + 1).max().unwrap_or(0)
    }

    /// Add a file, superseding any entry with the same name or any derived
    /// entry whose provenance points at it. The superseded entry's order is
    /// preserved so re-ingestion never shuffles presentation order.
    pub fn put_file(&mut self, mut file: FileInfo) {
        if let Some(idx) = self
            .files
            .iter()
            .position(|f| f.name == file.name || f.original_name.as_deref() == Some(&file.name))
        {
            file.order = self.files[idx].order;
            self.files.remove(idx);
        } else {
            file.order = self.next_order();
        }
        self.files.push(file);
    }

    /// Replace `search_name` in place with a derived file, keeping the old
    /// entry's order and linking provenance back to the root source file.
    ///
    /// Returns false when `search_name` is not present.
    pub fn replace_file(&mut self, search_name: &str, mut replacement: FileInfo) -> bool {
        let Some(idx) = self.files.iter().position(|f| f.name == search_name) else {
            return false;
        };
        let old = &self.files[idx];
        replacement.order = old.order;
        // Chain through prior derivatives so purge checks the real source.
        replacement.original_name = Some(
            old.original_name
                .clone()
                .unwrap_or_else(|| search_name.to_string()),
        );
        self.files[idx] = replacement;
        true
    }

    /// Remove every file of a group.
    pub fn remove_files(&mut self, group: FileGroup) {
        self.files.retain(|f| f.group != group);
    }

    /// Keep only the first `n` files of a group, by current order.
    pub fn limit_files(&mut self, group: FileGroup, n: usize) {
        let mut keep: Vec<&FileInfo> = self.files.iter().filter(|f| f.group == group).collect();
        keep.sort_by_key(|f| f.order);
        let dropped: Vec<String> = keep
            .into_iter()
            .skip(n)
            .map(|f| f.name.clone())
            .collect();
        self.files.retain(|f| !dropped.contains(&f.name));
    }

    /// Drop files the predicate rejects. The caller typically closes over
    /// the file catalog to drop entries whose backing path is gone.
    pub fn purge_files<F>(&mut self, keep: F)
    where
        F: Fn(&FileInfo) -> bool,
    {
        self.files.retain(|f| keep(f));
    }

    /// Re-stamp `order` as a dense 0..n sequence sorted by current order,
    /// removing gaps and duplicates.
    pub fn reorder_files(&mut self) {
        self.files.sort_by_key(|f| f.order);
        for (i, f) in self.files.iter_mut().enumerate() {
            f.order = i as u32;
        }
    }

    /// Whether this post may be scheduled or published at all.
    pub fn is_publishable(&self) -> bool {
        self.valid && !self.skip
    }

    /// Transition to `Scheduled` at the given date.
    ///
    /// Fails when the post is invalid or marked skip. A status other than
    /// `Unscheduled` is tolerated with a warning — the caller decides.
    pub fn schedule(&mut self, date: DateTime<Utc>) -> Result<()> {
        if !self.valid {
            return Err(DripfeedError::InvalidPost(format!(
                "{} is not valid and cannot be scheduled",
                self.id
            )));
        }
        if self.skip {
            return Err(DripfeedError::InvalidPost(format!(
                "{} is marked skip and cannot be scheduled",
                self.id
            )));
        }
        if self.status != PostStatus::Unscheduled {
            warn!(
                post = %self.id,
                status = %self.status,
                "scheduling a post that is not unscheduled"
            );
        }
        self.status = PostStatus::Scheduled;
        self.scheduled_at = Some(date);
        Ok(())
    }

    /// Fold one publish attempt into the post.
    ///
    /// The result is always appended. Dry runs change nothing else. A real
    /// success makes the post `Published` (terminal); a real failure makes
    /// it `Failed` (retryable via re-preparation). Returns the attempt's
    /// success flag.
    pub fn process_result(
        &mut self,
        remote_id: Option<String>,
        link: Option<String>,
        result: PostResult,
    ) -> bool {
        let success = result.success;
        let dry_run = result.dry_run;
        self.results.push(result);

        if dry_run {
            return success;
        }

        if success {
            self.remote_id = remote_id;
            self.link = link;
            self.status = PostStatus::Published;
            self.published_at = Some(Utc::now());
        } else {
            self.status = PostStatus::Failed;
        }
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn file(name: &str, order: u32) -> FileInfo {
        let basename = name
            .rsplit('/')
            .next()
            .unwrap()
            .rsplit_once('.')
            .map(|(b, _)| b.to_string())
            .unwrap_or_else(|| name.to_string());
        let extension = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        FileInfo {
            name: name.to_string(),
            basename,
            extension: extension.to_string(),
            group: FileGroup::from_extension(extension),
            mime_type: mime_for_extension(extension).to_string(),
            size_bytes: 1000,
            order,
            width: None,
            height: None,
            original_name: None,
        }
    }

    #[test]
    fn test_compose_id() {
        assert_eq!(Post::compose_id("trip-2024", "mastodon"), "trip-2024:mastodon");
    }

    #[test]
    fn test_new_post_defaults() {
        let post = Post::new("src", "tgt");
        assert_eq!(post.id, "src:tgt");
        assert_eq!(post.status, PostStatus::Unknown);
        assert!(!post.valid);
        assert!(!post.skip);
        assert!(post.files.is_empty());
        assert!(post.results.is_empty());
        assert!(post.published_at.is_none());
    }

    #[test]
    fn test_file_group_from_extension() {
        assert_eq!(FileGroup::from_extension("JPG"), FileGroup::Image);
        assert_eq!(FileGroup::from_extension("mp4"), FileGroup::Video);
        assert_eq!(FileGroup::from_extension("txt"), FileGroup::Text);
        assert_eq!(FileGroup::from_extension("pdf"), FileGroup::Other);
    }

    #[test]
    fn test_put_file_appends_with_next_order() {
        let mut post = Post::new("s", "t");
        post.put_file(file("a.jpg", 0));
        post.put_file(file("b.jpg", 0));
        assert_eq!(post.files[0].order, 0);
        assert_eq!(post.files[1].order, 1);
    }

    #[test]
    fn test_put_file_supersedes_same_name_keeping_order() {
        let mut post = Post::new("s", "t");
        post.put_file(file("a.jpg", 0));
        post.put_file(file("b.jpg", 0));

        let mut fresh = file("a.jpg", 99);
        fresh.size_bytes = 2000;
        post.put_file(fresh);

        assert_eq!(post.files.len(), 2);
        let a = post.files.iter().find(|f| f.name == "a.jpg").unwrap();
        assert_eq!(a.order, 0);
        assert_eq!(a.size_bytes, 2000);
    }

    #[test]
    fn test_put_file_supersedes_derivative_by_provenance() {
        let mut post = Post::new("s", "t");
        let mut derived = file("_t/a-800x600.jpg", 3);
        derived.original_name = Some("a.jpg".to_string());
        post.files.push(derived);

        // Re-ingesting the source file replaces its derivative.
        post.put_file(file("a.jpg", 0));

        assert_eq!(post.files.len(), 1);
        assert_eq!(post.files[0].name, "a.jpg");
        assert_eq!(post.files[0].order, 3);
    }

    #[test]
    fn test_replace_file_keeps_order_and_links_provenance() {
        let mut post = Post::new("s", "t");
        post.put_file(file("a.jpg", 0));
        post.put_file(file("b.jpg", 0));

        let replaced = post.replace_file("b.jpg", file("_t/b-100x100.jpg", 42));
        assert!(replaced);

        let derived = post.files.iter().find(|f| f.name == "_t/b-100x100.jpg").unwrap();
        assert_eq!(derived.order, 1);
        assert_eq!(derived.original_name.as_deref(), Some("b.jpg"));
    }

    #[test]
    fn test_replace_file_chains_to_root_source() {
        let mut post = Post::new("s", "t");
        post.put_file(file("a.jpg", 0));
        post.replace_file("a.jpg", file("_t/a-1.jpg", 0));
        post.replace_file("_t/a-1.jpg", file("_t/a-2.jpg", 0));

        let derived = &post.files[0];
        assert_eq!(derived.name, "_t/a-2.jpg");
        assert_eq!(derived.original_name.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_replace_file_missing_returns_false() {
        let mut post = Post::new("s", "t");
        assert!(!post.replace_file("nope.jpg", file("x.jpg", 0)));
    }

    #[test]
    fn test_limit_files_keeps_first_n_by_order() {
        let mut post = Post::new("s", "t");
        post.put_file(file("a.jpg", 0));
        post.put_file(file("b.jpg", 0));
        post.put_file(file("c.jpg", 0));
        post.put_file(file("notes.txt", 0));

        post.limit_files(FileGroup::Image, 2);

        let images = post.files_of(FileGroup::Image);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "a.jpg");
        assert_eq!(images[1].name, "b.jpg");
        // Other groups untouched.
        assert_eq!(post.files_of(FileGroup::Text).len(), 1);
    }

    #[test]
    fn test_remove_files_drops_whole_group() {
        let mut post = Post::new("s", "t");
        post.put_file(file("a.jpg", 0));
        post.put_file(file("clip.mp4", 0));
        post.remove_files(FileGroup::Image);
        assert!(post.files_of(FileGroup::Image).is_empty());
        assert_eq!(post.files_of(FileGroup::Video).len(), 1);
    }

    #[test]
    fn test_reorder_files_densifies() {
        let mut post = Post::new("s", "t");
        post.files.push(file("a.jpg", 7));
        post.files.push(file("b.jpg", 2));
        post.files.push(file("c.jpg", 7));

        post.reorder_files();

        let orders: Vec<u32> = post.files.iter().map(|f| f.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(post.files[0].name, "b.jpg");
    }

    #[test]
    fn test_schedule_rejects_invalid_post() {
        let mut post = Post::new("s", "t");
        post.valid = false;
        let err = post.schedule(Utc::now()).unwrap_err();
        assert!(matches!(err, DripfeedError::InvalidPost(_)));
        assert_eq!(post.status, PostStatus::Unknown);
    }

    #[test]
    fn test_schedule_rejects_skip_post() {
        let mut post = Post::new("s", "t");
        post.valid = true;
        post.skip = true;
        assert!(post.schedule(Utc::now()).is_err());
    }

    #[test]
    fn test_schedule_sets_status_and_date() {
        let mut post = Post::new("s", "t");
        post.valid = true;
        post.status = PostStatus::Unscheduled;
        let date = Utc::now();
        post.schedule(date).unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.scheduled_at, Some(date));
    }

    #[test]
    fn test_process_result_dry_run_keeps_status() {
        let mut post = Post::new("s", "t");
        post.status = PostStatus::Scheduled;
        let ok = post.process_result(
            Some("remote-1".to_string()),
            None,
            PostResult::success(serde_json::json!({"id": "remote-1"}), true),
        );
        assert!(ok);
        assert_eq!(post.status, PostStatus::Scheduled);
        assert!(post.remote_id.is_none());
        assert!(post.published_at.is_none());
        assert_eq!(post.results.len(), 1);
    }

    #[test]
    fn test_process_result_success_publishes() {
        let mut post = Post::new("s", "t");
        post.status = PostStatus::Scheduled;
        let ok = post.process_result(
            Some("remote-1".to_string()),
            Some("https://example.com/1".to_string()),
            PostResult::success(serde_json::Value::Null, false),
        );
        assert!(ok);
        assert_eq!(post.status, PostStatus::Published);
        assert_eq!(post.remote_id.as_deref(), Some("remote-1"));
        assert_eq!(post.link.as_deref(), Some("https://example.com/1"));
        assert!(post.published_at.is_some());
    }

    #[test]
    fn test_process_result_failure_is_retryable() {
        let mut post = Post::new("s", "t");
        post.status = PostStatus::Scheduled;
        let ok = post.process_result(
            None,
            None,
            PostResult::failure("boom".to_string(), false),
        );
        assert!(!ok);
        assert_eq!(post.status, PostStatus::Failed);
        assert!(post.published_at.is_none());
        assert_eq!(post.results.len(), 1);
    }

    #[test]
    fn test_results_are_append_only() {
        let mut post = Post::new("s", "t");
        post.process_result(None, None, PostResult::failure("1".to_string(), false));
        post.process_result(
            Some("r".to_string()),
            None,
            PostResult::success(serde_json::Value::Null, false),
        );
        assert_eq!(post.results.len(), 2);
    }

    #[test]
    fn test_post_serialization_round_trip() {
        let mut post = Post::new("folder", "mastodon");
        post.title = "A title".to_string();
        post.tags = vec!["travel".to_string()];
        post.put_file(file("a.jpg", 0));

        let json = serde_json::to_string(&post).unwrap();
        assert!(json.contains(r#""sourceId":"folder""#));
        assert!(json.contains(r#""status":"UNKNOWN""#));
        assert!(json.contains(r#""mimeType":"image/jpeg""#));

        let decoded: Post = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, post.id);
        assert_eq!(decoded.files.len(), 1);
        assert_eq!(decoded.tags, post.tags);
    }

    #[test]
    fn test_scheduled_at_serializes_as_iso8601() {
        let mut post = Post::new("s", "t");
        post.valid = true;
        post.status = PostStatus::Unscheduled;
        post.schedule("2024-01-08T12:00:00Z".parse().unwrap()).unwrap();

        let json = serde_json::to_string(&post).unwrap();
        assert!(json.contains("2024-01-08T12:00:00Z"));
    }
}
