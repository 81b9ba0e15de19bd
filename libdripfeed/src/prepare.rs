//! Post preparation
//!
//! Preparation reconciles a source folder into its post record for one
//! target: purge vanished files, re-ingest the folder snapshot, extract
//! the text fields, run the constraint pipeline, and persist. It is safe
//! to run repeatedly; data-quality problems hold the post back by
//! clearing `valid` instead of failing the run.

use tracing::{debug, info, warn};

use crate::catalog::FileCatalog;
use crate::config::Target;
use crate::decompile::{decompile, PostText};
use crate::error::{DripfeedError, Result};
use crate::plugins::{build_plugin, PluginContext};
use crate::store::PostStore;
use crate::types::{FileGroup, FileInfo, Post, PostStatus};

/// Basename of the text file holding an explicit title.
const TITLE_BASENAME: &str = "title";
/// Basename of the text file holding the post body.
const BODY_BASENAME: &str = "body";

pub struct Preparer<'a> {
    store: &'a PostStore,
}

impl<'a> Preparer<'a> {
    pub fn new(store: &'a PostStore) -> Self {
        Self { store }
    }

    /// Prepare the post for one (source, target) pair and persist it.
    pub fn prepare(&self, source_id: &str, target: &Target) -> Result<Post> {
        let catalog = self.store.catalog(source_id);

        let (mut post, is_new) = match self.store.load(source_id, &target.id)? {
            Some(post) => (post, false),
            None => (Post::new(source_id, &target.id), true),
        };
        debug!(post = %post.id, is_new, "preparing post");

        if is_new {
            catalog.ensure_dir(&format!("_{}", target.id))?;
        } else {
            post.purge_files(|f| {
                catalog.exists(&f.name)
                    && f.original_name
                        .as_deref()
                        .map_or(true, |original| catalog.exists(original))
            });
        }

        for file in catalog.list_files()? {
            if post.ignore_files.contains(&file.name) {
                continue;
            }
            post.put_file(file);
        }

        self.extract_text(&catalog, &mut post)?;
        post.valid = !post.title.is_empty();
        if !post.valid {
            warn!(post = %post.id, "no title resolved, post held back");
        }

        let ctx = PluginContext {
            catalog: &catalog as &dyn FileCatalog,
            target_id: &target.id,
        };
        for plugin_config in &target.plugins {
            let plugin = build_plugin(plugin_config)?;
            match plugin.process(&mut post, &ctx) {
                Ok(()) => {}
                Err(DripfeedError::Transform(e)) => {
                    warn!(
                        post = %post.id,
                        plugin = plugin.id(),
                        error = %e,
                        "transform failed, post held back"
                    );
                    // The post is already invalid; the rest of its
                    // pipeline would work on broken input.
                    post.valid = false;
                    break;
                }
                Err(other) => return Err(other),
            }
        }

        if matches!(post.status, PostStatus::Unknown | PostStatus::Failed) {
            post.status = PostStatus::Unscheduled;
        }
        post.reorder_files();

        self.store.save(&post)?;
        info!(
            post = %post.id,
            status = %post.status,
            valid = post.valid,
            files = post.files.len(),
            "prepared post"
        );
        Ok(post)
    }

    /// Prepare every (source, target) combination, collecting the results.
    pub fn prepare_all(&self, sources: &[String], targets: &[Target]) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        for target in targets {
            for source in sources {
                posts.push(self.prepare(source, target)?);
            }
        }
        Ok(posts)
    }

    /// Resolve title, body, tags, mentions and geo from the text files.
    ///
    /// A file named `title.*` provides the title verbatim; a file named
    /// `body.*` (else the first other text file) provides the raw body fed
    /// to the decompiler. Hand-edited fields on the record win over a
    /// re-parse.
    fn extract_text(&self, catalog: &dyn FileCatalog, post: &mut Post) -> Result<()> {
        let text_files: Vec<FileInfo> = post
            .files_of(FileGroup::Text)
            .into_iter()
            .cloned()
            .collect();

        let mut existing = PostText {
            title: post.title.clone(),
            body: post.body.clone(),
            tags: post.tags.clone(),
            mentions: post.mentions.clone(),
            geo: post.geo.clone(),
        };

        let title_file = text_files.iter().find(|f| f.basename == TITLE_BASENAME);
        let explicit_title = title_file.is_some();
        if let Some(file) = title_file {
            existing.title = catalog.read_text(&file.name)?.trim().to_string();
        }

        let body_file = text_files
            .iter()
            .find(|f| f.basename == BODY_BASENAME)
            .or_else(|| text_files.iter().find(|f| f.basename != TITLE_BASENAME));
        let raw = match body_file {
            Some(file) => catalog.read_text(&file.name)?,
            None => String::new(),
        };

        let text = decompile(&raw, &existing, explicit_title);
        post.title = text.title;
        post.body = text.body;
        post.tags = text.tags;
        post.mentions = text.mentions;
        post.geo = text.geo;
        Ok(())
    }
}
