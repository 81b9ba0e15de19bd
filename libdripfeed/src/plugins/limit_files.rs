//! File-count constraints
//!
//! Trims each group to its configured maximum, optionally makes one group
//! exclusive, and caps the total count with a group-priority fallback.
//! Minimum violations clear `valid` instead of erroring so the operator
//! sees the post held back rather than the run aborted.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{FileGroup, Post};

use super::{merged_settings, ConstraintPlugin, PluginContext};

pub const ID: &str = "limit_files";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitFilesSettings {
    pub image_min: u32,
    pub image_max: Option<u32>,
    pub video_min: u32,
    pub video_max: Option<u32>,
    pub total_max: Option<u32>,
    /// When files of this group are present, all other groups are dropped.
    pub exclusive: Option<FileGroup>,
    /// Group order used when `total_max` forces cuts across groups.
    pub priority: Vec<FileGroup>,
}

impl Default for LimitFilesSettings {
    fn default() -> Self {
        Self {
            image_min: 0,
            image_max: None,
            video_min: 0,
            video_max: None,
            total_max: None,
            exclusive: None,
            priority: vec![
                FileGroup::Video,
                FileGroup::Image,
                FileGroup::Text,
                FileGroup::Other,
            ],
        }
    }
}

pub struct LimitFiles {
    settings: LimitFilesSettings,
}

impl LimitFiles {
    pub fn from_settings(overrides: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            settings: merged_settings(ID, overrides)?,
        })
    }

    fn apply_total_max(&self, post: &mut Post, total_max: u32) {
        if post.files.len() <= total_max as usize {
            return;
        }
        let mut keep: Vec<String> = Vec::new();
        for group in &self.settings.priority {
            for file in post.files_of(*group) {
                if keep.len() < total_max as usize {
                    keep.push(file.name.clone());
                }
            }
        }
        post.purge_files(|f| keep.contains(&f.name));
    }
}

impl ConstraintPlugin for LimitFiles {
    fn id(&self) -> &'static str {
        ID
    }

    fn process(&self, post: &mut Post, _ctx: &PluginContext) -> Result<()> {
        let s = &self.settings;

        if let Some(group) = s.exclusive {
            if !post.files_of(group).is_empty() {
                let dropped: Vec<String> = post
                    .files
                    .iter()
                    .filter(|f| f.group != group)
                    .map(|f| f.name.clone())
                    .collect();
                if !dropped.is_empty() {
                    debug!(
                        post = %post.id,
                        group = %group,
                        dropped = dropped.len(),
                        "exclusive group, dropping other files"
                    );
                    post.purge_files(|f| f.group == group);
                }
            }
        }

        if let Some(max) = s.image_max {
            post.limit_files(FileGroup::Image, max as usize);
        }
        if let Some(max) = s.video_max {
            post.limit_files(FileGroup::Video, max as usize);
        }
        if let Some(total_max) = s.total_max {
            self.apply_total_max(post, total_max);
        }

        if (post.files_of(FileGroup::Image).len() as u32) < s.image_min {
            warn!(post = %post.id, min = s.image_min, "not enough images");
            post.valid = false;
        }
        if (post.files_of(FileGroup::Video).len() as u32) < s.video_min {
            warn!(post = %post.id, min = s.video_min, "not enough videos");
            post.valid = false;
        }

        Ok(())
    }
}
