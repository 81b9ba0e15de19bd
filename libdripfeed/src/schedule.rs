//! Interval scheduling and due-post selection
//!
//! One post per target is scheduled at a time. The next date is derived
//! from the most recent publication plus the target's interval, and due
//! selection scans sources in caller-supplied order, repairing stale
//! records as it goes.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::config::Target;
use crate::error::{DripfeedError, Result};
use crate::publisher::{publish_post, Publisher};
use crate::store::PostStore;
use crate::types::{Post, PostStatus};

/// Parse a human-readable schedule string into a date.
///
/// Supports relative durations ("2h", "30m", "1day"), natural language
/// ("tomorrow", "next friday") and absolute dates ("2026-09-01 15:00").
pub fn parse_when(input: &str) -> Result<DateTime<Utc>> {
    if input.is_empty() {
        return Err(DripfeedError::InvalidInput(
            "schedule string cannot be empty".to_string(),
        ));
    }

    if let Ok(std_duration) = humantime::parse_duration(input) {
        let duration = Duration::try_seconds(std_duration.as_secs() as i64)
            .ok_or_else(|| DripfeedError::InvalidInput("duration out of range".to_string()))?;
        return Ok(Utc::now() + duration);
    }

    if let Ok(date) =
        chrono_english::parse_date_string(input, Utc::now(), chrono_english::Dialect::Us)
    {
        return Ok(date);
    }

    Err(DripfeedError::InvalidInput(format!(
        "could not parse schedule string: {}",
        input
    )))
}

pub struct Scheduler<'a> {
    store: &'a PostStore,
}

impl<'a> Scheduler<'a> {
    pub fn new(store: &'a PostStore) -> Self {
        Self { store }
    }

    /// The date the target's next post should go out: the most recent
    /// publication plus the target's interval, or now when nothing was
    /// published yet.
    pub fn next_post_date(&self, target: &Target, sources: &[String]) -> Result<DateTime<Utc>> {
        let posts = self.store.load_for_target(&target.id, sources)?;
        let last_published = posts
            .iter()
            .filter_map(|p| p.published_at)
            .max();
        Ok(match last_published {
            Some(date) => date + Duration::days(target.interval_days),
            None => Utc::now(),
        })
    }

    /// Schedule the target's next post, keeping at most one scheduled.
    ///
    /// An already scheduled post is returned unchanged. Otherwise the
    /// first eligible post in source order is scheduled at `date` (or the
    /// interval-derived date) and persisted. Returns `None` when nothing
    /// qualifies.
    pub fn schedule_next_post(
        &self,
        target: &Target,
        sources: &[String],
        date: Option<DateTime<Utc>>,
    ) -> Result<Option<Post>> {
        let posts = self.store.load_for_target(&target.id, sources)?;
        if let Some(post) = posts.iter().find(|p| p.status == PostStatus::Scheduled) {
            return Ok(Some(post.clone()));
        }

        let next_date = match date {
            Some(date) => date,
            None => self.next_post_date(target, sources)?,
        };

        for mut post in posts {
            if post.is_publishable() && post.status == PostStatus::Unscheduled {
                post.schedule(next_date)?;
                self.store.save(&post)?;
                info!(post = %post.id, date = %next_date, "scheduled post");
                return Ok(Some(post));
            }
        }
        Ok(None)
    }

    /// The first scheduled post whose date has passed, in source order.
    ///
    /// Stale records found on the way are repaired and persisted: a
    /// scheduled post without a date, marked skip, or no longer valid
    /// reverts to unscheduled, one that was already published is forced
    /// terminal.
    pub fn get_due_post(&self, target: &Target, sources: &[String]) -> Result<Option<Post>> {
        let now = Utc::now();
        for mut post in self.store.load_for_target(&target.id, sources)? {
            if post.status != PostStatus::Scheduled {
                continue;
            }
            if post.published_at.is_some() {
                warn!(post = %post.id, "scheduled post was already published, repairing");
                post.status = PostStatus::Published;
                self.store.save(&post)?;
                continue;
            }
            if post.skip {
                warn!(post = %post.id, "scheduled post is marked skip, reverting");
                post.status = PostStatus::Unscheduled;
                post.scheduled_at = None;
                self.store.save(&post)?;
                continue;
            }
            if !post.valid {
                warn!(post = %post.id, "scheduled post is no longer valid, reverting");
                post.status = PostStatus::Unscheduled;
                post.scheduled_at = None;
                self.store.save(&post)?;
                continue;
            }
            let Some(scheduled_at) = post.scheduled_at else {
                warn!(post = %post.id, "scheduled post has no date, reverting");
                post.status = PostStatus::Unscheduled;
                self.store.save(&post)?;
                continue;
            };
            if scheduled_at <= now {
                return Ok(Some(post));
            }
        }
        Ok(None)
    }

    /// Publish the target's due post, if any. Returns the post and the
    /// attempt's success flag.
    pub async fn publish_due_post(
        &self,
        target: &Target,
        sources: &[String],
        publisher: &dyn Publisher,
        dry_run: bool,
    ) -> Result<Option<(Post, bool)>> {
        let Some(mut post) = self.get_due_post(target, sources)? else {
            return Ok(None);
        };
        let success = publish_post(self.store, publisher, &mut post, dry_run).await?;
        Ok(Some((post, success)))
    }
}
