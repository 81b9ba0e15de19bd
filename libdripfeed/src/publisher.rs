//! Publisher boundary
//!
//! The core never talks to a network itself; a `Publisher` is handed in
//! at the edge. `publish_post` enforces the preconditions, folds the
//! outcome into the post's append-only results and persists it. A
//! publisher failure becomes a failed result, never an error to the
//! caller, so a batch publish continues with the next post.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::{DripfeedError, Result};
use crate::store::PostStore;
use crate::types::{Post, PostResult};

/// What a target reported back for a successful publish.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub remote_id: String,
    pub link: Option<String>,
    pub response: serde_json::Value,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Push one post to the external target.
    async fn publish(&self, post: &Post, dry_run: bool) -> Result<PublishReceipt>;
}

/// Publish one post and persist the outcome.
///
/// Returns the attempt's success flag. Precondition violations (invalid,
/// skip, already published) are errors; a failing publisher is not.
pub async fn publish_post(
    store: &PostStore,
    publisher: &dyn Publisher,
    post: &mut Post,
    dry_run: bool,
) -> Result<bool> {
    if !post.valid {
        return Err(DripfeedError::InvalidPost(format!(
            "{} is not valid and cannot be published",
            post.id
        )));
    }
    if post.skip {
        return Err(DripfeedError::InvalidPost(format!(
            "{} is marked skip and cannot be published",
            post.id
        )));
    }
    if post.published_at.is_some() {
        return Err(DripfeedError::InvalidPost(format!(
            "{} was already published",
            post.id
        )));
    }

    info!(post = %post.id, publisher = publisher.name(), dry_run, "publishing post");
    let success = match publisher.publish(post, dry_run).await {
        Ok(receipt) => post.process_result(
            Some(receipt.remote_id),
            receipt.link,
            PostResult::success(receipt.response, dry_run),
        ),
        Err(e) => {
            warn!(post = %post.id, error = %e, "publish failed");
            post.process_result(None, None, PostResult::failure(e.to_string(), dry_run))
        }
    };
    store.save(post)?;
    Ok(success)
}

/// In-memory publisher for tests and dry-run plumbing.
pub struct MockPublisher {
    fail_with: Option<String>,
    counter: AtomicU64,
    calls: Mutex<Vec<MockCall>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub post_id: String,
    pub dry_run: bool,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            counter: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A publisher whose every attempt fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(&self, post: &Post, dry_run: bool) -> Result<PublishReceipt> {
        self.calls.lock().unwrap().push(MockCall {
            post_id: post.id.clone(),
            dry_run,
        });
        if let Some(message) = &self.fail_with {
            return Err(DripfeedError::Publish(message.clone()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PublishReceipt {
            remote_id: format!("mock-{}", n),
            link: Some(format!("https://mock.example/{}", n)),
            response: serde_json::json!({ "id": format!("mock-{}", n) }),
        })
    }
}
