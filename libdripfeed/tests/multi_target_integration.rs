//! Multi-target integration tests
//!
//! Each target keeps its own post record, pipeline and schedule for the
//! same content folders. These tests exercise that isolation through the
//! store on a real content tree.

use anyhow::Result;
use image::{Rgb, RgbImage};
use libdripfeed::config::{PluginConfig, Target};
use libdripfeed::prepare::Preparer;
use libdripfeed::schedule::Scheduler;
use libdripfeed::store::PostStore;
use libdripfeed::types::{FileGroup, PostStatus};
use libdripfeed::MockPublisher;
use std::fs;
use tempfile::TempDir;

fn target(id: &str, plugins: Vec<(&str, serde_json::Value)>) -> Target {
    Target {
        id: id.to_string(),
        interval_days: 7,
        plugins: plugins
            .into_iter()
            .map(|(pid, settings)| PluginConfig {
                id: pid.to_string(),
                settings,
            })
            .collect(),
    }
}

fn content_tree(folders: &[&str]) -> Result<(TempDir, PostStore)> {
    let dir = TempDir::new()?;
    for folder in folders {
        let path = dir.path().join(folder);
        fs::create_dir_all(&path)?;
        fs::write(path.join("body.txt"), format!("Post from {}", folder))?;
        for name in ["a.png", "b.png"] {
            RgbImage::from_pixel(64, 64, Rgb([50, 90, 130])).save(path.join(name))?;
        }
    }
    let store = PostStore::new(dir.path());
    Ok((dir, store))
}

#[test]
fn test_targets_get_independent_records_and_pipelines() -> Result<()> {
    let (dir, store) = content_tree(&["one"])?;
    let strict = target(
        "strict",
        vec![("limit_files", serde_json::json!({ "image_max": 1 }))],
    );
    let lax = target("lax", vec![]);

    let preparer = Preparer::new(&store);
    let strict_post = preparer.prepare("one", &strict)?;
    let lax_post = preparer.prepare("one", &lax)?;

    assert_eq!(strict_post.files_of(FileGroup::Image).len(), 1);
    assert_eq!(lax_post.files_of(FileGroup::Image).len(), 2);
    assert!(dir.path().join("one/_strict.json").is_file());
    assert!(dir.path().join("one/_lax.json").is_file());
    Ok(())
}

#[test]
fn test_derivatives_do_not_leak_between_targets() -> Result<()> {
    let (dir, store) = content_tree(&["one"])?;
    let resized = target(
        "small",
        vec![("image_size", serde_json::json!({ "max_width": 32 }))],
    );
    let plain = target("plain", vec![]);

    let preparer = Preparer::new(&store);
    preparer.prepare("one", &resized)?;
    let plain_post = preparer.prepare("one", &plain)?;

    // The resize derivative lives in the other target's asset dir and
    // never shows up in this target's files.
    assert!(dir.path().join("one/_small/a-32x32.jpg").is_file());
    assert!(plain_post
        .files
        .iter()
        .all(|f| !f.name.starts_with("_small/")));
    Ok(())
}

#[tokio::test]
async fn test_schedules_advance_independently_per_target() -> Result<()> {
    let (_dir, store) = content_tree(&["one", "two"])?;
    let mastodon = target("mastodon", vec![]);
    let pixelfed = target("pixelfed", vec![]);
    let sources = store.list_sources()?;

    let preparer = Preparer::new(&store);
    for t in [&mastodon, &pixelfed] {
        preparer.prepare_all(&sources, std::slice::from_ref(t))?;
    }

    let scheduler = Scheduler::new(&store);
    let past = "2024-01-01T00:00:00Z".parse()?;
    scheduler.schedule_next_post(&mastodon, &sources, Some(past))?;
    scheduler.schedule_next_post(&pixelfed, &sources, Some(past))?;

    // Publishing mastodon's due post leaves pixelfed's queue untouched.
    let publisher = MockPublisher::new();
    scheduler
        .publish_due_post(&mastodon, &sources, &publisher, false)
        .await?
        .expect("mastodon post is due");

    let mastodon_one = store.load("one", "mastodon")?.unwrap();
    let pixelfed_one = store.load("one", "pixelfed")?.unwrap();
    assert_eq!(mastodon_one.status, PostStatus::Published);
    assert_eq!(pixelfed_one.status, PostStatus::Scheduled);

    let still_due = scheduler.get_due_post(&pixelfed, &sources)?;
    assert_eq!(still_due.unwrap().id, "one:pixelfed");
    Ok(())
}

#[test]
fn test_source_filter_limits_scheduling_pool() -> Result<()> {
    let (_dir, store) = content_tree(&["one", "two"])?;
    let t = target("t", vec![]);
    let sources = store.list_sources()?;
    Preparer::new(&store).prepare_all(&sources, std::slice::from_ref(&t))?;

    let only_two = vec!["two".to_string()];
    let scheduled = Scheduler::new(&store)
        .schedule_next_post(&t, &only_two, None)?
        .unwrap();
    assert_eq!(scheduled.id, "two:t");
    Ok(())
}
