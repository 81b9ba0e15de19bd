//! Dripfeed - folder-based post scheduling for social targets
//!
//! This library turns a content folder tree into a steady stream of
//! posts: one folder is one potential post, each configured target gets
//! its own prepared, constrained and scheduled copy, and a publisher
//! boundary pushes due posts out at the configured interval.

pub mod catalog;
pub mod config;
pub mod decompile;
pub mod error;
pub mod logging;
pub mod plugins;
pub mod prepare;
pub mod publisher;
pub mod schedule;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use catalog::{FileCatalog, FolderCatalog};
pub use config::{Config, Target};
pub use error::{DripfeedError, Result};
pub use prepare::Preparer;
pub use publisher::{MockPublisher, Publisher};
pub use schedule::Scheduler;
pub use store::PostStore;
pub use types::{FileGroup, FileInfo, Post, PostResult, PostStatus};
