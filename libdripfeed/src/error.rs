//! Error types for Dripfeed

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DripfeedError>;

#[derive(Error, Debug)]
pub enum DripfeedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Invalid post: {0}")]
    InvalidPost(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DripfeedError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DripfeedError::InvalidInput(_) => 3,
            DripfeedError::InvalidPost(_) => 2,
            DripfeedError::Config(_) => 1,
            DripfeedError::Store(_) => 1,
            DripfeedError::Catalog(_) => 1,
            DripfeedError::Transform(_) => 1,
            DripfeedError::Publish(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read source folder {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found in source folder: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to encode post record: {0}")]
    EncodeError(#[source] serde_json::Error),

    #[error("Failed to decode post record {path}: {source}")]
    DecodeError {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A constraint plugin could not produce a conformant derivative.
///
/// Transform errors are caught at the plugin-invocation boundary during
/// preparation: the post is marked invalid instead of aborting the run.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Unknown plugin id: {0}")]
    UnknownPlugin(String),

    #[error("Invalid plugin settings for {plugin}: {message}")]
    InvalidSettings { plugin: String, message: String },

    #[error("Image operation failed on {file}: {source}")]
    Image {
        file: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Could not reduce {file} below {max_bytes} bytes after {attempts} attempts (last size {last_bytes})")]
    ReduceSize {
        file: String,
        max_bytes: u64,
        attempts: u32,
        last_bytes: u64,
    },

    #[error("IO error on {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}
