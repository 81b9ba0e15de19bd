//! Constraint plugin pipeline
//!
//! A plugin enforces one normalization rule by mutating a post in place.
//! Plugins are registered in an explicit table (`build_plugin`) and run in
//! the order the target configuration lists them. Each must be safe to run
//! repeatedly: preparation re-runs the full pipeline after manual edits, so
//! a plugin seeing an already-conformant post must change nothing.
//!
//! Settings are plain JSON objects merged over the plugin's built-in
//! defaults; operator-provided keys win, unknown keys are ignored and
//! missing keys fall back to the defaults.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::catalog::FileCatalog;
use crate::config::PluginConfig;
use crate::error::{Result, TransformError};
use crate::types::Post;

pub mod image_frame;
pub mod image_size;
pub mod limit_files;

pub use image_frame::ImageFrame;
pub use image_size::ImageSize;
pub use limit_files::LimitFiles;

/// Everything a plugin may touch besides the post itself.
pub struct PluginContext<'a> {
    pub catalog: &'a dyn FileCatalog,
    pub target_id: &'a str,
}

impl<'a> PluginContext<'a> {
    /// Directory (relative to the source folder) where this target's
    /// derivatives live. The underscore keeps it out of re-ingestion.
    pub fn asset_dir(&self) -> String {
        format!("_{}", self.target_id)
    }

    /// Relative name for a derivative of `basename` with a label such as
    /// `800x600` or `framed`.
    pub fn derivative_name(&self, basename: &str, label: &str, extension: &str) -> String {
        format!("{}/{}-{}.{}", self.asset_dir(), basename, label, extension)
    }
}

/// One normalization rule over a post.
pub trait ConstraintPlugin: Send + Sync {
    fn id(&self) -> &'static str;

    /// Apply the rule, mutating the post in place.
    ///
    /// Data-quality violations clear `post.valid` and return Ok; only a
    /// failure to produce a conformant derivative is an error, and the
    /// preparer catches it at this boundary.
    fn process(&self, post: &mut Post, ctx: &PluginContext) -> Result<()>;
}

/// Merge operator settings over a plugin's defaults and decode them.
pub fn merged_settings<T>(plugin: &'static str, overrides: &Value) -> Result<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    let mut merged = serde_json::to_value(T::default()).map_err(|e| {
        TransformError::InvalidSettings {
            plugin: plugin.to_string(),
            message: e.to_string(),
        }
    })?;

    match overrides {
        Value::Null => {}
        Value::Object(entries) => {
            if let Value::Object(base) = &mut merged {
                for (key, value) in entries {
                    base.insert(key.clone(), value.clone());
                }
            }
        }
        other => {
            return Err(TransformError::InvalidSettings {
                plugin: plugin.to_string(),
                message: format!("expected an object, got {}", other),
            }
            .into())
        }
    }

    serde_json::from_value(merged).map_err(|e| {
        TransformError::InvalidSettings {
            plugin: plugin.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Explicit registration table mapping plugin ids to constructors.
pub fn build_plugin(config: &PluginConfig) -> Result<Box<dyn ConstraintPlugin>> {
    match config.id.as_str() {
        limit_files::ID => Ok(Box::new(LimitFiles::from_settings(&config.settings)?)),
        image_size::ID => Ok(Box::new(ImageSize::from_settings(&config.settings)?)),
        image_frame::ID => Ok(Box::new(ImageFrame::from_settings(&config.settings)?)),
        other => Err(TransformError::UnknownPlugin(other.to_string()).into()),
    }
}

/// Parse a `#rrggbb` color into RGB components.
pub(crate) fn parse_hex_color(plugin: &'static str, spec: &str) -> Result<[u8; 3]> {
    let hex = spec.strip_prefix('#').unwrap_or(spec);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TransformError::InvalidSettings {
            plugin: plugin.to_string(),
            message: format!("invalid color: {}", spec),
        }
        .into());
    }
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    Ok([r, g, b])
}

/// Encode an image as JPEG at the given quality, in memory.
///
/// The byte-budget loop in `image_size` needs the encoded size before
/// anything touches the filesystem, so derivatives are built here and
/// written in one go.
pub(crate) fn encode_jpeg(
    img: &image::DynamicImage,
    quality: u8,
    file_label: &str,
) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buffer = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| TransformError::Image {
            file: file_label.to_string(),
            source: e,
        })?;
    Ok(buffer.into_inner())
}

/// Write an encoded derivative to disk.
pub(crate) fn write_derivative(path: &Path, bytes: &[u8], file_label: &str) -> Result<()> {
    std::fs::write(path, bytes).map_err(|e| {
        TransformError::Io {
            file: file_label.to_string(),
            source: e,
        }
        .into()
    })
}

/// Open an image file for transformation.
pub(crate) fn open_image(path: &Path, file_label: &str) -> Result<image::DynamicImage> {
    image::open(path)
        .map_err(|e| {
            TransformError::Image {
                file: file_label.to_string(),
                source: e,
            }
            .into()
        })
}
