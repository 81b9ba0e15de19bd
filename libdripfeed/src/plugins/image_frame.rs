//! Solid-color image framing
//!
//! Adds an inner and optionally an outer border around every image.
//! Border widths are absolute pixels or a percentage of the smaller
//! image dimension. Framing is purely additive: it always produces a
//! derivative and never invalidates a post.

use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TransformError};
use crate::types::{FileGroup, Post};

use super::{
    encode_jpeg, merged_settings, open_image, parse_hex_color, write_derivative,
    ConstraintPlugin, PluginContext,
};

pub const ID: &str = "image_frame";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageFrameSettings {
    /// Border width in pixels ("24") or percent of min(width, height) ("5%").
    pub inner_width: String,
    pub inner_color: String,
    pub outer_width: Option<String>,
    pub outer_color: String,
    pub quality: u8,
}

impl Default for ImageFrameSettings {
    fn default() -> Self {
        Self {
            inner_width: "2%".to_string(),
            inner_color: "#ffffff".to_string(),
            outer_width: None,
            outer_color: "#000000".to_string(),
            quality: 85,
        }
    }
}

/// Resolve a border spec against the image's smaller dimension.
fn border_pixels(spec: &str, width: u32, height: u32) -> Result<u32> {
    let parsed = if let Some(percent) = spec.strip_suffix('%') {
        percent
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| *p >= 0.0)
            .map(|p| (width.min(height) as f64 * p / 100.0).round() as u32)
    } else {
        spec.trim().parse::<u32>().ok()
    };
    parsed.ok_or_else(|| {
        TransformError::InvalidSettings {
            plugin: ID.to_string(),
            message: format!("invalid border width: {}", spec),
        }
        .into()
    })
}

fn add_border(img: DynamicImage, border: u32, color: [u8; 3]) -> DynamicImage {
    if border == 0 {
        return img;
    }
    let mut canvas = RgbImage::from_pixel(
        img.width() + 2 * border,
        img.height() + 2 * border,
        Rgb(color),
    );
    image::imageops::overlay(&mut canvas, &img.to_rgb8(), border as i64, border as i64);
    DynamicImage::ImageRgb8(canvas)
}

pub struct ImageFrame {
    settings: ImageFrameSettings,
    inner_color: [u8; 3],
    outer_color: [u8; 3],
}

impl ImageFrame {
    pub fn from_settings(overrides: &serde_json::Value) -> Result<Self> {
        let settings: ImageFrameSettings = merged_settings(ID, overrides)?;
        let inner_color = parse_hex_color(ID, &settings.inner_color)?;
        let outer_color = parse_hex_color(ID, &settings.outer_color)?;
        Ok(Self {
            settings,
            inner_color,
            outer_color,
        })
    }
}

impl ConstraintPlugin for ImageFrame {
    fn id(&self) -> &'static str {
        ID
    }

    fn process(&self, post: &mut Post, ctx: &PluginContext) -> Result<()> {
        let images: Vec<_> = post
            .files_of(FileGroup::Image)
            .into_iter()
            .cloned()
            .collect();

        for file in images {
            let (Some(width), Some(height)) = (file.width, file.height) else {
                warn!(post = %post.id, file = %file.name, "image has no readable dimensions");
                continue;
            };

            let inner = border_pixels(&self.settings.inner_width, width, height)?;
            let outer = match &self.settings.outer_width {
                Some(spec) => border_pixels(spec, width, height)?,
                None => 0,
            };

            let img = open_image(&ctx.catalog.resolve(&file.name), &file.name)?;
            let img = add_border(img, inner, self.inner_color);
            let img = add_border(img, outer, self.outer_color);
            let bytes = encode_jpeg(&img, self.settings.quality, &file.name)?;

            ctx.catalog.ensure_dir(&ctx.asset_dir())?;
            let name = ctx.derivative_name(&file.basename, "framed", "jpg");
            write_derivative(&ctx.catalog.resolve(&name), &bytes, &name)?;
            let info = ctx.catalog.file_info(&name)?;
            post.replace_file(&file.name, info);
        }
        Ok(())
    }
}
