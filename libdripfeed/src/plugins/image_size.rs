//! Image geometry and byte-size constraints
//!
//! Geometry is resolved by a pure decision tree before any pixel work:
//! minimum clamps first (scaling up), then maximum bounds (scaling down),
//! then aspect-ratio bounds. Whenever satisfying one bound would violate
//! its complementary bound, the image is fitted onto the bound canvas
//! exactly, cropping under `cover` and padding under `contain`. An image
//! already within every bound resolves to no geometry at all and is never
//! rewritten.
//!
//! After geometry the derivative is re-encoded as JPEG and, when a byte
//! budget is set, iteratively rescaled until it fits or the attempt
//! ceiling is hit.

use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TransformError};
use crate::types::{FileGroup, Post};

use super::{
    encode_jpeg, merged_settings, open_image, parse_hex_color, write_derivative,
    ConstraintPlugin, PluginContext,
};

pub const ID: &str = "image_size";

const MAX_REDUCE_ATTEMPTS: u32 = 5;

/// How to land an image on a bound canvas it does not fit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Scale to fill the canvas, cropping the overhang.
    #[default]
    Cover,
    /// Scale to fit inside the canvas, padding the rest.
    Contain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSizeSettings {
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_height: Option<u32>,
    pub min_ratio: Option<f64>,
    pub max_ratio: Option<f64>,
    pub fit: FitPolicy,
    pub max_size: Option<u64>,
    pub min_size: Option<u64>,
    pub bg_color: String,
    pub quality: u8,
}

impl Default for ImageSizeSettings {
    fn default() -> Self {
        Self {
            min_width: None,
            max_width: None,
            min_height: None,
            max_height: None,
            min_ratio: None,
            max_ratio: None,
            fit: FitPolicy::Cover,
            max_size: None,
            min_size: None,
            bg_color: "#ffffff".to_string(),
            quality: 85,
        }
    }
}

/// Resolved target dimensions: the scaled image and the canvas it lands
/// on. The canvas exceeds the image only under `contain` (padding) and
/// never exceeds it under `cover` (cropping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub img_w: u32,
    pub img_h: u32,
    pub can_w: u32,
    pub can_h: u32,
}

fn fit(img_w: f64, img_h: f64, bound_w: f64, bound_h: f64, policy: FitPolicy) -> (f64, f64, f64, f64) {
    let scale = match policy {
        FitPolicy::Cover => (bound_w / img_w).max(bound_h / img_h),
        FitPolicy::Contain => (bound_w / img_w).min(bound_h / img_h),
    };
    (img_w * scale, img_h * scale, bound_w, bound_h)
}

/// Resolve the target geometry for an image, or `None` when every bound
/// is already satisfied.
pub fn resolve_geometry(orig_w: u32, orig_h: u32, s: &ImageSizeSettings) -> Option<Geometry> {
    let mut img_w = orig_w as f64;
    let mut img_h = orig_h as f64;
    let mut can_w = img_w;
    let mut can_h = img_h;
    let mut changed = false;

    // Uniform scale keeps a prior fit's image/canvas relationship intact.
    fn rescale(img_w: &mut f64, img_h: &mut f64, can_w: &mut f64, can_h: &mut f64, scale: f64) {
        *img_w *= scale;
        *img_h *= scale;
        *can_w *= scale;
        *can_h *= scale;
    }

    if let Some(min_w) = s.min_width.map(f64::from) {
        if can_w < min_w {
            let scaled_h = can_h * min_w / can_w;
            match s.max_height.map(f64::from) {
                Some(max_h) if scaled_h > max_h => {
                    (img_w, img_h, can_w, can_h) = fit(img_w, img_h, min_w, max_h, s.fit);
                }
                _ => {
                    let scale = min_w / can_w;
                    rescale(&mut img_w, &mut img_h, &mut can_w, &mut can_h, scale);
                }
            }
            changed = true;
        }
    }

    if let Some(min_h) = s.min_height.map(f64::from) {
        if can_h < min_h {
            let scaled_w = can_w * min_h / can_h;
            match s.max_width.map(f64::from) {
                Some(max_w) if scaled_w > max_w => {
                    (img_w, img_h, can_w, can_h) = fit(img_w, img_h, max_w, min_h, s.fit);
                }
                _ => {
                    let scale = min_h / can_h;
                    rescale(&mut img_w, &mut img_h, &mut can_w, &mut can_h, scale);
                }
            }
            changed = true;
        }
    }

    if let Some(max_w) = s.max_width.map(f64::from) {
        if can_w > max_w {
            let scaled_h = can_h * max_w / can_w;
            match s.min_height.map(f64::from) {
                Some(min_h) if scaled_h < min_h => {
                    (img_w, img_h, can_w, can_h) = fit(img_w, img_h, max_w, min_h, s.fit);
                }
                _ => {
                    let scale = max_w / can_w;
                    rescale(&mut img_w, &mut img_h, &mut can_w, &mut can_h, scale);
                }
            }
            changed = true;
        }
    }

    if let Some(max_h) = s.max_height.map(f64::from) {
        if can_h > max_h {
            let scaled_w = can_w * max_h / can_h;
            match s.min_width.map(f64::from) {
                Some(min_w) if scaled_w < min_w => {
                    (img_w, img_h, can_w, can_h) = fit(img_w, img_h, min_w, max_h, s.fit);
                }
                _ => {
                    let scale = max_h / can_h;
                    rescale(&mut img_w, &mut img_h, &mut can_w, &mut can_h, scale);
                }
            }
            changed = true;
        }
    }

    let ratio = can_w / can_h;
    if let Some(min_ratio) = s.min_ratio {
        if ratio < min_ratio {
            match s.fit {
                FitPolicy::Cover => can_h = can_w / min_ratio,
                FitPolicy::Contain => can_w = can_h * min_ratio,
            }
            changed = true;
        }
    }
    if let Some(max_ratio) = s.max_ratio {
        if ratio > max_ratio {
            match s.fit {
                FitPolicy::Cover => can_w = can_h * max_ratio,
                FitPolicy::Contain => can_h = can_w / max_ratio,
            }
            changed = true;
        }
    }

    if !changed {
        return None;
    }
    Some(Geometry {
        img_w: (img_w.round() as u32).max(1),
        img_h: (img_h.round() as u32).max(1),
        can_w: (can_w.round() as u32).max(1),
        can_h: (can_h.round() as u32).max(1),
    })
}

pub struct ImageSize {
    settings: ImageSizeSettings,
    background: [u8; 3],
}

impl ImageSize {
    pub fn from_settings(overrides: &serde_json::Value) -> Result<Self> {
        let settings: ImageSizeSettings = merged_settings(ID, overrides)?;
        let background = parse_hex_color(ID, &settings.bg_color)?;
        Ok(Self {
            settings,
            background,
        })
    }

    /// Resize, center-crop any overhang, then pad onto the canvas.
    fn render(&self, img: DynamicImage, geo: Geometry) -> DynamicImage {
        let mut out = img;
        if out.width() != geo.img_w || out.height() != geo.img_h {
            out = out.resize_exact(geo.img_w, geo.img_h, FilterType::Lanczos3);
        }

        let crop_w = out.width().min(geo.can_w);
        let crop_h = out.height().min(geo.can_h);
        if crop_w < out.width() || crop_h < out.height() {
            let x = (out.width() - crop_w) / 2;
            let y = (out.height() - crop_h) / 2;
            out = out.crop_imm(x, y, crop_w, crop_h);
        }

        if geo.can_w > out.width() || geo.can_h > out.height() {
            let mut canvas = RgbImage::from_pixel(geo.can_w, geo.can_h, Rgb(self.background));
            let x = ((geo.can_w - out.width()) / 2) as i64;
            let y = ((geo.can_h - out.height()) / 2) as i64;
            image::imageops::overlay(&mut canvas, &out.to_rgb8(), x, y);
            out = DynamicImage::ImageRgb8(canvas);
        }
        out
    }

    /// Rescale and re-encode until the derivative fits the byte budget.
    fn enforce_byte_budget(
        &self,
        mut img: DynamicImage,
        mut bytes: Vec<u8>,
        file_label: &str,
    ) -> Result<(DynamicImage, Vec<u8>)> {
        let Some(max_size) = self.settings.max_size else {
            return Ok((img, bytes));
        };
        let mut attempts = 0;
        while bytes.len() as u64 > max_size {
            if attempts >= MAX_REDUCE_ATTEMPTS {
                return Err(TransformError::ReduceSize {
                    file: file_label.to_string(),
                    max_bytes: max_size,
                    attempts,
                    last_bytes: bytes.len() as u64,
                }
                .into());
            }
            let scale = (0.9 * max_size as f64 / bytes.len() as f64).sqrt();
            let w = ((img.width() as f64 * scale).round() as u32).max(1);
            let h = ((img.height() as f64 * scale).round() as u32).max(1);
            debug!(
                file = file_label,
                bytes = bytes.len(),
                max_size,
                width = w,
                "reducing image to fit byte budget"
            );
            img = img.resize_exact(w, h, FilterType::Lanczos3);
            bytes = encode_jpeg(&img, self.settings.quality, file_label)?;
            attempts += 1;
        }
        Ok((img, bytes))
    }
}

impl ConstraintPlugin for ImageSize {
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

            let geometry = resolve_geometry(width, height, &self.settings);
            let over_budget = self
                .settings
                .max_size
                .map_or(false, |max| file.size_bytes > max);
            if geometry.is_none() && !over_budget {
                continue;
            }

            let img = open_image(&ctx.catalog.resolve(&file.name), &file.name)?;
            let img = match geometry {
                Some(geo) => self.render(img, geo),
                None => img,
            };
            let bytes = encode_jpeg(&img, self.settings.quality, &file.name)?;
            let (img, bytes) = self.enforce_byte_budget(img, bytes, &file.name)?;

            if let Some(min_size) = self.settings.min_size {
                if (bytes.len() as u64) < min_size {
                    warn!(
                        post = %post.id,
                        file = %file.name,
                        bytes = bytes.len(),
                        min_size,
                        "derivative fell below the size floor"
                    );
                    post.valid = false;
                    continue;
                }
            }

            ctx.catalog.ensure_dir(&ctx.asset_dir())?;
            let label = format!("{}x{}", img.width(), img.height());
            let name = ctx.derivative_name(&file.basename, &label, "jpg");
            write_derivative(&ctx.catalog.resolve(&name), &bytes, &name)?;
            let info = ctx.catalog.file_info(&name)?;
            post.replace_file(&file.name, info);
        }
        Ok(())
    }
}
