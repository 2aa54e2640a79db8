use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use tracing::warn;

use super::category::AssetCategory;

/// Thumbnail bounding box (max width or height)
pub const THUMB_BOX: u32 = 256;

/// Medium bounding box
pub const MEDIUM_BOX: u32 = 800;

/// Large bounding box; emitted only when the source exceeds it. Also the
/// re-encode box for space-sensitive primaries.
pub const LARGE_BOX: u32 = 1600;

/// JPEG quality per derivative slot. Derivative quality never depends on
/// the category; only the primary slot policy does.
const THUMB_QUALITY: u8 = 70;
const MEDIUM_QUALITY: u8 = 80;
const LARGE_QUALITY: u8 = 85;

/// Review-grade quality for space-sensitive primaries: small on disk, good
/// enough to eyeball progress. Not archival.
const REVIEW_QUALITY: u8 = 60;

/// What to put in the primary slot of the store.
#[derive(Debug)]
pub enum GeneratedPrimary {
    /// Store the uploaded bytes untouched.
    Verbatim,
    /// Store this bounded, re-encoded JPEG instead of the upload.
    Reencoded(Vec<u8>),
}

/// Resized copies of one upload. Thumbnail and medium are always produced
/// on the happy path; large only when the source out-sizes its box.
#[derive(Debug, Default)]
pub struct DerivativeSet {
    pub thumbnail: Option<Vec<u8>>,
    pub medium: Option<Vec<u8>>,
    pub large: Option<Vec<u8>>,
}

impl DerivativeSet {
    pub fn is_empty(&self) -> bool {
        self.thumbnail.is_none() && self.medium.is_none() && self.large.is_none()
    }
}

#[derive(Debug)]
pub struct DerivativeOutput {
    pub primary: GeneratedPrimary,
    pub derivatives: DerivativeSet,
}

impl DerivativeOutput {
    fn fallback() -> Self {
        Self {
            primary: GeneratedPrimary::Verbatim,
            derivatives: DerivativeSet::default(),
        }
    }
}

/// Derives the stored primary and the resized copies for one validated
/// image upload. Never fails: any decode or encode problem degrades to the
/// unmodified original with an empty derivative set.
pub fn generate(bytes: &[u8], category: AssetCategory) -> DerivativeOutput {
    match try_generate(bytes, category) {
        Ok(output) => output,
        Err(e) => {
            warn!("derivative generation failed, storing original as-is: {e:#}");
            DerivativeOutput::fallback()
        }
    }
}

fn try_generate(bytes: &[u8], category: AssetCategory) -> anyhow::Result<DerivativeOutput> {
    let decoded = image::load_from_memory(bytes)?;
    let oriented = apply_exif_orientation(decoded, bytes);
    let flat = flatten_to_rgb(oriented);
    let (width, height) = (flat.width(), flat.height());

    let derivatives = DerivativeSet {
        thumbnail: Some(render_slot(&flat, THUMB_BOX, THUMB_QUALITY)?),
        medium: Some(render_slot(&flat, MEDIUM_BOX, MEDIUM_QUALITY)?),
        large: if width > LARGE_BOX || height > LARGE_BOX {
            Some(render_slot(&flat, LARGE_BOX, LARGE_QUALITY)?)
        } else {
            None
        },
    };

    let primary = if category.is_space_sensitive() {
        GeneratedPrimary::Reencoded(render_slot(&flat, LARGE_BOX, REVIEW_QUALITY)?)
    } else {
        GeneratedPrimary::Verbatim
    };

    Ok(DerivativeOutput {
        primary,
        derivatives,
    })
}

/// Resize into the bounding box (aspect-preserving, never upscaling) and
/// encode as JPEG at the slot quality.
fn render_slot(img: &RgbImage, bound: u32, quality: u8) -> anyhow::Result<Vec<u8>> {
    let resized;
    let source = match fit_dimensions(img.width(), img.height(), bound) {
        Some((w, h)) => {
            resized = image::imageops::resize(img, w, h, image::imageops::FilterType::Lanczos3);
            &resized
        }
        None => img,
    };
    encode_jpeg(source, quality)
}

/// Target dimensions for fit-within-box scaling, or None when the image
/// already fits (no upscaling).
fn fit_dimensions(width: u32, height: u32, bound: u32) -> Option<(u32, u32)> {
    if width <= bound && height <= bound {
        return None;
    }
    let (w, h) = (width as u64, height as u64);
    let scaled = if w >= h {
        (bound as u64, (h * bound as u64 / w).max(1))
    } else {
        ((w * bound as u64 / h).max(1), bound as u64)
    };
    Some((scaled.0 as u32, scaled.1 as u32))
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)?;
    Ok(out)
}

/// Flattens any alpha channel onto a white background. JPEG output has no
/// alpha, and darkened transparent edges look broken in review views.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let blend = |c: u8| -> u8 {
            ((a as u16 * c as u16 + (255 - a) as u16 * 255) / 255) as u8
        };
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Rotates/flips camera uploads upright per the EXIF orientation tag. The
/// re-encode drops metadata, so pixels must be corrected first. Unreadable
/// or absent EXIF leaves the image untouched.
fn apply_exif_orientation(img: DynamicImage, raw: &[u8]) -> DynamicImage {
    let orientation = exif::Reader::new()
        .read_from_container(&mut Cursor::new(raw))
        .ok()
        .and_then(|data| {
            data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        });

    match orientation {
        Some(2) => img.fliph(),
        Some(3) => img.rotate180(),
        Some(4) => img.flipv(),
        Some(5) => img.rotate90().fliph(),
        Some(6) => img.rotate90(),
        Some(7) => img.rotate270().fliph(),
        Some(8) => img.rotate270(),
        _ => img,
    }
}
