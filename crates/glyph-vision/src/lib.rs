//! Image normalization for Glyph classifiers.
//!
//! Turns whatever a client sent (encoded bytes, a `data:image/...;base64,`
//! URI, an already-decoded image, or a canvas pixel array) into a grayscale
//! [`Tensor`] of fixed size with intensities in `[0, 1]`. Pure and
//! synchronous; no HTTP or model dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use glyph_core::tensor::{IMAGE_SIDE, Layout};
//! use glyph_vision::{ImageInput, normalize};
//!
//! let bytes = std::fs::read("seven.png").unwrap();
//! let tensor = normalize(&ImageInput::Bytes(bytes), IMAGE_SIDE, Layout::Flat).unwrap();
//! assert_eq!(tensor.shape(), &[784]);
//! ```

mod input;

pub use input::ImageInput;

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use glyph_core::{
  Error, Result,
  tensor::{Layout, Tensor},
};
use image::{DynamicImage, GrayImage, imageops::FilterType};

/// Resampling filter used for every resize.
const FILTER: FilterType = FilterType::Lanczos3;

// ─── Public API ──────────────────────────────────────────────────────────────

/// Normalize `input` to a `side × side` tensor in `layout`.
pub fn normalize(input: &ImageInput, side: usize, layout: Layout) -> Result<Tensor> {
  let pixels = intensities(input, side)?;
  shape(pixels, side, layout)
}

/// Normalize `input` once and shape the result for every layout in `layouts`.
///
/// Decoding and resampling happen a single time regardless of how many
/// layouts are requested.
pub fn normalize_layouts(
  input:   &ImageInput,
  side:    usize,
  layouts: impl IntoIterator<Item = Layout>,
) -> Result<BTreeMap<Layout, Tensor>> {
  let pixels = intensities(input, side)?;
  layouts
    .into_iter()
    .map(|layout| Ok((layout, shape(pixels.clone(), side, layout)?)))
    .collect()
}

/// Normalize a numeric pixel array such as a drawing canvas produces.
///
/// Values are treated as raw `[0, 255]` intensities when the maximum exceeds
/// `1`, otherwise as already normalized. Without explicit dimensions the
/// array must have a perfect-square length.
pub fn normalize_pixels(
  values: &[f32],
  width:  Option<usize>,
  height: Option<usize>,
  side:   usize,
  layout: Layout,
) -> Result<Tensor> {
  let gray = pixels_to_gray(values, width, height)?;
  shape(resample(gray, side)?, side, layout)
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Grayscale intensities in `[0, 1]`, row-major, `side * side` long.
fn intensities(input: &ImageInput, side: usize) -> Result<Vec<f32>> {
  let gray = match input {
    ImageInput::DataUri(uri) => decode_bytes(&decode_data_uri(uri)?)?.to_luma8(),
    ImageInput::Bytes(bytes) => decode_bytes(bytes)?.to_luma8(),
    ImageInput::Decoded(img) => img.to_luma8(),
    ImageInput::Pixels { values, width, height } => {
      pixels_to_gray(values, *width, *height)?
    }
  };
  resample(gray, side)
}

fn shape(pixels: Vec<f32>, side: usize, layout: Layout) -> Result<Tensor> {
  Tensor::from_pixels(pixels, side, side, layout).ok_or_else(|| {
    Error::MalformedImage(format!("resampled image is not {side}x{side}"))
  })
}

fn resample(gray: GrayImage, side: usize) -> Result<Vec<f32>> {
  if gray.width() == 0 || gray.height() == 0 {
    return Err(Error::MalformedImage("image has no pixels".into()));
  }
  let side = u32::try_from(side)
    .map_err(|_| Error::MalformedImage(format!("target size {side} too large")))?;

  let resized = image::imageops::resize(&gray, side, side, FILTER);
  Ok(resized.into_raw().into_iter().map(|p| f32::from(p) / 255.0).collect())
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
  let (header, payload) = uri
    .split_once(',')
    .ok_or_else(|| Error::MalformedImage("data URI has no payload".into()))?;
  if !header.ends_with(";base64") {
    return Err(Error::MalformedImage(format!(
      "data URI is not base64-encoded: {header}"
    )));
  }

  let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
  B64
    .decode(compact)
    .map_err(|e| Error::MalformedImage(format!("invalid base64 payload: {e}")))
}

fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
  image::load_from_memory(bytes)
    .map_err(|e| Error::MalformedImage(format!("cannot decode image: {e}")))
}

fn pixels_to_gray(
  values: &[f32],
  width:  Option<usize>,
  height: Option<usize>,
) -> Result<GrayImage> {
  if values.is_empty() {
    return Err(Error::MalformedImage("pixel array is empty".into()));
  }
  if values.iter().any(|v| !v.is_finite()) {
    return Err(Error::MalformedImage("pixel array has non-finite values".into()));
  }

  let (w, h) = match (width, height) {
    (Some(w), Some(h)) => (w, h),
    (Some(w), None) if w > 0 => (w, values.len() / w),
    (None, Some(h)) if h > 0 => (values.len() / h, h),
    _ => {
      let side = values.len().isqrt();
      (side, side)
    }
  };
  if w.checked_mul(h) != Some(values.len()) {
    return Err(Error::MalformedImage(format!(
      "{} pixels do not form a {w}x{h} image",
      values.len()
    )));
  }

  let max = values.iter().copied().fold(f32::MIN, f32::max);
  let scale = if max > 1.0 { 1.0 } else { 255.0 };
  let raw: Vec<u8> = values
    .iter()
    .map(|&v| (v * scale).round().clamp(0.0, 255.0) as u8)
    .collect();

  let (w, h) = (
    u32::try_from(w).map_err(|_| Error::MalformedImage("image too wide".into()))?,
    u32::try_from(h).map_err(|_| Error::MalformedImage("image too tall".into()))?,
  );
  GrayImage::from_raw(w, h, raw)
    .ok_or_else(|| Error::MalformedImage("pixel buffer size mismatch".into()))
}
