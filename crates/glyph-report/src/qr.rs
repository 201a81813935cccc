//! QR summaries of a prediction history.
//!
//! A summary is either the recent history itself, serialized as JSON, or a
//! share URL pointing at a server-rendered table. [`QrPayload::choose`]
//! decides which one to encode; [`QrPayload::render_png`] draws it.

use std::io::Cursor;

use glyph_core::record::PredictionRecord;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Most records ever inlined into a JSON summary.
pub const INLINE_RECORD_LIMIT: usize = 50;

/// Pixel size of one QR module.
pub const MODULE_PIXELS: u32 = 10;

// ─── Options ─────────────────────────────────────────────────────────────────

/// What the caller asked the symbol to carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrMode {
  /// Inline JSON when it fits, the share URL otherwise.
  #[default]
  Auto,
  Json,
  Url,
}

/// Error-correction level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrLevel {
  #[default]
  H,
  Q,
}

impl From<QrLevel> for EcLevel {
  fn from(level: QrLevel) -> Self {
    match level {
      QrLevel::H => EcLevel::H,
      QrLevel::Q => EcLevel::Q,
    }
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The text that ends up inside the symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPayload {
  Json(String),
  Url(String),
}

impl QrPayload {
  /// Pick the payload for `mode`.
  ///
  /// `records` is the user's history, newest first; only the first
  /// [`INLINE_RECORD_LIMIT`] are inlined. `share_url` is only called when the
  /// URL is needed. In `Auto` mode JSON longer than `inline_max_bytes` goes
  /// out as a URL. In every mode JSON that no symbol version can hold at
  /// `level` also goes out as a URL.
  pub fn choose(
    mode:             QrMode,
    records:          &[PredictionRecord],
    share_url:        impl FnOnce() -> String,
    inline_max_bytes: usize,
    level:            QrLevel,
  ) -> Result<Self> {
    if mode == QrMode::Url {
      return Ok(Self::Url(share_url()));
    }

    let recent = &records[..records.len().min(INLINE_RECORD_LIMIT)];
    let json = serde_json::to_string(recent)?;

    if mode == QrMode::Auto && json.len() > inline_max_bytes {
      tracing::debug!(bytes = json.len(), "summary over inline budget, sharing a URL");
      return Ok(Self::Url(share_url()));
    }
    if QrCode::with_error_correction_level(json.as_bytes(), level.into()).is_err() {
      tracing::info!(bytes = json.len(), "summary too long for a QR symbol, sharing a URL");
      return Ok(Self::Url(share_url()));
    }
    Ok(Self::Json(json))
  }

  pub fn text(&self) -> &str {
    match self {
      Self::Json(s) | Self::Url(s) => s,
    }
  }

  pub fn is_url(&self) -> bool { matches!(self, Self::Url(_)) }

  /// Encode the payload as a PNG QR code, auto-selecting the symbol version.
  pub fn render_png(&self, level: QrLevel) -> Result<Vec<u8>> {
    render_png(self.text(), level)
  }
}

/// Draw `text` as a black-on-white QR code with a four-module quiet zone.
pub fn render_png(text: &str, level: QrLevel) -> Result<Vec<u8>> {
  let code = QrCode::with_error_correction_level(text.as_bytes(), level.into())?;
  let img = code
    .render::<Luma<u8>>()
    .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
    .quiet_zone(true)
    .build();

  let mut buf = Vec::new();
  DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
  Ok(buf)
}
