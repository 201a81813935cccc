//! Read-side views over a user's prediction history.
//!
//! Everything here is a pure function of a slice of
//! [`glyph_core::record::PredictionRecord`]s: the CSV export, the QR summary,
//! the shared HTML table, and the stats summary. The keyed share tokens used
//! by the QR summary's URL mode live in [`share`].

pub mod error;
pub mod export;
pub mod qr;
pub mod share;
pub mod stats;
pub mod table;

pub use error::{Error, Result};
pub use export::to_csv;
pub use qr::{QrLevel, QrMode, QrPayload};
pub use share::ShareSigner;
pub use stats::Summary;
pub use table::render_table;

#[cfg(test)]
pub(crate) mod fixtures {
  use chrono::{TimeZone, Utc};
  use glyph_core::record::PredictionRecord;

  pub fn record(pred: u8, model: &str, filename: Option<&str>) -> PredictionRecord {
    PredictionRecord {
      time:       Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, u32::from(pred)).unwrap(),
      user:       "alice".into(),
      filename:   filename.map(str::to_owned),
      pred,
      confidence: 0.5,
      model:      model.into(),
    }
  }
}
