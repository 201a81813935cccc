//! CSV export of a prediction history.

use glyph_core::record::PredictionRecord;

use crate::Result;

/// Serialize `records` as CSV, one row per record, in the order given.
///
/// The header row is the record's field names
/// (`time,user,filename,pred,confidence,model`). An empty slice produces
/// zero bytes, not a lone header.
pub fn to_csv(records: &[PredictionRecord]) -> Result<Vec<u8>> {
  if records.is_empty() {
    return Ok(Vec::new());
  }

  let mut writer = csv::Writer::from_writer(Vec::new());
  for record in records {
    writer.serialize(record)?;
  }
  writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures::record;

  #[test]
  fn empty_history_exports_nothing() {
    assert!(to_csv(&[]).unwrap().is_empty());
  }

  #[test]
  fn single_record_has_header_and_one_row() {
    let bytes = to_csv(&[record(3, "mlp", Some("three.png"))]).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "time,user,filename,pred,confidence,model");
    assert!(lines[1].starts_with("2024-05-01T12:00:03"), "{}", lines[1]);
    assert!(lines[1].ends_with(",alice,three.png,3,0.5,mlp"), "{}", lines[1]);
  }

  #[test]
  fn missing_filename_is_an_empty_field() {
    let bytes = to_csv(&[record(1, "cnn", None), record(0, "mlp", None)]).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let rows: Vec<&str> = text.lines().skip(1).collect();

    assert_eq!(rows.len(), 2);
    assert!(rows[0].ends_with(",alice,,1,0.5,cnn"), "{}", rows[0]);
    assert!(rows[1].ends_with(",alice,,0,0.5,mlp"), "{}", rows[1]);
  }

  #[test]
  fn fields_with_commas_are_quoted() {
    let bytes = to_csv(&[record(2, "mlp", Some("a,b.png"))]).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains(",\"a,b.png\","), "{text}");
  }
}
