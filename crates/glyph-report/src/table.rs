//! Server-rendered HTML table of a shared history.

use std::fmt::Write as _;

use glyph_core::record::{PredictionRecord, UserIdentity};

/// Render `records` (already newest first and limited) as a standalone page.
pub fn render_table(user: &UserIdentity, records: &[PredictionRecord]) -> String {
  let mut html = String::new();
  let title = format!("Predictions for {}", escape(user.as_str()));

  // Writing to a `String` cannot fail.
  let _ = write!(
    html,
    "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n",
  );

  if records.is_empty() {
    html.push_str("<p>No predictions yet.</p>\n");
  } else {
    html.push_str(
      "<table>\n<tr><th>Time</th><th>File</th><th>Prediction</th><th>Confidence</th><th>Model</th></tr>\n",
    );
    for r in records {
      let _ = writeln!(
        html,
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.1}%</td><td>{}</td></tr>",
        r.time.format("%Y-%m-%d %H:%M:%S"),
        escape(r.filename.as_deref().unwrap_or("")),
        r.pred,
        r.confidence * 100.0,
        escape(r.model.as_str()),
      );
    }
    html.push_str("</table>\n");
  }

  html.push_str("</body>\n</html>\n");
  html
}

fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures::record;

  #[test]
  fn one_row_per_record() {
    let records = vec![record(7, "cnn", Some("seven.png")), record(1, "mlp", None)];
    let html = render_table(&"alice".into(), &records);

    assert_eq!(html.matches("<tr><td>").count(), 2);
    assert!(html.contains("<td>seven.png</td><td>7</td><td>50.0%</td><td>cnn</td>"));
    assert!(html.contains("2024-05-01 12:00:07"));
  }

  #[test]
  fn markup_in_fields_is_escaped() {
    let records = vec![record(1, "mlp", Some("<script>x</script>.png"))];
    let html = render_table(&"<b>eve</b>".into(), &records);

    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;"));
    assert!(html.contains("Predictions for &lt;b&gt;eve&lt;/b&gt;"));
  }

  #[test]
  fn empty_history_says_so() {
    let html = render_table(&"alice".into(), &[]);
    assert!(html.contains("No predictions yet."));
    assert!(!html.contains("<table>"));
  }
}
