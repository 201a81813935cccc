//! The closed set of image representations the normalizer accepts.

use glyph_core::{Error, Result};
use image::DynamicImage;
use serde_json::Value;

/// An incoming image in any supported representation.
#[derive(Debug, Clone)]
pub enum ImageInput {
  /// `data:image/<fmt>;base64,<payload>`
  DataUri(String),
  /// An encoded image file (PNG, JPEG, BMP, GIF).
  Bytes(Vec<u8>),
  /// An image already decoded in memory.
  Decoded(DynamicImage),
  /// Canvas intensities, either `[0, 255]` or `[0, 1]`, row-major.
  Pixels {
    values: Vec<f32>,
    width:  Option<usize>,
    height: Option<usize>,
  },
}

impl ImageInput {
  /// Interpret an untyped JSON value as an image.
  ///
  /// Accepts a data-URI string, a flat numeric array, or a rectangular array
  /// of numeric rows. Anything else is [`Error::UnsupportedInputType`].
  pub fn from_json(value: &Value) -> Result<Self> {
    match value {
      Value::String(s) if s.starts_with("data:image") => Ok(Self::DataUri(s.clone())),
      Value::String(_) => Err(Error::UnsupportedInputType(
        "string is not a data:image URI".into(),
      )),
      Value::Array(items) if items.iter().all(Value::is_array) && !items.is_empty() => {
        let height = items.len();
        let mut values = Vec::new();
        let mut width = None;
        for row in items {
          let row = numbers(row.as_array().map(Vec::as_slice).unwrap_or_default())?;
          if *width.get_or_insert(row.len()) != row.len() {
            return Err(Error::MalformedImage("pixel rows differ in length".into()));
          }
          values.extend(row);
        }
        Ok(Self::Pixels { values, width, height: Some(height) })
      }
      Value::Array(items) => Ok(Self::Pixels {
        values: numbers(items)?,
        width:  None,
        height: None,
      }),
      other => Err(Error::UnsupportedInputType(kind(other).into())),
    }
  }
}

fn numbers(items: &[Value]) -> Result<Vec<f32>> {
  items
    .iter()
    .map(|v| {
      v.as_f64().map(|n| n as f32).ok_or_else(|| {
        Error::UnsupportedInputType(format!("pixel array contains {}", kind(v)))
      })
    })
    .collect()
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn data_uri_string_is_accepted() {
    let input = ImageInput::from_json(&json!("data:image/png;base64,AAAA")).unwrap();
    assert!(matches!(input, ImageInput::DataUri(_)));
  }

  #[test]
  fn plain_string_and_object_are_unsupported() {
    for value in [json!("hello"), json!({"a": 1}), json!(true), json!(null)] {
      assert!(matches!(
        ImageInput::from_json(&value),
        Err(Error::UnsupportedInputType(_))
      ));
    }
  }

  #[test]
  fn nested_rows_carry_dimensions() {
    let input = ImageInput::from_json(&json!([[0, 255, 0], [255, 0, 255]])).unwrap();
    match input {
      ImageInput::Pixels { values, width, height } => {
        assert_eq!(values.len(), 6);
        assert_eq!(width, Some(3));
        assert_eq!(height, Some(2));
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn ragged_rows_are_malformed() {
    assert!(matches!(
      ImageInput::from_json(&json!([[0, 1], [0]])),
      Err(Error::MalformedImage(_))
    ));
  }
}
