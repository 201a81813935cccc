//! Normalized image tensors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Side length, in pixels, of every normalized digit image.
pub const IMAGE_SIDE: usize = 28;

/// How a normalized tensor is shaped for the backend that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
  /// `[rows * cols]`, for vector-input models.
  Flat,
  /// `[rows, cols, 1]`, for channel-last convolutional models.
  Planar,
}

impl Layout {
  pub fn shape(self, rows: usize, cols: usize) -> Vec<usize> {
    match self {
      Layout::Flat => vec![rows * cols],
      Layout::Planar => vec![rows, cols, 1],
    }
  }
}

impl fmt::Display for Layout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Layout::Flat => "flat",
      Layout::Planar => "planar",
    })
  }
}

/// Row-major grayscale intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  layout: Layout,
  shape:  Vec<usize>,
  data:   Vec<f32>,
}

impl Tensor {
  /// Wrap `data` (row-major, `rows * cols` values) in the given layout.
  ///
  /// Returns `None` if the length does not match `rows * cols`.
  pub fn from_pixels(
    data:   Vec<f32>,
    rows:   usize,
    cols:   usize,
    layout: Layout,
  ) -> Option<Self> {
    (data.len() == rows * cols).then(|| Self {
      layout,
      shape: layout.shape(rows, cols),
      data,
    })
  }

  pub fn layout(&self) -> Layout { self.layout }

  pub fn shape(&self) -> &[usize] { &self.shape }

  pub fn data(&self) -> &[f32] { &self.data }

  pub fn len(&self) -> usize { self.data.len() }

  pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn layouts_shape_the_same_pixels() {
    let flat = Tensor::from_pixels(vec![0.0; 784], 28, 28, Layout::Flat).unwrap();
    let planar =
      Tensor::from_pixels(vec![0.0; 784], 28, 28, Layout::Planar).unwrap();
    assert_eq!(flat.shape(), &[784]);
    assert_eq!(planar.shape(), &[28, 28, 1]);
    assert_eq!(flat.len(), planar.len());
  }

  #[test]
  fn length_mismatch_is_rejected() {
    assert!(Tensor::from_pixels(vec![0.0; 10], 28, 28, Layout::Flat).is_none());
  }
}
