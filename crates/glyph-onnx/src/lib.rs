//! ONNX classifier backends for Glyph, executed with `tract` (pure Rust).
//!
//! Each configured model is loaded once at startup. A model whose artifact is
//! missing is simply left out of the [`BackendRegistry`]; the service runs
//! with whatever backends did load, possibly none.

mod error;

pub use error::{Error, Result};

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use glyph_core::{
  classifier::{BackendRegistry, Classifier, DIGIT_CLASSES, Prediction},
  record::ModelTag,
  tensor::{IMAGE_SIDE, Layout, Tensor as ImageTensor},
};
use serde::Deserialize;
use tract_onnx::prelude::*;

// ─── Configuration ───────────────────────────────────────────────────────────

/// One entry of the `[[backends]]` configuration list.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSpec {
  pub tag:    ModelTag,
  pub path:   PathBuf,
  pub layout: Layout,
}

/// Load every backend in `specs` whose artifact can be loaded.
///
/// Missing artifacts are logged at `warn` and skipped; artifacts that exist
/// but fail to load are logged at `error` and skipped. Duplicate tags keep
/// the first entry.
pub fn load_registry(specs: &[BackendSpec]) -> BackendRegistry {
  let mut registry = BackendRegistry::new();

  for spec in specs {
    match OnnxClassifier::load(&spec.path, spec.tag.clone(), spec.layout) {
      Ok(backend) => {
        tracing::info!(
          tag = %spec.tag,
          layout = %spec.layout,
          classes = backend.num_classes(),
          "loaded backend from {}",
          spec.path.display(),
        );
        if !registry.register(Arc::new(backend)) {
          tracing::warn!(tag = %spec.tag, "duplicate backend tag; keeping the first");
        }
      }
      Err(Error::MissingArtifact(path)) => {
        tracing::warn!(
          tag = %spec.tag,
          "model artifact not found at {}; backend unavailable",
          path.display(),
        );
      }
      Err(e) => {
        tracing::error!(tag = %spec.tag, "failed to load backend: {e}");
      }
    }
  }

  if registry.is_empty() {
    tracing::warn!("no classifier backends loaded; prediction routes will fail");
  }
  registry
}

// ─── Backend ─────────────────────────────────────────────────────────────────

/// A classifier backed by an optimized tract plan.
pub struct OnnxClassifier {
  tag:         ModelTag,
  layout:      Layout,
  num_classes: usize,
  plan:        TypedRunnableModel<TypedModel>,
}

impl OnnxClassifier {
  /// Load the ONNX model at `path`.
  pub fn load(path: impl AsRef<Path>, tag: ModelTag, layout: Layout) -> Result<Self> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(Error::MissingArtifact(path.to_path_buf()));
    }

    let load_err = |e: TractError| Error::Load {
      path:    path.to_path_buf(),
      message: format!("{e:#}"),
    };

    let model = tract_onnx::onnx().model_for_path(path).map_err(load_err)?;
    Self::from_model(model, tag, layout).map_err(load_err)
  }

  /// Fix `model`'s input to a single normalized image in `layout` and
  /// optimize it into a runnable plan.
  fn from_model(model: InferenceModel, tag: ModelTag, layout: Layout) -> TractResult<Self> {
    let input_shape = match layout {
      Layout::Flat => tvec!(1, IMAGE_SIDE * IMAGE_SIDE),
      Layout::Planar => tvec!(1, IMAGE_SIDE, IMAGE_SIDE, 1),
    };

    let typed = model
      .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), input_shape))?
      .into_optimized()?;

    let num_classes = typed
      .output_fact(0)?
      .shape
      .as_concrete()
      .and_then(|dims| dims.last().copied())
      .unwrap_or(DIGIT_CLASSES);

    let plan = typed.into_runnable()?;

    Ok(Self { tag, layout, num_classes, plan })
  }
}

impl Classifier for OnnxClassifier {
  fn tag(&self) -> &ModelTag { &self.tag }

  fn layout(&self) -> Layout { self.layout }

  fn num_classes(&self) -> usize { self.num_classes }

  fn predict(&self, tensor: &ImageTensor) -> glyph_core::Result<Prediction> {
    let fail = |e: TractError| {
      glyph_core::Error::inference(&self.tag, format!("{e:#}"))
    };

    let mut dims = vec![1];
    dims.extend_from_slice(tensor.shape());
    let input = Tensor::from_shape(&dims, tensor.data()).map_err(fail)?;

    let outputs = self.plan.run(tvec!(input.into())).map_err(fail)?;
    let output = outputs
      .first()
      .ok_or_else(|| glyph_core::Error::inference(&self.tag, "model produced no output"))?;
    let scores: Vec<f32> = output.to_array_view::<f32>().map_err(fail)?.iter().copied().collect();

    Prediction::from_scores(&scores)
      .filter(|p| usize::from(p.label) < self.num_classes)
      .ok_or_else(|| {
        glyph_core::Error::inference(
          &self.tag,
          format!("unusable output of {} scores", scores.len()),
        )
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tract_onnx::pb;

  /// `softmax(flatten(x) · W)` over ten classes, where input pixel `i` only
  /// votes for class `i % 10`.
  fn bucket_model() -> pb::ModelProto {
    // onnx.TensorProto.DataType.FLOAT
    const FLOAT: i32 = 1;
    let pixels = IMAGE_SIDE * IMAGE_SIDE;
    let mut weights = vec![0.0f32; pixels * DIGIT_CLASSES];
    for i in 0..pixels {
      weights[i * DIGIT_CLASSES + i % DIGIT_CLASSES] = 0.05;
    }

    let node = |op: &str, inputs: &[&str], output: &str| pb::NodeProto {
      op_type: op.into(),
      input: inputs.iter().map(|s| s.to_string()).collect(),
      output: vec![output.into()],
      ..Default::default()
    };
    let value = |name: &str| pb::ValueInfoProto {
      name: name.into(),
      r#type: Some(pb::TypeProto {
        value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
          elem_type: FLOAT,
          ..Default::default()
        })),
        ..Default::default()
      }),
      ..Default::default()
    };

    pb::ModelProto {
      ir_version: 7,
      opset_import: vec![pb::OperatorSetIdProto { domain: String::new(), version: 13 }],
      graph: Some(pb::GraphProto {
        name: "buckets".into(),
        node: vec![
          node("Flatten", &["x"], "flat"),
          node("MatMul", &["flat", "w"], "logits"),
          node("Softmax", &["logits"], "y"),
        ],
        initializer: vec![pb::TensorProto {
          name: "w".into(),
          dims: vec![pixels as i64, DIGIT_CLASSES as i64],
          data_type: FLOAT,
          float_data: weights,
          ..Default::default()
        }],
        input: vec![value("x")],
        output: vec![value("y")],
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  fn bucket_classifier(layout: Layout) -> OnnxClassifier {
    let model = tract_onnx::onnx().model_for_proto_model(&bucket_model()).unwrap();
    OnnxClassifier::from_model(model, "buckets".into(), layout).unwrap()
  }

  /// Lights every pixel whose index is `digit` mod 10.
  fn striped(digit: usize, layout: Layout) -> ImageTensor {
    let pixels = (0..IMAGE_SIDE * IMAGE_SIDE)
      .map(|i| if i % DIGIT_CLASSES == digit { 1.0 } else { 0.0 })
      .collect();
    ImageTensor::from_pixels(pixels, IMAGE_SIDE, IMAGE_SIDE, layout).unwrap()
  }

  #[test]
  fn predicts_in_both_layouts() {
    for layout in [Layout::Flat, Layout::Planar] {
      let backend = bucket_classifier(layout);
      assert_eq!(backend.num_classes(), DIGIT_CLASSES);
      assert_eq!(backend.layout(), layout);

      for digit in [0, 3, 9] {
        let input = striped(digit, layout);
        let first = backend.predict(&input).unwrap();
        assert_eq!(usize::from(first.label), digit, "{layout}");
        assert!((0.0..=1.0).contains(&first.confidence), "{first:?}");
        assert!(first.confidence > 1.0 / DIGIT_CLASSES as f64);

        let second = backend.predict(&input).unwrap();
        assert_eq!(first, second);
      }
    }
  }

  #[test]
  fn layouts_agree_on_the_same_image() {
    let flat = bucket_classifier(Layout::Flat).predict(&striped(7, Layout::Flat)).unwrap();
    let planar = bucket_classifier(Layout::Planar).predict(&striped(7, Layout::Planar)).unwrap();
    assert_eq!(flat.label, planar.label);
    assert!((flat.confidence - planar.confidence).abs() < 1e-6);
  }

  #[test]
  fn missing_artifact_is_reported_as_such() {
    let err = OnnxClassifier::load("/nonexistent/model.onnx", "mlp".into(), Layout::Flat)
      .err()
      .unwrap();
    assert!(matches!(err, Error::MissingArtifact(_)));
  }

  #[test]
  fn garbage_artifact_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.onnx");
    std::fs::write(&path, b"definitely not protobuf").unwrap();

    let err = OnnxClassifier::load(&path, "cnn".into(), Layout::Planar).err().unwrap();
    assert!(matches!(err, Error::Load { .. }));
  }

  #[test]
  fn registry_skips_unavailable_backends() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.onnx");
    std::fs::write(&broken, b"\x00\x01").unwrap();

    let specs = vec![
      BackendSpec {
        tag:    "mlp".into(),
        path:   dir.path().join("absent.onnx"),
        layout: Layout::Flat,
      },
      BackendSpec { tag: "cnn".into(), path: broken, layout: Layout::Planar },
    ];
    assert!(load_registry(&specs).is_empty());
  }
}
