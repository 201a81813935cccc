//! Orchestrator tests with in-process classifiers and an in-memory store.

use std::{
  io::Cursor,
  sync::{Arc, Mutex},
};

use glyph_core::{
  classifier::{BackendRegistry, Classifier, DIGIT_CLASSES, Prediction},
  record::{ModelTag, NewPrediction, PredictionRecord, UserIdentity},
  store::{PredictionQuery, PredictionStore},
  tensor::{Layout, Tensor},
};
use glyph_store_sqlite::SqliteStore;
use glyph_vision::ImageInput;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use crate::{BatchEntry, BatchItem, Error, Orchestrator};

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// Maps mean brightness onto `0..=9` and remembers every shape it was given.
struct Brightness {
  tag:    ModelTag,
  layout: Layout,
  seen:   Mutex<Vec<Vec<usize>>>,
}

impl Brightness {
  fn new(tag: &str, layout: Layout) -> Arc<Self> {
    Arc::new(Self { tag: tag.into(), layout, seen: Mutex::new(Vec::new()) })
  }
}

impl Classifier for Brightness {
  fn tag(&self) -> &ModelTag { &self.tag }
  fn layout(&self) -> Layout { self.layout }
  fn predict(&self, tensor: &Tensor) -> glyph_core::Result<Prediction> {
    self.seen.lock().unwrap().push(tensor.shape().to_vec());
    let mean = tensor.data().iter().sum::<f32>() / tensor.len() as f32;
    let mut scores = [0.0f32; DIGIT_CLASSES];
    scores[(mean * 9.0).round() as usize] = 1.0;
    Ok(Prediction::from_scores(&scores).unwrap())
  }
}

struct Broken {
  tag: ModelTag,
}

impl Classifier for Broken {
  fn tag(&self) -> &ModelTag { &self.tag }
  fn layout(&self) -> Layout { Layout::Flat }
  fn predict(&self, _: &Tensor) -> glyph_core::Result<Prediction> {
    Err(glyph_core::Error::inference(&self.tag, "weights exploded"))
  }
}

/// Claims a label outside its own label set.
struct OutOfRange {
  tag: ModelTag,
}

impl Classifier for OutOfRange {
  fn tag(&self) -> &ModelTag { &self.tag }
  fn layout(&self) -> Layout { Layout::Flat }
  fn num_classes(&self) -> usize { 3 }
  fn predict(&self, _: &Tensor) -> glyph_core::Result<Prediction> {
    Ok(Prediction { label: 7, confidence: 0.9 })
  }
}

/// A log with room for a fixed number of records. Single inserts land one
/// at a time; `insert_many` is all-or-nothing.
struct DiskFull {
  records: Mutex<Vec<PredictionRecord>>,
  room:    usize,
}

impl DiskFull {
  fn with_room(room: usize) -> Arc<Self> {
    Arc::new(Self { records: Mutex::new(Vec::new()), room })
  }

  fn stored(&self) -> usize { self.records.lock().unwrap().len() }

  fn full() -> std::io::Error { std::io::Error::other("no space left on device") }
}

impl PredictionStore for DiskFull {
  type Error = std::io::Error;

  async fn insert(&self, input: NewPrediction) -> std::io::Result<PredictionRecord> {
    let mut records = self.records.lock().unwrap();
    if records.len() >= self.room {
      return Err(Self::full());
    }
    let record = input.into_record(chrono::Utc::now());
    records.insert(0, record.clone());
    Ok(record)
  }

  async fn insert_many(
    &self,
    inputs: Vec<NewPrediction>,
  ) -> std::io::Result<Vec<PredictionRecord>> {
    let mut records = self.records.lock().unwrap();
    if records.len() + inputs.len() > self.room {
      return Err(Self::full());
    }
    let time = chrono::Utc::now();
    let stored: Vec<_> = inputs.into_iter().map(|i| i.into_record(time)).collect();
    for record in &stored {
      records.insert(0, record.clone());
    }
    Ok(stored)
  }

  async fn query(&self, query: &PredictionQuery) -> std::io::Result<Vec<PredictionRecord>> {
    Ok(query.apply(self.records.lock().unwrap().iter().cloned()))
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn png(value: u8) -> Vec<u8> {
  let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 40, Luma([value])));
  let mut buf = Vec::new();
  img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
  buf
}

async fn orchestrator(
  backends: Vec<Arc<dyn Classifier>>,
) -> Orchestrator<SqliteStore> {
  let mut registry = BackendRegistry::new();
  for backend in backends {
    registry.register(backend);
  }
  let store = SqliteStore::open_in_memory().await.unwrap();
  Orchestrator::new(registry, Arc::new(store))
}

async fn logged(o: &Orchestrator<SqliteStore>) -> usize {
  o.store().query(&PredictionQuery::default()).await.unwrap().len()
}

fn alice() -> UserIdentity { "alice".into() }

// ─── Single image ────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_backend_is_an_error_and_logs_nothing() {
  let o = orchestrator(vec![]).await;
  let err = o
    .run(ImageInput::Bytes(png(255)), &alice(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(glyph_core::Error::NoBackendAvailable)));
  assert_eq!(logged(&o).await, 0);
}

#[tokio::test]
async fn one_record_per_backend_tagged_with_its_model() {
  let mlp = Brightness::new("mlp", Layout::Flat);
  let cnn = Brightness::new("cnn", Layout::Planar);
  let o = orchestrator(vec![mlp.clone(), cnn.clone()]).await;

  let records = o
    .run(ImageInput::Bytes(png(255)), &alice(), Some("seven.png".into()))
    .await
    .unwrap();

  assert_eq!(records.len(), 2);
  assert_eq!(records[0].model.as_str(), "mlp");
  assert_eq!(records[1].model.as_str(), "cnn");
  for r in &records {
    assert_eq!(r.user, alice());
    assert_eq!(r.filename.as_deref(), Some("seven.png"));
    assert_eq!(r.pred, 9);
    assert!((0.0..=1.0).contains(&r.confidence));
  }

  // Each backend saw the image in its own layout.
  assert_eq!(*mlp.seen.lock().unwrap(), vec![vec![784]]);
  assert_eq!(*cnn.seen.lock().unwrap(), vec![vec![28, 28, 1]]);

  let history = o
    .store()
    .query(&PredictionQuery::for_user(alice(), 50))
    .await
    .unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0], records[1]);
}

#[tokio::test]
async fn pixel_arrays_go_through_the_same_path() {
  let o = orchestrator(vec![Brightness::new("mlp", Layout::Flat)]).await;
  let input = ImageInput::Pixels { values: vec![0.0; 784], width: None, height: None };

  let records = o.run(input, &alice(), None).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].pred, 0);
}

#[tokio::test]
async fn failing_backend_leaves_no_partial_records() {
  let o = orchestrator(vec![
    Brightness::new("mlp", Layout::Flat),
    Arc::new(Broken { tag: "cnn".into() }),
  ])
  .await;

  let err = o
    .run(ImageInput::Bytes(png(0)), &alice(), None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(glyph_core::Error::Inference { ref model, .. }) if model.as_str() == "cnn"
  ));
  assert_eq!(logged(&o).await, 0);
}

#[tokio::test]
async fn label_outside_backend_range_is_rejected() {
  let o = orchestrator(vec![Arc::new(OutOfRange { tag: "tiny".into() })]).await;
  let err = o
    .run(ImageInput::Bytes(png(0)), &alice(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(glyph_core::Error::Inference { .. })));
  assert_eq!(logged(&o).await, 0);
}

#[tokio::test]
async fn malformed_image_is_reported_before_any_write() {
  let o = orchestrator(vec![Brightness::new("mlp", Layout::Flat)]).await;
  let err = o
    .run(ImageInput::Bytes(b"definitely not a png".to_vec()), &alice(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(glyph_core::Error::MalformedImage(_))));
  assert_eq!(logged(&o).await, 0);
}

#[tokio::test]
async fn store_failure_leaves_no_partial_records() {
  let store = DiskFull::with_room(1);
  let mut registry = BackendRegistry::new();
  registry.register(Brightness::new("mlp", Layout::Flat));
  registry.register(Brightness::new("cnn", Layout::Planar));
  let o = Orchestrator::new(registry, Arc::clone(&store));

  let err = o
    .run(ImageInput::Bytes(png(255)), &alice(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Store(_)));
  assert_eq!(store.stored(), 0);
}

// ─── Batch ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_isolates_a_corrupt_item() {
  let o = orchestrator(vec![
    Brightness::new("mlp", Layout::Flat),
    Brightness::new("cnn", Layout::Planar),
  ])
  .await;

  let items = vec![
    BatchItem { bytes: png(255), filename: Some("a.png".into()) },
    BatchItem { bytes: b"\x89PNG truncated".to_vec(), filename: Some("b.png".into()) },
    BatchItem { bytes: png(0), filename: Some("c.png".into()) },
  ];
  let entries = o.run_batch(items, &alice()).await.unwrap();

  assert_eq!(entries.len(), 3);
  assert!(!entries[0].is_failed());
  assert!(entries[1].is_failed());
  assert!(!entries[2].is_failed());

  match &entries[1] {
    BatchEntry::Failed { filename, error } => {
      assert_eq!(filename.as_deref(), Some("b.png"));
      assert!(error.contains("malformed"), "{error}");
    }
    other => panic!("expected a failure, got {other:?}"),
  }
  match &entries[2] {
    BatchEntry::Predicted { records, .. } => {
      assert_eq!(records.len(), 2);
      assert!(records.iter().all(|r| r.pred == 0));
    }
    other => panic!("expected records, got {other:?}"),
  }

  assert_eq!(logged(&o).await, 4);
}

#[tokio::test]
async fn batch_item_hit_by_a_store_failure_writes_nothing() {
  let store = DiskFull::with_room(3);
  let mut registry = BackendRegistry::new();
  registry.register(Brightness::new("mlp", Layout::Flat));
  registry.register(Brightness::new("cnn", Layout::Planar));
  let o = Orchestrator::new(registry, Arc::clone(&store));

  let items = vec![
    BatchItem { bytes: png(255), filename: Some("a.png".into()) },
    BatchItem { bytes: png(0), filename: Some("b.png".into()) },
  ];
  let entries = o.run_batch(items, &alice()).await.unwrap();

  assert!(!entries[0].is_failed());
  assert!(entries[1].is_failed());
  let history = store.query(&PredictionQuery::default()).await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(history.iter().all(|r| r.filename.as_deref() == Some("a.png")));
}

#[tokio::test]
async fn empty_registry_fails_the_whole_batch() {
  let o = orchestrator(vec![]).await;
  let items = vec![BatchItem { bytes: png(255), filename: None }];
  let err = o.run_batch(items, &alice()).await.unwrap_err();
  assert!(matches!(err, Error::Core(glyph_core::Error::NoBackendAvailable)));
}

#[test]
fn batch_entries_serialize_flat() {
  let failed = BatchEntry::Failed {
    filename: Some("b.png".into()),
    error:    "malformed image: eof".into(),
  };
  assert_eq!(
    serde_json::to_value(&failed).unwrap(),
    serde_json::json!({ "filename": "b.png", "error": "malformed image: eof" }),
  );
}
