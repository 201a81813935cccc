//! [`FileStore`]: the JSON-file implementation of [`PredictionStore`].

use std::{
  fs::{self, File, OpenOptions},
  io::{BufReader, ErrorKind, Write as _},
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use fs2::FileExt as _;
use serde_json::Value;

use glyph_core::{
  record::{NewPrediction, PredictionRecord},
  store::{PredictionQuery, PredictionStore},
};

use crate::{Error, Result, encode::decode_entry};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A prediction log backed by a single JSON-array file.
///
/// Writers are serialized twice over: by an in-process mutex and by an
/// exclusive advisory lock on a sidecar `<log>.lock` file, which also covers
/// other processes sharing the log. Each write replaces the log atomically
/// (temp file + rename), and readers hold a shared lock on the sidecar, so a
/// reader never sees a partially-written array.
///
/// Cloning is cheap; clones share the same write mutex.
#[derive(Clone)]
pub struct FileStore {
  inner: Arc<Inner>,
}

struct Inner {
  path:      PathBuf,
  lock_path: PathBuf,
  writer:    Mutex<()>,
}

/// What was found at the log path.
enum Log {
  Entries(Vec<Value>),
  Missing,
  Corrupt(String),
}

impl FileStore {
  /// Open the log at `path`, creating parent directories and an empty array
  /// if nothing exists there yet.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let parent = parent_dir(&path)?;
    fs::create_dir_all(&parent)?;

    let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
    lock_name.push(".lock");
    let store = Self {
      inner: Arc::new(Inner {
        lock_path: parent.join(lock_name),
        path,
        writer: Mutex::new(()),
      }),
    };

    {
      let _guard = store.write_guard();
      let _lock = store.lock(true)?;
      if let Log::Missing = read_log(&store.inner.path)? {
        write_atomic(&store.inner.path, &[])?;
        tracing::info!("initialised empty prediction log at {}", store.inner.path.display());
      }
    }
    Ok(store)
  }

  pub fn path(&self) -> &Path { &self.inner.path }

  fn write_guard(&self) -> std::sync::MutexGuard<'_, ()> {
    // A poisoned mutex only means another writer panicked; the file itself
    // is replaced atomically, so it is still consistent.
    self.inner.writer.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Take the sidecar lock; released when the returned file is dropped.
  fn lock(&self, exclusive: bool) -> Result<File> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&self.inner.lock_path)?;
    if exclusive {
      file.lock_exclusive()?;
    } else {
      file.lock_shared()?;
    }
    Ok(file)
  }

  /// Read-modify-write under both locks. `append` receives the stamp for
  /// the new entries and the current log; nothing is written if it fails.
  fn append_blocking<T>(
    &self,
    append: impl FnOnce(DateTime<Utc>, &mut Vec<Value>) -> Result<T>,
  ) -> Result<T> {
    let _guard = self.write_guard();
    let _lock = self.lock(true)?;

    let mut entries = match read_log(&self.inner.path)? {
      Log::Entries(entries) => entries,
      Log::Missing => Vec::new(),
      Log::Corrupt(reason) => {
        let aside = quarantine(&self.inner.path)?;
        tracing::warn!(
          "prediction log was corrupt ({reason}); moved to {} and starting fresh",
          aside.display(),
        );
        Vec::new()
      }
    };

    // Never stamp earlier than the current head, even if the clock stepped
    // backwards, so storage order stays newest-first by time.
    let now = Utc::now();
    let time = entries
      .iter()
      .find_map(decode_entry)
      .map_or(now, |head| head.time.max(now));

    let appended = append(time, &mut entries)?;
    write_atomic(&self.inner.path, &entries)?;
    Ok(appended)
  }

  fn insert_blocking(&self, input: NewPrediction) -> Result<PredictionRecord> {
    let record = self.append_blocking(|time, entries| {
      let record = input.into_record(time);
      entries.insert(0, serde_json::to_value(&record)?);
      Ok(record)
    })?;

    tracing::debug!(user = %record.user, model = %record.model, pred = record.pred, "prediction logged");
    Ok(record)
  }

  fn insert_many_blocking(&self, inputs: Vec<NewPrediction>) -> Result<Vec<PredictionRecord>> {
    let records = self.append_blocking(|time, entries| {
      let records: Vec<PredictionRecord> =
        inputs.into_iter().map(|input| input.into_record(time)).collect();
      let mut head = records
        .iter()
        .rev()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;
      head.append(entries);
      *entries = head;
      Ok(records)
    })?;

    for record in &records {
      tracing::debug!(user = %record.user, model = %record.model, pred = record.pred, "prediction logged");
    }
    Ok(records)
  }

  fn query_blocking(&self, query: &PredictionQuery) -> Result<Vec<PredictionRecord>> {
    let _lock = self.lock(false)?;

    let entries = match read_log(&self.inner.path)? {
      Log::Entries(entries) => entries,
      Log::Missing => Vec::new(),
      Log::Corrupt(reason) => {
        tracing::warn!(
          "prediction log at {} is unreadable ({reason}); treating it as empty",
          self.inner.path.display(),
        );
        Vec::new()
      }
    };

    Ok(query.apply(entries.iter().filter_map(decode_entry)))
  }
}

// ─── PredictionStore impl ────────────────────────────────────────────────────

impl PredictionStore for FileStore {
  type Error = Error;

  async fn insert(&self, input: NewPrediction) -> Result<PredictionRecord> {
    let store = self.clone();
    tokio::task::spawn_blocking(move || store.insert_blocking(input)).await?
  }

  async fn insert_many(&self, inputs: Vec<NewPrediction>) -> Result<Vec<PredictionRecord>> {
    let store = self.clone();
    tokio::task::spawn_blocking(move || store.insert_many_blocking(inputs)).await?
  }

  async fn query(&self, query: &PredictionQuery) -> Result<Vec<PredictionRecord>> {
    let store = self.clone();
    let query = query.clone();
    tokio::task::spawn_blocking(move || store.query_blocking(&query)).await?
  }
}

// ─── File helpers ────────────────────────────────────────────────────────────

fn parent_dir(path: &Path) -> Result<PathBuf> {
  match path.parent() {
    Some(p) if p.as_os_str().is_empty() => Ok(PathBuf::from(".")),
    Some(p) => Ok(p.to_path_buf()),
    None => Err(Error::NoParent(path.to_path_buf())),
  }
}

fn read_log(path: &Path) -> Result<Log> {
  let file = match File::open(path) {
    Ok(file) => file,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Log::Missing),
    Err(e) => return Err(e.into()),
  };

  Ok(match serde_json::from_reader::<_, Vec<Value>>(BufReader::new(file)) {
    Ok(entries) => Log::Entries(entries),
    Err(e) => Log::Corrupt(e.to_string()),
  })
}

fn write_atomic(path: &Path, entries: &[Value]) -> Result<()> {
  let parent = parent_dir(path)?;
  let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
  serde_json::to_writer_pretty(tmp.as_file_mut(), entries)?;
  tmp.as_file_mut().write_all(b"\n")?;
  tmp.as_file_mut().flush()?;
  tmp.as_file_mut().sync_all()?;
  tmp.persist(path)?;
  Ok(())
}

/// Move a corrupt log aside so its bytes survive the next write.
fn quarantine(path: &Path) -> Result<PathBuf> {
  let mut name = path.file_name().unwrap_or_default().to_os_string();
  name.push(format!(".corrupt-{}", Utc::now().timestamp_micros()));
  let aside = path.with_file_name(name);
  fs::rename(path, &aside)?;
  Ok(aside)
}
