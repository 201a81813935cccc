//! Small JSON files the server owns next to the prediction log.

use std::{
  io::Write as _,
  path::Path,
};

use serde::{Serialize, de::DeserializeOwned};

/// Load the JSON document at `path`, writing `T::default()` there first if
/// it is missing.
pub(crate) fn load_or_create<T>(path: &Path) -> std::io::Result<T>
where
  T: Default + Serialize + DeserializeOwned,
{
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }

  if path.exists() {
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
  } else {
    let empty = T::default();
    write_atomic(path, &empty)?;
    Ok(empty)
  }
}

/// Replace `path` with `value` via a synced temp file in the same directory.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
  let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
  serde_json::to_writer_pretty(&mut tmp, value)?;
  tmp.write_all(b"\n")?;
  tmp.as_file().sync_all()?;
  tmp.persist(path).map_err(|e| e.error)?;
  Ok(())
}
