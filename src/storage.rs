//! Local file storage for uploaded samples and submissions.
//!
//! Files are addressed by an opaque locator, a path relative to the storage
//! root: `<kind>/<YYYY>/<MM>/<unix-ts>_<random>_<filename>`. Only this module
//! turns a locator back into a filesystem path.

use chrono::{Datelike, Utc};
use rand::Rng;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
  Samples,
  Submissions,
}

impl StorageKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Samples => "samples",
      Self::Submissions => "submissions",
    }
  }
}

#[derive(Debug, Clone)]
pub struct Storage {
  base: PathBuf,
}

impl Storage {
  pub fn new(base: impl Into<PathBuf>) -> Self {
    Self { base: base.into() }
  }

  /// Stream `reader` into a new file and return its locator along with the
  /// number of bytes written. The filename must already be sanitised.
  pub fn save(&self, kind: StorageKind, filename: &str, mut reader: impl Read) -> io::Result<(String, u64)> {
    let now = Utc::now();
    let suffix: u32 = rand::rng().random_range(0..1_000_000);
    let locator = format!(
      "{}/{:04}/{:02}/{}_{:06}_{}",
      kind.as_str(),
      now.year(),
      now.month(),
      now.timestamp(),
      suffix,
      filename
    );

    let path = self.resolve(&locator)?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }

    let mut file = File::create_new(&path)?;
    let written = match io::copy(&mut reader, &mut file) {
      Ok(n) => n,
      Err(e) => {
        drop(file);
        let _ = fs::remove_file(&path);
        return Err(e);
      }
    };
    file.sync_all()?;

    tracing::debug!("Stored {} bytes at {}", written, locator);
    Ok((locator, written))
  }

  pub fn open(&self, locator: &str) -> io::Result<File> {
    File::open(self.resolve(locator)?)
  }

  /// Remove a stored file; a missing file is not an error
  pub fn delete(&self, locator: &str) -> io::Result<()> {
    match fs::remove_file(self.resolve(locator)?) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e),
    }
  }

  /// Map a locator to a path under the storage root, rejecting anything that
  /// could point outside it.
  fn resolve(&self, locator: &str) -> io::Result<PathBuf> {
    let relative = Path::new(locator);
    let escapes = locator.is_empty()
      || relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid storage locator: {:?}", locator),
      ));
    }
    Ok(self.base.join(relative))
  }
}
