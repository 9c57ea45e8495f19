//! Input rules for uploads and text fields.
//!
//! Filenames arrive from multipart headers and end up inside storage
//! locators and ZIP entry names, so they are normalised to NFC and reduced
//! to a single path component before anything else looks at them.

use unicode_normalization::UnicodeNormalization;

use crate::config::{ALLOWED_AUDIO_EXTENSIONS, MAX_LIST_LIMIT};
use crate::error::{Error, Result};

// ============================================================================
// Limits
// ============================================================================

/// Longest accepted filename, in characters
pub const MAX_FILENAME_CHARS: usize = 200;

pub const MAX_TITLE_CHARS: usize = 200;

pub const MAX_DESCRIPTION_CHARS: usize = 5000;

// ============================================================================
// Filenames
// ============================================================================

/// Reduce a client-supplied filename to a safe single component.
///
/// - NFC normalisation (macOS clients send NFD)
/// - Drops any directory part, with either separator
/// - Removes control characters and leading dots
pub fn sanitize_filename(raw: &str) -> Result<String> {
  let normalized: String = raw.nfc().collect();
  let base = normalized
    .rsplit(['/', '\\'])
    .next()
    .unwrap_or_default();

  let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
  let cleaned = cleaned.trim().trim_start_matches('.').trim();

  if cleaned.is_empty() {
    return Err(Error::Validation("filename is empty".into()));
  }
  if cleaned.chars().count() > MAX_FILENAME_CHARS {
    return Err(Error::Validation(format!(
      "filename is longer than {} characters",
      MAX_FILENAME_CHARS
    )));
  }
  Ok(cleaned.to_string())
}

/// Lowercased extension, if the file has one
pub fn file_extension(filename: &str) -> Option<String> {
  let (stem, ext) = filename.rsplit_once('.')?;
  if stem.is_empty() || ext.is_empty() {
    return None;
  }
  Some(ext.to_lowercase())
}

/// Sanitise a filename and require one of the accepted audio formats
pub fn validate_audio_filename(raw: &str) -> Result<String> {
  let filename = sanitize_filename(raw)?;
  match file_extension(&filename) {
    Some(ext) if ALLOWED_AUDIO_EXTENSIONS.contains(&ext.as_str()) => Ok(filename),
    _ => Err(Error::Validation(format!(
      "unsupported file type, expected one of: {}",
      ALLOWED_AUDIO_EXTENSIONS.join(", ")
    ))),
  }
}

pub fn validate_file_size(size: u64, max: usize) -> Result<()> {
  if size == 0 {
    return Err(Error::Validation("file is empty".into()));
  }
  if size > max as u64 {
    return Err(Error::Validation(format!(
      "file exceeds the {} byte limit",
      max
    )));
  }
  Ok(())
}

// ============================================================================
// Text fields
// ============================================================================

/// Trimmed, non-empty, bounded title
pub fn validate_title(title: &str) -> Result<String> {
  let title = title.trim();
  if title.is_empty() {
    return Err(Error::Validation("title is required".into()));
  }
  if title.chars().count() > MAX_TITLE_CHARS {
    return Err(Error::Validation(format!(
      "title is longer than {} characters",
      MAX_TITLE_CHARS
    )));
  }
  Ok(title.to_string())
}

/// Trimmed description; may be empty
pub fn validate_description(description: &str) -> Result<String> {
  let description = description.trim();
  if description.chars().count() > MAX_DESCRIPTION_CHARS {
    return Err(Error::Validation(format!(
      "description is longer than {} characters",
      MAX_DESCRIPTION_CHARS
    )));
  }
  Ok(description.to_string())
}

// ============================================================================
// Paging
// ============================================================================

pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
  limit.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
}

pub fn clamp_offset(offset: Option<i64>) -> i64 {
  offset.unwrap_or(0).max(0)
}
