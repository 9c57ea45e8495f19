//! Sample pack ZIP export.
//!
//! All-or-nothing: the archive is written to a temporary file next to the
//! destination and only renamed into place once every sample has been
//! copied. Any unreadable sample aborts the export and the temporary file is
//! removed on drop.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;

use crate::domain::PackWithSamples;
use crate::error::Result;
use crate::storage::Storage;

/// Write every sample of `pack` into a ZIP at `destination`, one entry per
/// sample named by its filename. Returns the number of entries written.
pub fn create_pack_zip(storage: &Storage, pack: &PackWithSamples, destination: &Path) -> Result<usize> {
    tracing::info!(
        "Creating zip for pack {} with {} samples",
        pack.pack.id,
        pack.samples.len()
    );

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir)?;

    let mut zip = zip::ZipWriter::new(temp);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for sample in &pack.samples {
        let mut source = storage.open(&sample.storage_locator).map_err(|e| {
            tracing::warn!(
                "Sample {} ({}) is unreadable, aborting archive: {}",
                sample.id,
                sample.storage_locator,
                e
            );
            e
        })?;
        zip.start_file(sample.filename.as_str(), options)?;
        io::copy(&mut source, &mut zip)?;
    }

    let mut temp = zip.finish()?;
    temp.flush()?;
    temp.persist(destination).map_err(|e| e.error)?;

    tracing::info!("Wrote {} with {} entries", destination.display(), pack.samples.len());
    Ok(pack.samples.len())
}
