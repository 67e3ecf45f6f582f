//! Tar-gzip reader (`.tar.gz`, `.tgz`)

use super::{ArchiveSource, EntryCallback};
use crate::error::{ArchiveError, ArchiveResult};
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::trace;

/// Streams the regular file entries of a gzip-compressed tar archive
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzSource;

impl ArchiveSource for TarGzSource {
    fn for_each_entry(
        &self,
        name: &str,
        reader: &mut dyn Read,
        on_entry: &mut EntryCallback<'_>,
    ) -> ArchiveResult<()> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let entries = archive.entries().map_err(|e| ArchiveError::read(name, e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| ArchiveError::read(name, e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let entry_path = entry
                .path()
                .map_err(|e| ArchiveError::read(name, e))?
                .to_string_lossy()
                .into_owned();
            let full_path = format!("{}/{}", name, entry_path);

            trace!(archive = %name, entry = %entry_path, "Tar entry");
            if !on_entry(&full_path, &mut entry) {
                break;
            }
        }

        Ok(())
    }
}
