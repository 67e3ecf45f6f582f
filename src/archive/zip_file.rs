//! Zip reader (`.zip`)
//!
//! Zip keeps its directory at the end of the file, so the stream is read
//! into memory before entries are listed.

use super::{ArchiveSource, EntryCallback};
use crate::error::{ArchiveError, ArchiveResult};
use std::io::{Cursor, Read, Seek};
use tracing::trace;
use zip::result::ZipError;
use zip::ZipArchive;

/// Iterates the file entries of a zip archive in stored order
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipSource;

impl ArchiveSource for ZipSource {
    fn for_each_entry(
        &self,
        name: &str,
        reader: &mut dyn Read,
        on_entry: &mut EntryCallback<'_>,
    ) -> ArchiveResult<()> {
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .map_err(|e| ArchiveError::read(name, e))?;

        let mut archive = ZipArchive::new(Cursor::new(buffer)).map_err(|e| ArchiveError::zip(name, e))?;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(|e| ArchiveError::zip(name, e))?;
            if file.is_dir() {
                continue;
            }

            let full_path = format!("{}/{}", name, file.name());
            trace!(archive = %name, entry = %file.name(), "Zip entry");
            if !on_entry(&full_path, &mut file) {
                break;
            }
        }

        Ok(())
    }
}

/// Read a single entry by its stored path
pub(crate) fn read_entry<R: Read + Seek>(name: &str, reader: R, entry: &str) -> ArchiveResult<Vec<u8>> {
    let mut archive = ZipArchive::new(reader).map_err(|e| ArchiveError::zip(name, e))?;
    let mut file = match archive.by_name(entry) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => {
            return Err(ArchiveError::EntryNotFound {
                archive: name.into(),
                entry: entry.to_string(),
            })
        }
        Err(e) => return Err(ArchiveError::zip(name, e)),
    };

    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)
        .map_err(|e| ArchiveError::read(name, e))?;
    Ok(bytes)
}
