//! Archive sources
//!
//! An archive source turns one compressed byte stream into a sequence of
//! named entries. The walker only relies on the entry-iteration contract:
//!
//! ```text
//!   for_each_entry(name, stream, on_entry)
//!        │
//!        ├── on_entry("corpus.tar.gz/a/x.xml", <reader>) -> true   continue
//!        ├── on_entry("corpus.tar.gz/a/y.txt", <reader>) -> false  stop
//!        └── (remaining entries are never decoded)
//! ```
//!
//! Entry paths of tar and zip archives are the archive name, a `/`, and the
//! path stored in the archive. A plain `.gz` file has a single entry named
//! after the file without its `.gz` suffix. Directory entries are skipped.

pub mod gzip;
pub mod tar_gz;
pub mod zip_file;

pub use self::gzip::GzipSource;
pub use self::tar_gz::TarGzSource;
pub use self::zip_file::ZipSource;

use crate::error::{ArchiveError, ArchiveResult};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Per-entry callback: return `true` to continue, `false` to stop iterating
pub type EntryCallback<'a> = dyn FnMut(&str, &mut dyn Read) -> bool + 'a;

/// Iterates the regular file entries of an archive stream
pub trait ArchiveSource: Send + Sync {
    fn for_each_entry(
        &self,
        name: &str,
        reader: &mut dyn Read,
        on_entry: &mut EntryCallback<'_>,
    ) -> ArchiveResult<()>;
}

/// Archive formats recognised by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.tar.gz` or `.tgz`
    TarGz,
    /// `.zip`
    Zip,
    /// `.gz` holding a single file
    Gzip,
}

impl ArchiveKind {
    /// Decide how a named item is unpacked
    ///
    /// Tar-gzip and zip archives are only opened when `recurse_archives` is
    /// set. Plain gzip files are always decompressed. With archives off, a
    /// `.tar.gz` therefore yields a single `.tar` item, while `.tgz` and
    /// `.zip` files are treated as ordinary items.
    pub fn detect(name: &str, recurse_archives: bool) -> Option<Self> {
        if recurse_archives && (name.ends_with(".tar.gz") || name.ends_with(".tgz")) {
            Some(ArchiveKind::TarGz)
        } else if recurse_archives && name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".gz") {
            Some(ArchiveKind::Gzip)
        } else {
            None
        }
    }

    /// Reader for this format
    pub fn source(self) -> &'static dyn ArchiveSource {
        match self {
            ArchiveKind::TarGz => &TarGzSource,
            ArchiveKind::Zip => &ZipSource,
            ArchiveKind::Gzip => &GzipSource,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::Zip => "zip",
            ArchiveKind::Gzip => "gz",
        }
    }
}

/// Read one file out of an archive on disk
///
/// Zip archives are accessed through their central directory and
/// `path_inside` must be the exact stored path. Gzip-based archives are
/// scanned from the start and the first entry whose path ends with
/// `path_inside` is returned.
pub fn fetch_file_from_archive(archive: &Path, path_inside: &str) -> ArchiveResult<Vec<u8>> {
    let name = archive.to_string_lossy();

    if name.ends_with(".zip") {
        let file = File::open(archive).map_err(|e| ArchiveError::read(&name, e))?;
        return zip_file::read_entry(&name, BufReader::new(file), path_inside).map_err(|e| match e {
            ArchiveError::EntryNotFound { .. } => not_found(archive, path_inside),
            other => other,
        });
    }

    let kind = match ArchiveKind::detect(&name, true) {
        Some(kind @ (ArchiveKind::TarGz | ArchiveKind::Gzip)) => kind,
        _ => {
            return Err(ArchiveError::Unsupported {
                name: name.into_owned(),
            })
        }
    };

    let mut reader = BufReader::new(File::open(archive).map_err(|e| ArchiveError::read(&name, e))?);
    let mut found: Option<std::io::Result<Vec<u8>>> = None;
    kind.source().for_each_entry(&name, &mut reader, &mut |entry_path, content| {
        if !entry_path.ends_with(path_inside) {
            return true;
        }
        let mut bytes = Vec::new();
        found = Some(content.read_to_end(&mut bytes).map(|_| bytes));
        false
    })?;

    match found {
        Some(Ok(bytes)) => Ok(bytes),
        Some(Err(e)) => Err(ArchiveError::read(&name, e)),
        None => Err(not_found(archive, path_inside)),
    }
}

fn not_found(archive: &Path, entry: &str) -> ArchiveError {
    ArchiveError::EntryNotFound {
        archive: archive.to_path_buf(),
        entry: entry.to_string(),
    }
}
