//! Plain gzip reader (`.gz`)
//!
//! A gzip file is treated as an archive with exactly one entry, named after
//! the file without its `.gz` suffix.

use super::{ArchiveSource, EntryCallback};
use crate::error::ArchiveResult;
use flate2::read::GzDecoder;
use std::io::Read;

#[derive(Debug, Clone, Copy, Default)]
pub struct GzipSource;

impl ArchiveSource for GzipSource {
    // Decompression errors surface while the callback reads the entry.
    fn for_each_entry(
        &self,
        name: &str,
        reader: &mut dyn Read,
        on_entry: &mut EntryCallback<'_>,
    ) -> ArchiveResult<()> {
        let entry_name = name.strip_suffix(".gz").unwrap_or(name);
        let mut decoder = GzDecoder::new(reader);
        on_entry(entry_name, &mut decoder);
        Ok(())
    }
}
