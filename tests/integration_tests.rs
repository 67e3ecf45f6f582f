//! Integration tests for archive-walker
//!
//! Trees and archives are built in temporary directories; nothing outside
//! them is touched.

use archive_walker::{
    fetch_file_from_archive, ArchiveError, ErrorHandler, ExecutionMode, FileHandler, ItemStream,
    Walker, WalkerError, WalkerOptions, WalkerPhase,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// One recorded handler call
#[derive(Debug, Clone, PartialEq, Eq)]
struct Visit {
    path: String,
    content: String,
    origin: Option<PathBuf>,
}

#[derive(Default)]
struct Recorder {
    visits: Mutex<Vec<Visit>>,
    dirs: Mutex<Vec<PathBuf>>,
}

impl Recorder {
    fn paths(&self) -> Vec<String> {
        self.visits.lock().iter().map(|v| v.path.clone()).collect()
    }

    fn visits(&self) -> Vec<Visit> {
        self.visits.lock().clone()
    }
}

impl FileHandler for Recorder {
    fn directory(&self, dir: &Path) -> anyhow::Result<()> {
        self.dirs.lock().push(dir.to_path_buf());
        Ok(())
    }

    fn file(&self, path: &str, mut content: ItemStream, origin: Option<&Path>) -> anyhow::Result<()> {
        let mut bytes = Vec::new();
        content.read_to_end(&mut bytes)?;
        self.visits.lock().push(Visit {
            path: path.to_string(),
            content: String::from_utf8_lossy(&bytes).into_owned(),
            origin: origin.map(Path::to_path_buf),
        });
        Ok(())
    }
}

/// Counts reports and always asks to abort
#[derive(Default)]
struct AbortingErrors {
    reports: AtomicUsize,
}

impl ErrorHandler for AbortingErrors {
    fn error_occurred(&self, _err: &anyhow::Error, _path: &str, _origin: Option<&Path>) -> bool {
        self.reports.fetch_add(1, Ordering::SeqCst);
        false
    }
}

fn inline() -> WalkerOptions {
    WalkerOptions::new(ExecutionMode::Inline)
}

fn relative(root: &Path, path: &str) -> String {
    Path::new(path)
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| path.to_string())
}

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn zip_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (path, content) in files {
        writer.start_file(*path, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_inline_order_directories_first() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("b.txt"), "b").unwrap();
    fs::write(root.join("A.txt"), "a").unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub").join("c.txt"), "c").unwrap();

    let recorder = Arc::new(Recorder::default());
    let walker = Walker::new(inline(), recorder.clone()).unwrap();
    walker.process_path(root).unwrap();
    walker.close();

    let paths: Vec<String> = recorder.paths().iter().map(|p| relative(root, p)).collect();
    assert_eq!(paths, vec!["sub/c.txt", "A.txt", "b.txt"]);
    assert_eq!(*recorder.dirs.lock(), vec![root.join("sub")]);

    let stats = walker.stats();
    assert_eq!(stats.directories, 1);
    assert_eq!(stats.submitted, 4);
    assert_eq!(stats.completed, 4);
}

#[test]
fn test_single_file_input() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("only.txt");
    fs::write(&file, "solo").unwrap();

    let recorder = Arc::new(Recorder::default());
    let walker = Walker::new(inline(), recorder.clone()).unwrap();
    walker.process_path(&file).unwrap();
    walker.close();

    let visits = recorder.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].content, "solo");
    assert_eq!(visits[0].origin.as_deref(), Some(file.as_path()));
    assert!(recorder.dirs.lock().is_empty());
}

#[test]
fn test_tar_gz_entries_filtered_by_base_name() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("corpus.tar.gz");
    fs::write(&archive, tar_gz(&[("a/x.xml", b"<x/>"), ("a/y.txt", b"why")])).unwrap();

    let recorder = Arc::new(Recorder::default());
    let walker = Walker::new(inline(), recorder.clone()).unwrap();
    walker.set_name_glob("*.xml").unwrap();
    walker.process_path(&archive).unwrap();
    walker.close();

    let visits = recorder.visits();
    assert_eq!(visits.len(), 1);
    assert!(visits[0].path.ends_with("corpus.tar.gz/a/x.xml"));
    assert_eq!(visits[0].content, "<x/>");
    assert_eq!(visits[0].origin.as_deref(), Some(archive.as_path()));
    assert_eq!(walker.stats().archives, 1);
}

#[test]
fn test_archives_disabled() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.tgz"), tar_gz(&[("inner.txt", b"i")])).unwrap();
    fs::write(root.join("b.tar.gz"), tar_gz(&[("inner.txt", b"i")])).unwrap();
    fs::write(root.join("c.zip"), zip_archive(&[("inner.txt", b"i")])).unwrap();

    let recorder = Arc::new(Recorder::default());
    let walker = Walker::new(inline().recurse_archives(false), recorder.clone()).unwrap();
    walker.process_path(root).unwrap();
    walker.close();

    // .tar.gz is still gunzipped, leaving the tar itself
    let paths: Vec<String> = recorder.paths().iter().map(|p| relative(root, p)).collect();
    assert_eq!(paths, vec!["a.tgz", "b.tar", "c.zip"]);
}

#[test]
fn test_zip_and_gzip_items() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("docs.zip"), zip_archive(&[("one.xml", b"1"), ("sub/two.xml", b"2")])).unwrap();
    fs::write(root.join("three.xml.gz"), gzip(b"3")).unwrap();

    let recorder = Arc::new(Recorder::default());
    let walker = Walker::new(inline(), recorder.clone()).unwrap();
    walker.process_path(root).unwrap();
    walker.close();

    let visits: Vec<(String, String)> = recorder
        .visits()
        .into_iter()
        .map(|v| (relative(root, &v.path), v.content))
        .collect();
    assert_eq!(
        visits,
        vec![
            ("docs.zip/one.xml".to_string(), "1".to_string()),
            ("docs.zip/sub/two.xml".to_string(), "2".to_string()),
            ("three.xml".to_string(), "3".to_string()),
        ]
    );
}

#[test]
fn test_nested_archive() {
    let dir = tempdir().unwrap();
    let inner = zip_archive(&[("deep.xml", b"<deep/>")]);
    let outer = dir.path().join("outer.tar.gz");
    fs::write(&outer, tar_gz(&[("pack/inner.zip", &inner)])).unwrap();

    let recorder = Arc::new(Recorder::default());
    let walker = Walker::new(inline(), recorder.clone()).unwrap();
    walker.process_path(&outer).unwrap();
    walker.close();

    let visits = recorder.visits();
    assert_eq!(visits.len(), 1);
    assert!(visits[0].path.ends_with("outer.tar.gz/pack/inner.zip/deep.xml"));
    assert_eq!(visits[0].origin.as_deref(), Some(outer.as_path()));
    assert_eq!(walker.stats().archives, 2);
}

#[test]
fn test_os_junk_skipped_in_archives() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("mac.zip");
    fs::write(&archive, zip_archive(&[("folder/.DS_Store", b"junk"), ("folder/keep.txt", b"k")])).unwrap();

    let recorder = Arc::new(Recorder::default());
    let walker = Walker::new(inline(), recorder.clone()).unwrap();
    walker.process_path(&archive).unwrap();
    walker.close();

    assert_eq!(recorder.visits().len(), 1);
    assert!(recorder.paths()[0].ends_with("keep.txt"));
    assert_eq!(walker.stats().skipped, 1);
}

#[test]
fn test_corrupt_archive_is_reported() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("broken.zip");
    fs::write(&archive, b"definitely not a zip").unwrap();

    let errors = Arc::new(AbortingErrors::default());
    let walker = Walker::with_handlers(inline(), Arc::new(Recorder::default()), errors.clone()).unwrap();
    walker.process_path(&archive).unwrap();

    assert_eq!(errors.reports.load(Ordering::SeqCst), 1);
    assert_eq!(walker.phase(), WalkerPhase::Aborted);
}

/// Counts reports and always asks to continue
#[derive(Default)]
struct ContinuingErrors {
    reports: AtomicUsize,
}

impl ErrorHandler for ContinuingErrors {
    fn error_occurred(&self, _err: &anyhow::Error, _path: &str, _origin: Option<&Path>) -> bool {
        self.reports.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[test]
fn test_unreadable_entry_does_not_hide_later_entries() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("a.txt", stored).unwrap();
    writer.write_all(b"AAAAAAAAAAAAAAAA").unwrap();
    writer.start_file("b.txt", stored).unwrap();
    writer.write_all(b"bee").unwrap();
    let mut data = writer.finish().unwrap().into_inner();

    // Flip a byte of a.txt's stored data so its checksum no longer matches
    let offset = data
        .windows(16)
        .position(|w| w == b"AAAAAAAAAAAAAAAA")
        .unwrap();
    data[offset] = b'Z';

    let dir = tempdir().unwrap();
    let archive = dir.path().join("damaged.zip");
    fs::write(&archive, data).unwrap();

    let recorder = Arc::new(Recorder::default());
    let errors = Arc::new(ContinuingErrors::default());
    let walker = Walker::with_handlers(inline(), recorder.clone(), errors.clone()).unwrap();
    walker.process_path(&archive).unwrap();
    walker.close();

    assert_eq!(errors.reports.load(Ordering::SeqCst), 1);
    let paths = recorder.paths();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with("damaged.zip/b.txt"));
    assert_eq!(walker.phase(), WalkerPhase::Closed);
}

#[test]
fn test_abort_stops_archive_iteration() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("batch.tar.gz");
    fs::write(&archive, tar_gz(&[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")])).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let handler = move |path: &str, _content: ItemStream, _origin: Option<&Path>| -> anyhow::Result<()> {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        seen_clone.lock().push(name.clone());
        if name == "b.txt" {
            anyhow::bail!("b is broken");
        }
        Ok(())
    };

    // Default error policy: report, then abort
    let walker = Walker::new(inline(), Arc::new(handler)).unwrap();
    walker.process_path(&archive).unwrap();

    assert_eq!(*seen.lock(), vec!["a.txt", "b.txt"]);
    assert_eq!(walker.phase(), WalkerPhase::Aborted);
}

#[test]
fn test_inline_failure_stops_traversal() {
    let dir = tempdir().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(dir.path().join(name), name).unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let handler = move |path: &str, _content: ItemStream, _origin: Option<&Path>| -> anyhow::Result<()> {
        let name = Path::new(path).file_name().unwrap().to_string_lossy().into_owned();
        seen_clone.lock().push(name.clone());
        if name == "b.txt" {
            anyhow::bail!("b is broken");
        }
        Ok(())
    };

    let errors = Arc::new(AbortingErrors::default());
    let walker = Walker::with_handlers(inline(), Arc::new(handler), errors.clone()).unwrap();
    walker.process_path(dir.path()).unwrap();

    assert_eq!(*seen.lock(), vec!["a.txt", "b.txt"]);
    assert_eq!(errors.reports.load(Ordering::SeqCst), 1);
    assert!(walker.is_closed());

    // A closed walker ignores further input
    walker.process_path(dir.path()).unwrap();
    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn test_concurrent_failures_reported_once() {
    let handler = |_path: &str, _content: ItemStream, _origin: Option<&Path>| -> anyhow::Result<()> {
        thread::sleep(Duration::from_millis(2));
        anyhow::bail!("always fails")
    };

    let errors = Arc::new(AbortingErrors::default());
    let walker = Walker::with_handlers(
        WalkerOptions::new(ExecutionMode::Pooled { threads: 4 }),
        Arc::new(handler),
        errors.clone(),
    )
    .unwrap();

    for i in 0..50 {
        walker.process_stream(&format!("item{}.txt", i), Box::new(Cursor::new(vec![0u8; 8])), None);
    }
    walker.close();

    assert_eq!(errors.reports.load(Ordering::SeqCst), 1);
    assert_eq!(walker.phase(), WalkerPhase::Aborted);
}

#[test]
fn test_close_waits_for_submitted_work() {
    let done = Arc::new(AtomicUsize::new(0));
    let done_clone = Arc::clone(&done);
    let handler = move |_path: &str, mut content: ItemStream, _origin: Option<&Path>| -> anyhow::Result<()> {
        let mut sink = Vec::new();
        content.read_to_end(&mut sink)?;
        thread::sleep(Duration::from_millis(3));
        done_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };

    let walker = Walker::new(WalkerOptions::new(ExecutionMode::Pooled { threads: 3 }), Arc::new(handler)).unwrap();
    for i in 0..40 {
        walker.process_stream(&format!("doc{}.xml", i), Box::new(Cursor::new(b"<d/>".to_vec())), None);
    }
    let submitted = walker.stats().submitted;
    walker.close();

    assert_eq!(submitted, 40);
    assert_eq!(done.load(Ordering::SeqCst), 40);
    assert_eq!(walker.phase(), WalkerPhase::Closed);
}

#[test]
fn test_abort_from_another_thread() {
    let started = Arc::new(AtomicUsize::new(0));
    let started_clone = Arc::clone(&started);
    let handler = move |_path: &str, _content: ItemStream, _origin: Option<&Path>| -> anyhow::Result<()> {
        started_clone.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        Ok(())
    };

    let walker = Walker::new(WalkerOptions::new(ExecutionMode::Pooled { threads: 2 }), Arc::new(handler)).unwrap();
    let handle = walker.abort_handle();
    let aborter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.abort();
    });

    for i in 0..1000 {
        if walker.is_closed() {
            break;
        }
        walker.process_stream(&format!("f{}.txt", i), Box::new(Cursor::new(Vec::new())), None);
    }
    aborter.join().unwrap();
    walker.close();

    assert_eq!(walker.phase(), WalkerPhase::Aborted);
    assert!(started.load(Ordering::SeqCst) < 1000);
}

#[test]
fn test_missing_root() {
    let dir = tempdir().unwrap();
    let walker = Walker::new(inline(), Arc::new(Recorder::default())).unwrap();

    let err = walker.process_path(dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, WalkerError::NotFound { .. }));
    assert_eq!(walker.phase(), WalkerPhase::Active);
}

#[test]
fn test_fetch_file_from_archives() {
    let dir = tempdir().unwrap();
    let zipped = dir.path().join("set.zip");
    let tarred = dir.path().join("set.tar.gz");
    fs::write(&zipped, zip_archive(&[("docs/a.xml", b"<a/>")])).unwrap();
    fs::write(&tarred, tar_gz(&[("docs/b.xml", b"<b/>")])).unwrap();

    assert_eq!(fetch_file_from_archive(&zipped, "docs/a.xml").unwrap(), b"<a/>");
    assert_eq!(fetch_file_from_archive(&tarred, "docs/b.xml").unwrap(), b"<b/>");

    let missing = fetch_file_from_archive(&tarred, "docs/zz.xml").unwrap_err();
    assert!(matches!(missing, ArchiveError::EntryNotFound { .. }));
}
