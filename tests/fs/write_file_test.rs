/*!
 * Write Pipeline Tests
 */

use crate::support::{filesystem, Call, Captured, RecordingBackend};
use loopfs::{Filesystem, FsConfig, FsError, WriteOptions};
use nix::errno::Errno;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn write_file(fs: &loopfs::Filesystem, path: &str, data: &'static [u8]) -> FsError {
    let captured = Captured::new();
    let sink = captured.sink();
    fs.write_file(path, data, move |err| sink.borrow_mut().push(err));
    captured.single()
}

fn write_offsets(backend: &RecordingBackend) -> Vec<(u64, usize)> {
    backend
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Write { offset, len, .. } => Some((offset, len)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_write_creates_and_chunks() {
    let backend = RecordingBackend::new();
    let fs = filesystem(&backend, 4);

    let err = write_file(&fs, "/out", b"0123456789");

    assert!(!err.is_error());
    assert_eq!(backend.inner.contents("/out").unwrap(), b"0123456789");
    assert_eq!(write_offsets(&backend), vec![(0, 4), (4, 4), (8, 2)]);
    assert!(matches!(backend.calls().last(), Some(Call::Close(_))));
}

#[test]
fn test_write_truncates_existing() {
    let backend = RecordingBackend::with_file("/out", b"a much longer previous body");
    let fs = filesystem(&backend, 8192);

    let err = write_file(&fs, "/out", b"short");

    assert!(!err.is_error());
    assert_eq!(backend.inner.contents("/out").unwrap(), b"short");
}

#[test]
fn test_short_writes_resume() {
    let backend = RecordingBackend::new();
    backend.faults().max_write = Some(3);
    let fs = filesystem(&backend, 8);

    let err = write_file(&fs, "/out", b"abcdefgh");

    assert!(!err.is_error());
    assert_eq!(backend.inner.contents("/out").unwrap(), b"abcdefgh");
    assert_eq!(write_offsets(&backend), vec![(0, 8), (3, 5), (6, 2)]);
}

#[test]
fn test_zero_byte_write_is_eio() {
    let backend = RecordingBackend::new();
    backend.faults().max_write = Some(0);
    let fs = filesystem(&backend, 8);

    let err = write_file(&fs, "/out", b"data");

    assert_eq!(err.errno(), Some(Errno::EIO));
    assert_eq!(write_offsets(&backend).len(), 1);
    assert_eq!(backend.inner.open_count(), 0);
}

#[test]
fn test_write_failure_still_closes() {
    let backend = RecordingBackend::new();
    backend.faults().write = Some(Errno::ENOSPC);
    backend.faults().close = Some(Errno::EIO);
    let fs = filesystem(&backend, 8);

    let err = write_file(&fs, "/full", b"data");

    assert_eq!(err.errno(), Some(Errno::ENOSPC));
    assert!(matches!(backend.calls().last(), Some(Call::Close(_))));
}

#[test]
fn test_close_failure_reported() {
    let backend = RecordingBackend::new();
    backend.faults().close = Some(Errno::EIO);
    let fs = filesystem(&backend, 8);

    let err = write_file(&fs, "/out", b"data");

    assert_eq!(err.errno(), Some(Errno::EIO));
    assert_eq!(backend.inner.contents("/out").unwrap(), b"data");
}

#[test]
fn test_open_failure_skips_close() {
    let backend = RecordingBackend::new();
    let fs = filesystem(&backend, 8);

    let err = write_file(&fs, "/no/such/dir/file", b"data");

    assert_eq!(err.errno(), Some(Errno::ENOENT));
    assert_eq!(backend.count(|c| matches!(c, Call::Close(_))), 0);
}

#[test]
fn test_empty_write_only_opens_and_closes() {
    let backend = RecordingBackend::with_file("/out", b"old");
    let fs = filesystem(&backend, 8);

    let err = write_file(&fs, "/out", b"");

    assert!(!err.is_error());
    assert_eq!(backend.inner.contents("/out").unwrap(), b"");
    assert_eq!(write_offsets(&backend).len(), 0);
}

#[test]
fn test_append_options() {
    let backend = RecordingBackend::with_file("/log", b"one\n");
    let fs = filesystem(&backend, 8);
    let captured = Captured::new();

    let sink = captured.sink();
    fs.write_file_with("/log", String::from("two\n"), WriteOptions::append(), move |err| {
        sink.borrow_mut().push(err)
    });

    assert!(!captured.single().is_error());
    assert_eq!(backend.inner.contents("/log").unwrap(), b"one\ntwo\n");
}

#[test]
fn test_dropped_facade_releases_pending_write() {
    let backend = RecordingBackend::new();
    let fs = Filesystem::with_backend(backend.clone(), FsConfig::external().with_workers(2)).unwrap();
    let captured = Captured::<FsError>::new();

    let sink = captured.sink();
    fs.write_file("/out", "abandoned", move |err| sink.borrow_mut().push(err));
    assert_eq!(fs.event_loop().pending(), 1);

    drop(fs);
    assert_eq!(Arc::strong_count(&backend), 1);
    assert_eq!(captured.count(), 0);
    assert!(backend.inner.contents("/out").is_none());
}
