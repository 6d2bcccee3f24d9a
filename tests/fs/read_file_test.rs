/*!
 * Read Pipeline Tests
 * Chunking, ordering and failure short-circuiting of read_file
 */

use crate::support::{filesystem, read_file, Call, Captured, RecordingBackend};
use loopfs::{DriveMode, Filesystem, FsConfig, FsError, OpenFlags, ReadOptions, RunMode};
use nix::errno::Errno;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn test_chunked_offsets() {
    let backend = RecordingBackend::with_file("/abc", b"abcdef");
    let fs = filesystem(&backend, 2);

    let (err, contents) = read_file(&fs, "/abc");

    assert!(!err.is_error());
    assert_eq!(contents, b"abcdef");
    assert_eq!(backend.read_offsets(), vec![0, 2, 4]);
    assert_eq!(backend.read_lengths(), vec![2, 2, 2]);
}

#[test]
fn test_call_order() {
    let backend = RecordingBackend::with_file("/f", b"hello");
    let fs = filesystem(&backend, 8192);

    read_file(&fs, "/f");

    let calls = backend.calls();
    assert_eq!(calls.len(), 4);
    assert!(matches!(calls[0], Call::Stat(_)));
    assert!(matches!(calls[1], Call::Open(_)));
    assert!(matches!(calls[2], Call::Read { offset: 0, len: 5, .. }));
    assert!(matches!(calls[3], Call::Close(_)));
}

#[test]
fn test_last_chunk_is_remainder() {
    let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let backend = RecordingBackend::with_file("/big", &data);
    let fs = filesystem(&backend, 8192);

    let (err, contents) = read_file(&fs, "/big");

    assert!(!err.is_error());
    assert_eq!(contents, data);
    assert_eq!(backend.read_lengths(), vec![8192, 8192, 20_000 - 2 * 8192]);
}

#[test]
fn test_default_chunk_size() {
    assert_eq!(FsConfig::default().chunk_size, 8192);
}

#[test]
fn test_empty_file_issues_no_reads() {
    let backend = RecordingBackend::with_file("/empty", b"");
    let fs = filesystem(&backend, 4);

    let (err, contents) = read_file(&fs, "/empty");

    assert!(!err.is_error());
    assert!(contents.is_empty());
    assert_eq!(backend.count(|c| matches!(c, Call::Read { .. })), 0);
    assert_eq!(backend.count(|c| matches!(c, Call::Close(_))), 1);
}

#[test]
fn test_stat_failure_stops_pipeline() {
    let backend = RecordingBackend::new();
    let fs = filesystem(&backend, 4);

    let (err, contents) = read_file(&fs, "/missing");

    assert!(err.is_error());
    assert_eq!(err.message, "ENOENT");
    assert_eq!(err.code, -(Errno::ENOENT as i32));
    assert!(contents.is_empty());
    assert_eq!(backend.calls(), vec![Call::Stat("/missing".into())]);
}

#[test]
fn test_open_failure_skips_read_and_close() {
    let backend = RecordingBackend::with_file("/locked", b"secret");
    backend.faults().open = Some(Errno::EACCES);
    let fs = filesystem(&backend, 4);

    let (err, contents) = read_file(&fs, "/locked");

    assert_eq!(err.errno(), Some(Errno::EACCES));
    assert!(contents.is_empty());
    assert_eq!(backend.count(|c| matches!(c, Call::Read { .. })), 0);
    assert_eq!(backend.count(|c| matches!(c, Call::Close(_))), 0);
}

#[test]
fn test_read_failure_still_closes() {
    let backend = RecordingBackend::with_file("/flaky", b"0123456789");
    backend.faults().read_at = Some((4, Errno::EIO));
    backend.faults().close = Some(Errno::EBADF);
    let fs = filesystem(&backend, 4);

    let (err, contents) = read_file(&fs, "/flaky");

    // The read error survives the failing close
    assert_eq!(err.errno(), Some(Errno::EIO));
    assert!(contents.is_empty());
    assert_eq!(backend.read_offsets(), vec![0, 4]);
    assert!(matches!(backend.calls().last(), Some(Call::Close(_))));
    assert_eq!(backend.inner.open_count(), 0);
}

#[test]
fn test_close_failure_keeps_contents() {
    let backend = RecordingBackend::with_file("/f", b"payload");
    backend.faults().close = Some(Errno::EIO);
    let fs = filesystem(&backend, 4);

    let (err, contents) = read_file(&fs, "/f");

    assert_eq!(err.errno(), Some(Errno::EIO));
    assert_eq!(contents, b"payload");
}

#[test]
fn test_truncated_after_stat() {
    let backend = RecordingBackend::with_file("/shrinking", b"abcdefgh");
    backend.after_stat(|fs| fs.set_len("/shrinking", 3).unwrap());
    let fs = filesystem(&backend, 2);

    let (err, contents) = read_file(&fs, "/shrinking");

    assert!(!err.is_error());
    assert_eq!(contents, b"abc");
    assert_eq!(backend.read_offsets(), vec![0, 2, 3]);
    assert_eq!(backend.inner.open_count(), 0);
}

#[test]
fn test_growth_after_stat_ignored() {
    let backend = RecordingBackend::with_file("/growing", b"abcd");
    backend.after_stat(|fs| {
        fs.set_len("/growing", 64).unwrap();
    });
    let fs = filesystem(&backend, 3);

    let (err, contents) = read_file(&fs, "/growing");

    assert!(!err.is_error());
    assert_eq!(contents, b"abcd");
    assert_eq!(backend.read_offsets(), vec![0, 3]);
}

#[test]
fn test_missing_file_not_created() {
    // Stat runs before the creating open
    let backend = RecordingBackend::new();
    let fs = filesystem(&backend, 4);

    read_file(&fs, "/ghost");

    assert!(backend.inner.contents("/ghost").is_none());
}

#[test]
fn test_read_only_options() {
    let backend = RecordingBackend::with_file("/ro", b"data");
    let fs = filesystem(&backend, 4);
    let captured = Captured::new();

    let sink = captured.sink();
    let options = ReadOptions {
        flags: OpenFlags::read_only(),
        mode: 0,
    };
    fs.read_file_with("/ro", options, move |err, contents| {
        sink.borrow_mut().push((err, contents));
    });

    let (err, contents) = captured.single();
    assert!(!err.is_error());
    assert_eq!(&contents[..], b"data");
}

#[test]
fn test_directory_fails_at_open() {
    let backend = RecordingBackend::new();
    backend.inner.create_dir("/dir").unwrap();
    let fs = filesystem(&backend, 4);

    let (err, contents) = read_file(&fs, "/dir");

    assert_eq!(err.errno(), Some(Errno::EISDIR));
    assert!(contents.is_empty());
}

#[test]
fn test_concurrent_pipelines_on_one_loop() {
    let backend = RecordingBackend::new();
    backend.inner.insert_file("/a", b"first file".to_vec()).unwrap();
    backend.inner.insert_file("/b", b"second".to_vec()).unwrap();
    let fs = filesystem(&backend, 3);
    let captured = Captured::new();

    // Submit both before anyone drives the loop
    let config = fs.config().clone().with_drive_mode(DriveMode::External);
    let external = Filesystem::new(fs.event_loop().clone(), config);
    for path in ["/a", "/b"] {
        let sink = captured.sink();
        external.read_file(path, move |err, contents| {
            sink.borrow_mut().push((path, err, contents.to_vec()));
        });
    }
    fs.event_loop().run(RunMode::Default).unwrap();

    let mut results = captured.sink().borrow().clone();
    results.sort_by_key(|(path, ..)| *path);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].2, b"first file");
    assert_eq!(results[1].2, b"second");
    assert!(results.iter().all(|(_, err, _)| !err.is_error()));
}

#[test]
fn test_dropped_facade_releases_pending_read() {
    let backend = RecordingBackend::with_file("/f", b"never read");
    let fs = Filesystem::with_backend(backend.clone(), FsConfig::external().with_workers(2)).unwrap();
    let captured = Captured::<FsError>::new();

    let sink = captured.sink();
    fs.read_file("/f", move |err, _| sink.borrow_mut().push(err));
    assert_eq!(fs.event_loop().pending(), 1);

    // Nobody drives the loop; dropping the facade tears it down
    drop(fs);
    assert_eq!(Arc::strong_count(&backend), 1);
    assert_eq!(captured.count(), 0);
    assert!(backend.calls().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_read_count_is_ceil(size in 0usize..2048, chunk in 1usize..300) {
        let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
        let backend = RecordingBackend::with_file("/p", &data);
        let fs = filesystem(&backend, chunk);

        let (err, contents) = read_file(&fs, "/p");

        prop_assert!(!err.is_error());
        prop_assert_eq!(contents, data);
        prop_assert_eq!(backend.read_offsets().len(), size.div_ceil(chunk));
        let offsets = backend.read_offsets();
        prop_assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    }
}
