// Tests for artifact sinks

use burrow_core::sink::{Artifact, FileSink, MemorySink, ReportSink, artifact_stem};
use chrono::{Local, TimeZone};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_artifact_stem_format() {
    let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
    assert_eq!(artifact_stem("example.com", at), "20240309_070501-example.com");
    assert_eq!(
        artifact_stem("localhost:8080", at),
        "20240309_070501-localhost_8080"
    );
}

#[test]
fn test_file_sink_creates_files_up_front() {
    let temp_dir = TempDir::new().unwrap();
    let sink = FileSink::create(temp_dir.path(), "run", false).unwrap();

    assert!(temp_dir.path().join("run.txt").exists());
    assert!(temp_dir.path().join("run_info.txt").exists());
    assert!(!temp_dir.path().join("run_info.json").exists());
    assert_eq!(sink.paths().len(), 2);
    assert!(sink.path(Artifact::Json).is_none());
}

#[test]
fn test_file_sink_writes_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let mut sink = FileSink::create(temp_dir.path(), "run", true).unwrap();

    sink.write(Artifact::RawList, "https://h/\n").unwrap();
    sink.write(Artifact::Info, "Target: https://h/\n").unwrap();
    sink.write(Artifact::Json, "{}").unwrap();

    assert_eq!(
        fs::read_to_string(temp_dir.path().join("run.txt")).unwrap(),
        "https://h/\n"
    );
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("run_info.txt")).unwrap(),
        "Target: https://h/\n"
    );
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("run_info.json")).unwrap(),
        "{}"
    );
}

#[test]
fn test_file_sink_skips_json_when_not_requested() {
    let temp_dir = TempDir::new().unwrap();
    let mut sink = FileSink::create(temp_dir.path(), "run", false).unwrap();

    sink.write(Artifact::Json, "{}").unwrap();
    assert!(!temp_dir.path().join("run_info.json").exists());
}

#[test]
fn test_file_sink_unwritable_destination() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does").join("not").join("exist");
    assert!(FileSink::create(&missing, "run", false).is_err());
}

#[test]
fn test_memory_sink() {
    let mut sink = MemorySink::default();
    sink.write(Artifact::Info, "first").unwrap();
    sink.write(Artifact::Info, "second").unwrap();

    assert_eq!(sink.get(Artifact::Info), Some("second"));
    assert_eq!(sink.get(Artifact::RawList), None);
}
