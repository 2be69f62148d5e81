//! BulkLoader end to end with fake transport and destination
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{DirDownloader, MemoryRowSource, RecordingInserter};
use ferry_common::types::{ChunkEntry, ChunkManifest, TableManifest};
use ferry_migrate::config::{FailurePolicy, LoadConfig, TableConfig};
use ferry_migrate::error::MigrateError;
use ferry_migrate::export::ChunkedExporter;
use ferry_migrate::load::BulkLoader;
use ferry_migrate::remote::RemoteUrl;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct Fixture {
    _root: tempfile::TempDir,
    staging: PathBuf,
    work_dir: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("staging");
        let work_dir = root.path().join("work");
        std::fs::create_dir_all(&staging).unwrap();
        Self {
            _root: root,
            staging,
            work_dir,
        }
    }

    fn stage(&self, name: &str, contents: &str) {
        std::fs::write(self.staging.join(name), contents).unwrap();
    }

    fn settings(&self, workers: usize, policy: FailurePolicy) -> LoadConfig {
        LoadConfig {
            work_dir: self.work_dir.clone(),
            workers,
            failure_policy: policy,
            ..LoadConfig::default()
        }
    }

    fn loader(&self, inserter: Arc<RecordingInserter>, settings: LoadConfig) -> BulkLoader {
        BulkLoader::new(
            Arc::new(DirDownloader {
                source: self.staging.clone(),
            }),
            inserter,
            RemoteUrl::parse("gs://staging/app").unwrap(),
            settings,
        )
    }
}

fn remaining(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_export_then_load_round_trip() {
    let fixture = Fixture::new();
    let source = MemoryRowSource::default()
        .with_table("t", vec![vec![Some("1"), Some("a")], vec![Some("2"), None], vec![Some("3"), Some("c")]])
        .with_table("u", vec![vec![Some("x")]]);

    let exporter = ChunkedExporter::new(source, &fixture.staging, 2).unwrap();
    exporter
        .export_all(&[TableConfig::new("t"), TableConfig::new("u")])
        .await
        .unwrap();

    let inserter = Arc::new(RecordingInserter::default());
    let loader = fixture.loader(inserter.clone(), fixture.settings(2, FailurePolicy::Abort));
    let report = loader.run().await.unwrap();

    assert_eq!(report.jobs, 3);
    assert_eq!(report.succeeded, 3);
    assert!(report.failed.is_empty());
    assert_eq!(
        inserter.loaded_files(),
        vec![
            ("t".to_string(), "t_split_aa".to_string()),
            ("t".to_string(), "t_split_ab".to_string()),
            ("u".to_string(), "u_split_aa".to_string()),
        ]
    );

    let loaded = inserter.loaded.lock().unwrap();
    let first = loaded.iter().find(|(_, f, _)| f == "t_split_aa").unwrap();
    assert_eq!(first.2, "\"1\",\"a\"\n\"2\",NULL\n");
    drop(loaded);

    assert!(!fixture.work_dir.exists(), "work dir should be removed after a clean run");
}

#[tokio::test]
async fn test_load_without_manifest_uses_file_names() {
    let fixture = Fixture::new();
    fixture.stage("orders_split_aa", "\"1\"\n");
    fixture.stage("orders_split_ab", "\"2\"\n");
    fixture.stage("notes.txt", "ignored");

    let inserter = Arc::new(RecordingInserter::default());
    let loader = fixture.loader(inserter.clone(), fixture.settings(4, FailurePolicy::Abort));
    let report = loader.run().await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert!(inserter.loaded_files().iter().all(|(table, _)| table == "orders"));
}

#[tokio::test]
async fn test_bootstrap_runs_before_load() {
    let fixture = Fixture::new();
    fixture.stage("t_split_aa", "\"1\"\n");

    let mut settings = fixture.settings(1, FailurePolicy::Abort);
    settings.bootstrap = true;
    settings.bootstrap_script = Some(PathBuf::from("schema.sql"));

    let inserter = Arc::new(RecordingInserter::default());
    fixture.loader(inserter.clone(), settings).run().await.unwrap();

    assert_eq!(*inserter.bootstrapped.lock().unwrap(), vec![PathBuf::from("schema.sql")]);
}

#[tokio::test]
async fn test_abort_policy_fails_on_bulk_insert_error() {
    let fixture = Fixture::new();
    for suffix in ["aa", "ab", "ac", "ad", "ae"] {
        fixture.stage(&format!("t_split_{}", suffix), "\"1\"\n");
    }

    let inserter = Arc::new(RecordingInserter::failing(&["t_split_ac"]));
    let loader = fixture.loader(inserter.clone(), fixture.settings(2, FailurePolicy::Abort));
    let err = loader.run().await.unwrap_err();

    match err {
        MigrateError::Load { job_id, file, .. } => {
            assert_eq!(job_id, 3);
            assert_eq!(file, "t_split_ac");
        },
        other => panic!("unexpected error: {other}"),
    }

    // Which other jobs ran before cancellation is up to the scheduler; the
    // failed chunk is always left behind.
    assert!(inserter.loaded_files().len() <= 4);
    assert!(fixture.work_dir.join("t_split_ac").exists());
}

#[tokio::test]
async fn test_continue_policy_loads_the_rest() {
    let fixture = Fixture::new();
    for suffix in ["aa", "ab", "ac", "ad", "ae"] {
        fixture.stage(&format!("t_split_{}", suffix), "\"1\"\n");
    }

    let inserter = Arc::new(RecordingInserter::failing(&["t_split_ac"]));
    let loader = fixture.loader(inserter.clone(), fixture.settings(2, FailurePolicy::Continue));
    let err = loader.run().await.unwrap_err();

    assert!(matches!(err, MigrateError::LoadAggregate { failed: 1, total: 5 }));
    assert_eq!(inserter.loaded_files().len(), 4);

    // Loaded chunks are deleted; the failed one stays for inspection
    assert_eq!(remaining(&fixture.work_dir), vec!["t_split_ac"]);
}

#[tokio::test]
async fn test_load_jobs_report_lists_failures() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(&fixture.work_dir).unwrap();
    std::fs::write(fixture.work_dir.join("t_split_aa"), "\"1\"\n").unwrap();
    std::fs::write(fixture.work_dir.join("t_split_ab"), "\"2\"\n").unwrap();

    let jobs = ferry_migrate::load::discover_jobs(&fixture.work_dir).unwrap();
    let inserter = Arc::new(RecordingInserter::failing(&["t_split_ab"]));
    let loader = fixture.loader(inserter, fixture.settings(1, FailurePolicy::Continue));

    let report = loader.load_jobs(jobs).await.unwrap();

    assert_eq!(report.jobs, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].job.file_name(), "t_split_ab");
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_rerun_after_failure_reloads_every_chunk() {
    let fixture = Fixture::new();
    for suffix in ["aa", "ab", "ac"] {
        fixture.stage(&format!("t_split_{}", suffix), "\"1\"\n");
    }

    let failing = Arc::new(RecordingInserter::failing(&["t_split_ab"]));
    let first = fixture.loader(failing.clone(), fixture.settings(2, FailurePolicy::Continue));
    assert!(first.run().await.is_err());
    assert_eq!(failing.loaded_files().len(), 2);

    // The staging area is fetched again in full, so chunks that already
    // loaded are inserted a second time.
    let healthy = Arc::new(RecordingInserter::default());
    let second = fixture.loader(healthy.clone(), fixture.settings(2, FailurePolicy::Continue));
    let report = second.run().await.unwrap();

    assert_eq!(report.succeeded, 3);
    assert_eq!(healthy.loaded_files().len(), 3);
    assert!(!fixture.work_dir.exists());
}

#[tokio::test]
async fn test_tampered_manifest_loads_nothing() {
    let fixture = Fixture::new();
    let victim = fixture.staging.parent().unwrap().join("victim.txt");
    std::fs::write(&victim, "\"1\"\n").unwrap();

    let mut manifest = ChunkManifest::new(10);
    manifest.push_table(TableManifest {
        table: "users; DROP TABLE x".to_string(),
        rows: 1,
        chunks: vec![ChunkEntry {
            file_name: "../victim.txt".to_string(),
            rows: 1,
        }],
    });
    manifest.write_to_dir(&fixture.staging).unwrap();

    let inserter = Arc::new(RecordingInserter::default());
    let loader = fixture.loader(inserter.clone(), fixture.settings(1, FailurePolicy::Abort));

    assert!(loader.run().await.is_err());
    assert!(inserter.loaded_files().is_empty());
    assert!(victim.exists());
}
