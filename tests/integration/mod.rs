//! End-to-end tests with the real archiver and cipher
//!
//! Every test here skips itself when `tar` or `gpg` is not on `PATH`. The
//! cipher runs with a throwaway home directory so no user keyring is touched.

use ::stashbox::*;
use std::fs;
use std::os::unix::fs::symlink;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Temporary source tree, output directory and cipher home for one test
pub struct BackupHarness {
    pub temp_dir: TempDir,
    pub cipher_home: TempDir,
    pub pipeline: Pipeline,
}

impl BackupHarness {
    /// Create a harness, or `None` when the external programs are missing
    pub fn new() -> Option<Self> {
        if process::require_programs(&["tar", "gpg"]).is_err() {
            eprintln!("tar or gpg not found on PATH; skipping");
            return None;
        }
        let temp_dir = TempDir::new().unwrap();
        let cipher_home = TempDir::new().unwrap();
        let tools = ToolConfig {
            cipher_home: Some(cipher_home.path().to_path_buf()),
            ..ToolConfig::default()
        };
        let pipeline = PipelineBuilder::new()
            .tool_config(&tools)
            .privilege(FixedPrivilege(true))
            .names(RunNames::new("testhost", "20260101"))
            .build();

        Some(Self {
            temp_dir,
            cipher_home,
            pipeline,
        })
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path("out")
    }

    /// Write a sources list and parse it
    pub fn sources(&self, entries: &[(&str, &Path)]) -> Vec<Source> {
        let list: String = entries
            .iter()
            .map(|(label, path)| format!("{}={}\n", label, path.display()))
            .collect();
        let file = self.path("sources.ini");
        fs::write(&file, list).unwrap();
        SourceCatalog::parse(&file).unwrap()
    }

    pub fn run_config(&self, sources: Vec<Source>, checksum: bool) -> RunConfig {
        RunConfig {
            sources,
            output_directory: self.output_dir(),
            secret: "very_bad_pw".into(),
            checksum,
            verbose: false,
        }
    }
}

/// Relative path and content of every regular file under `root`
fn regular_files(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn names_under(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect()
}

#[test]
fn test_round_trip_is_byte_identical() {
    let Some(harness) = BackupHarness::new() else {
        return;
    };
    let data = harness.path("data");
    fs::create_dir_all(data.join("deep/deeper")).unwrap();
    fs::write(data.join("text.txt"), "plain text\n").unwrap();
    fs::write(data.join("deep/binary.bin"), (0u8..=255).collect::<Vec<_>>()).unwrap();
    fs::write(data.join("deep/deeper/empty"), "").unwrap();
    symlink("text.txt", data.join("link-to-text")).unwrap();
    let single = harness.path("single.conf");
    fs::write(&single, "key = value\n").unwrap();

    let sources = harness.sources(&[("data", &data), ("single", &single)]);
    let report = harness
        .pipeline
        .backup(&harness.run_config(sources, true))
        .unwrap();
    assert_eq!(report.digests_recorded, 4);

    let extracted = harness
        .pipeline
        .extract(&ExtractConfig {
            archive: report.artifact.clone(),
            secret: "very_bad_pw".into(),
            ledger: report.ledger.clone(),
            verbose: false,
        })
        .unwrap();
    assert_eq!(extracted.files_verified, Some(4));

    let root = &extracted.extracted_root;
    assert_eq!(
        regular_files(&root.join("backup-data-20260101")),
        regular_files(&data)
    );
    assert_eq!(
        fs::read(root.join("backup-single-20260101/single.conf")).unwrap(),
        fs::read(&single).unwrap()
    );
    let link = root.join("backup-data-20260101/link-to-text");
    assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("text.txt"));
}

#[test]
fn test_special_files_are_left_out() {
    let Some(harness) = BackupHarness::new() else {
        return;
    };
    let data = harness.path("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("kept.txt"), "kept").unwrap();
    let _listener = UnixListener::bind(data.join("app.sock")).unwrap();
    nix::unistd::mkfifo(&data.join("queue.fifo"), nix::sys::stat::Mode::S_IRWXU).unwrap();
    symlink(harness.path("nowhere"), data.join("dangling")).unwrap();

    let sources = harness.sources(&[("data", &data)]);
    let report = harness
        .pipeline
        .backup(&harness.run_config(sources, false))
        .unwrap();
    let extracted = harness
        .pipeline
        .extract(&ExtractConfig {
            archive: report.artifact,
            secret: "very_bad_pw".into(),
            ledger: None,
            verbose: false,
        })
        .unwrap();

    let names = names_under(&extracted.extracted_root);
    assert!(names.contains(&"kept.txt".to_string()));
    for skipped in ["app.sock", "queue.fifo", "dangling"] {
        assert!(!names.contains(&skipped.to_string()), "{} was copied", skipped);
    }
}

#[test]
fn test_second_run_same_day_is_refused() {
    let Some(harness) = BackupHarness::new() else {
        return;
    };
    let data = harness.path("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("a.txt"), "a").unwrap();

    let sources = harness.sources(&[("data", &data)]);
    let config = harness.run_config(sources, false);
    let first = harness.pipeline.backup(&config).unwrap();
    let original = fs::read(&first.artifact).unwrap();

    let second = harness.pipeline.backup(&config);
    assert!(matches!(second, Err(StashError::DestinationExists(_))));
    assert_eq!(fs::read(&first.artifact).unwrap(), original);
}

#[test]
fn test_wrong_secret_is_decrypt_failure() {
    let Some(harness) = BackupHarness::new() else {
        return;
    };
    let data = harness.path("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("a.txt"), "a").unwrap();

    let sources = harness.sources(&[("data", &data)]);
    let report = harness
        .pipeline
        .backup(&harness.run_config(sources, false))
        .unwrap();

    let result = harness.pipeline.extract(&ExtractConfig {
        archive: report.artifact,
        secret: "not the secret".into(),
        ledger: None,
        verbose: false,
    });
    assert!(matches!(result, Err(StashError::DecryptFailed(_))));
    assert!(!harness.output_dir().join("backup-testhost-20260101").exists());
}

#[test]
fn test_artifact_is_armored() {
    let Some(harness) = BackupHarness::new() else {
        return;
    };
    let file = harness.path("one.txt");
    fs::write(&file, "1").unwrap();

    let sources = harness.sources(&[("one", &file)]);
    let report = harness
        .pipeline
        .backup(&harness.run_config(sources, false))
        .unwrap();

    let text = fs::read_to_string(&report.artifact).unwrap();
    assert!(text.starts_with("-----BEGIN PGP MESSAGE-----"));
    assert!(harness.cipher_home.path().exists());
}
