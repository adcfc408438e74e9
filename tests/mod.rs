//! Main test module for Stashbox
//!
//! This module includes all test suites:
//! - Integration tests running the real archiver and cipher
//! - Property-based tests for invariants
//! - Edge cases exercised through the public API

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::stashbox::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_sources_file_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.ini");
        assert!(matches!(
            SourceCatalog::parse(&missing),
            Err(StashError::SourcesFileMissing(_))
        ));

        let comments_only = temp_dir.path().join("comments.ini");
        fs::write(&comments_only, "# nothing here\n\n   \n# still nothing\n").unwrap();
        assert!(matches!(
            SourceCatalog::parse(&comments_only),
            Err(StashError::NoSources)
        ));

        let bad_path = temp_dir.path().join("bad.ini");
        let gone = temp_dir.path().join("gone");
        fs::write(&bad_path, format!("gone={}\n", gone.display())).unwrap();
        match SourceCatalog::parse(&bad_path) {
            Err(StashError::SourcePathMissing(path)) => assert_eq!(path, gone),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_separator_splits_once() {
        let temp_dir = TempDir::new().unwrap();
        let odd = temp_dir.path().join("a=b");
        fs::create_dir(&odd).unwrap();

        let sources = SourceCatalog::parse_str(&format!("  odd  =  {}  ", odd.display())).unwrap();
        assert_eq!(sources, vec![Source::new("odd", &odd)]);
    }

    #[test]
    fn test_parse_error_names_line() {
        let temp_dir = TempDir::new().unwrap();
        let content = format!(
            "# header\nok={}\n\nthis line is wrong\n",
            temp_dir.path().display()
        );
        match SourceCatalog::parse_str(&content) {
            Err(StashError::SourceParse { line, text }) => {
                assert_eq!(line, 4);
                assert_eq!(text, "this line is wrong");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_special_filenames_are_staged_and_hashed() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        fs::create_dir_all(&source).unwrap();

        let special_names = [
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file.multiple.dots.txt",
            "ünïcödé.txt",
            "=equals=.txt",
        ];
        for name in &special_names {
            fs::write(source.join(name), name.as_bytes()).unwrap();
        }

        let staged = temp_dir.path().join("staged");
        fs::create_dir(&staged).unwrap();
        StagingArea::stage(&source, &staged).unwrap();

        let files = ledger::collect_files(&staged).unwrap();
        assert_eq!(files.len(), special_names.len());
        for name in &special_names {
            assert_eq!(fs::read(staged.join(name)).unwrap(), name.as_bytes());
        }
    }

    #[test]
    fn test_single_file_source_keeps_its_name() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("hosts");
        fs::write(&file, "127.0.0.1 localhost\n").unwrap();

        let staged = temp_dir.path().join("backup-hosts-20260101");
        fs::create_dir(&staged).unwrap();
        StagingArea::stage(&file, &staged).unwrap();

        assert_eq!(
            fs::read_to_string(staged.join("hosts")).unwrap(),
            "127.0.0.1 localhost\n"
        );
    }

    #[test]
    fn test_empty_directory_source() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty");
        fs::create_dir(&empty).unwrap();

        let staged = temp_dir.path().join("staged");
        StagingArea::stage(&empty, &staged).unwrap();
        assert!(staged.is_dir());
        assert!(ledger::collect_files(&staged).unwrap().is_empty());
    }

    #[test]
    fn test_ledger_accepts_mixed_case_and_trailing_fields() {
        let temp_dir = TempDir::new().unwrap();
        let tree = temp_dir.path().join("tree");
        fs::create_dir(&tree).unwrap();
        fs::write(tree.join("a"), "abc").unwrap();

        let ledger_path = temp_dir.path().join("ledger.sha256");
        fs::write(
            &ledger_path,
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD  a\n\n",
        )
        .unwrap();

        let mut reporter = ProgressDisplay::Hidden.tracker("Verifying backup...", 0);
        assert_eq!(ledger::verify(&tree, &ledger_path, &mut reporter).unwrap(), 1);
    }

    #[test]
    fn test_appended_byte_breaks_verification() {
        let temp_dir = TempDir::new().unwrap();
        let tree = temp_dir.path().join("tree");
        fs::create_dir_all(tree.join("sub")).unwrap();
        fs::write(tree.join("one.txt"), "one").unwrap();
        fs::write(tree.join("sub/two.txt"), "two").unwrap();

        let ledger_path = temp_dir.path().join("ledger.sha256");
        let mut writer = ledger::LedgerWriter::open(&ledger_path).unwrap();
        let files = ledger::collect_files(&tree).unwrap();
        writer
            .record_all(&files, &mut ProgressDisplay::Hidden.tracker("Computing checksums...", 2))
            .unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let mut content = fs::read(tree.join("sub/two.txt")).unwrap();
        content.push(b'\n');
        fs::write(tree.join("sub/two.txt"), content).unwrap();

        let mut reporter = ProgressDisplay::Hidden.tracker("Verifying backup...", 0);
        match ledger::verify(&tree, &ledger_path, &mut reporter) {
            Err(StashError::Integrity(path)) => assert_eq!(path, tree.join("sub/two.txt")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_encrypt_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("container");
        let output = temp_dir.path().join("artifact.enc");
        fs::write(&input, "payload").unwrap();
        fs::write(&output, "existing").unwrap();

        let result = GpgCipher::default().encrypt(
            &input,
            &output,
            &Passphrase::new("pw"),
            &ProgressDisplay::Hidden,
        );
        assert!(matches!(result, Err(StashError::DestinationExists(_))));
        assert_eq!(fs::read_to_string(&output).unwrap(), "existing");
    }

    #[test]
    fn test_tool_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tools.json");
        fs::write(&path, r#"{ "cipher_program": "gpg2", "armor": false }"#).unwrap();

        let config = ToolConfig::load(&path).unwrap();
        assert_eq!(config.cipher_program, "gpg2");
        assert!(!config.armor);
        assert_eq!(config.archiver_program, "tar");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ToolConfig::load(&path), Err(StashError::Json(_))));
        assert!(matches!(
            ToolConfig::load(Path::new("/nonexistent/tools.json")),
            Err(StashError::Io(_))
        ));
    }
}
