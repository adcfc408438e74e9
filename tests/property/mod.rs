//! Property-based testing for Stashbox
//!
//! Uses proptest to check catalog parsing, size formatting and digest
//! invariants across generated inputs.

use ::stashbox::*;
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Labels without separators, comment markers or surrounding blanks
fn label_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,15}"
}

fn content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..20_000)
}

/// Sources list line decorations that must not change the parsed result
#[derive(Debug, Clone)]
enum Filler {
    Blank,
    Comment(String),
}

fn filler_strategy() -> impl Strategy<Value = Filler> {
    prop_oneof![
        Just(Filler::Blank),
        "[ -~]{0,30}".prop_map(Filler::Comment),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_catalog_preserves_file_order(
        labels in prop::collection::vec(label_strategy(), 1..12),
        fillers in prop::collection::vec(filler_strategy(), 0..12),
        pad in 0usize..4,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let mut content = String::new();
        let mut expected = Vec::new();

        for (idx, label) in labels.iter().enumerate() {
            if let Some(filler) = fillers.get(idx) {
                match filler {
                    Filler::Blank => content.push_str("   \n"),
                    Filler::Comment(text) => content.push_str(&format!("# {}\n", text)),
                }
            }
            let path = temp_dir.path().join(format!("src{}", idx));
            fs::write(&path, label.as_bytes()).unwrap();
            let spaces = " ".repeat(pad);
            content.push_str(&format!("{}{}{}={}{}\n", spaces, label, spaces, spaces, path.display()));
            expected.push(Source::new(label.clone(), path));
        }

        let parsed = SourceCatalog::parse_str(&content).unwrap();
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn prop_line_without_separator_names_its_line(
        leading in prop::collection::vec(filler_strategy(), 0..8),
        text in "[a-zA-Z0-9 /._-]{1,40}",
    ) {
        let trimmed = text.trim().to_string();
        prop_assume!(!trimmed.is_empty());

        let mut content = String::new();
        for filler in &leading {
            match filler {
                Filler::Blank => content.push('\n'),
                Filler::Comment(c) => content.push_str(&format!("#{}\n", c)),
            }
        }
        content.push_str(&text);
        content.push('\n');

        match SourceCatalog::parse_str(&content) {
            Err(StashError::SourceParse { line, text }) => {
                prop_assert_eq!(line, leading.len() + 1);
                prop_assert_eq!(text, trimmed);
            }
            other => prop_assert!(false, "unexpected result: {:?}", other),
        }
    }

    #[test]
    fn prop_format_size_unit_bounds(bytes in any::<u64>()) {
        let formatted = utils::format_size(bytes);
        let (number, unit) = formatted.split_once(' ').unwrap();
        let value: f64 = number.parse().unwrap();

        prop_assert!(["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"].contains(&unit));
        // Two-decimal rounding may print 1024.00 just below the next unit
        if unit != "EiB" {
            prop_assert!(value <= 1024.0);
        }
        if bytes >= 1024 {
            prop_assert!(value >= 1.0);
        }
        if unit == "B" {
            prop_assert_eq!(number, bytes.to_string());
        }
    }

    #[test]
    fn prop_digest_is_deterministic_and_detects_append(
        content in content_strategy(),
        extra in any::<u8>(),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let tree = temp_dir.path().join("tree");
        fs::create_dir(&tree).unwrap();
        let file = tree.join("payload.bin");
        fs::write(&file, &content).unwrap();

        let first = ledger::digest(&file).unwrap();
        prop_assert_eq!(&first, &ledger::digest(&file).unwrap());
        prop_assert_eq!(first.len(), 64);

        let ledger_path = temp_dir.path().join("ledger.sha256");
        let mut writer = ledger::LedgerWriter::open(&ledger_path).unwrap();
        writer.record(&first).unwrap();
        writer.finish().unwrap();

        let mut reporter = ProgressDisplay::Hidden.tracker("Verifying backup...", 0);
        prop_assert_eq!(ledger::verify(&tree, &ledger_path, &mut reporter).unwrap(), 1);

        let mut tampered = content.clone();
        tampered.push(extra);
        fs::write(&file, &tampered).unwrap();

        let mut reporter = ProgressDisplay::Hidden.tracker("Verifying backup...", 0);
        match ledger::verify(&tree, &ledger_path, &mut reporter) {
            Err(StashError::Integrity(path)) => prop_assert_eq!(path, file),
            other => prop_assert!(false, "unexpected result: {:?}", other),
        }
    }
}
