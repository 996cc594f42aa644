use callguard::config::GovernorConfig;
use callguard_cli::replay::{ReplayOptions, replay};
use callguard_cli::transcript;
use std::io::Write;

#[test]
fn replays_a_jsonl_file_to_a_halt() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..16 {
        writeln!(
            file,
            r#"{{"tool": "get_repository_tree", "args": {{"owner": "acme", "repo": "widget", "path": "d{i}"}}, "result": []}}"#
        )
        .unwrap();
    }

    let entries = transcript::load(file.path()).unwrap();
    assert_eq!(entries.len(), 16);

    let config = GovernorConfig::new().with_tier("large_refactor");
    let summary = replay(entries, config, ReplayOptions::default());
    assert!(summary.decision.is_halt());
    assert!(summary.steps[3].decision.message().unwrap().contains("Too many tree calls"));
    assert!(summary.to_text().contains("halt:"));
}

#[test]
fn missing_transcript_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = transcript::load(dir.path().join("none.jsonl")).unwrap_err();
    assert!(err.contains("failed to read transcript"));
}
