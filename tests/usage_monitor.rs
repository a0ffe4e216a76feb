use chrono::{Duration, TimeZone, Utc};
use claude_usage_monitor::prelude::*;
use claude_usage_monitor::report::render_report;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn assistant_line(ts: &str, msg: &str, req: &str, model: &str, input: u64, output: u64) -> String {
    format!(
        r#"{{"type":"assistant","timestamp":"{ts}","requestId":"{req}","message":{{"id":"{msg}","model":"{model}","usage":{{"input_tokens":{input},"output_tokens":{output},"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}}}}"#
    )
}

fn write_project(root: &Path) {
    let project_a = root.join("project-a");
    let project_b = root.join("project-b");
    fs::create_dir_all(&project_a).unwrap();
    fs::create_dir_all(&project_b).unwrap();

    let session_one = [
        assistant_line("2024-01-01T10:05:00Z", "msg_1", "req_1", "claude-3-5-sonnet-20241022", 1000, 500),
        r#"{"type":"user","timestamp":"2024-01-01T10:06:00Z","message":{"role":"user"}}"#.to_string(),
        assistant_line("2024-01-01T10:30:00Z", "msg_2", "req_2", "claude-3-opus-20240229", 200, 100),
        "not json at all".to_string(),
    ]
    .join("\n");
    fs::write(project_a.join("session-one.jsonl"), session_one).unwrap();

    // Duplicate of msg_1 plus a message in a later block
    let session_two = [
        assistant_line("2024-01-01T10:05:00Z", "msg_1", "req_1", "claude-3-5-sonnet-20241022", 1000, 500),
        assistant_line("2024-01-01T18:00:00Z", "msg_3", "req_3", "claude-3-haiku-20240307", 5000, 0),
    ]
    .join("\n");
    fs::write(project_b.join("session-two.jsonl"), session_two).unwrap();
}

fn load(root: &Path) -> UsageMonitor {
    LoadSettings {
        source: DataSource::Path(root.to_path_buf()),
        ..LoadSettings::default()
    }
    .load()
    .unwrap()
}

#[test]
fn test_load_directory_tree() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    let monitor = load(dir.path());
    assert_eq!(monitor.entry_count(), 3);
    assert_eq!(monitor.session_count(), 2);
    assert_eq!(monitor.total_tokens(), 1500 + 300 + 5000);

    let blocks = monitor.session_blocks();
    assert_eq!(blocks[0].start_time(), Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    assert_eq!(blocks[1].start_time(), Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap());

    // sonnet x1, opus x5, haiku x0.2
    let expected_weighted = 1500.0 + 300.0 * 5.0 + 5000.0 * 0.2;
    assert!((monitor.total_weighted_tokens() - expected_weighted).abs() < 1e-6);
}

#[test]
fn test_reload_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    let first = load(dir.path());
    let mut second = load(dir.path());
    second.load_path(dir.path()).unwrap();

    assert_eq!(first.entry_count(), second.entry_count());
    assert_eq!(first.total_tokens(), second.total_tokens());
    assert_eq!(first.session_count(), second.session_count());
    assert!((first.total_cost() - second.total_cost()).abs() < 1e-9);
}

#[test]
fn test_line_order_does_not_change_aggregates() {
    let ordered = TempDir::new().unwrap();
    let shuffled = TempDir::new().unwrap();

    let lines = [
        assistant_line("2024-01-01T09:00:00Z", "m1", "r1", "claude-3-5-sonnet-20241022", 100, 10),
        assistant_line("2024-01-01T09:20:00Z", "m2", "r2", "claude-3-5-sonnet-20241022", 200, 20),
        assistant_line("2024-01-01T16:00:00Z", "m3", "r3", "claude-3-5-sonnet-20241022", 300, 30),
    ];
    fs::write(ordered.path().join("s.jsonl"), lines.join("\n")).unwrap();
    let reversed: Vec<_> = lines.iter().rev().cloned().collect();
    fs::write(shuffled.path().join("s.jsonl"), reversed.join("\n")).unwrap();

    let a = load(ordered.path());
    let b = load(shuffled.path());
    assert_eq!(a.usage_entries(), b.usage_entries());
    assert_eq!(a.session_count(), b.session_count());
    assert_eq!(a.total_tokens(), b.total_tokens());
}

#[test]
fn test_export_then_load_reproduces_entries() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    let monitor = load(dir.path());

    let out = TempDir::new().unwrap();
    let export_path = out.path().join("export.jsonl");
    assert_eq!(monitor.export_jsonl(&export_path).unwrap(), 3);

    let reloaded = load(&export_path);
    assert_eq!(reloaded.usage_entries(), monitor.usage_entries());
    assert_eq!(reloaded.session_count(), monitor.session_count());
}

#[test]
fn test_missing_path_is_error() {
    let result = LoadSettings {
        source: DataSource::Path("/definitely/not/here".into()),
        ..LoadSettings::default()
    }
    .load();
    assert!(matches!(result, Err(UsageError::PathNotFound(_))));
}

#[test]
fn test_report_over_loaded_data() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    let monitor = load(dir.path());

    let now = Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap() + Duration::minutes(10);
    let report = render_report(&monitor, Some(ClaudePlan::Pro), now);
    assert!(report.contains("Loaded 3 entries across 2 sessions"));
    assert!(report.contains("Total tokens: 6,800"));
    assert!(report.contains("← CONFIGURED"));
}
