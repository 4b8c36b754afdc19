/// Integration tests for the integrity checker
/// Scenarios drive the real parser and state machine end to end
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

use sftp_audit_tools::audit::checker::{CheckWindow, IntegrityChecker};
use sftp_audit_tools::audit::parser::LogLineParser;

fn no_cancel() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

fn audit_line(ts: &str, user: &str, pid: u32, op: &str) -> String {
    format!(
        "Mar  1 12:00:00 sftp01 internal-sftp[2211]: audit time={ts} user={user} pid={pid} {op}"
    )
}

fn check_lines(lines: &[String]) -> IntegrityChecker {
    let parser = LogLineParser::new();
    let mut checker = IntegrityChecker::new(CheckWindow::default());
    for raw in lines {
        let parsed = parser.parse(raw).unwrap().expect("audit line must match");
        checker.observe(&parsed);
    }
    checker.finish();
    checker
}

fn write_log(dir: &TempDir, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    path
}

fn clean_session() -> Vec<String> {
    vec![
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line(
            "2024-03-01 10:00:01.000",
            "alice",
            100,
            "open \"foo.txt\" flags WRITE,CREATE mode 0644",
        ),
        audit_line(
            "2024-03-01 10:00:02.000",
            "alice",
            100,
            "close \"foo.txt\" bytes read 0 written 1024",
        ),
        audit_line("2024-03-01 10:00:03.000", "alice", 100, "session closed for local user alice"),
    ]
}

#[test]
fn test_clean_session_has_no_findings() {
    let checker = check_lines(&clean_session());
    assert!(checker.anomalies().is_empty());
    assert!(checker.errors().is_empty());
}

#[test]
fn test_double_open_is_exactly_one_anomaly() {
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line("2024-03-01 10:00:01.000", "alice", 100, "open \"foo.txt\" flags READ"),
        audit_line("2024-03-01 10:00:02.000", "alice", 100, "open \"foo.txt\" flags READ"),
        audit_line("2024-03-01 10:00:03.000", "alice", 100, "session closed for local user alice"),
    ]);

    // The one-shot flag also suppresses the leaked-handle finding at
    // session close; the first finding wins.
    assert_eq!(checker.anomalies().len(), 1);
    assert!(checker.anomalies()[0]
        .message
        .contains("open of file 'foo.txt' that had been previously open"));
}

#[test]
fn test_path_variants_do_not_mismatch() {
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line(
            "2024-03-01 10:00:01.000",
            "alice",
            100,
            "open \"/srv/in//upload.csv\" flags READ",
        ),
        audit_line(
            "2024-03-01 10:00:02.000",
            "alice",
            100,
            "close \"/srv/in/./upload.csv\" bytes read 512 written 0",
        ),
        audit_line("2024-03-01 10:00:03.000", "alice", 100, "session closed for local user alice"),
    ]);
    assert!(checker.anomalies().is_empty());
}

#[test]
fn test_close_without_open_is_flagged() {
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line(
            "2024-03-01 10:00:01.000",
            "alice",
            100,
            "close \"ghost.txt\" bytes read 0 written 0",
        ),
        audit_line("2024-03-01 10:00:02.000", "alice", 100, "session closed for local user alice"),
    ]);
    assert_eq!(checker.anomalies().len(), 1);
    assert!(checker.anomalies()[0]
        .message
        .contains("close of file 'ghost.txt' without prior open"));
}

#[test]
fn test_missing_final_close_is_one_anomaly() {
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line("2024-03-01 10:00:01.000", "alice", 100, "opendir \"/srv/in\""),
        audit_line("2024-03-01 10:00:02.000", "alice", 100, "closedir \"/srv/in\""),
    ]);
    assert_eq!(checker.anomalies().len(), 1);
    assert!(checker.anomalies()[0]
        .message
        .contains("missing final session close"));
}

#[test]
fn test_leaked_handle_and_missing_close_are_two_findings() {
    // Handle check and session-close check are distinct passes in the
    // end-of-run sweep, so one broken session yields both findings.
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line("2024-03-01 10:00:01.000", "alice", 100, "open \"foo.txt\" flags READ"),
    ]);

    assert_eq!(checker.anomalies().len(), 2);
    assert!(checker.anomalies()[0]
        .message
        .contains("file 'foo.txt' was opened but never closed"));
    assert!(checker.anomalies()[1]
        .message
        .contains("missing final session close"));
}

#[test]
fn test_activity_outside_window_is_not_flagged() {
    // Session busy at 23:58: assumed to continue in the next rotation.
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 23:58:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line("2024-03-01 23:58:30.000", "alice", 100, "open \"late.txt\" flags READ"),
    ]);
    assert!(checker.anomalies().is_empty());
}

#[test]
fn test_out_of_window_lines_still_update_state() {
    // The open happens before the window opens; the in-window close must
    // not read as close-without-open.
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 00:01:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line("2024-03-01 00:02:00.000", "alice", 100, "open \"early.txt\" flags READ"),
        audit_line(
            "2024-03-01 08:00:00.000",
            "alice",
            100,
            "close \"early.txt\" bytes read 10 written 0",
        ),
        audit_line("2024-03-01 08:00:01.000", "alice", 100, "session closed for local user alice"),
    ]);
    assert!(checker.anomalies().is_empty());
}

#[test]
fn test_operation_without_session_open() {
    let checker = check_lines(&[
        audit_line("2024-03-01 10:00:00.000", "alice", 100, "open \"foo.txt\" flags READ"),
        audit_line(
            "2024-03-01 10:00:01.000",
            "alice",
            100,
            "close \"foo.txt\" bytes read 0 written 0",
        ),
        audit_line("2024-03-01 10:00:02.000", "alice", 100, "session closed for local user alice"),
    ]);
    assert_eq!(checker.anomalies().len(), 1);
    assert!(checker.anomalies()[0]
        .message
        .contains("detected operation 'FileOpen' without prior session open"));
}

#[test]
fn test_new_session_without_previous_close() {
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line(
            "2024-03-01 11:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line("2024-03-01 11:00:01.000", "alice", 100, "session closed for local user alice"),
    ]);
    assert_eq!(checker.anomalies().len(), 1);
    assert!(checker.anomalies()[0]
        .message
        .contains("new session without close of previous session"));
}

#[test]
fn test_status_response_records_error_and_aborts_open() {
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line("2024-03-01 10:00:01.000", "alice", 100, "open \"missing.txt\" flags READ"),
        audit_line("2024-03-01 10:00:02.000", "alice", 100, "sent status No such file"),
        audit_line("2024-03-01 10:00:03.000", "alice", 100, "session closed for local user alice"),
    ]);

    // The failed open is aborted, not leaked, so the only record is the
    // client error itself.
    assert!(checker.anomalies().is_empty());
    assert_eq!(checker.errors().len(), 1);
    assert_eq!(checker.errors()[0].status_text, "No such file");
    assert_eq!(checker.errors()[0].preceding_op.name(), "FileOpen");
}

#[test]
fn test_double_status_response_is_flagged() {
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line("2024-03-01 10:00:01.000", "alice", 100, "open \"missing.txt\" flags READ"),
        audit_line("2024-03-01 10:00:02.000", "alice", 100, "sent status No such file"),
        audit_line("2024-03-01 10:00:03.000", "alice", 100, "sent status Failure"),
        audit_line("2024-03-01 10:00:04.000", "alice", 100, "session closed for local user alice"),
    ]);

    assert_eq!(checker.anomalies().len(), 1);
    assert!(checker.anomalies()[0]
        .message
        .contains("status response 'Failure' without any prior client activity"));
    assert_eq!(checker.errors().len(), 2);
}

#[test]
fn test_sessions_are_tracked_independently() {
    let checker = check_lines(&[
        audit_line(
            "2024-03-01 10:00:00.000",
            "alice",
            100,
            "session opened for local user alice from [10.0.0.5]",
        ),
        audit_line(
            "2024-03-01 10:00:00.500",
            "bob",
            200,
            "session opened for local user bob from [10.0.0.9]",
        ),
        // alice's open of the same path must not collide with bob's.
        audit_line("2024-03-01 10:00:01.000", "alice", 100, "open \"/srv/shared.txt\" flags READ"),
        audit_line("2024-03-01 10:00:02.000", "bob", 200, "open \"/srv/shared.txt\" flags READ"),
        audit_line(
            "2024-03-01 10:00:03.000",
            "alice",
            100,
            "close \"/srv/shared.txt\" bytes read 1 written 0",
        ),
        audit_line(
            "2024-03-01 10:00:04.000",
            "bob",
            200,
            "close \"/srv/shared.txt\" bytes read 1 written 0",
        ),
        audit_line("2024-03-01 10:00:05.000", "alice", 100, "session closed for local user alice"),
        audit_line("2024-03-01 10:00:06.000", "bob", 200, "session closed for local user bob"),
    ]);
    assert!(checker.anomalies().is_empty());
}

#[test]
fn test_check_command_writes_report() {
    let dir = TempDir::new().unwrap();
    let log = write_log(
        &dir,
        "sftp.log",
        &[
            audit_line(
                "2024-03-01 10:00:00.000",
                "alice",
                100,
                "session opened for local user alice from [10.0.0.5]",
            ),
            audit_line("2024-03-01 10:00:01.000", "alice", 100, "open \"foo.txt\" flags READ"),
            audit_line("2024-03-01 10:00:02.000", "alice", 100, "open \"foo.txt\" flags READ"),
            audit_line("2024-03-01 10:00:03.000", "alice", 100, "sent status Failure"),
            audit_line("2024-03-01 10:00:04.000", "alice", 100, "session closed for local user alice"),
        ],
    );
    let report = dir.path().join("logcheck.txt");
    let csv_out = dir.path().join("findings.csv");

    let result = sftp_audit_tools::commands::check::run(
        &[log.to_str().unwrap().to_string()],
        "00:05:00",
        "23:55:00",
        report.to_str().unwrap(),
        false,
        Some(csv_out.to_str().unwrap()),
        no_cancel(),
    );
    assert!(result.is_ok());

    let text = fs::read_to_string(&report).unwrap();
    assert!(text.contains("SFTP Log Anomalies - 1 total"));
    assert!(text.contains("previously open"));
    assert!(text.contains("SFTP Client Errors - 1 total"));
    // Detail section suppressed without --print-errors.
    assert!(text.contains("SFTP client error details not requested."));
    assert!(!text.contains("sent status message"));

    let csv_text = fs::read_to_string(&csv_out).unwrap();
    assert!(csv_text.starts_with("record_type,session_key,timestamp"));
    assert!(csv_text.contains("anomaly,"));
    assert!(csv_text.contains("error,"));
}

#[test]
fn test_check_command_print_errors_includes_detail() {
    let dir = TempDir::new().unwrap();
    let log = write_log(
        &dir,
        "sftp.log",
        &[
            audit_line(
                "2024-03-01 10:00:00.000",
                "alice",
                100,
                "session opened for local user alice from [10.0.0.5]",
            ),
            audit_line("2024-03-01 10:00:01.000", "alice", 100, "open \"gone.txt\" flags READ"),
            audit_line("2024-03-01 10:00:02.000", "alice", 100, "sent status No such file"),
            audit_line("2024-03-01 10:00:03.000", "alice", 100, "session closed for local user alice"),
        ],
    );
    let report = dir.path().join("logcheck.txt");

    let result = sftp_audit_tools::commands::check::run(
        &[log.to_str().unwrap().to_string()],
        "00:05:00",
        "23:55:00",
        report.to_str().unwrap(),
        true,
        None,
        no_cancel(),
    );
    assert!(result.is_ok());

    let text = fs::read_to_string(&report).unwrap();
    assert!(text.contains(
        "sent status message 'No such file' in response to operation 'FileOpen'."
    ));
}

#[test]
fn test_check_command_with_bad_window() {
    let result = sftp_audit_tools::commands::check::run(
        &["whatever.log".to_string()],
        "not-a-time",
        "23:55:00",
        "logcheck.txt",
        false,
        None,
        no_cancel(),
    );
    assert!(result.is_err());
}

#[test]
fn test_check_command_with_missing_file() {
    let result = sftp_audit_tools::commands::check::run(
        &["/nonexistent/sftp.log".to_string()],
        "00:05:00",
        "23:55:00",
        "logcheck.txt",
        false,
        None,
        no_cancel(),
    );
    assert!(result.is_err());
}
