/// Validate the csv and json report files.
use serde_json::json;
use serial_test::serial;

mod common;

// Report file names.
const REPORT_PREFIX: &str = "report-test";
const STATS_FILE: &str = "report-test_stats.csv";
const HISTORY_FILE: &str = "report-test_stats_history.csv";
const FAILURES_FILE: &str = "report-test_failures.csv";
const JSON_FILE: &str = "report-test.json";

#[test]
#[serial]
// Every report is written, with the columns charting scripts read.
fn test_report_files() {
    common::cleanup_files(vec![STATS_FILE, HISTORY_FILE, FAILURES_FILE, JSON_FILE]);

    let server = httpmock::MockServer::start();
    // Create answers with an array, which is also accepted.
    let _mock_endpoints =
        common::setup_mock_server_endpoints(&server, 200, json!([{"id": common::NOTE_ID}]));

    let configuration = common::build_configuration(
        &server,
        vec![
            "--run-time",
            "2",
            "--report-prefix",
            REPORT_PREFIX,
            "--report-json",
            JSON_FILE,
            "--no-print-metrics",
        ],
    );
    let swarm_metrics = common::run_load_test(configuration);

    // One row per label, plus the aggregated row.
    assert!(common::first_line(STATS_FILE).starts_with("Type,Name,Request Count,Failure Count"));
    assert!(common::first_line(STATS_FILE).contains("Average Response Time"));
    assert_eq!(
        common::file_length(STATS_FILE),
        swarm_metrics.requests.len() + 2
    );

    // One row per history sample.
    assert!(common::first_line(HISTORY_FILE).starts_with("Timestamp,User Count"));
    assert!(common::first_line(HISTORY_FILE).contains("Total Request Count"));
    assert_eq!(
        common::file_length(HISTORY_FILE),
        swarm_metrics.history.len() + 1
    );

    assert_eq!(common::first_line(FAILURES_FILE), "Method,Name,Error,Occurrences");
    assert_eq!(
        common::file_length(FAILURES_FILE),
        swarm_metrics.errors.len() + 1
    );

    let json_report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(JSON_FILE).unwrap()).unwrap();
    assert_eq!(json_report["users"], json!(1));
    assert_eq!(
        json_report["total_requests"],
        json!(swarm_metrics.total_requests)
    );
    assert!(json_report["requests"]["seed note"].is_object());

    common::cleanup_files(vec![STATS_FILE, HISTORY_FILE, FAILURES_FILE, JSON_FILE]);
}

#[test]
#[serial]
// Reports are written even when no task ever ran.
fn test_reports_without_tasks() {
    common::cleanup_files(vec![STATS_FILE, HISTORY_FILE, FAILURES_FILE]);

    let server = httpmock::MockServer::start();
    let configuration = common::build_configuration(
        &server,
        vec![
            "--report-prefix",
            REPORT_PREFIX,
            "--auth-host",
            // Nothing listens here, every login fails.
            "http://127.0.0.1:1",
        ],
    );
    let swarm_metrics = common::run_load_test(configuration);

    assert_eq!(swarm_metrics.sessions.aborted, 1);
    assert_eq!(swarm_metrics.task_requests, 0);
    assert!(common::file_length(STATS_FILE) >= 2);
    assert!(common::file_length(FAILURES_FILE) >= 2);
    assert!(common::file_length(HISTORY_FILE) >= 2);

    common::cleanup_files(vec![STATS_FILE, HISTORY_FILE, FAILURES_FILE]);
}
