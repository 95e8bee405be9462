use gumdrop::Options;
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::json;
use std::io::{self, BufRead};

use notesync_swarm::metrics::SwarmMetrics;
use notesync_swarm::{SwarmAttack, SwarmConfiguration};

// Paths served by the mock notes API and identity service.
pub const SIGNUP_PATH: &str = "/auth/v1/signup";
pub const TOKEN_PATH: &str = "/auth/v1/token";
pub const NOTES_PATH: &str = "/api/notes";
pub const OWN_NOTES_PATH: &str = "/api/notes/mine";
// Every created note gets this id.
pub const NOTE_ID: &str = "abc-123";
pub const NOTE_PATH: &str = "/api/notes/abc-123";

pub const ACCESS_TOKEN: &str = "test-access-token";

// Indexes into the vector returned by setup_mock_server_endpoints().
#[allow(dead_code)]
pub const SIGNUP_KEY: usize = 0;
#[allow(dead_code)]
pub const TOKEN_KEY: usize = 1;
#[allow(dead_code)]
pub const LIST_ALL_KEY: usize = 2;
#[allow(dead_code)]
pub const LIST_OWN_KEY: usize = 3;
#[allow(dead_code)]
pub const CREATE_KEY: usize = 4;
#[allow(dead_code)]
pub const UPDATE_KEY: usize = 5;
#[allow(dead_code)]
pub const DELETE_KEY: usize = 6;

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// Mock a well behaved notes API. The token exchange returns `token_status`, and create
/// returns `create_body`.
#[allow(dead_code)]
pub fn setup_mock_server_endpoints<'a>(
    server: &'a MockServer,
    token_status: u16,
    create_body: serde_json::Value,
) -> Vec<Mock<'a>> {
    vec![
        server.mock(|when, then| {
            when.method(POST).path(SIGNUP_PATH);
            then.status(200).json_body(json!({"id": "user-1"}));
        }),
        server.mock(|when, then| {
            when.method(POST)
                .path(TOKEN_PATH)
                .query_param("grant_type", "password");
            if token_status == 200 {
                then.status(200).json_body(json!({
                    "access_token": ACCESS_TOKEN,
                    "token_type": "bearer",
                }));
            } else {
                then.status(token_status)
                    .json_body(json!({"error": "invalid_grant"}));
            }
        }),
        server.mock(|when, then| {
            when.method(GET)
                .path(NOTES_PATH)
                .header("authorization", format!("Bearer {}", ACCESS_TOKEN));
            then.status(200).json_body(json!([]));
        }),
        server.mock(|when, then| {
            when.method(GET)
                .path(OWN_NOTES_PATH)
                .header("authorization", format!("Bearer {}", ACCESS_TOKEN));
            then.status(200).json_body(json!([]));
        }),
        server.mock(|when, then| {
            when.method(POST).path(NOTES_PATH);
            then.status(201).json_body(create_body);
        }),
        server.mock(|when, then| {
            when.method(PUT).path(NOTE_PATH);
            then.status(200).json_body(json!({"id": NOTE_ID}));
        }),
        server.mock(|when, then| {
            when.method(DELETE).path(NOTE_PATH);
            then.status(204);
        }),
    ]
}

/// The following options are configured by default, if not set to a custom value:
///  --host <mock-server>
///  --users 1
///  --hatch-rate 1
///  --run-time 1
///  --min-think-time 10
///  --max-think-time 20
pub fn build_configuration(server: &MockServer, custom: Vec<&str>) -> SwarmConfiguration {
    let mut configuration: Vec<&str> = vec![];
    // Declare server_url here no matter what, so its lifetime is sufficient when needed.
    let server_url = server.base_url();

    // Merge in all custom options first.
    configuration.extend_from_slice(&custom);

    if !configuration.contains(&"--host") {
        configuration.extend_from_slice(&["--host", &server_url]);
    }
    if !configuration.contains(&"--users") {
        configuration.extend_from_slice(&["--users", "1"]);
    }
    if !configuration.contains(&"--hatch-rate") {
        configuration.extend_from_slice(&["--hatch-rate", "1"]);
    }
    if !configuration.contains(&"--run-time") {
        configuration.extend_from_slice(&["--run-time", "1"]);
    }
    // Keep the think time short so a one second test does real work.
    if !configuration.contains(&"--min-think-time") {
        configuration.extend_from_slice(&["--min-think-time", "10"]);
    }
    if !configuration.contains(&"--max-think-time") {
        configuration.extend_from_slice(&["--max-think-time", "20"]);
    }

    SwarmConfiguration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// Run the actual load test, returning the SwarmMetrics.
pub fn run_load_test(configuration: SwarmConfiguration) -> SwarmMetrics {
    SwarmAttack::initialize_with_config(configuration)
        .unwrap()
        .execute()
        .unwrap()
}

/// Helper to count the number of lines in a test artifact.
#[allow(dead_code)]
pub fn file_length(file_name: &str) -> usize {
    if let Ok(file) = std::fs::File::open(std::path::Path::new(file_name)) {
        io::BufReader::new(file).lines().count()
    } else {
        0
    }
}

/// Helper to read the first line of a test artifact.
#[allow(dead_code)]
pub fn first_line(file_name: &str) -> String {
    std::fs::read_to_string(file_name)
        .ok()
        .and_then(|contents| contents.lines().next().map(str::to_string))
        .unwrap_or_default()
}

/// Helper to delete test artifacts, if existing.
#[allow(dead_code)]
pub fn cleanup_files(files: Vec<&str>) {
    for file in files {
        if std::path::Path::new(file).exists() {
            std::fs::remove_file(file).expect("failed to remove file");
        }
    }
}
