//! Optionally writes report files after running a load test.
//!
//! `--report-prefix NAME` writes three csv files, with the column names expected by
//! charting scripts written for locust output:
//!  - `NAME_stats.csv`: one row per request label, plus an `Aggregated` row,
//!  - `NAME_stats_history.csv`: one row per second, `Timestamp` is seconds since start,
//!  - `NAME_failures.csv`: one row per distinct error.
//!
//! `--report-json NAME` writes the serialized [`SwarmMetrics`].

use itertools::Itertools;
use std::collections::BTreeMap;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::logger::csv_field;
use crate::metrics::{self, RequestMetricAggregate, SwarmMetrics};
use crate::{SwarmAttack, SwarmError};

/// Percentiles included in the stats csv, with their column names.
const PERCENTILES: [(f32, &str); 11] = [
    (0.5, "50%"),
    (0.66, "66%"),
    (0.75, "75%"),
    (0.8, "80%"),
    (0.9, "90%"),
    (0.95, "95%"),
    (0.98, "98%"),
    (0.99, "99%"),
    (0.999, "99.9%"),
    (0.9999, "99.99%"),
    (1.0, "100%"),
];

/// One row of the stats csv.
#[derive(Debug, Clone)]
pub(crate) struct StatsRow {
    pub method: String,
    pub name: String,
    pub request_count: usize,
    pub failure_count: usize,
    pub median_response_time: usize,
    pub average_response_time: f32,
    pub min_response_time: usize,
    pub max_response_time: usize,
    pub requests_per_second: f32,
    pub failures_per_second: f32,
    pub percentiles: Vec<usize>,
}

impl StatsRow {
    fn new(method: &str, name: &str, request: &RequestMetricAggregate, duration: usize) -> Self {
        let (requests_per_second, failures_per_second) = metrics::per_second_calculations(
            duration,
            request.total_count(),
            request.fail_count,
        );
        StatsRow {
            method: method.to_string(),
            name: name.to_string(),
            request_count: request.total_count(),
            failure_count: request.fail_count,
            median_response_time: request.median_response_time(),
            average_response_time: request.average_response_time(),
            min_response_time: request.min_response_time,
            max_response_time: request.max_response_time,
            requests_per_second,
            failures_per_second,
            percentiles: PERCENTILES
                .iter()
                .map(|(percent, _)| request.response_time_percentile(*percent))
                .collect(),
        }
    }

    fn to_csv(&self) -> String {
        let mut fields = vec![
            csv_field(&self.method),
            csv_field(&self.name),
            self.request_count.to_string(),
            self.failure_count.to_string(),
            self.median_response_time.to_string(),
            format!("{:.2}", self.average_response_time),
            self.min_response_time.to_string(),
            self.max_response_time.to_string(),
            format!("{:.2}", self.requests_per_second),
            format!("{:.2}", self.failures_per_second),
        ];
        fields.extend(self.percentiles.iter().map(|p| p.to_string()));
        fields.join(",")
    }
}

fn stats_header() -> String {
    let mut columns = vec![
        "Type",
        "Name",
        "Request Count",
        "Failure Count",
        "Median Response Time",
        "Average Response Time",
        "Min Response Time",
        "Max Response Time",
        "Requests/s",
        "Failures/s",
    ];
    columns.extend(PERCENTILES.iter().map(|(_, name)| *name));
    columns.join(",")
}

/// Build `NAME_stats.csv`.
pub(crate) fn stats_csv(metrics: &SwarmMetrics) -> String {
    let mut lines = vec![stats_header()];
    for (name, request) in metrics.requests.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        lines.push(
            StatsRow::new(&request.method.to_string(), name, request, metrics.duration).to_csv(),
        );
    }
    let aggregated = metrics.aggregated_requests();
    lines.push(StatsRow::new("", "Aggregated", &aggregated, metrics.duration).to_csv());
    lines.join("\n") + "\n"
}

/// Build `NAME_stats_history.csv`, rates are computed between consecutive samples.
pub(crate) fn history_csv(metrics: &SwarmMetrics) -> String {
    let mut lines = vec![
        "Timestamp,User Count,Type,Name,Requests/s,Failures/s,Total Request Count,Total Failure Count"
            .to_string(),
    ];

    let mut previous = (0, 0, 0);
    for sample in &metrics.history {
        let (previous_elapsed, previous_requests, previous_failures) = previous;
        let (requests_per_second, failures_per_second) = metrics::per_second_calculations(
            sample.elapsed.saturating_sub(previous_elapsed),
            sample.requests.saturating_sub(previous_requests),
            sample.failures.saturating_sub(previous_failures),
        );
        lines.push(format!(
            "{},{},,Aggregated,{:.2},{:.2},{},{}",
            sample.elapsed,
            sample.users,
            requests_per_second,
            failures_per_second,
            sample.requests,
            sample.failures
        ));
        previous = (sample.elapsed, sample.requests, sample.failures);
    }
    lines.join("\n") + "\n"
}

/// Build `NAME_failures.csv`.
pub(crate) fn failures_csv(metrics: &SwarmMetrics) -> String {
    let mut lines = vec!["Method,Name,Error,Occurrences".to_string()];
    // Most frequent first.
    let errors: BTreeMap<_, _> = metrics
        .errors
        .values()
        .map(|error| ((std::cmp::Reverse(error.occurrences), &error.name, &error.error), error))
        .collect();
    for error in errors.values() {
        lines.push(format!(
            "{},{},{},{}",
            error.method,
            csv_field(&error.name),
            csv_field(&error.error),
            error.occurrences
        ));
    }
    lines.join("\n") + "\n"
}

async fn write_file(path: &str, contents: &str) -> Result<(), SwarmError> {
    let mut file = File::create(path).await.map_err(|e| SwarmError::InvalidOption {
        option: "--report-prefix".to_string(),
        value: path.to_string(),
        detail: format!("Failed to create report file: {}", e),
    })?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;
    info!("wrote report file to: {}", path);
    Ok(())
}

impl SwarmAttack {
    /// Write every enabled report file.
    pub(crate) async fn write_reports(&self) -> Result<(), SwarmError> {
        let prefix = &self.configuration.report_prefix;
        if !prefix.is_empty() {
            write_file(&format!("{}_stats.csv", prefix), &stats_csv(&self.metrics)).await?;
            write_file(
                &format!("{}_stats_history.csv", prefix),
                &history_csv(&self.metrics),
            )
            .await?;
            write_file(
                &format!("{}_failures.csv", prefix),
                &failures_csv(&self.metrics),
            )
            .await?;
        }

        let report_json = &self.configuration.report_json;
        if !report_json.is_empty() {
            let json = serde_json::to_string_pretty(&self.metrics).map_err(|e| {
                SwarmError::InvalidOption {
                    option: "--report-json".to_string(),
                    value: report_json.to_string(),
                    detail: format!("Failed to serialize metrics: {}", e),
                }
            })?;
            write_file(report_json, &json).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::SwarmMethod;
    use crate::metrics::{ErrorMetric, HistorySample};

    fn metrics() -> SwarmMetrics {
        let mut metrics = SwarmMetrics {
            duration: 10,
            ..Default::default()
        };
        let mut create = RequestMetricAggregate::new("create note", SwarmMethod::Post);
        for response_time in [10, 20, 30, 40] {
            create.set_response_time(response_time);
            create.set_status_code(201);
            create.success_count += 1;
        }
        create.set_response_time(50);
        create.set_status_code(500);
        create.fail_count += 1;
        metrics.requests.insert("create note".to_string(), create);

        metrics.errors.insert(
            "500 Internal Server Error.POST.create note".to_string(),
            ErrorMetric {
                method: SwarmMethod::Post,
                name: "create note".to_string(),
                error: "500 Internal Server Error".to_string(),
                occurrences: 1,
            },
        );
        metrics.errors.insert(
            "timeout, retry.PUT.update note".to_string(),
            ErrorMetric {
                method: SwarmMethod::Put,
                name: "update note".to_string(),
                error: "timeout, retry".to_string(),
                occurrences: 3,
            },
        );
        metrics
    }

    #[test]
    fn stats_columns() {
        let csv = stats_csv(&metrics());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Type,Name,Request Count,Failure Count,"));
        assert!(lines[0].contains("Average Response Time"));
        assert!(lines[0].ends_with("99.99%,100%"));
        assert!(lines[1].starts_with("POST,create note,5,1,30,30.00,10,50,0.50,0.10,"));
        assert!(lines[2].starts_with(",Aggregated,5,1,"));
        assert_eq!(
            lines[0].split(',').count(),
            lines[1].split(',').count()
        );
    }

    #[test]
    fn history_rates() {
        let mut metrics = metrics();
        metrics.history = vec![
            HistorySample {
                elapsed: 1,
                users: 2,
                requests: 4,
                failures: 0,
            },
            HistorySample {
                elapsed: 3,
                users: 2,
                requests: 10,
                failures: 2,
            },
        ];
        let csv = history_csv(&metrics);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Timestamp,User Count,Type,Name,Requests/s,Failures/s,Total Request Count,Total Failure Count"
        );
        assert_eq!(lines[1], "1,2,,Aggregated,4.00,0.00,4,0");
        assert_eq!(lines[2], "3,2,,Aggregated,3.00,1.00,10,2");
    }

    #[test]
    fn failures_most_frequent_first() {
        let csv = failures_csv(&metrics());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Method,Name,Error,Occurrences");
        assert_eq!(lines[1], "PUT,update note,\"timeout, retry\",3");
        assert_eq!(lines[2], "POST,create note,500 Internal Server Error,1");
    }

    #[test]
    fn empty_reports() {
        let metrics = SwarmMetrics::default();
        assert_eq!(stats_csv(&metrics).lines().count(), 2);
        assert_eq!(history_csv(&metrics).lines().count(), 1);
        assert_eq!(failures_csv(&metrics).lines().count(), 1);
    }
}
