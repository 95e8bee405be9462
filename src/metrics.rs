//! Metrics collected and aggregated during a load test.
//!
//! Users never aggregate anything themselves. Each request and each session milestone
//! is sent as a [`SwarmMetric`] over an
//! [`unbounded Flume channel`](https://docs.rs/flume/*/flume/fn.unbounded.html) to the
//! parent process, which folds them into [`SwarmMetrics`]. Users can therefore spend
//! all their time generating load.
//!
//! When the load test completes [`SwarmAttack::execute()`](../struct.SwarmAttack.html#method.execute)
//! returns the final [`SwarmMetrics`]. Viewed with [`std::fmt::Display`] they render as
//! tables of sessions, tasks, requests, response times, status codes and errors.

use chrono::prelude::*;
use itertools::Itertools;
use num_format::{Locale, ToFormattedString};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::{f32, fmt};

use crate::catalog::TaskKind;
use crate::client::SwarmMethod;
use crate::logger::SwarmLog;
use crate::session::AuthAbort;
use crate::util;
use crate::{SwarmAttack, SwarmAttackRunState, SwarmError};

/// Messages sent from [`SwarmUser`](../user/struct.SwarmUser.html) threads to the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwarmMetric {
    Request(RequestMetric),
    Session(SessionMetric),
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// 2xx response carrying whatever the operation needed.
    Success,
    /// Non-2xx response. Transport errors, where no response arrived, use status 0.
    HttpFailure(u16),
    /// 2xx response whose body could not be used, such as a create without an id.
    ResponseDecodeFailure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::HttpFailure(status) => write!(f, "http failure ({})", status),
            Outcome::ResponseDecodeFailure => write!(f, "response decode failure"),
        }
    }
}

/// One request made by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestMetric {
    /// Milliseconds since the load test started.
    pub elapsed: u64,
    /// Index of the user that made the request.
    pub user: usize,
    /// The method of the request.
    pub method: SwarmMethod,
    /// The label the request is aggregated under, for example "update note".
    pub name: String,
    /// The full url requested.
    pub url: String,
    /// The scheduler task that made the request, `None` for session bootstrap requests.
    pub task: Option<TaskKind>,
    /// The HTTP status code, 0 when no response arrived.
    pub status_code: u16,
    /// How many milliseconds the request took.
    pub response_time: u64,
    /// How the request was classified.
    pub outcome: Outcome,
    /// Description of the failure, empty on success.
    pub error: String,
}

impl RequestMetric {
    pub(crate) fn new(elapsed: u64, user: usize, name: &str, task: Option<TaskKind>) -> Self {
        RequestMetric {
            elapsed,
            user,
            method: task.map(|kind| kind.method()).unwrap_or(SwarmMethod::Post),
            name: name.to_string(),
            url: String::new(),
            task,
            status_code: 0,
            response_time: 0,
            outcome: Outcome::Success,
            error: String::new(),
        }
    }

    /// Whether the request was successful.
    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// A session milestone reported by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMetric {
    pub user: usize,
    pub event: SessionEvent,
}

/// What happened to a user's session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SessionEvent {
    /// The user authenticated and finished seeding.
    Active {
        /// Notes created while seeding.
        seeded: usize,
        /// Seed requests that failed.
        seed_failures: usize,
    },
    /// The user gave up before reaching steady state.
    Aborted(AuthAbort),
}

/// Sending half of the metrics channel, cloned into every user.
///
/// Recording never blocks. Once the parent has stopped listening records are dropped.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    sender: Option<flume::Sender<SwarmMetric>>,
}

impl MetricsRecorder {
    pub fn new(sender: flume::Sender<SwarmMetric>) -> Self {
        MetricsRecorder {
            sender: Some(sender),
        }
    }

    /// A recorder that discards everything.
    pub fn disabled() -> Self {
        MetricsRecorder { sender: None }
    }

    pub fn record(&self, metric: SwarmMetric) {
        if let Some(sender) = self.sender.as_ref() {
            if let Err(e) = sender.send(metric) {
                debug!("metrics channel closed, dropping metric: {}", e);
            }
        }
    }
}

/// Aggregated metrics for all requests sharing one label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestMetricAggregate {
    /// The label requests are aggregated under.
    pub name: String,
    /// The method used by these requests.
    pub method: SwarmMethod,
    /// Per-response-time counters.
    ///
    /// Response times under 100ms are stored exactly. Response times between 100 and
    /// 500ms are rounded to the nearest 10ms, between 500 and 1000ms to the nearest
    /// 100ms, and anything slower to the nearest 1000ms.
    pub response_times: BTreeMap<usize, usize>,
    /// The fastest response seen, not rounded.
    pub min_response_time: usize,
    /// The slowest response seen, not rounded.
    pub max_response_time: usize,
    /// Total of all response times.
    pub total_response_time: usize,
    /// How many response times have been tracked.
    pub response_time_counter: usize,
    /// Per-status-code counters.
    pub status_code_counts: HashMap<u16, usize>,
    pub success_count: usize,
    /// Every failure, including decode failures.
    pub fail_count: usize,
    /// The subset of failures that were 2xx responses with an unusable body.
    pub decode_fail_count: usize,
}

impl RequestMetricAggregate {
    pub(crate) fn new(name: &str, method: SwarmMethod) -> Self {
        trace!("new request aggregate: {}", name);
        RequestMetricAggregate {
            name: name.to_string(),
            method,
            response_times: BTreeMap::new(),
            min_response_time: 0,
            max_response_time: 0,
            total_response_time: 0,
            response_time_counter: 0,
            status_code_counts: HashMap::new(),
            success_count: 0,
            fail_count: 0,
            decode_fail_count: 0,
        }
    }

    /// Track response time.
    pub(crate) fn set_response_time(&mut self, response_time: u64) {
        let response_time_usize = response_time as usize;

        self.min_response_time = update_min_time(self.min_response_time, response_time_usize);
        self.max_response_time = update_max_time(self.max_response_time, response_time_usize);
        self.total_response_time += response_time_usize;
        self.response_time_counter += 1;

        // Round the response time so similar times are combined.
        let rounded_response_time = if response_time < 100 {
            response_time_usize
        } else if response_time < 500 {
            ((response_time as f64 / 10.0).round() * 10.0) as usize
        } else if response_time < 1000 {
            ((response_time as f64 / 100.0).round() * 100.0) as usize
        } else {
            ((response_time as f64 / 1000.0).round() * 1000.0) as usize
        };

        *self.response_times.entry(rounded_response_time).or_insert(0) += 1;
    }

    /// Increment counter for status code.
    pub(crate) fn set_status_code(&mut self, status_code: u16) {
        *self.status_code_counts.entry(status_code).or_insert(0) += 1;
    }

    /// Fold one request into the aggregate.
    pub(crate) fn record(&mut self, request: &RequestMetric) {
        self.set_response_time(request.response_time);
        self.set_status_code(request.status_code);
        match request.outcome {
            Outcome::Success => self.success_count += 1,
            Outcome::HttpFailure(_) => self.fail_count += 1,
            Outcome::ResponseDecodeFailure => {
                self.fail_count += 1;
                self.decode_fail_count += 1;
            }
        }
    }

    /// Total number of requests.
    pub fn total_count(&self) -> usize {
        self.success_count + self.fail_count
    }

    /// Mean response time in milliseconds.
    pub fn average_response_time(&self) -> f32 {
        match self.response_time_counter {
            0 => 0.0,
            _ => self.total_response_time as f32 / self.response_time_counter as f32,
        }
    }

    /// Median response time in milliseconds.
    pub fn median_response_time(&self) -> usize {
        util::median(
            &self.response_times,
            self.response_time_counter,
            self.min_response_time,
            self.max_response_time,
        )
    }

    /// The response time `percent` of requests finished within.
    pub fn response_time_percentile(&self, percent: f32) -> usize {
        calculate_response_time_percentile(
            &self.response_times,
            self.response_time_counter,
            self.min_response_time,
            self.max_response_time,
            percent,
        )
    }

    /// Merge another aggregate in, used to build the "Aggregated" rows.
    pub(crate) fn merge(&mut self, other: &RequestMetricAggregate) {
        self.response_times = merge_times(
            std::mem::take(&mut self.response_times),
            &other.response_times,
        );
        self.min_response_time = update_min_time(self.min_response_time, other.min_response_time);
        self.max_response_time = update_max_time(self.max_response_time, other.max_response_time);
        self.total_response_time += other.total_response_time;
        self.response_time_counter += other.response_time_counter;
        for (status_code, count) in &other.status_code_counts {
            *self.status_code_counts.entry(*status_code).or_insert(0) += count;
        }
        self.success_count += other.success_count;
        self.fail_count += other.fail_count;
        self.decode_fail_count += other.decode_fail_count;
    }
}

/// Aggregated results of each scheduler task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMetricAggregate {
    /// How many times the task ran.
    pub runs: usize,
    pub successes: usize,
    /// Runs that ended with a non-2xx status or no response at all.
    pub http_failures: usize,
    /// Runs that got a 2xx response with an unusable body.
    pub decode_failures: usize,
}

impl TaskMetricAggregate {
    pub(crate) fn record(&mut self, outcome: Outcome) {
        self.runs += 1;
        match outcome {
            Outcome::Success => self.successes += 1,
            Outcome::HttpFailure(_) => self.http_failures += 1,
            Outcome::ResponseDecodeFailure => self.decode_failures += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.http_failures + self.decode_failures
    }
}

/// A distinct error and how many times it occurred.
///
/// Errors sharing a method, label and error text are counted together.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ErrorMetric {
    pub method: SwarmMethod,
    pub name: String,
    pub error: String,
    pub occurrences: usize,
}

/// Cumulative counters captured once per second, written to `<prefix>_stats_history.csv`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct HistorySample {
    /// Seconds since the load test started.
    pub elapsed: usize,
    /// Users still running.
    pub users: usize,
    /// Requests made so far.
    pub requests: usize,
    /// Failed requests so far.
    pub failures: usize,
}

/// Session bootstrap counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionMetrics {
    /// Users that reached steady state.
    pub active: usize,
    /// Users that gave up during bootstrap.
    pub aborted: usize,
    /// Aborts grouped by reason.
    pub abort_reasons: BTreeMap<String, usize>,
    /// Notes created while seeding.
    pub seeded: usize,
    /// Seed requests that failed.
    pub seed_failures: usize,
}

impl SessionMetrics {
    /// Sessions that are done authenticating, one way or the other.
    pub fn finished(&self) -> usize {
        self.active + self.aborted
    }
}

/// All metrics of a load test.
#[derive(Clone, Debug, Default)]
pub struct SwarmMetrics {
    /// When the load test started.
    pub started: Option<DateTime<Local>>,
    /// How many seconds the load test ran.
    pub duration: usize,
    /// How many users were launched.
    pub users: usize,
    /// Session outcomes.
    pub sessions: SessionMetrics,
    /// Per-label request metrics.
    pub requests: HashMap<String, RequestMetricAggregate>,
    /// Per-task results.
    pub tasks: BTreeMap<TaskKind, TaskMetricAggregate>,
    /// Distinct errors, keyed by `error.method.name`.
    pub errors: BTreeMap<String, ErrorMetric>,
    /// One sample per second.
    pub history: Vec<HistorySample>,
    /// Every request made, including session bootstrap.
    pub total_requests: usize,
    /// Every failed request, including session bootstrap.
    pub total_failures: usize,
    /// Requests made by scheduler tasks.
    pub task_requests: usize,
    /// Why the load test ended before its run time, if it did.
    pub stop_reason: Option<String>,
    /// Whether these are the final metrics, which display more tables.
    pub(crate) final_metrics: bool,
    /// Whether to display metrics at all.
    pub(crate) display_metrics: bool,
}

impl SwarmMetrics {
    /// Fold one request in.
    pub(crate) fn record_request(&mut self, request: &RequestMetric, record_errors: bool) {
        self.requests
            .entry(request.name.clone())
            .or_insert_with(|| RequestMetricAggregate::new(&request.name, request.method))
            .record(request);

        self.total_requests += 1;
        if !request.success() {
            self.total_failures += 1;
        }

        if let Some(kind) = request.task {
            self.task_requests += 1;
            self.tasks.entry(kind).or_default().record(request.outcome);
        }

        if record_errors && !request.success() {
            self.record_error(request);
        }
    }

    /// Count a distinct error.
    pub(crate) fn record_error(&mut self, request: &RequestMetric) {
        let error_string = format!("{}.{}.{}", request.error, request.method, request.name);
        self.errors
            .entry(error_string)
            .or_insert_with(|| ErrorMetric {
                method: request.method,
                name: request.name.clone(),
                error: request.error.clone(),
                occurrences: 0,
            })
            .occurrences += 1;
    }

    /// Fold one session milestone in.
    pub(crate) fn record_session(&mut self, session: &SessionMetric) {
        match &session.event {
            SessionEvent::Active {
                seeded,
                seed_failures,
            } => {
                self.sessions.active += 1;
                self.sessions.seeded += seeded;
                self.sessions.seed_failures += seed_failures;
            }
            SessionEvent::Aborted(reason) => {
                self.sessions.aborted += 1;
                *self
                    .sessions
                    .abort_reasons
                    .entry(reason.to_string())
                    .or_insert(0) += 1;
            }
        }
    }

    /// Users launched that haven't aborted.
    pub fn running_users(&self) -> usize {
        self.users.saturating_sub(self.sessions.aborted)
    }

    /// Capture cumulative counters.
    pub(crate) fn record_history(&mut self, elapsed: usize) {
        let sample = HistorySample {
            elapsed,
            users: self.running_users(),
            requests: self.total_requests,
            failures: self.total_failures,
        };
        // One sample per second at most, the latest wins.
        match self.history.last_mut() {
            Some(last) if last.elapsed == elapsed => *last = sample,
            _ => self.history.push(sample),
        }
    }

    /// Combine every label into one aggregate.
    pub fn aggregated_requests(&self) -> RequestMetricAggregate {
        let mut aggregate = RequestMetricAggregate::new("Aggregated", SwarmMethod::Get);
        for request in self.requests.values() {
            aggregate.merge(request);
        }
        aggregate
    }

    /// Display the final metrics.
    pub fn print(&self) {
        if self.display_metrics {
            info!("printing final metrics after {} seconds...", self.duration);
            print!("{}", self);
        }
    }

    /// Display metrics while the load test is running.
    pub(crate) fn print_running(&self) {
        if self.display_metrics {
            info!(
                "printing running metrics after {} seconds...",
                self.duration
            );
            println!("{}", self);
        }
    }

    pub(crate) fn fmt_sessions(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.users == 0 {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === SESSIONS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<13} | {:>9} | {:>9} | {:>13} | {:>14}",
            "Users", "Active", "Aborted", "Seeded notes", "Seed failures"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<13} | {:>9} | {:>9} | {:>13} | {:>14}",
            format_number(self.users),
            format_number(self.sessions.active),
            format_number(self.sessions.aborted),
            format_number(self.sessions.seeded),
            format_number(self.sessions.seed_failures),
        )?;
        for (reason, count) in &self.sessions.abort_reasons {
            writeln!(fmt, "   aborted: {} ({})", reason, format_number(*count))?;
        }
        if let Some(reason) = &self.stop_reason {
            writeln!(fmt, "   stopped early: {}", reason)?;
        }

        Ok(())
    }

    pub(crate) fn fmt_tasks(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tasks.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === PER TASK METRICS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>11} | {:>11} | {:>11} | {:>8}",
            "Task", "# runs", "# http fail", "# decode", "runs/s"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (kind, task) in &self.tasks {
            let (runs, _) = per_second_calculations(self.duration, task.runs, task.failures());
            writeln!(
                fmt,
                " {:<24} | {:>11} | {:>11} | {:>11} | {:>8.p$}",
                kind.name(),
                format_number(task.runs),
                format_number(task.http_failures),
                format_number(task.decode_failures),
                runs,
                p = determine_precision(runs),
            )?;
        }

        Ok(())
    }

    pub(crate) fn fmt_requests(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === PER REQUEST METRICS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8} | {:>7}",
            "Name", "# reqs", "# fails", "req/s", "fail/s"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (request_key, request) in self.requests.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            self.fmt_request_row(fmt, request_key, request)?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+---------------+----------------+----------+--------"
            )?;
            self.fmt_request_row(fmt, "Aggregated", &self.aggregated_requests())?;
        }

        Ok(())
    }

    fn fmt_request_row(
        &self,
        fmt: &mut fmt::Formatter<'_>,
        name: &str,
        request: &RequestMetricAggregate,
    ) -> fmt::Result {
        let total_count = request.total_count();
        let fail_percent = if request.fail_count > 0 {
            request.fail_count as f32 / total_count as f32 * 100.0
        } else {
            0.0
        };
        let (reqs, fails) = per_second_calculations(self.duration, total_count, request.fail_count);
        // Compress 100.0 and 0.0 to 100 and 0 respectively to save width.
        let fails_column = if fail_percent as usize == 100 || fail_percent as usize == 0 {
            format!(
                "{} ({}%)",
                format_number(request.fail_count),
                fail_percent as usize
            )
        } else {
            format!("{} ({:.1}%)", format_number(request.fail_count), fail_percent)
        };
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8.reqs_p$} | {:>7.fails_p$}",
            util::truncate_string(name, 24),
            format_number(total_count),
            fails_column,
            reqs,
            fails,
            reqs_p = determine_precision(reqs),
            fails_p = determine_precision(fails),
        )
    }

    pub(crate) fn fmt_response_times(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>11} | {:>10} | {:>10} | {:>11}",
            "Name", "Avg (ms)", "Min", "Max", "Median"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let row = |fmt: &mut fmt::Formatter<'_>, name: &str, request: &RequestMetricAggregate| {
            let average = request.average_response_time();
            writeln!(
                fmt,
                " {:<24} | {:>11.avg_precision$} | {:>10} | {:>10} | {:>11}",
                util::truncate_string(name, 24),
                average,
                format_number(request.min_response_time),
                format_number(request.max_response_time),
                format_number(request.median_response_time()),
                avg_precision = determine_precision(average),
            )
        };
        for (request_key, request) in self.requests.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            row(fmt, request_key, request)?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+-------------+------------+------------+------------"
            )?;
            row(fmt, "Aggregated", &self.aggregated_requests())?;
        }

        Ok(())
    }

    pub(crate) fn fmt_percentiles(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only include percentiles in the final report.
        if !self.final_metrics || self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === SLOWEST RESPONSE TIMES (ms) ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8}",
            "Name", "50%", "90%", "95%", "99%", "100%"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let row = |fmt: &mut fmt::Formatter<'_>, name: &str, request: &RequestMetricAggregate| {
            writeln!(
                fmt,
                " {:<24} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8}",
                util::truncate_string(name, 24),
                format_number(request.response_time_percentile(0.5)),
                format_number(request.response_time_percentile(0.9)),
                format_number(request.response_time_percentile(0.95)),
                format_number(request.response_time_percentile(0.99)),
                format_number(request.response_time_percentile(1.0)),
            )
        };
        for (request_key, request) in self.requests.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            row(fmt, request_key, request)?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+----------+----------+----------+----------+---------"
            )?;
            row(fmt, "Aggregated", &self.aggregated_requests())?;
        }

        Ok(())
    }

    pub(crate) fn fmt_status_codes(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.final_metrics || self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<24} | {:>51} ", "Name", "Status codes")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (request_key, request) in self.requests.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            writeln!(
                fmt,
                " {:<24} | {:>51}",
                util::truncate_string(request_key, 24),
                prepare_status_codes(&request.status_code_counts),
            )?;
        }
        writeln!(
            fmt,
            " -------------------------+----------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>51} ",
            "Aggregated",
            prepare_status_codes(&self.aggregated_requests().status_code_counts)
        )?;

        Ok(())
    }

    pub(crate) fn fmt_errors(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.final_metrics || self.errors.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === ERRORS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<11} | Error", "Count")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        // Most frequent first.
        for error in self
            .errors
            .values()
            .sorted_by(|a, b| b.occurrences.cmp(&a.occurrences))
        {
            writeln!(
                fmt,
                " {:<12}  {} {}: {}",
                format_number(error.occurrences),
                error.method,
                error.name,
                error.error
            )?;
        }
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;

        Ok(())
    }
}

impl Serialize for SwarmMetrics {
    // Can't be derived because of the started field.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("SwarmMetrics", 12)?;
        // Convert started field to a unix timestamp.
        let timestamp = self.started.map(|started| started.timestamp()).unwrap_or(0);
        s.serialize_field("started", &timestamp)?;
        s.serialize_field("duration", &self.duration)?;
        s.serialize_field("users", &self.users)?;
        s.serialize_field("sessions", &self.sessions)?;
        s.serialize_field("requests", &self.requests)?;
        s.serialize_field("tasks", &self.tasks)?;
        s.serialize_field("errors", &self.errors)?;
        s.serialize_field("history", &self.history)?;
        s.serialize_field("total_requests", &self.total_requests)?;
        s.serialize_field("total_failures", &self.total_failures)?;
        s.serialize_field("task_requests", &self.task_requests)?;
        s.serialize_field("stop_reason", &self.stop_reason)?;
        s.end()
    }
}

impl fmt::Display for SwarmMetrics {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_sessions(fmt)?;
        self.fmt_tasks(fmt)?;
        self.fmt_requests(fmt)?;
        self.fmt_response_times(fmt)?;
        self.fmt_percentiles(fmt)?;
        self.fmt_status_codes(fmt)?;
        self.fmt_errors(fmt)
    }
}

impl SwarmAttack {
    // Receive metrics from users, optionally displaying running metrics. If flush is
    // true all queued metrics are received, otherwise receiving stops after 400 ms and
    // continues on the next call.
    pub(crate) async fn sync_metrics(
        &mut self,
        run_state: &mut SwarmAttackRunState,
        flush: bool,
    ) -> Result<(), SwarmError> {
        if let Some(running_metrics) = self.configuration.running_metrics {
            if util::timer_expired(run_state.running_metrics_timer, running_metrics) {
                run_state.running_metrics_timer = std::time::Instant::now();
                run_state.display_running_metrics = true;
            }
        }

        self.receive_metrics(run_state, flush).await?;

        if util::timer_expired(run_state.history_timer, 1) {
            run_state.history_timer = std::time::Instant::now();
            self.update_duration();
            let elapsed = self.elapsed_seconds();
            self.metrics.record_history(elapsed);
        }

        if run_state.display_running_metrics {
            run_state.display_running_metrics = false;
            self.update_duration();
            self.metrics.print_running();
        }

        Ok(())
    }

    pub(crate) async fn receive_metrics(
        &mut self,
        run_state: &mut SwarmAttackRunState,
        flush: bool,
    ) -> Result<bool, SwarmError> {
        let mut received_message = false;
        // The main loop wakes up every 500ms, don't spend more than 400ms here.
        let receive_timeout = 400;
        let receive_started = std::time::Instant::now();

        while let Ok(message) = run_state.metrics_rx.try_recv() {
            received_message = true;
            match message {
                SwarmMetric::Request(request_metric) => {
                    self.metrics
                        .record_request(&request_metric, !self.configuration.no_error_summary);
                    if let Some(logger) = run_state.all_users_logger_tx.as_ref() {
                        if let Err(e) = logger.send(Some(SwarmLog::Request(request_metric))) {
                            warn!("failed to send to request logger: {}", e);
                        }
                    }
                }
                SwarmMetric::Session(session_metric) => {
                    if let SessionEvent::Aborted(reason) = &session_metric.event {
                        info!("user {} aborted: {}", session_metric.user, reason);
                    }
                    self.metrics.record_session(&session_metric);
                }
            }
            if !flush && util::ms_timer_expired(receive_started, receive_timeout) {
                break;
            }
        }

        Ok(received_message)
    }

    // How long the load test has been running.
    pub(crate) fn update_duration(&mut self) {
        self.metrics.duration = self.elapsed_seconds();
    }

    fn elapsed_seconds(&self) -> usize {
        self.started
            .map(|started| started.elapsed().as_secs() as usize)
            .unwrap_or(0)
    }
}

/// Helper to calculate requests and fails per seconds.
pub(crate) fn per_second_calculations(duration: usize, total: usize, fail: usize) -> (f32, f32) {
    if duration == 0 {
        (0.0, 0.0)
    } else {
        (
            total as f32 / duration as f32,
            fail as f32 / duration as f32,
        )
    }
}

fn determine_precision(value: f32) -> usize {
    if value < 1000.0 {
        2
    } else {
        0
    }
}

/// Format large number in locale appropriate style.
pub(crate) fn format_number(number: usize) -> String {
    (number).to_formatted_string(&Locale::en)
}

/// Merge one set of rounded response times into another.
pub(crate) fn merge_times(
    mut global_response_times: BTreeMap<usize, usize>,
    local_response_times: &BTreeMap<usize, usize>,
) -> BTreeMap<usize, usize> {
    for (response_time, count) in local_response_times {
        *global_response_times.entry(*response_time).or_insert(0) += count;
    }
    global_response_times
}

/// Update a minimum, where 0 means nothing seen yet.
pub(crate) fn update_min_time(global_min: usize, min: usize) -> usize {
    if global_min == 0 || (min > 0 && min < global_min) {
        min
    } else {
        global_min
    }
}

pub(crate) fn update_max_time(global_max: usize, max: usize) -> usize {
    global_max.max(max)
}

/// Get the response time that a certain percent of the requests finished within.
pub(crate) fn calculate_response_time_percentile(
    response_times: &BTreeMap<usize, usize>,
    total_requests: usize,
    min: usize,
    max: usize,
    percent: f32,
) -> usize {
    let percentile_request = (total_requests as f32 * percent).round() as usize;
    debug!(
        "percentile: {}, request {} of total {}",
        percent, percentile_request, total_requests
    );

    let mut total_count: usize = 0;
    for (value, counter) in response_times {
        total_count += counter;
        if total_count >= percentile_request {
            return (*value).clamp(min, max.max(min));
        }
    }
    0
}

/// Format status code counters as `"12 [200], 3 [404]"`.
pub(crate) fn prepare_status_codes(status_code_counts: &HashMap<u16, usize>) -> String {
    status_code_counts
        .iter()
        .sorted()
        .map(|(status_code, count)| format!("{} [{}]", format_number(*count), status_code))
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;

    fn request(
        name: &str,
        task: Option<TaskKind>,
        response_time: u64,
        outcome: Outcome,
    ) -> RequestMetric {
        let mut request = RequestMetric::new(0, 0, name, task);
        request.response_time = response_time;
        request.outcome = outcome;
        request.status_code = match outcome {
            Outcome::Success | Outcome::ResponseDecodeFailure => 200,
            Outcome::HttpFailure(status) => status,
        };
        if !outcome.is_success() {
            request.error = outcome.to_string();
        }
        request
    }

    #[test]
    fn response_time_rounding() {
        let mut aggregate = RequestMetricAggregate::new("list all notes", SwarmMethod::Get);
        aggregate.set_response_time(7);
        aggregate.set_response_time(99);
        aggregate.set_response_time(104);
        aggregate.set_response_time(551);
        aggregate.set_response_time(1_499);
        aggregate.set_response_time(1_501);
        assert_eq!(
            aggregate.response_times.keys().copied().collect::<Vec<_>>(),
            vec![7, 99, 100, 600, 1_000, 2_000]
        );
        assert_eq!(aggregate.min_response_time, 7);
        assert_eq!(aggregate.max_response_time, 1_501);
        assert_eq!(aggregate.response_time_counter, 6);
        assert_eq!(aggregate.total_response_time, 3_761);
    }

    #[test]
    fn min_ignores_zero() {
        assert_eq!(update_min_time(0, 5), 5);
        assert_eq!(update_min_time(5, 0), 5);
        assert_eq!(update_min_time(5, 3), 3);
        assert_eq!(update_max_time(5, 3), 5);
    }

    #[test]
    fn percentiles() {
        let mut response_times = BTreeMap::new();
        response_times.insert(10, 90);
        response_times.insert(200, 9);
        response_times.insert(2_000, 1);
        assert_eq!(
            calculate_response_time_percentile(&response_times, 100, 8, 1_800, 0.5),
            10
        );
        assert_eq!(
            calculate_response_time_percentile(&response_times, 100, 8, 1_800, 0.95),
            200
        );
        // Rounded bucket is clamped to the real maximum.
        assert_eq!(
            calculate_response_time_percentile(&response_times, 100, 8, 1_800, 1.0),
            1_800
        );
        assert_eq!(
            calculate_response_time_percentile(&BTreeMap::new(), 0, 0, 0, 0.5),
            0
        );
    }

    #[test]
    fn calculate_per_second() {
        assert_eq!(per_second_calculations(0, 10, 1), (0.0, 0.0));
        assert_eq!(per_second_calculations(10, 100, 5), (10.0, 0.5));
    }

    #[test]
    fn outcomes_are_counted_separately() {
        let mut metrics = SwarmMetrics::default();
        metrics.record_request(
            &request("create note", Some(TaskKind::Create), 10, Outcome::Success),
            true,
        );
        metrics.record_request(
            &request(
                "create note",
                Some(TaskKind::Create),
                12,
                Outcome::ResponseDecodeFailure,
            ),
            true,
        );
        metrics.record_request(
            &request(
                "create note",
                Some(TaskKind::Create),
                14,
                Outcome::HttpFailure(500),
            ),
            true,
        );
        metrics.record_request(&request("log in", None, 30, Outcome::Success), true);

        let create = &metrics.requests["create note"];
        assert_eq!(create.success_count, 1);
        assert_eq!(create.fail_count, 2);
        assert_eq!(create.decode_fail_count, 1);
        assert_eq!(create.status_code_counts[&200], 2);
        assert_eq!(create.status_code_counts[&500], 1);

        let task = &metrics.tasks[&TaskKind::Create];
        assert_eq!(task.runs, 3);
        assert_eq!(task.successes, 1);
        assert_eq!(task.http_failures, 1);
        assert_eq!(task.decode_failures, 1);

        // Bootstrap requests are not task runs.
        assert_eq!(metrics.tasks.len(), 1);
        assert_eq!(metrics.task_requests, 3);
        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.total_failures, 2);
        assert_eq!(metrics.errors.len(), 2);

        let aggregated = metrics.aggregated_requests();
        assert_eq!(aggregated.total_count(), 4);
        assert_eq!(aggregated.min_response_time, 10);
        assert_eq!(aggregated.max_response_time, 30);
    }

    #[test]
    fn errors_are_deduplicated() {
        let mut metrics = SwarmMetrics::default();
        for _ in 0..3 {
            metrics.record_request(
                &request("delete note", Some(TaskKind::Delete), 5, Outcome::HttpFailure(404)),
                true,
            );
        }
        assert_eq!(metrics.errors.len(), 1);
        let error = metrics.errors.values().next().unwrap();
        assert_eq!(error.occurrences, 3);
        assert_eq!(error.method, SwarmMethod::Delete);

        let mut quiet = SwarmMetrics::default();
        quiet.record_request(
            &request("delete note", Some(TaskKind::Delete), 5, Outcome::HttpFailure(404)),
            false,
        );
        assert!(quiet.errors.is_empty());
        assert_eq!(quiet.total_failures, 1);
    }

    #[test]
    fn sessions_and_history() {
        let mut metrics = SwarmMetrics {
            users: 3,
            ..Default::default()
        };
        metrics.record_session(&SessionMetric {
            user: 0,
            event: SessionEvent::Active {
                seeded: 10,
                seed_failures: 0,
            },
        });
        metrics.record_session(&SessionMetric {
            user: 1,
            event: SessionEvent::Active {
                seeded: 8,
                seed_failures: 2,
            },
        });
        metrics.record_session(&SessionMetric {
            user: 2,
            event: SessionEvent::Aborted(AuthAbort::TokenExchange { status: 401 }),
        });
        assert_eq!(metrics.sessions.finished(), 3);
        assert_eq!(metrics.sessions.seeded, 18);
        assert_eq!(metrics.sessions.seed_failures, 2);
        assert_eq!(metrics.sessions.abort_reasons.len(), 1);
        assert_eq!(metrics.running_users(), 2);

        metrics.record_request(&request("log in", None, 5, Outcome::Success), true);
        metrics.record_history(1);
        metrics.record_request(&request("log in", None, 5, Outcome::HttpFailure(0)), true);
        metrics.record_history(1);
        metrics.record_history(2);
        assert_eq!(
            metrics.history,
            vec![
                HistorySample {
                    elapsed: 1,
                    users: 2,
                    requests: 2,
                    failures: 1
                },
                HistorySample {
                    elapsed: 2,
                    users: 2,
                    requests: 2,
                    failures: 1
                },
            ]
        );
    }

    #[test]
    fn display_final_metrics() {
        let mut metrics = SwarmMetrics {
            users: 1,
            duration: 2,
            final_metrics: true,
            ..Default::default()
        };
        metrics.record_request(
            &request("list all notes", Some(TaskKind::ListAll), 20, Outcome::Success),
            true,
        );
        metrics.record_request(
            &request("update note", Some(TaskKind::Update), 40, Outcome::HttpFailure(409)),
            true,
        );
        let output = metrics.to_string();
        assert!(output.contains("=== SESSIONS ==="));
        assert!(output.contains("=== PER TASK METRICS ==="));
        assert!(output.contains("=== PER REQUEST METRICS ==="));
        assert!(output.contains("Aggregated"));
        assert!(output.contains("=== SLOWEST RESPONSE TIMES (ms) ==="));
        assert!(output.contains("1 [409]"));
        assert!(output.contains("=== ERRORS ==="));

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["total_requests"], 2);
        assert_eq!(json["started"], 0);
    }
}
