//! # notesync-swarm
//!
//! A load generator that simulates many concurrent users of a note-taking API.
//!
//! Each simulated user signs up (or reuses a shared account), exchanges its credentials
//! for a bearer token, seeds a handful of notes, and then loops through a weighted mix of
//! list, create, update and delete requests with a random think time between them. Every
//! request is timed and classified, and the results are aggregated into per-endpoint,
//! per-task and per-second metrics.
//!
//! ## Running a swarm
//!
//! The simplest way is the bundled binary:
//!
//! ```bash
//! $ notesync-swarm --host http://127.0.0.1:5000 -u 50 -r 5 -t 5m --report-prefix swarm
//! ```
//!
//! The same load test can be started from Rust, optionally setting programmatic defaults
//! that run-time options can still override:
//!
//! ```rust,no_run
//! use notesync_swarm::prelude::*;
//!
//! fn main() -> Result<(), SwarmError> {
//!     let _metrics = SwarmAttack::initialize()?
//!         .set_default(SwarmDefault::Host, "http://127.0.0.1:5000")?
//!         .set_default(SwarmDefault::Users, 50)?
//!         .set_default(SwarmDefault::HatchRate, "5")?
//!         .set_default(SwarmDefault::RunTime, 300)?
//!         .execute()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Phases
//!
//! A [`SwarmAttack`] moves through [`AttackPhase::Idle`], [`AttackPhase::Starting`] (users
//! launch at the hatch rate), [`AttackPhase::Running`], [`AttackPhase::Stopping`] and
//! finally [`AttackPhase::Shutdown`]. The run stops when the run time elapses, when the
//! request budget is spent, when too many users fail to log in, or on ctrl-c. Users are
//! always stopped cooperatively: each finishes its in-flight request before exiting.

#[macro_use]
extern crate log;

pub mod catalog;
pub mod client;
pub mod config;
pub mod logger;
pub mod metrics;
pub mod pool;
pub mod prelude;
mod report;
pub mod scheduler;
pub mod session;
mod user;
pub mod util;

use chrono::prelude::*;
use gumdrop::Options;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{fmt, io, time};
use tokio::runtime::Runtime;

pub use crate::config::{SwarmConfiguration, SwarmDefault, SwarmDefaultType};
use crate::catalog::TaskCatalog;
use crate::client::SwarmClient;
use crate::config::SwarmDefaults;
use crate::logger::SwarmLog;
use crate::metrics::{MetricsRecorder, SwarmMetric, SwarmMetrics};
use crate::user::{SwarmUser, SwarmUserCommand};

/// Set by the ctrl-c handler, checked by the parent loop.
pub(crate) static CANCELED: AtomicBool = AtomicBool::new(false);

/// Sessions that must finish authenticating before the abort threshold is checked.
const AUTH_ABORT_SAMPLE: usize = 10;

/// An enumeration of all errors a [`SwarmAttack`] can return.
#[derive(Debug)]
pub enum SwarmError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a ['tokio::task::JoinError'](https://tokio-rs.github.io/tokio/doc/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Failed to parse a hostname.
    InvalidHost {
        /// The invalid hostname that caused this error.
        host: String,
        /// An optional explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`](https://docs.rs/url/*/url/enum.ParseError.html).
        parse_error: url::ParseError,
    },
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Invalid think time specified.
    InvalidWaitTime {
        // The specified minimum think time.
        min_wait: usize,
        // The specified maximum think time.
        max_wait: usize,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Invalid task weight specified.
    InvalidWeight {
        // The specified weight.
        weight: usize,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Every task weight is zero.
    NoTasks {
        /// An optional explanation of the error.
        detail: String,
    },
}

impl SwarmError {
    fn describe(&self) -> &str {
        match *self {
            SwarmError::Io(_) => "io::Error",
            SwarmError::Reqwest(_) => "reqwest::Error",
            SwarmError::TokioJoin(_) => "tokio::task::JoinError",
            SwarmError::InvalidHost { .. } => "failed to parse hostname",
            SwarmError::InvalidOption { .. } => "invalid option or value specified",
            SwarmError::InvalidWaitTime { .. } => "invalid think time specified",
            SwarmError::InvalidWeight { .. } => "invalid weight specified",
            SwarmError::NoTasks { .. } => "no tasks enabled",
        }
    }
}

impl fmt::Display for SwarmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SwarmError::Io(ref source) => write!(f, "SwarmError: {} ({})", self.describe(), source),
            SwarmError::Reqwest(ref source) => {
                write!(f, "SwarmError: {} ({})", self.describe(), source)
            }
            SwarmError::TokioJoin(ref source) => {
                write!(f, "SwarmError: {} ({})", self.describe(), source)
            }
            SwarmError::InvalidHost {
                ref parse_error,
                ref host,
                ..
            } => write!(
                f,
                "SwarmError: {} {} ({})",
                self.describe(),
                host,
                parse_error
            ),
            SwarmError::InvalidOption { ref detail, .. }
            | SwarmError::InvalidWaitTime { ref detail, .. }
            | SwarmError::InvalidWeight { ref detail, .. }
            | SwarmError::NoTasks { ref detail } => {
                write!(f, "SwarmError: {}: {}", self.describe(), detail)
            }
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for SwarmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            SwarmError::Io(ref source) => Some(source),
            SwarmError::Reqwest(ref source) => Some(source),
            SwarmError::TokioJoin(ref source) => Some(source),
            SwarmError::InvalidHost {
                ref parse_error, ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for SwarmError {
    fn from(err: reqwest::Error) -> SwarmError {
        SwarmError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for SwarmError {
    fn from(err: io::Error) -> SwarmError {
        SwarmError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for SwarmError {
    fn from(err: tokio::task::JoinError) -> SwarmError {
        SwarmError::TokioJoin(err)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A [`SwarmAttack`] moves through each of the following phases during a load test.
pub enum AttackPhase {
    /// Nothing is running yet.
    Idle,
    /// [`SwarmUser`](./user/struct.SwarmUser.html)s are launching at the hatch rate.
    Starting,
    /// All users have launched and are generating load.
    Running,
    /// Users are finishing their in-flight requests and exiting.
    Stopping,
    /// Exiting the load test.
    Shutdown,
}

/// Internal global run state for a load test.
#[derive(Debug)]
pub(crate) struct SwarmAttackRunState {
    /// When the previous user was launched.
    spawn_user_timer: time::Instant,
    /// How many milliseconds until the next user should be launched.
    spawn_user_in_ms: usize,
    /// Time spent doing things, subtracted from the time sleeping to avoid drift.
    drift_timer: tokio::time::Instant,
    /// Unbounded sender cloned into every user.
    all_users_metrics_tx: flume::Sender<SwarmMetric>,
    /// Unbounded receiver the parent drains metrics from.
    pub(crate) metrics_rx: flume::Receiver<SwarmMetric>,
    /// Request logger task, if enabled.
    logger_handle: Option<tokio::task::JoinHandle<Result<(), SwarmError>>>,
    /// Sender to the request logger task, if enabled.
    pub(crate) all_users_logger_tx: Option<flume::Sender<Option<SwarmLog>>>,
    /// Every launched user, so they can be joined when stopping.
    users: Vec<tokio::task::JoinHandle<()>>,
    /// One command channel per launched user.
    user_channels: Vec<flume::Sender<SwarmUserCommand>>,
    /// Timer tracking when to display running metrics, if enabled.
    pub(crate) running_metrics_timer: time::Instant,
    /// Whether running metrics should be displayed on the next sync.
    pub(crate) display_running_metrics: bool,
    /// Timer tracking when to capture the next history sample.
    pub(crate) history_timer: time::Instant,
    /// Connection pool shared by all users.
    client: SwarmClient,
    /// Task weights shared by all users.
    catalog: Arc<TaskCatalog>,
}

/// Global internal state for the load test.
pub struct SwarmAttack {
    /// Optional default values for run-time options.
    defaults: SwarmDefaults,
    /// Configuration object holding options set when launching the load test.
    configuration: SwarmConfiguration,
    /// How long (in seconds) the load test should run, 0 runs until stopped.
    run_time: usize,
    /// Which phase the load test is currently operating in.
    attack_phase: AttackPhase,
    /// When the load test started.
    started: Option<time::Instant>,
    /// All metrics merged together.
    metrics: SwarmMetrics,
}

impl SwarmAttack {
    /// Load configuration from the command line and initialize a [`SwarmAttack`].
    ///
    /// # Example
    /// ```rust,no_run
    /// use notesync_swarm::prelude::*;
    ///
    /// let mut swarm_attack = SwarmAttack::initialize();
    /// ```
    pub fn initialize() -> Result<SwarmAttack, SwarmError> {
        SwarmAttack::initialize_with_config(SwarmConfiguration::parse_args_default_or_exit())
    }

    /// Initialize a [`SwarmAttack`] with an already loaded configuration.
    ///
    /// This is generally used by tests.
    ///
    /// # Example
    /// ```rust
    /// use notesync_swarm::{SwarmAttack, SwarmConfiguration};
    /// use gumdrop::Options;
    ///
    /// let configuration = SwarmConfiguration::parse_args_default(&["--host", "http://127.0.0.1"]).unwrap();
    /// let mut swarm_attack = SwarmAttack::initialize_with_config(configuration);
    /// ```
    pub fn initialize_with_config(
        configuration: SwarmConfiguration,
    ) -> Result<SwarmAttack, SwarmError> {
        Ok(SwarmAttack {
            defaults: SwarmDefaults::default(),
            configuration,
            run_time: 0,
            attack_phase: AttackPhase::Idle,
            started: None,
            metrics: SwarmMetrics::default(),
        })
    }

    fn set_attack_phase(&mut self, run_state: &mut SwarmAttackRunState, phase: AttackPhase) {
        // There's nothing to do if already in the specified phase.
        if self.attack_phase == phase {
            return;
        }

        // The drift timer starts at 0 any time the phase is changed.
        run_state.drift_timer = tokio::time::Instant::now();

        info!("entering SwarmAttack phase: {:?}", &phase);
        self.attack_phase = phase;
    }

    /// Execute the load test, returning the collected metrics.
    ///
    /// # Example
    /// ```rust,no_run
    /// use notesync_swarm::prelude::*;
    ///
    /// fn main() -> Result<(), SwarmError> {
    ///     let swarm_metrics = SwarmAttack::initialize()?
    ///         .set_default(SwarmDefault::Host, "http://127.0.0.1:5000")?
    ///         // Exit after ten seconds.
    ///         .set_default(SwarmDefault::RunTime, 10)?
    ///         .execute()?;
    ///
    ///     println!("{} requests", swarm_metrics.total_requests);
    ///     Ok(())
    /// }
    /// ```
    pub fn execute(mut self) -> Result<SwarmMetrics, SwarmError> {
        // If version flag is set, display package name and version and exit.
        if self.configuration.version {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }

        self.configuration.configure(&self.defaults);

        // The catalog only depends on the weights, list it before validating the rest.
        let catalog = TaskCatalog::new(&self.configuration.weights())?;
        if self.configuration.list {
            catalog.print();
            std::process::exit(0);
        }

        self.configuration.validate()?;
        self.run_time = self.configuration.run_time_secs();
        info!("host configured: {}", self.configuration.host);

        let rt = Runtime::new()?;
        self = rt.block_on(self.start_attack(catalog))?;

        Ok(self.metrics)
    }

    // Build the run state: channels, the shared client and the ctrl-c handler.
    async fn initialize_attack(
        &mut self,
        catalog: TaskCatalog,
    ) -> Result<SwarmAttackRunState, SwarmError> {
        trace!("initialize_attack");

        let (all_users_metrics_tx, metrics_rx): (
            flume::Sender<SwarmMetric>,
            flume::Receiver<SwarmMetric>,
        ) = flume::unbounded();

        let client = SwarmClient::new(&self.configuration)?;
        let std_now = time::Instant::now();

        let run_state = SwarmAttackRunState {
            spawn_user_timer: std_now,
            spawn_user_in_ms: 0,
            drift_timer: tokio::time::Instant::now(),
            all_users_metrics_tx,
            metrics_rx,
            logger_handle: None,
            all_users_logger_tx: None,
            users: Vec::new(),
            user_channels: Vec::new(),
            running_metrics_timer: std_now,
            display_running_metrics: false,
            history_timer: std_now,
            client,
            catalog: Arc::new(catalog),
        };

        // Catch ctrl-c to allow clean shutdown to display metrics.
        util::setup_ctrlc_handler();

        Ok(run_state)
    }

    // Reset metrics and timers, launch the request logger if enabled.
    async fn reset_run_state(
        &mut self,
        run_state: &mut SwarmAttackRunState,
    ) -> Result<(), SwarmError> {
        self.metrics = SwarmMetrics {
            display_metrics: !self.configuration.no_print_metrics,
            ..Default::default()
        };

        if !self.configuration.request_log.is_empty() {
            let (all_users_logger_tx, logger_rx): (
                flume::Sender<Option<SwarmLog>>,
                flume::Receiver<Option<SwarmLog>>,
            ) = flume::unbounded();
            let logger_configuration = self.configuration.clone();
            run_state.logger_handle =
                Some(tokio::spawn(logger_configuration.logger_main(logger_rx)));
            run_state.all_users_logger_tx = Some(all_users_logger_tx);
        }

        let std_now = time::Instant::now();
        run_state.spawn_user_timer = std_now;
        run_state.spawn_user_in_ms = 0;
        run_state.drift_timer = tokio::time::Instant::now();
        run_state.users = Vec::new();
        run_state.user_channels = Vec::new();
        run_state.running_metrics_timer = std_now;
        run_state.display_running_metrics = false;
        run_state.history_timer = std_now;

        // Record when the SwarmAttack officially started, the run time includes the
        // ramp up.
        self.started = Some(std_now);
        self.metrics.started = Some(Local::now());

        Ok(())
    }

    // Launch users at the hatch rate until all are running.
    async fn spawn_attack(
        &mut self,
        run_state: &mut SwarmAttackRunState,
    ) -> Result<(), SwarmError> {
        let hatch_rate = util::get_hatch_rate(self.configuration.hatch_rate.clone());
        let total_users = self.configuration.users();

        // Determine if it's time to launch a user.
        if run_state.spawn_user_in_ms == 0
            || util::ms_timer_expired(run_state.spawn_user_timer, run_state.spawn_user_in_ms)
        {
            if self.metrics.users < total_users {
                run_state.spawn_user_timer = time::Instant::now();
                // Start with 1,000 milliseconds and divide by the hatch_rate.
                run_state.spawn_user_in_ms = (1_000.0 / hatch_rate) as usize;

                let (parent_sender, thread_receiver): (
                    flume::Sender<SwarmUserCommand>,
                    flume::Receiver<SwarmUserCommand>,
                ) = flume::unbounded();
                run_state.user_channels.push(parent_sender);

                // Users are numbered from 1 as they're human-visible in the logs.
                let thread_number = self.metrics.users + 1;
                let thread_user = SwarmUser::new(
                    thread_number,
                    self.started.unwrap_or_else(time::Instant::now),
                    &self.configuration,
                    run_state.client.clone(),
                    run_state.catalog.clone(),
                    MetricsRecorder::new(run_state.all_users_metrics_tx.clone()),
                );

                let user = tokio::spawn(user::user_main(thread_user, thread_receiver));
                run_state.users.push(user);
                self.metrics.users += 1;
            }
        } else {
            // If displaying running metrics, be sure we wake up often enough to
            // display them at the configured rate.
            let running_metrics = self.configuration.running_metrics.unwrap_or(0);

            // Never sleep longer than the parent loop interval, so stop conditions are
            // noticed while ramping up.
            let mut sleep_delay = run_state.spawn_user_in_ms.min(500);
            if running_metrics > 0 && running_metrics * 1_000 < sleep_delay {
                sleep_delay = running_metrics * 1_000;
            }
            let sleep_duration = tokio::time::Duration::from_millis(sleep_delay as u64);
            debug!("sleeping {:?}...", sleep_duration);
            run_state.drift_timer =
                util::sleep_minus_drift(sleep_duration, run_state.drift_timer).await;
        }

        // If enough users have been launched, move onto the next attack phase.
        if self.metrics.users >= total_users {
            info!("launched {} users...", self.metrics.users);
            self.set_attack_phase(run_state, AttackPhase::Running);
        }

        Ok(())
    }

    // Let the load test run, waking up twice per second.
    async fn monitor_attack(&mut self, run_state: &mut SwarmAttackRunState) {
        run_state.drift_timer =
            util::sleep_minus_drift(time::Duration::from_millis(500), run_state.drift_timer)
                .await;
    }

    /// Why the load test should stop now, if it should.
    fn stop_reason(&self) -> Option<String> {
        if CANCELED.load(Ordering::SeqCst) {
            return Some("canceled".to_string());
        }

        if let Some(started) = self.started {
            if self.run_time > 0 && util::timer_expired(started, self.run_time) {
                return Some(format!("run time of {} seconds elapsed", self.run_time));
            }
        }

        if let Some(request_budget) = self.configuration.request_budget {
            if self.metrics.task_requests >= request_budget {
                return Some(format!("request budget of {} reached", request_budget));
            }
        }

        if self.auth_abort_exceeded() {
            return Some(format!(
                "{} of {} sessions failed to authenticate",
                self.metrics.sessions.aborted,
                self.metrics.sessions.finished()
            ));
        }

        None
    }

    /// Whether enough sessions aborted that the remaining load is meaningless.
    fn auth_abort_exceeded(&self) -> bool {
        if self.configuration.no_auth_abort {
            return false;
        }

        let sessions = &self.metrics.sessions;
        let finished = sessions.finished();
        let sample = self.configuration.users().clamp(1, AUTH_ABORT_SAMPLE);
        if finished < sample {
            return false;
        }

        let threshold = self.configuration.auth_abort_threshold();
        sessions.aborted as f32 * 100.0 > threshold * finished as f32
    }

    // Tell every user to exit, wait for them, then drain everything they sent.
    async fn stop_running_users(
        &mut self,
        run_state: &mut SwarmAttackRunState,
    ) -> Result<(), SwarmError> {
        info!("stopping after {} seconds...", self.metrics.duration);
        for (index, send_to_user) in run_state.user_channels.iter().enumerate() {
            match send_to_user.send(SwarmUserCommand::Exit) {
                Ok(_) => {
                    debug!("telling user {} to exit", index);
                }
                Err(e) => {
                    info!("failed to tell user {} to exit: {}", index, e);
                }
            }
        }
        info!("waiting for users to exit");

        // Take the users vector out of the run state so it can be consumed by
        // futures::future::join_all().
        let users = std::mem::take(&mut run_state.users);
        for result in futures::future::join_all(users).await {
            if let Err(e) = result {
                warn!("user exited with an error: {}", e);
            }
        }
        debug!("all users exited");

        // Collect every metric the users sent, this also feeds the request logger.
        let _received_message = self.receive_metrics(run_state, true).await?;

        // If the logger task is enabled, tell it to flush and exit.
        if let Some(logger_tx) = run_state.all_users_logger_tx.take() {
            if let Err(e) = logger_tx.send(None) {
                warn!("unexpected error telling logger task to exit: {}", e);
            }
        }
        if let Some(logger) = run_state.logger_handle.take() {
            if let Err(e) = logger.await? {
                warn!("request logger failed: {}", e);
            }
        }

        Ok(())
    }

    // Final metrics and reports.
    async fn stop_attack(&mut self) -> Result<(), SwarmError> {
        self.update_duration();
        self.metrics.record_history(self.metrics.duration);

        // Percentiles and errors are only displayed when the load test is finished.
        self.metrics.final_metrics = true;

        self.write_reports().await
    }

    // The parent loop runs until the swarm shuts down. It enters in AttackPhase::Idle
    // and exits in AttackPhase::Shutdown.
    async fn start_attack(mut self, catalog: TaskCatalog) -> Result<SwarmAttack, SwarmError> {
        trace!("start_attack");

        let mut run_state = self.initialize_attack(catalog).await?;

        loop {
            match self.attack_phase {
                AttackPhase::Idle => {
                    self.reset_run_state(&mut run_state).await?;
                    self.set_attack_phase(&mut run_state, AttackPhase::Starting);
                }
                AttackPhase::Starting => {
                    self.update_duration();
                    self.spawn_attack(&mut run_state).await?;
                }
                AttackPhase::Running => {
                    self.update_duration();
                    self.monitor_attack(&mut run_state).await;
                }
                AttackPhase::Stopping => {
                    self.update_duration();
                    self.stop_running_users(&mut run_state).await?;
                    self.stop_attack().await?;
                    self.set_attack_phase(&mut run_state, AttackPhase::Shutdown);
                }
                AttackPhase::Shutdown => break,
            }

            if self.attack_phase == AttackPhase::Shutdown {
                continue;
            }

            // Regularly synchronize metrics.
            self.sync_metrics(&mut run_state, false).await?;

            if matches!(
                self.attack_phase,
                AttackPhase::Starting | AttackPhase::Running
            ) {
                if let Some(reason) = self.stop_reason() {
                    info!("stopping load test: {}", reason);
                    self.metrics.stop_reason = Some(reason);
                    self.set_attack_phase(&mut run_state, AttackPhase::Stopping);
                }
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metrics::SessionMetrics;

    fn attack(args: &[&str]) -> SwarmAttack {
        let configuration = SwarmConfiguration::parse_args_default(args).unwrap();
        SwarmAttack::initialize_with_config(configuration).unwrap()
    }

    fn sessions(active: usize, aborted: usize) -> SessionMetrics {
        SessionMetrics {
            active,
            aborted,
            ..Default::default()
        }
    }

    #[test]
    fn auth_abort_waits_for_a_sample() {
        let mut swarm = attack(&["--host", "http://127.0.0.1", "-u", "20"]);
        // Nine of nine failed, but ten must finish first.
        swarm.metrics.sessions = sessions(0, 9);
        assert!(!swarm.auth_abort_exceeded());

        swarm.metrics.sessions = sessions(0, 10);
        assert!(swarm.auth_abort_exceeded());

        // Exactly 90% doesn't exceed the default threshold.
        swarm.metrics.sessions = sessions(1, 9);
        assert!(!swarm.auth_abort_exceeded());
    }

    #[test]
    fn auth_abort_small_swarm() {
        let mut swarm = attack(&["--host", "http://127.0.0.1", "-u", "1"]);
        swarm.metrics.sessions = sessions(0, 1);
        assert!(swarm.auth_abort_exceeded());

        let mut swarm = attack(&["--host", "http://127.0.0.1", "-u", "1", "--no-auth-abort"]);
        swarm.metrics.sessions = sessions(0, 1);
        assert!(!swarm.auth_abort_exceeded());
    }

    #[test]
    fn request_budget_stops() {
        let mut swarm = attack(&["--host", "http://127.0.0.1", "--request-budget", "5"]);
        assert!(swarm.stop_reason().is_none());
        swarm.metrics.task_requests = 5;
        assert_eq!(
            swarm.stop_reason().as_deref(),
            Some("request budget of 5 reached")
        );
    }

    #[test]
    fn error_display() {
        let error = SwarmError::NoTasks {
            detail: "all weights are 0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "SwarmError: no tasks enabled: all weights are 0"
        );
    }
}
