//! Functions and structures related to configuring a load test.
//!
//! The swarm can be configured at run time by passing in the options and flags defined by
//! the [`SwarmConfiguration`] structure.
//!
//! It can be configured programmatically with [`SwarmDefaultType::set_default`]. Run-time
//! options always win over programmatic defaults, which win over built-in defaults.

use gumdrop::Options;
use simplelog::*;
use std::fmt;
use std::path::PathBuf;

use crate::catalog::TaskWeights;
use crate::client::{NoteRoutes, DEFAULT_NOTES_PATH, DEFAULT_SIGNUP_PATH, DEFAULT_TOKEN_PATH};
use crate::logger::SwarmLogFormat;
use crate::pool::{DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER};
use crate::scheduler::{DEFAULT_MAX_THINK_TIME, DEFAULT_MIN_THINK_TIME};
use crate::session::{
    DEFAULT_EMAIL_DOMAIN, DEFAULT_PASSWORD, DEFAULT_SEED_RECORDS, DEFAULT_USERNAME_PREFIX,
};
use crate::util;
use crate::{SwarmAttack, SwarmError};

/// Default percentage of failed logins that cancels the whole run.
pub const DEFAULT_AUTH_ABORT_THRESHOLD: f32 = 90.0;

/// Runtime options available when launching a load test.
///
/// Help is generated for all of these options by passing `-h`. Most of them can also be
/// given a programmatic default with [`SwarmDefaultType::set_default`].
#[derive(Options, Debug, Clone, Default)]
#[options(
    help = r#"notesync-swarm simulates many concurrent users of a note-taking API, measuring
latency, throughput and error rate under load.

The following runtime options are available:"#
)]
pub struct SwarmConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V")]
    pub version: bool,
    /// Lists all tasks and exits
    // Add a blank line after this option
    #[options(short = "l", help = "Lists all tasks and exits\n")]
    pub list: bool,

    /// Defines host to load test (ie http://10.21.32.33)
    #[options(short = "H")]
    pub host: String,
    /// Sets concurrent users (default: number of CPUs)
    #[options(short = "u")]
    pub users: Option<usize>,
    /// Sets per-second user hatch rate (default: 1)
    #[options(short = "r", meta = "RATE")]
    pub hatch_rate: Option<String>,
    /// Stops load test after (30s, 20m, 3h, 1h30m, etc)
    #[options(short = "t", meta = "TIME")]
    pub run_time: String,
    /// Stops load test after this many task requests
    #[options(no_short, meta = "COUNT")]
    pub request_budget: Option<usize>,
    /// Enables log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q", help = "Decreases verbosity (-q, -qq, etc)")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(
        count,
        short = "v",
        // Add a blank line and then a 'Metrics:' header after this option
        help = "Increases verbosity (-v, -vv, etc)\n\nMetrics:"
    )]
    pub verbose: u8,

    /// How often to optionally print running metrics
    #[options(no_short, meta = "TIME")]
    pub running_metrics: Option<usize>,
    /// Doesn't display metrics at end of load test
    #[options(no_short)]
    pub no_print_metrics: bool,
    /// Doesn't display an error summary
    #[options(no_short)]
    pub no_error_summary: bool,
    /// Writes NAME_stats.csv, NAME_stats_history.csv and NAME_failures.csv
    #[options(no_short, meta = "NAME")]
    pub report_prefix: String,
    /// Writes a json summary of all metrics
    #[options(no_short, meta = "NAME")]
    pub report_json: String,
    /// Sets request log file name
    #[options(short = "R", meta = "NAME")]
    pub request_log: String,
    /// Sets request log format (csv, json, raw)
    #[options(
        no_short,
        meta = "FORMAT",
        help = "Sets request log format (csv, json, raw)\n\nApi:"
    )]
    pub request_format: Option<SwarmLogFormat>,

    /// Defines the identity service host (default: --host)
    #[options(no_short, meta = "HOST")]
    pub auth_host: Option<String>,
    /// Sets the notes collection path (default: /api/notes)
    #[options(no_short, meta = "PATH")]
    pub notes_path: Option<String>,
    /// Sets the sign up path (default: /auth/v1/signup)
    #[options(no_short, meta = "PATH")]
    pub signup_path: Option<String>,
    /// Sets the token exchange path (default: /auth/v1/token?grant_type=password)
    #[options(no_short, meta = "PATH")]
    pub token_path: Option<String>,
    /// Sets how long to wait for a response, in seconds
    #[options(
        no_short,
        meta = "VALUE",
        help = "Sets how long to wait for a response, in seconds\n\nUsers:"
    )]
    pub timeout: Option<String>,

    /// Logs every user into one shared account
    #[options(no_short, meta = "NAME")]
    pub username: Option<String>,
    /// Sets the password of every user
    #[options(no_short, meta = "PASSWORD")]
    pub password: Option<String>,
    /// Sets the prefix of generated usernames (default: swarm)
    #[options(no_short, meta = "PREFIX")]
    pub username_prefix: Option<String>,
    /// Sets the email domain of generated users (default: example.com)
    #[options(no_short, meta = "DOMAIN")]
    pub email_domain: Option<String>,
    /// Sets how many notes each user creates before starting tasks (default: 10)
    #[options(no_short, meta = "COUNT")]
    pub seed_records: Option<usize>,
    /// Sets how many notes a user needs before updating (default: 5)
    #[options(no_short, meta = "COUNT")]
    pub low_water: Option<usize>,
    /// Sets how many notes a user must exceed before deleting (default: 15)
    #[options(no_short, meta = "COUNT")]
    pub high_water: Option<usize>,
    /// Sets task weights (ie list-all=3,list-own=2,create=4,update=2,delete=1)
    #[options(no_short, meta = "WEIGHTS")]
    pub weights: Option<TaskWeights>,
    /// Sets minimum milliseconds between tasks (default: 1000)
    #[options(no_short, meta = "MS")]
    pub min_think_time: Option<usize>,
    /// Sets maximum milliseconds between tasks (default: 2000)
    #[options(no_short, meta = "MS")]
    pub max_think_time: Option<usize>,
    /// Cancels the run when more than this percent of logins fail (default: 90)
    #[options(no_short, meta = "PERCENT")]
    pub auth_abort_threshold: Option<f32>,
    /// Never cancels the run because of failed logins
    #[options(no_short)]
    pub no_auth_abort: bool,
}

/// Optionally defines a subset of active run-time options as programmatic defaults.
#[derive(Clone, Debug, Default)]
pub(crate) struct SwarmDefaults {
    pub host: Option<String>,
    pub users: Option<usize>,
    pub hatch_rate: Option<String>,
    pub run_time: Option<usize>,
    pub request_budget: Option<usize>,
    pub log_file: Option<String>,
    pub log_level: Option<u8>,
    pub quiet: Option<u8>,
    pub verbose: Option<u8>,
    pub running_metrics: Option<usize>,
    pub no_print_metrics: Option<bool>,
    pub no_error_summary: Option<bool>,
    pub report_prefix: Option<String>,
    pub report_json: Option<String>,
    pub request_log: Option<String>,
    pub request_format: Option<SwarmLogFormat>,
    pub auth_host: Option<String>,
    pub notes_path: Option<String>,
    pub signup_path: Option<String>,
    pub token_path: Option<String>,
    pub timeout: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub username_prefix: Option<String>,
    pub email_domain: Option<String>,
    pub seed_records: Option<usize>,
    pub low_water: Option<usize>,
    pub high_water: Option<usize>,
    pub weights: Option<TaskWeights>,
    pub min_think_time: Option<usize>,
    pub max_think_time: Option<usize>,
    pub auth_abort_threshold: Option<f32>,
    pub no_auth_abort: Option<bool>,
}

/// Enumeration of all options that can be given a programmatic default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwarmDefault {
    /// Host to load test.
    Host,
    /// Number of users to simulate.
    Users,
    /// Number of users to start per second.
    HatchRate,
    /// Number of seconds the load test runs.
    RunTime,
    /// Number of task requests after which the load test stops.
    RequestBudget,
    /// Log file name.
    LogFile,
    /// Log file level.
    LogLevel,
    /// Stdout quietness.
    Quiet,
    /// Stdout verbosity.
    Verbose,
    /// How often to print running metrics.
    RunningMetrics,
    /// Don't print metrics at the end.
    NoPrintMetrics,
    /// Don't collect an error summary.
    NoErrorSummary,
    /// Prefix of the csv report files.
    ReportPrefix,
    /// Name of the json report.
    ReportJson,
    /// Request log file name.
    RequestLog,
    /// Request log format.
    RequestFormat,
    /// Identity service host.
    AuthHost,
    /// Notes collection path.
    NotesPath,
    /// Sign up path.
    SignupPath,
    /// Token exchange path.
    TokenPath,
    /// Per request timeout in seconds.
    Timeout,
    /// Shared account used by every user.
    Username,
    /// Password of every user.
    Password,
    /// Prefix of generated usernames.
    UsernamePrefix,
    /// Email domain of generated users.
    EmailDomain,
    /// Notes created before starting tasks.
    SeedRecords,
    /// Pool size needed before updates.
    LowWater,
    /// Pool size to exceed before deletes.
    HighWater,
    /// Task weights.
    Weights,
    /// Minimum think time in milliseconds.
    MinThinkTime,
    /// Maximum think time in milliseconds.
    MaxThinkTime,
    /// Percent of failed logins that cancels the run.
    AuthAbortThreshold,
    /// Never cancel the run because of failed logins.
    NoAuthAbort,
}

impl SwarmDefault {
    fn expected_type(&self) -> &'static str {
        match self {
            SwarmDefault::Host
            | SwarmDefault::HatchRate
            | SwarmDefault::LogFile
            | SwarmDefault::ReportPrefix
            | SwarmDefault::ReportJson
            | SwarmDefault::RequestLog
            | SwarmDefault::AuthHost
            | SwarmDefault::NotesPath
            | SwarmDefault::SignupPath
            | SwarmDefault::TokenPath
            | SwarmDefault::Timeout
            | SwarmDefault::Username
            | SwarmDefault::Password
            | SwarmDefault::UsernamePrefix
            | SwarmDefault::EmailDomain => "&str",
            SwarmDefault::Users
            | SwarmDefault::RunTime
            | SwarmDefault::RequestBudget
            | SwarmDefault::LogLevel
            | SwarmDefault::Quiet
            | SwarmDefault::Verbose
            | SwarmDefault::RunningMetrics
            | SwarmDefault::SeedRecords
            | SwarmDefault::LowWater
            | SwarmDefault::HighWater
            | SwarmDefault::MinThinkTime
            | SwarmDefault::MaxThinkTime => "usize",
            SwarmDefault::NoPrintMetrics
            | SwarmDefault::NoErrorSummary
            | SwarmDefault::NoAuthAbort => "bool",
            SwarmDefault::RequestFormat => "SwarmLogFormat",
            SwarmDefault::Weights => "TaskWeights",
            SwarmDefault::AuthAbortThreshold => "f32",
        }
    }

    fn invalid_type<T: fmt::Display>(&self, value: T, received: &str) -> SwarmError {
        SwarmError::InvalidOption {
            option: format!("SwarmDefault::{:?}", self),
            value: value.to_string(),
            detail: format!(
                "set_default(SwarmDefault::{:?}, {}) expected {} value, received {}",
                self,
                value,
                self.expected_type(),
                received
            ),
        }
    }
}

/// Most run-time options can be programmatically configured with custom defaults.
///
/// # Example
/// ```rust
/// use notesync_swarm::prelude::*;
///
/// fn main() -> Result<(), SwarmError> {
///     SwarmAttack::initialize()?
///         .set_default(SwarmDefault::Host, "http://127.0.0.1:5000")?
///         .set_default(SwarmDefault::Users, 20)?
///         .set_default(SwarmDefault::Weights, "delete=0")?
///         .set_default(SwarmDefault::NoAuthAbort, true)?;
///
///     Ok(())
/// }
/// ```
pub trait SwarmDefaultType<T> {
    fn set_default(self, key: SwarmDefault, value: T) -> Result<Box<Self>, SwarmError>;
}

impl SwarmDefaultType<&str> for SwarmAttack {
    fn set_default(mut self, key: SwarmDefault, value: &str) -> Result<Box<Self>, SwarmError> {
        let value_string = Some(value.to_string());
        match key {
            SwarmDefault::Host => {
                self.defaults.host = if value.is_empty() { None } else { value_string }
            }
            SwarmDefault::HatchRate => self.defaults.hatch_rate = value_string,
            SwarmDefault::LogFile => self.defaults.log_file = value_string,
            SwarmDefault::ReportPrefix => self.defaults.report_prefix = value_string,
            SwarmDefault::ReportJson => self.defaults.report_json = value_string,
            SwarmDefault::RequestLog => self.defaults.request_log = value_string,
            SwarmDefault::AuthHost => self.defaults.auth_host = value_string,
            SwarmDefault::NotesPath => self.defaults.notes_path = value_string,
            SwarmDefault::SignupPath => self.defaults.signup_path = value_string,
            SwarmDefault::TokenPath => self.defaults.token_path = value_string,
            SwarmDefault::Timeout => self.defaults.timeout = value_string,
            SwarmDefault::Username => self.defaults.username = value_string,
            SwarmDefault::Password => self.defaults.password = value_string,
            SwarmDefault::UsernamePrefix => self.defaults.username_prefix = value_string,
            SwarmDefault::EmailDomain => self.defaults.email_domain = value_string,
            // Weights are accepted as a string too.
            SwarmDefault::Weights => self.defaults.weights = Some(value.parse::<TaskWeights>()?),
            _ => return Err(key.invalid_type(value, "&str")),
        }
        Ok(Box::new(self))
    }
}

impl SwarmDefaultType<usize> for SwarmAttack {
    fn set_default(mut self, key: SwarmDefault, value: usize) -> Result<Box<Self>, SwarmError> {
        match key {
            SwarmDefault::Users => self.defaults.users = Some(value),
            SwarmDefault::RunTime => self.defaults.run_time = Some(value),
            SwarmDefault::RequestBudget => self.defaults.request_budget = Some(value),
            SwarmDefault::LogLevel => self.defaults.log_level = Some(value as u8),
            SwarmDefault::Quiet => self.defaults.quiet = Some(value as u8),
            SwarmDefault::Verbose => self.defaults.verbose = Some(value as u8),
            SwarmDefault::RunningMetrics => self.defaults.running_metrics = Some(value),
            SwarmDefault::SeedRecords => self.defaults.seed_records = Some(value),
            SwarmDefault::LowWater => self.defaults.low_water = Some(value),
            SwarmDefault::HighWater => self.defaults.high_water = Some(value),
            SwarmDefault::MinThinkTime => self.defaults.min_think_time = Some(value),
            SwarmDefault::MaxThinkTime => self.defaults.max_think_time = Some(value),
            // A whole percent is fine.
            SwarmDefault::AuthAbortThreshold => {
                self.defaults.auth_abort_threshold = Some(value as f32)
            }
            _ => return Err(key.invalid_type(value, "usize")),
        }
        Ok(Box::new(self))
    }
}

impl SwarmDefaultType<f32> for SwarmAttack {
    fn set_default(mut self, key: SwarmDefault, value: f32) -> Result<Box<Self>, SwarmError> {
        match key {
            SwarmDefault::AuthAbortThreshold => self.defaults.auth_abort_threshold = Some(value),
            SwarmDefault::HatchRate => self.defaults.hatch_rate = Some(value.to_string()),
            _ => return Err(key.invalid_type(value, "f32")),
        }
        Ok(Box::new(self))
    }
}

impl SwarmDefaultType<bool> for SwarmAttack {
    fn set_default(mut self, key: SwarmDefault, value: bool) -> Result<Box<Self>, SwarmError> {
        match key {
            SwarmDefault::NoPrintMetrics => self.defaults.no_print_metrics = Some(value),
            SwarmDefault::NoErrorSummary => self.defaults.no_error_summary = Some(value),
            SwarmDefault::NoAuthAbort => self.defaults.no_auth_abort = Some(value),
            _ => return Err(key.invalid_type(value, "bool")),
        }
        Ok(Box::new(self))
    }
}

impl SwarmDefaultType<SwarmLogFormat> for SwarmAttack {
    fn set_default(
        mut self,
        key: SwarmDefault,
        value: SwarmLogFormat,
    ) -> Result<Box<Self>, SwarmError> {
        match key {
            SwarmDefault::RequestFormat => self.defaults.request_format = Some(value),
            _ => return Err(key.invalid_type(value, "SwarmLogFormat")),
        }
        Ok(Box::new(self))
    }
}

impl SwarmDefaultType<TaskWeights> for SwarmAttack {
    fn set_default(
        mut self,
        key: SwarmDefault,
        value: TaskWeights,
    ) -> Result<Box<Self>, SwarmError> {
        match key {
            SwarmDefault::Weights => self.defaults.weights = Some(value),
            _ => return Err(key.invalid_type(value, "TaskWeights")),
        }
        Ok(Box::new(self))
    }
}

/// Used internally to configure [`SwarmConfiguration`] values based on precedence rules.
#[derive(Debug, Clone)]
pub(crate) struct SwarmValue<'a, T> {
    /// The optional value to set.
    pub(crate) value: Option<T>,
    /// Skip this value if true.
    pub(crate) filter: bool,
    /// An optional INFO level log message.
    pub(crate) message: &'a str,
}

pub(crate) trait SwarmConfigure<T> {
    /// Return the first value that isn't filtered.
    fn get_value(&self, values: Vec<SwarmValue<T>>) -> Option<T>;
}

impl<T: fmt::Display> SwarmConfigure<T> for SwarmConfiguration {
    fn get_value(&self, values: Vec<SwarmValue<T>>) -> Option<T> {
        for value in values {
            if let Some(v) = value.value {
                if value.filter {
                    continue;
                }
                if !value.message.is_empty() {
                    info!("{} = {}", value.message, v)
                }
                return Some(v);
            }
        }
        None
    }
}

impl SwarmConfiguration {
    /// Implement precedence rules for all [`SwarmConfiguration`] values.
    pub(crate) fn configure(&mut self, defaults: &SwarmDefaults) {
        // Configure `quiet`.
        self.quiet = self
            .get_value(vec![
                // Use --quiet if set.
                SwarmValue {
                    value: Some(self.quiet),
                    filter: self.quiet == 0,
                    message: "",
                },
                // Otherwise use SwarmDefault if set.
                SwarmValue {
                    value: defaults.quiet,
                    filter: defaults.quiet.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);

        // Configure `verbose`.
        self.verbose = self
            .get_value(vec![
                SwarmValue {
                    value: Some(self.verbose),
                    filter: self.verbose == 0,
                    message: "",
                },
                SwarmValue {
                    value: defaults.verbose,
                    filter: defaults.verbose.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);

        // Configure `log_level`.
        self.log_level = self
            .get_value(vec![
                SwarmValue {
                    value: Some(self.log_level),
                    filter: self.log_level == 0,
                    message: "",
                },
                SwarmValue {
                    value: defaults.log_level,
                    filter: defaults.log_level.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);

        // Configure `log_file`.
        self.log_file = self
            .get_value(vec![
                SwarmValue {
                    value: Some(self.log_file.clone()),
                    filter: self.log_file.is_empty(),
                    message: "",
                },
                SwarmValue {
                    value: defaults.log_file.clone(),
                    filter: defaults.log_file.is_none(),
                    message: "",
                },
            ])
            .unwrap_or_default();

        // Everything after this point can be logged.
        self.initialize_logger();

        // Configure `host`.
        self.host = self
            .get_value(vec![
                SwarmValue {
                    value: Some(self.host.clone()),
                    filter: self.host.is_empty(),
                    message: "host",
                },
                SwarmValue {
                    value: defaults.host.clone(),
                    filter: defaults.host.is_none(),
                    message: "host",
                },
            ])
            .unwrap_or_default();

        // Configure `users`, defaulting to the number of CPUs.
        let default_users = match std::thread::available_parallelism() {
            Ok(cpus) => Some(cpus.get()),
            Err(e) => {
                info!("failed to detect available_parallelism: {}", e);
                Some(1)
            }
        };
        self.users = self.get_value(vec![
            SwarmValue {
                value: self.users,
                filter: false,
                message: "users",
            },
            SwarmValue {
                value: defaults.users,
                filter: defaults.users.is_none(),
                message: "users",
            },
            SwarmValue {
                value: default_users,
                filter: false,
                message: "users defaulted to number of CPUs",
            },
        ]);

        // Configure `hatch_rate`.
        self.hatch_rate = self.get_value(vec![
            SwarmValue {
                value: self.hatch_rate.clone(),
                filter: self.hatch_rate.is_none(),
                message: "hatch_rate",
            },
            SwarmValue {
                value: defaults.hatch_rate.clone(),
                filter: defaults.hatch_rate.is_none(),
                message: "hatch_rate",
            },
        ]);

        // Configure `run_time`, stored as seconds.
        self.run_time = self
            .get_value(vec![
                SwarmValue {
                    value: Some(util::parse_timespan(&self.run_time)),
                    filter: util::parse_timespan(&self.run_time) == 0,
                    message: "run_time",
                },
                SwarmValue {
                    value: defaults.run_time,
                    filter: defaults.run_time.is_none(),
                    message: "run_time",
                },
            ])
            .map_or_else(|| "0".to_string(), |v| v.to_string());

        // Configure `request_budget`.
        self.request_budget = self.get_value(vec![
            SwarmValue {
                value: self.request_budget,
                filter: self.request_budget.is_none(),
                message: "request_budget",
            },
            SwarmValue {
                value: defaults.request_budget,
                filter: defaults.request_budget.is_none(),
                message: "request_budget",
            },
        ]);

        // Configure `running_metrics`.
        self.running_metrics = self.get_value(vec![
            SwarmValue {
                value: self.running_metrics,
                filter: self.running_metrics.is_none(),
                message: "running_metrics",
            },
            SwarmValue {
                value: defaults.running_metrics,
                filter: defaults.running_metrics.is_none(),
                message: "running_metrics",
            },
        ]);

        // Configure boolean flags: a flag set on the command line always wins.
        self.no_print_metrics = self.configure_flag(
            self.no_print_metrics,
            defaults.no_print_metrics,
            "no_print_metrics",
        );
        self.no_error_summary = self.configure_flag(
            self.no_error_summary,
            defaults.no_error_summary,
            "no_error_summary",
        );
        self.no_auth_abort =
            self.configure_flag(self.no_auth_abort, defaults.no_auth_abort, "no_auth_abort");

        // Configure report and log file names.
        self.report_prefix =
            self.configure_name(&self.report_prefix, &defaults.report_prefix, "report_prefix");
        self.report_json =
            self.configure_name(&self.report_json, &defaults.report_json, "report_json");
        self.request_log =
            self.configure_name(&self.request_log, &defaults.request_log, "request_log");

        // Configure `request_format`.
        self.request_format = self.get_value(vec![
            SwarmValue {
                value: self.request_format,
                filter: self.request_format.is_none(),
                message: "request_format",
            },
            SwarmValue {
                value: defaults.request_format,
                filter: defaults.request_format.is_none(),
                message: "request_format",
            },
            SwarmValue {
                value: Some(SwarmLogFormat::Json),
                filter: self.request_log.is_empty(),
                message: "request_format",
            },
        ]);

        // Configure api and identity settings.
        self.auth_host = self.configure_option(&self.auth_host, &defaults.auth_host, "auth_host");
        self.notes_path =
            self.configure_option(&self.notes_path, &defaults.notes_path, "notes_path");
        self.signup_path =
            self.configure_option(&self.signup_path, &defaults.signup_path, "signup_path");
        self.token_path =
            self.configure_option(&self.token_path, &defaults.token_path, "token_path");
        self.timeout = self.configure_option(&self.timeout, &defaults.timeout, "timeout");
        self.username = self.configure_option(&self.username, &defaults.username, "username");
        // Never log the password.
        self.password = self.configure_option(&self.password, &defaults.password, "");
        self.username_prefix = self.configure_option(
            &self.username_prefix,
            &defaults.username_prefix,
            "username_prefix",
        );
        self.email_domain =
            self.configure_option(&self.email_domain, &defaults.email_domain, "email_domain");

        // Configure workload settings.
        self.seed_records =
            self.configure_option(&self.seed_records, &defaults.seed_records, "seed_records");
        self.low_water = self.configure_option(&self.low_water, &defaults.low_water, "low_water");
        self.high_water =
            self.configure_option(&self.high_water, &defaults.high_water, "high_water");
        self.weights = self.configure_option(&self.weights, &defaults.weights, "weights");
        self.min_think_time = self.configure_option(
            &self.min_think_time,
            &defaults.min_think_time,
            "min_think_time",
        );
        self.max_think_time = self.configure_option(
            &self.max_think_time,
            &defaults.max_think_time,
            "max_think_time",
        );
        self.auth_abort_threshold = self.configure_option(
            &self.auth_abort_threshold,
            &defaults.auth_abort_threshold,
            "auth_abort_threshold",
        );
    }

    fn configure_flag(&self, flag: bool, default: Option<bool>, message: &str) -> bool {
        self.get_value(vec![
            SwarmValue {
                value: Some(flag),
                filter: !flag,
                message,
            },
            SwarmValue {
                value: default,
                filter: default.is_none(),
                message,
            },
        ])
        .unwrap_or(false)
    }

    fn configure_name(&self, name: &str, default: &Option<String>, message: &str) -> String {
        self.get_value(vec![
            SwarmValue {
                value: Some(name.to_string()),
                filter: name.is_empty(),
                message,
            },
            SwarmValue {
                value: default.clone(),
                filter: default.is_none(),
                message,
            },
        ])
        .unwrap_or_default()
    }

    fn configure_option<T: Clone + fmt::Display>(
        &self,
        value: &Option<T>,
        default: &Option<T>,
        message: &str,
    ) -> Option<T> {
        self.get_value(vec![
            SwarmValue {
                value: value.clone(),
                filter: value.is_none(),
                message,
            },
            SwarmValue {
                value: default.clone(),
                filter: default.is_none(),
                message,
            },
        ])
    }

    /// Validate configured [`SwarmConfiguration`] values.
    pub(crate) fn validate(&self) -> Result<(), SwarmError> {
        // Can't set both --verbose and --quiet.
        if self.verbose > 0 && self.quiet > 0 {
            return Err(SwarmError::InvalidOption {
                option: "`configuration.verbose`".to_string(),
                value: self.verbose.to_string(),
                detail: "`configuration.verbose` can not be set with `configuration.quiet`."
                    .to_string(),
            });
        }

        // A host is required.
        if self.host.is_empty() {
            return Err(SwarmError::InvalidOption {
                option: "`configuration.host`".to_string(),
                value: self.host.clone(),
                detail: "A host must be defined via the --host option or SwarmDefault::Host."
                    .to_string(),
            });
        }
        util::is_valid_host(&self.host)?;
        if let Some(auth_host) = self.auth_host.as_ref() {
            util::is_valid_host(auth_host)?;
        }

        // If set, hatch rate must be a positive number.
        if let Some(hatch_rate) = self.hatch_rate.as_ref() {
            match hatch_rate.parse::<f32>() {
                Ok(rate) if rate > 0.0 => (),
                _ => {
                    return Err(SwarmError::InvalidOption {
                        option: "`configuration.hatch_rate`".to_string(),
                        value: hatch_rate.to_string(),
                        detail: "`configuration.hatch_rate` must be a number greater than 0."
                            .to_string(),
                    })
                }
            }
        }

        // If set, timeout must be a positive number.
        if let Some(timeout) = self.timeout.as_ref() {
            match timeout.parse::<f32>() {
                Ok(seconds) if seconds > 0.0 => (),
                _ => {
                    return Err(SwarmError::InvalidOption {
                        option: "`configuration.timeout`".to_string(),
                        value: timeout.to_string(),
                        detail: "`configuration.timeout` must be greater than 0.".to_string(),
                    })
                }
            }
        }

        if self.users == Some(0) {
            return Err(SwarmError::InvalidOption {
                option: "configuration.users".to_string(),
                value: "0".to_string(),
                detail: "`configuration.users` must be set to at least 1.".to_string(),
            });
        }

        if self.request_budget == Some(0) {
            return Err(SwarmError::InvalidOption {
                option: "configuration.request_budget".to_string(),
                value: "0".to_string(),
                detail: "`configuration.request_budget` must be set to at least 1.".to_string(),
            });
        }

        if self.low_water() > self.high_water() {
            return Err(SwarmError::InvalidOption {
                option: "configuration.low_water".to_string(),
                value: self.low_water().to_string(),
                detail: format!(
                    "`configuration.low_water` can not be larger than `configuration.high_water` ({}).",
                    self.high_water()
                ),
            });
        }

        let (min_wait, max_wait) = self.think_time();
        if min_wait > max_wait {
            return Err(SwarmError::InvalidWaitTime {
                min_wait,
                max_wait,
                detail: "The minimum think time can not be larger than the maximum think time."
                    .to_string(),
            });
        }

        let threshold = self.auth_abort_threshold();
        if !(0.0..=100.0).contains(&threshold) {
            return Err(SwarmError::InvalidOption {
                option: "configuration.auth_abort_threshold".to_string(),
                value: threshold.to_string(),
                detail: "`configuration.auth_abort_threshold` must be between 0 and 100."
                    .to_string(),
            });
        }

        // A request format only makes sense with a request log.
        if self.request_format.is_some() && self.request_log.is_empty() {
            return Err(SwarmError::InvalidOption {
                option: "configuration.request_format".to_string(),
                value: format!("{:?}", self.request_format),
                detail: "`configuration.request_format` can not be set without setting `configuration.request_log`."
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Number of users to launch.
    pub fn users(&self) -> usize {
        self.users.unwrap_or(1)
    }

    /// Seconds to run, 0 runs until canceled.
    pub fn run_time_secs(&self) -> usize {
        util::parse_timespan(&self.run_time)
    }

    /// Per request timeout in milliseconds.
    pub fn timeout_ms(&self) -> Option<usize> {
        util::get_float_from_string(self.timeout.clone())
            .filter(|seconds| *seconds > 0.0)
            .map(|seconds| (seconds * 1_000.0) as usize)
    }

    /// Routes of the notes API and the identity service.
    pub fn routes(&self) -> NoteRoutes {
        NoteRoutes {
            notes: self
                .notes_path
                .clone()
                .unwrap_or_else(|| DEFAULT_NOTES_PATH.to_string()),
            signup: self
                .signup_path
                .clone()
                .unwrap_or_else(|| DEFAULT_SIGNUP_PATH.to_string()),
            token: self
                .token_path
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string()),
        }
    }

    pub fn password(&self) -> String {
        self.password
            .clone()
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_string())
    }

    pub fn username_prefix(&self) -> String {
        self.username_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_USERNAME_PREFIX.to_string())
    }

    pub fn email_domain(&self) -> String {
        self.email_domain
            .clone()
            .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string())
    }

    pub fn seed_records(&self) -> usize {
        self.seed_records.unwrap_or(DEFAULT_SEED_RECORDS)
    }

    pub fn low_water(&self) -> usize {
        self.low_water.unwrap_or(DEFAULT_LOW_WATER)
    }

    pub fn high_water(&self) -> usize {
        self.high_water.unwrap_or(DEFAULT_HIGH_WATER)
    }

    pub fn weights(&self) -> TaskWeights {
        self.weights.clone().unwrap_or_default()
    }

    /// Minimum and maximum milliseconds between tasks.
    pub fn think_time(&self) -> (usize, usize) {
        (
            self.min_think_time.unwrap_or(DEFAULT_MIN_THINK_TIME),
            self.max_think_time.unwrap_or(DEFAULT_MAX_THINK_TIME),
        )
    }

    pub fn auth_abort_threshold(&self) -> f32 {
        self.auth_abort_threshold
            .unwrap_or(DEFAULT_AUTH_ABORT_THRESHOLD)
    }

    /// Configure the stdout logger and the optional log file.
    pub(crate) fn initialize_logger(&self) {
        // Configure stdout level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                _ => LevelFilter::Warn,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        } else {
            None
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> =
            vec![SimpleLogger::new(debug_level, Config::default())];
        if let Some(log_to_file) = log_file.as_ref() {
            match std::fs::File::create(log_to_file) {
                Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
                Err(e) => eprintln!("failed to create log file {}: {}", log_to_file.display(), e),
            }
        }

        if let Err(e) = CombinedLogger::init(loggers) {
            info!("failed to initialize CombinedLogger: {}", e);
        }
        if let Some(log_to_file) = log_file {
            info!("Writing to log file: {}", log_to_file.display());
        }

        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use gumdrop::Options;

    fn configured(args: &[&str], defaults: &SwarmDefaults) -> SwarmConfiguration {
        let mut configuration = SwarmConfiguration::parse_args_default(args).unwrap();
        configuration.configure(defaults);
        configuration
    }

    #[test]
    fn parse_cli() {
        let configuration = SwarmConfiguration::parse_args_default(&[
            "--host",
            "http://127.0.0.1:5000",
            "-u",
            "25",
            "-r",
            "2.5",
            "-t",
            "1m30s",
            "--weights",
            "delete=0,create=6",
            "--request-format",
            "csv",
            "--auth-abort-threshold",
            "50",
            "--no-auth-abort",
        ])
        .unwrap();
        assert_eq!(configuration.host, "http://127.0.0.1:5000");
        assert_eq!(configuration.users, Some(25));
        assert_eq!(configuration.hatch_rate.as_deref(), Some("2.5"));
        assert_eq!(configuration.run_time_secs(), 90);
        assert_eq!(configuration.weights().delete, 0);
        assert_eq!(configuration.weights().create, 6);
        assert_eq!(configuration.request_format, Some(SwarmLogFormat::Csv));
        assert_eq!(configuration.auth_abort_threshold(), 50.0);
        assert!(configuration.no_auth_abort);

        assert!(SwarmConfiguration::parse_args_default(&["--weights", "archive=1"]).is_err());
        assert!(SwarmConfiguration::parse_args_default(&["--request-format", "xml"]).is_err());
    }

    #[test]
    fn built_in_defaults() {
        let configuration = configured(&["--host", "http://127.0.0.1"], &SwarmDefaults::default());
        assert!(configuration.users.is_some());
        assert_eq!(configuration.low_water(), 5);
        assert_eq!(configuration.high_water(), 15);
        assert_eq!(configuration.seed_records(), 10);
        assert_eq!(configuration.think_time(), (1_000, 2_000));
        assert_eq!(configuration.weights(), TaskWeights::default());
        assert_eq!(configuration.auth_abort_threshold(), 90.0);
        assert_eq!(configuration.routes(), NoteRoutes::default());
        assert_eq!(configuration.timeout_ms(), None);
        assert_eq!(configuration.request_format, None);
        assert!(configuration.validate().is_ok());
    }

    #[test]
    fn cli_wins_over_defaults() {
        let defaults = SwarmDefaults {
            host: Some("http://default.test".to_string()),
            users: Some(7),
            seed_records: Some(3),
            low_water: Some(2),
            no_print_metrics: Some(true),
            request_log: Some("requests.log".to_string()),
            ..Default::default()
        };
        let configuration = configured(&["-u", "3", "--seed-records", "0"], &defaults);
        assert_eq!(configuration.host, "http://default.test");
        assert_eq!(configuration.users, Some(3));
        assert_eq!(configuration.seed_records(), 0);
        assert_eq!(configuration.low_water(), 2);
        assert!(configuration.no_print_metrics);
        assert_eq!(configuration.request_log, "requests.log");
        // A request log defaults to json.
        assert_eq!(configuration.request_format, Some(SwarmLogFormat::Json));
    }

    #[test]
    fn invalid_configurations() {
        let defaults = SwarmDefaults::default();

        let no_host = configured(&[], &defaults);
        assert!(no_host.validate().is_err());

        let bad_host = configured(&["--host", "example.com"], &defaults);
        assert!(matches!(
            bad_host.validate(),
            Err(SwarmError::InvalidHost { .. })
        ));

        let marks = configured(
            &["--host", "http://a.test", "--low-water", "20", "--high-water", "10"],
            &defaults,
        );
        assert!(matches!(
            marks.validate(),
            Err(SwarmError::InvalidOption { .. })
        ));

        let think = configured(
            &["--host", "http://a.test", "--min-think-time", "500", "--max-think-time", "100"],
            &defaults,
        );
        assert!(matches!(
            think.validate(),
            Err(SwarmError::InvalidWaitTime { .. })
        ));

        let threshold = configured(
            &["--host", "http://a.test", "--auth-abort-threshold", "101"],
            &defaults,
        );
        assert!(threshold.validate().is_err());

        let hatch_rate = configured(&["--host", "http://a.test", "-r", "0"], &defaults);
        assert!(hatch_rate.validate().is_err());

        let timeout = configured(&["--host", "http://a.test", "--timeout", "-1"], &defaults);
        assert!(timeout.validate().is_err());

        let format = configured(
            &["--host", "http://a.test", "--request-format", "raw"],
            &defaults,
        );
        assert!(format.validate().is_err());

        let budget = configured(&["--host", "http://a.test", "--request-budget", "0"], &defaults);
        assert!(budget.validate().is_err());

        let users = configured(&["--host", "http://a.test", "-u", "0"], &defaults);
        assert!(users.validate().is_err());
    }

    #[test]
    fn timeout_in_milliseconds() {
        let configuration = configured(
            &["--host", "http://a.test", "--timeout", "1.5"],
            &SwarmDefaults::default(),
        );
        assert_eq!(configuration.timeout_ms(), Some(1_500));
    }
}
