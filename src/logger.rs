//! Optional request log.
//!
//! Enabled with the `--request-log` run-time option, or
//! [`SwarmDefault::RequestLog`](../config/enum.SwarmDefault.html#variant.RequestLog). When
//! enabled, a logger task is launched and the parent forwards every [`RequestMetric`] it
//! receives, which the task writes through Tokio's asynchronous
//! [`BufWriter`](https://docs.rs/tokio/*/tokio/io/struct.BufWriter.html).
//!
//! The format is set with `--request-format`:
//!  - `json` (default): one JSON object per line,
//!  - `csv`: a header followed by one row per request,
//!  - `raw`: the `Debug` output of each request.
//!
//! A `json` line looks like:
//! ```json
//! {"elapsed":1204,"error":"","method":"Put","name":"update note","outcome":"Success","response_time":14,"status_code":200,"task":"Update","url":"http://127.0.0.1:5000/api/notes/42","user":3}
//! ```

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::metrics::RequestMetric;
use crate::{SwarmConfiguration, SwarmError};

/// Messages the logger task accepts.
#[derive(Debug, Deserialize, Serialize)]
pub enum SwarmLog {
    Request(RequestMetric),
}

/// Supported request log formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwarmLogFormat {
    Csv,
    Json,
    Raw,
}

/// Allow request log formats to be specified loosely, for example `JSON` or `Csv`.
impl FromStr for SwarmLogFormat {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let log_format = RegexSet::new([r"(?i)^csv$", r"(?i)^(json|jsn)$", r"(?i)^raw$"])
            .map_err(|e| SwarmError::InvalidOption {
                option: "--request-format".to_string(),
                value: s.to_string(),
                detail: e.to_string(),
            })?;
        let matches = log_format.matches(s.trim());
        if matches.matched(0) {
            Ok(SwarmLogFormat::Csv)
        } else if matches.matched(1) {
            Ok(SwarmLogFormat::Json)
        } else if matches.matched(2) {
            Ok(SwarmLogFormat::Raw)
        } else {
            Err(SwarmError::InvalidOption {
                option: "--request-format".to_string(),
                value: s.to_string(),
                detail: "Invalid format, expected: csv, json, or raw.".to_string(),
            })
        }
    }
}

impl fmt::Display for SwarmLogFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let format = match self {
            SwarmLogFormat::Csv => "csv",
            SwarmLogFormat::Json => "json",
            SwarmLogFormat::Raw => "raw",
        };
        write!(f, "{}", format)
    }
}

/// Header written at the top of a csv request log.
pub(crate) const REQUEST_CSV_HEADER: &str =
    "elapsed,user,method,name,url,task,status_code,response_time,outcome,error";

/// Format one request for the request log.
pub(crate) fn format_request(request: &RequestMetric, format: SwarmLogFormat) -> String {
    match format {
        SwarmLogFormat::Json => serde_json::json!(request).to_string(),
        // Built by hand, one row at a time.
        SwarmLogFormat::Csv => [
            request.elapsed.to_string(),
            request.user.to_string(),
            request.method.to_string(),
            csv_field(&request.name),
            csv_field(&request.url),
            request
                .task
                .map(|kind| kind.to_string())
                .unwrap_or_default(),
            request.status_code.to_string(),
            request.response_time.to_string(),
            csv_field(&request.outcome.to_string()),
            csv_field(&request.error),
        ]
        .join(","),
        SwarmLogFormat::Raw => format!("{:?}", request),
    }
}

/// Quote a csv field if it contains a separator, a quote or a line break.
pub(crate) fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl SwarmConfiguration {
    /// Logger task, opens the request log and writes everything it receives until it
    /// gets `None`.
    pub(crate) async fn logger_main(
        self: SwarmConfiguration,
        receiver: flume::Receiver<Option<SwarmLog>>,
    ) -> Result<(), SwarmError> {
        let path = self.request_log.clone();
        let format = self.request_format.unwrap_or(SwarmLogFormat::Json);

        let file = File::create(&path).await?;
        info!("writing requests to request_log: {}", &path);
        let mut request_log = BufWriter::with_capacity(64 * 1024, file);

        if format == SwarmLogFormat::Csv {
            request_log
                .write_all(format!("{}\n", REQUEST_CSV_HEADER).as_bytes())
                .await?;
        }

        while let Ok(message) = receiver.recv_async().await {
            match message {
                Some(SwarmLog::Request(request)) => {
                    let formatted_log = format_request(&request, format);
                    if let Err(e) = request_log
                        .write_all(format!("{}\n", formatted_log).as_bytes())
                        .await
                    {
                        warn!("failed to write to {}: {}", &path, e);
                    }
                }
                // Empty message means it's time to exit.
                None => break,
            }
        }

        info!("flushing request_log: {}", &path);
        request_log.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::TaskKind;
    use crate::metrics::Outcome;

    #[test]
    fn log_format_from_str() {
        assert_eq!("csv".parse::<SwarmLogFormat>().unwrap(), SwarmLogFormat::Csv);
        assert_eq!("JSON".parse::<SwarmLogFormat>().unwrap(), SwarmLogFormat::Json);
        assert_eq!(" Raw ".parse::<SwarmLogFormat>().unwrap(), SwarmLogFormat::Raw);
        assert!("xml".parse::<SwarmLogFormat>().is_err());
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(csv_field("update note"), "update note");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn formats() {
        let mut request = RequestMetric::new(1204, 3, "update note", Some(TaskKind::Update));
        request.url = "http://127.0.0.1:5000/api/notes/42".to_string();
        request.status_code = 409;
        request.response_time = 14;
        request.outcome = Outcome::HttpFailure(409);
        request.error = "409 Conflict".to_string();

        assert_eq!(
            format_request(&request, SwarmLogFormat::Csv),
            "1204,3,PUT,update note,http://127.0.0.1:5000/api/notes/42,update,409,14,http failure (409),409 Conflict"
        );
        assert_eq!(
            REQUEST_CSV_HEADER.split(',').count(),
            format_request(&request, SwarmLogFormat::Csv).split(',').count()
        );

        let json: serde_json::Value =
            serde_json::from_str(&format_request(&request, SwarmLogFormat::Json)).unwrap();
        assert_eq!(json["name"], "update note");
        assert_eq!(json["status_code"], 409);

        assert!(format_request(&request, SwarmLogFormat::Raw).starts_with("RequestMetric"));
    }
}
