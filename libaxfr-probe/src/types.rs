use crate::domain::{Domain, NameServer, NameServerSet};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

/// One resource record received during a zone transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneRecord {
    pub name: String,
    pub ttl: u32,
    pub class: String,
    pub rtype: String,
    pub rdata: String,
}

impl fmt::Display for ZoneRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name, self.ttl, self.class, self.rtype, self.rdata
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFailure {
    Refused,
    TimedOut,
    Error { reason: String },
    Unknown,
}

impl TransferFailure {
    /// Transport-level failures are worth another session; answers from the
    /// server are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferFailure::TimedOut | TransferFailure::Error { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransferFailure::Refused => "refused",
            TransferFailure::TimedOut => "timed_out",
            TransferFailure::Error { .. } => "error",
            TransferFailure::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFailure::Refused => f.write_str("transfer refused"),
            TransferFailure::TimedOut => f.write_str("timed out"),
            TransferFailure::Error { reason } => write!(f, "error: {}", reason),
            TransferFailure::Unknown => f.write_str("empty response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    Success { records: Vec<ZoneRecord> },
    Failure(TransferFailure),
}

impl TransferResult {
    /// Builds a result from the records of a session that raised no error.
    pub fn from_records(records: Vec<ZoneRecord>) -> Self {
        if records.is_empty() {
            TransferResult::Failure(TransferFailure::Unknown)
        } else {
            TransferResult::Success { records }
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        TransferResult::Failure(TransferFailure::Error {
            reason: reason.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransferResult::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransferResult::Success { .. } => "success",
            TransferResult::Failure(failure) => failure.label(),
        }
    }

    pub fn failure(&self) -> Option<&TransferFailure> {
        match self {
            TransferResult::Failure(failure) => Some(failure),
            TransferResult::Success { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub server: NameServer,
    pub result: TransferResult,
    pub attempts: u32,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub domain: Domain,
    pub name_servers: NameServerSet,
    pub outcomes: Vec<ProbeOutcome>,
}

impl ScanReport {
    pub fn successes(&self) -> impl Iterator<Item = &ProbeOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_success())
    }
}

/// Which mechanism performs the lookups and transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// hickory resolver for NS lookups, AXFR spoken directly over TCP.
    #[default]
    Native,
    /// `nslookup` and `dig` run as subprocesses.
    Tools,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Backend::Native),
            "tools" | "dig" => Ok(Backend::Tools),
            other => Err(format!("unknown backend '{}' (expected native or tools)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub concurrency: usize,
    pub max_rate_per_second: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_attempts: 1,
            concurrency: 1,
            max_rate_per_second: 10,
        }
    }
}
