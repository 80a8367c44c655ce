//! Resolution and transfer through the `nslookup` and `dig` command-line
//! tools, kept so results can be compared against what the tools report.

use crate::{
    domain::{Domain, NameServer, NameServerSet},
    error::ProbeError,
    resolver::NameServerResolver,
    transfer::ZoneTransferClient,
    types::{TransferFailure, TransferResult, ZoneRecord},
};
use async_trait::async_trait;
use regex::Regex;
use std::{sync::LazyLock, time::Duration};
use tokio::process::Command;
use tracing::{debug, warn};

static NAMESERVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"nameserver = ([\w.-]+)").expect("valid nameserver regex"));

pub struct NslookupResolver {
    program: String,
}

impl NslookupResolver {
    pub fn new() -> Self {
        Self::with_program("nslookup")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NslookupResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameServerResolver for NslookupResolver {
    async fn resolve(&self, domain: &Domain) -> NameServerSet {
        let output = match Command::new(&self.program)
            .arg("-type=ns")
            .arg(domain.as_str())
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!("Error running {}: {}", self.program, e);
                return Vec::new();
            }
        };

        if !output.status.success() {
            warn!("{} exited with {} for {}", self.program, output.status, domain);
            return Vec::new();
        }

        parse_nslookup_output(&String::from_utf8_lossy(&output.stdout))
    }
}

pub fn parse_nslookup_output(stdout: &str) -> NameServerSet {
    NAMESERVER_RE
        .captures_iter(stdout)
        .map(|caps| NameServer::new(&caps[1]))
        .collect()
}

pub struct DigTransferClient {
    program: String,
}

impl DigTransferClient {
    pub fn new() -> Self {
        Self::with_program("dig")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DigTransferClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ZoneTransferClient for DigTransferClient {
    async fn transfer(
        &self,
        domain: &Domain,
        server: &NameServer,
        timeout: Duration,
    ) -> Result<TransferResult, ProbeError> {
        let secs = timeout.as_secs().max(1);
        let output = Command::new(&self.program)
            .arg(format!("@{}", server))
            .arg(domain.as_str())
            .arg("axfr")
            .arg(format!("+time={}", secs))
            .arg("+tries=1")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::BackendUnavailable {
                tool: "dig",
                source,
            })?;

        debug!("{} @{} exited with {}", self.program, server, output.status);
        Ok(classify_dig_output(
            &String::from_utf8_lossy(&output.stdout),
            output.status.success(),
        ))
    }
}

/// Classifies `dig axfr` output. Only `;` comment lines are searched for
/// failure text, so zone data that happens to say "failed" cannot turn a
/// transfer into a failure.
pub fn classify_dig_output(stdout: &str, exited_ok: bool) -> TransferResult {
    let mut records = Vec::new();
    let mut timed_out = false;
    let mut refused = false;

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with(';') {
            let lower = line.to_lowercase();
            if lower.contains("timed out") || lower.contains("no servers could be reached") {
                timed_out = true;
            } else if lower.contains("transfer failed") {
                refused = true;
            }
            continue;
        }

        match parse_dig_record(line) {
            Some(record) => records.push(record),
            None => debug!("Skipping unparsable dig line: {}", line),
        }
    }

    if timed_out {
        TransferResult::Failure(TransferFailure::TimedOut)
    } else if refused {
        TransferResult::Failure(TransferFailure::Refused)
    } else if !exited_ok {
        TransferResult::error("dig reported an error")
    } else {
        TransferResult::from_records(records)
    }
}

/// Splits off the first whitespace-delimited field, returning it and the
/// untouched remainder.
fn next_field(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    match line.split_once(char::is_whitespace) {
        Some((field, rest)) => Some((field, rest)),
        None if !line.is_empty() => Some((line, "")),
        None => None,
    }
}

/// The rdata is kept exactly as dig printed it; TXT strings may contain
/// meaningful runs of whitespace.
fn parse_dig_record(line: &str) -> Option<ZoneRecord> {
    let (name, rest) = next_field(line)?;
    let (ttl, rest) = next_field(rest)?;
    let (class, rest) = next_field(rest)?;
    let (rtype, rest) = next_field(rest)?;

    Some(ZoneRecord {
        name: name.to_string(),
        ttl: ttl.parse().ok()?,
        class: class.to_string(),
        rtype: rtype.to_string(),
        rdata: rest.trim().to_string(),
    })
}
