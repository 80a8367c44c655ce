use crate::{
    domain::{Domain, NameServer},
    types::{ProbeOutcome, ScanReport, TransferResult, ZoneRecord},
};
use serde::Serialize;
use std::io::{self, Write};

pub fn write_no_name_servers<W: Write>(out: &mut W, domain: &Domain) -> io::Result<()> {
    writeln!(out, "No name servers found for {}", domain)
}

pub fn write_attempt<W: Write>(out: &mut W, server: &NameServer) -> io::Result<()> {
    writeln!(out, "[*] Trying zone transfer from {}...", server)
}

/// Writes the records or the failure line that follow an attempt line.
pub fn write_result<W: Write>(out: &mut W, outcome: &ProbeOutcome) -> io::Result<()> {
    match &outcome.result {
        TransferResult::Success { records } => {
            writeln!(out, "[+] Zone transfer successful from {}:", outcome.server)?;
            writeln!(out)?;
            for record in records {
                writeln!(out, "{}", record)?;
            }
            writeln!(out)
        }
        TransferResult::Failure(failure) => {
            writeln!(
                out,
                "[-] Zone transfer failed or refused by {} ({})",
                outcome.server, failure
            )?;
            writeln!(out)
        }
    }
}

/// Writes the block for one probed server: the attempt line followed by the
/// records or the failure line.
pub fn write_outcome<W: Write>(out: &mut W, outcome: &ProbeOutcome) -> io::Result<()> {
    write_attempt(out, &outcome.server)?;
    write_result(out, outcome)
}

pub fn write_report<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    if report.name_servers.is_empty() {
        return write_no_name_servers(out, &report.domain);
    }
    for outcome in &report.outcomes {
        write_outcome(out, outcome)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct OutcomeLine<'a> {
    pub domain: &'a Domain,
    pub server: &'a NameServer,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<&'a [ZoneRecord]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl<'a> OutcomeLine<'a> {
    pub fn new(domain: &'a Domain, outcome: &'a ProbeOutcome) -> Self {
        let (records, reason) = match &outcome.result {
            TransferResult::Success { records } => (Some(records.as_slice()), None),
            TransferResult::Failure(failure) => (None, Some(failure.to_string())),
        };

        Self {
            domain,
            server: &outcome.server,
            status: outcome.result.label(),
            records,
            reason,
            attempts: outcome.attempts,
            duration_ms: outcome.duration.as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
struct NoNameServersLine<'a> {
    domain: &'a Domain,
    status: &'static str,
}

pub fn write_ndjson_no_name_servers<W: Write>(out: &mut W, domain: &Domain) -> io::Result<()> {
    let line = NoNameServersLine {
        domain,
        status: "no_name_servers",
    };
    writeln!(out, "{}", serde_json::to_string(&line)?)?;
    out.flush()
}

pub fn write_ndjson_outcome<W: Write>(
    out: &mut W,
    domain: &Domain,
    outcome: &ProbeOutcome,
) -> io::Result<()> {
    writeln!(out, "{}", serde_json::to_string(&OutcomeLine::new(domain, outcome))?)?;
    out.flush()
}
