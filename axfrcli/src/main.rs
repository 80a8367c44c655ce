mod config;

use clap::{ArgAction, Parser};
use config::{config_path, get_default_config_toml, load_config, Overrides};
use futures::StreamExt;
use libaxfr_probe::{report, Backend, Domain, NameServer, NameServerSet, ProbeError, Prober};
use std::{
    io::{self, Write},
    net::IpAddr,
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "axfr")]
#[command(about = "Find a domain's name servers and test each one for open zone transfers (AXFR)", long_about = None)]
struct Args {
    /// Domain to test for zone transfer
    #[arg(required_unless_present_any = ["print_default_config", "write_default_config"])]
    domain: Option<Domain>,

    /// Seconds allowed for each transfer session
    #[arg(long, short = 't')]
    timeout: Option<u64>,

    /// Sessions per name server (timeouts and transport errors are retried)
    #[arg(long, short = 'a')]
    attempts: Option<u32>,

    /// Name servers to probe in parallel
    #[arg(long, short = 'c')]
    concurrency: Option<usize>,

    /// Lookup and transfer mechanism: native or tools (nslookup + dig)
    #[arg(long, short = 'b')]
    backend: Option<Backend>,

    /// Comma-separated recursive resolvers for the NS lookup (e.g., 1.1.1.1,9.9.9.9)
    #[arg(long, short = 'r', value_delimiter = ',')]
    resolver: Option<Vec<IpAddr>>,

    /// Comma-separated name servers to probe instead of looking up NS records
    #[arg(long, short = 's', value_delimiter = ',')]
    server: Option<Vec<String>>,

    /// Output results as NDJSON stream (one JSON object per line)
    #[arg(long, short = 'j')]
    ndjson: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    quiet: bool,

    /// Print the default config to stdout and exit
    #[arg(long)]
    print_default_config: bool,

    /// Write the default config to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    // hickory is chatty about malformed UDP answers it already handles
    let directives = if verbose < 2 {
        format!("{level},hickory_proto=error,hickory_resolver=error")
    } else {
        level.to_string()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_default_config {
        println!("{}", get_default_config_toml());
        return Ok(());
    }

    if args.write_default_config {
        if let Some(path) = config_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, get_default_config_toml())?;
            println!("Default config written to: {}", path.display());
        } else {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
        return Ok(());
    }

    init_logging(args.verbose, args.quiet);

    let mut config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    config.apply(Overrides {
        timeout_secs: args.timeout,
        max_attempts: args.attempts,
        concurrency: args.concurrency,
        backend: args.backend,
        nameservers: args.resolver,
    });

    let Some(domain) = args.domain else {
        eprintln!("Error: A domain is required");
        std::process::exit(2);
    };
    let servers = args
        .server
        .map(|hosts| hosts.iter().map(|h| NameServer::new(h)).collect::<Vec<_>>());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let prober = Prober::for_backend(
            config.probe.backend,
            &config.resolver.nameservers,
            config.probe_config(),
        );
        run(prober, domain, servers, args.ndjson).await
    })
}

async fn run(
    prober: Prober,
    domain: Domain,
    servers: Option<Vec<NameServer>>,
    ndjson: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let name_servers = match servers {
        Some(servers) => servers,
        None => prober.resolve(&domain).await,
    };

    let mut stdout = io::stdout();

    if name_servers.is_empty() {
        if ndjson {
            report::write_ndjson_no_name_servers(&mut stdout, &domain)?;
        } else {
            report::write_no_name_servers(&mut stdout, &domain)?;
        }
        return Ok(());
    }

    tracing::info!("Probing {} name servers for {}", name_servers.len(), domain);

    match report_outcomes(&prober, &domain, name_servers, ndjson, &mut stdout).await {
        Ok(()) => Ok(()),
        Err(RunError::Probe(e)) => {
            stdout.flush()?;
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(RunError::Io(e)) => Err(e.into()),
    }
}

/// Probes every server and writes its outcome as soon as it is known. A
/// sequential text run prints the attempt line before the probe starts so
/// slow servers show progress.
async fn report_outcomes<W: Write>(
    prober: &Prober,
    domain: &Domain,
    name_servers: NameServerSet,
    ndjson: bool,
    out: &mut W,
) -> Result<(), RunError> {
    if !ndjson && prober.config().concurrency <= 1 {
        for server in &name_servers {
            report::write_attempt(out, server)?;
            out.flush()?;
            let outcome = prober.probe_one(domain, server).await?;
            report::write_result(out, &outcome)?;
            out.flush()?;
        }
        return Ok(());
    }

    let mut stream = std::pin::pin!(prober.probe_stream(domain, name_servers));
    while let Some(outcome) = stream.next().await {
        let outcome = outcome?;
        if ndjson {
            report::write_ndjson_outcome(out, domain, &outcome)?;
        } else {
            report::write_outcome(out, &outcome)?;
            out.flush()?;
        }
    }

    Ok(())
}
