use crate::domain::{Domain, NameServer, NameServerSet};
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
    proto::rr::{RData, RecordType},
    system_conf::read_system_conf,
    TokioAsyncResolver,
};
use std::{net::IpAddr, time::Duration};
use tracing::{debug, warn};

/// Finds the name servers a domain delegates to.
///
/// Implementations never fail: any resolution problem is logged and reported
/// as an empty set, which callers treat as "no name servers found".
#[async_trait]
pub trait NameServerResolver: Send + Sync {
    async fn resolve(&self, domain: &Domain) -> NameServerSet;
}

/// Builds a stub resolver. With no explicit upstreams the system configuration
/// is used, falling back to the library defaults when it cannot be read.
/// Explicit upstreams are queried on `port`.
pub fn build_resolver(upstreams: &[IpAddr], port: u16, timeout: Duration) -> TokioAsyncResolver {
    let (config, mut opts) = if upstreams.is_empty() {
        read_system_conf().unwrap_or_else(|e| {
            warn!("Could not read system resolver configuration ({}), using defaults", e);
            (ResolverConfig::default(), ResolverOpts::default())
        })
    } else {
        let group = NameServerConfigGroup::from_ips_clear(upstreams, port, true);
        (
            ResolverConfig::from_parts(None, Vec::new(), group),
            ResolverOpts::default(),
        )
    };

    opts.timeout = timeout;
    opts.attempts = 1;
    // Treat every query name as absolute; search domains would turn
    // "example" into "example.corp.local".
    opts.ndots = 0;

    TokioAsyncResolver::tokio(config, opts)
}

pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn new(resolver: TokioAsyncResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl NameServerResolver for SystemResolver {
    async fn resolve(&self, domain: &Domain) -> NameServerSet {
        let fqdn = domain.to_fqdn();
        match self.resolver.lookup(fqdn.as_str(), RecordType::NS).await {
            Ok(lookup) => {
                let servers: NameServerSet = lookup
                    .iter()
                    .filter_map(|rdata| match rdata {
                        RData::NS(ns) => Some(NameServer::new(&ns.0.to_utf8())),
                        _ => None,
                    })
                    .collect();
                debug!("{} name servers found for {}", servers.len(), domain);
                servers
            }
            Err(e) => {
                if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) {
                    debug!("No NS records for {}: {}", domain, e);
                } else {
                    warn!("Failed to lookup NS records for {}: {}", domain, e);
                }
                Vec::new()
            }
        }
    }
}
