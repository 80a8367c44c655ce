use crate::{
    domain::{Domain, NameServer, NameServerSet},
    error::ProbeError,
    ratelimit::SessionRateLimiter,
    resolver::{build_resolver, NameServerResolver, SystemResolver},
    tools::{DigTransferClient, NslookupResolver},
    transfer::{AxfrClient, ZoneTransferClient, DNS_PORT},
    types::{Backend, ProbeConfig, ProbeOutcome, ScanReport, TransferFailure, TransferResult},
};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::{net::IpAddr, sync::Arc, time::Instant};
use tracing::{debug, info};

pub struct Prober {
    resolver: Arc<dyn NameServerResolver>,
    client: Arc<dyn ZoneTransferClient>,
    rate_limiter: Arc<SessionRateLimiter>,
    config: ProbeConfig,
}

impl Prober {
    /// Wires up the resolver and transfer client for `backend`. `upstreams`
    /// only applies to the native backend; the tools use the system setup.
    pub fn for_backend(backend: Backend, upstreams: &[IpAddr], config: ProbeConfig) -> Self {
        match backend {
            Backend::Native => {
                let resolver = build_resolver(upstreams, DNS_PORT, config.timeout);
                Self::with_capabilities(
                    config,
                    Arc::new(SystemResolver::new(resolver.clone())),
                    Arc::new(AxfrClient::new(resolver)),
                )
            }
            Backend::Tools => Self::with_capabilities(
                config,
                Arc::new(NslookupResolver::new()),
                Arc::new(DigTransferClient::new()),
            ),
        }
    }

    pub fn with_capabilities(
        config: ProbeConfig,
        resolver: Arc<dyn NameServerResolver>,
        client: Arc<dyn ZoneTransferClient>,
    ) -> Self {
        Self {
            resolver,
            client,
            rate_limiter: Arc::new(SessionRateLimiter::new(config.max_rate_per_second)),
            config,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub async fn resolve(&self, domain: &Domain) -> NameServerSet {
        self.resolver.resolve(domain).await
    }

    /// Probes one server, running up to `max_attempts` sessions while they
    /// end in a transport failure. Each session is cut off at the configured
    /// timeout.
    pub async fn probe_one(&self, domain: &Domain, server: &NameServer) -> Result<ProbeOutcome, ProbeError> {
        let start = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;

        let result = loop {
            attempts += 1;
            self.rate_limiter.acquire().await;

            let session = self.client.transfer(domain, server, self.config.timeout);
            let result = match tokio::time::timeout(self.config.timeout, session).await {
                Ok(result) => result?,
                Err(_) => TransferResult::Failure(TransferFailure::TimedOut),
            };

            let retry = attempts < max_attempts
                && result.failure().is_some_and(TransferFailure::is_retryable);
            if !retry {
                break result;
            }
            debug!("Attempt {} against {} failed: {:?}, retrying", attempts, server, result);
        };

        info!("Zone transfer of {} from {}: {}", domain, server, result.label());

        Ok(ProbeOutcome {
            server: server.clone(),
            result,
            attempts,
            duration: start.elapsed(),
        })
    }

    /// Outcomes come out in `servers` order even when several probes run at
    /// once. A `BackendUnavailable` error ends the run; callers should stop
    /// polling after the first `Err`.
    pub fn probe_stream<'a>(
        &'a self,
        domain: &'a Domain,
        servers: NameServerSet,
    ) -> impl Stream<Item = Result<ProbeOutcome, ProbeError>> + 'a {
        stream::iter(servers)
            .map(move |server| async move { self.probe_one(domain, &server).await })
            .buffered(self.config.concurrency.max(1))
    }

    /// Resolves the name servers once, then probes each of them once.
    pub async fn scan(&self, domain: &Domain) -> Result<ScanReport, ProbeError> {
        let name_servers = self.resolve(domain).await;
        let outcomes: Vec<ProbeOutcome> = self
            .probe_stream(domain, name_servers.clone())
            .try_collect()
            .await?;

        Ok(ScanReport {
            domain: domain.clone(),
            name_servers,
            outcomes,
        })
    }
}

impl Clone for Prober {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            client: Arc::clone(&self.client),
            rate_limiter: Arc::clone(&self.rate_limiter),
            config: self.config.clone(),
        }
    }
}
