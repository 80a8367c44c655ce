use thiserror::Error;

/// Errors that abort a whole run. Everything that only concerns a single
/// name server is reported through `TransferResult` instead.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{tool} is not available: {source}. Please install dnsutils or bind-utils")]
    BackendUnavailable {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
}
