mod domain;
mod error;
mod prober;
mod ratelimit;
pub mod report;
mod resolver;
pub mod tools;
mod transfer;
mod types;

pub use domain::{Domain, DomainError, NameServer, NameServerSet};
pub use error::ProbeError;
pub use prober::Prober;
pub use resolver::{build_resolver, NameServerResolver, SystemResolver};
pub use transfer::{AxfrClient, ZoneTransferClient, DNS_PORT};
pub use types::{
    Backend, ProbeConfig, ProbeOutcome, ScanReport, TransferFailure, TransferResult, ZoneRecord,
};
