use libaxfr_probe::{Backend, ProbeConfig};
use serde::{Deserialize, Serialize};
use std::{
    io,
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeSection,
    #[serde(default)]
    pub resolver: ResolverSection,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeSection {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub concurrency: usize,
    pub max_rate_per_second: u32,
    pub backend: Backend,
}

impl Default for ProbeSection {
    fn default() -> Self {
        let defaults = ProbeConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            max_attempts: defaults.max_attempts,
            concurrency: defaults.concurrency,
            max_rate_per_second: defaults.max_rate_per_second,
            backend: Backend::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverSection {
    /// Recursive resolvers to ask for NS records; empty means the system ones.
    pub nameservers: Vec<IpAddr>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub concurrency: Option<usize>,
    pub backend: Option<Backend>,
    pub nameservers: Option<Vec<IpAddr>>,
}

impl Config {
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(secs) = overrides.timeout_secs {
            self.probe.timeout_secs = secs;
        }
        if let Some(attempts) = overrides.max_attempts {
            self.probe.max_attempts = attempts;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.probe.concurrency = concurrency;
        }
        if let Some(backend) = overrides.backend {
            self.probe.backend = backend;
        }
        if let Some(nameservers) = overrides.nameservers {
            self.resolver.nameservers = nameservers;
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_secs(self.probe.timeout_secs.max(1)),
            max_attempts: self.probe.max_attempts.max(1),
            concurrency: self.probe.concurrency.max(1),
            max_rate_per_second: self.probe.max_rate_per_second,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("axfr").join("config.toml"))
}

pub fn load_config() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(Config::default()),
    }
}

/// A missing file yields the defaults; an unreadable or malformed one is an
/// error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn get_default_config_toml() -> String {
    r#"# axfr configuration

[probe]
# Seconds allowed for one transfer session (connect + transfer)
timeout_secs = 5

# Sessions per name server; only timeouts and transport errors are retried
max_attempts = 1

# Name servers probed in parallel (results are still printed in order)
concurrency = 1

# Upper bound on transfer sessions started per second, 0 disables the limit
max_rate_per_second = 10

# "native" speaks DNS directly, "tools" runs nslookup and dig
backend = "native"

[resolver]
# Recursive resolvers used for the NS lookup, empty uses the system resolver
# nameservers = ["1.1.1.1", "9.9.9.9"]
nameservers = []
"#
    .to_string()
}
