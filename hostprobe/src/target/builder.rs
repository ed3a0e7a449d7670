//! Builder for creating targets.

use std::sync::Arc;

use log::debug;

use super::Target;
use crate::channel::ElevationPatterns;
use crate::config::{Credential, ScanConfig};
use crate::error::{ConfigError, ProfilerError, Result};
use crate::profiler::ProfilerRegistry;
use crate::transport::{BackendFactory, DefaultBackends};

/// Builder for constructing targets.
///
/// # Example
///
/// ```rust,no_run
/// use hostprobe::{Credential, TargetBuilder};
///
/// # async fn example() -> Result<(), hostprobe::Error> {
/// let mut target = TargetBuilder::new("192.168.1.10")
///     .credential(Credential::new("admin").with_secret("secret"))
///     .scrub(true)
///     .build()?;
///
/// let inventory = target.scan().await?;
/// println!("{}", inventory.to_json());
/// # Ok(())
/// # }
/// ```
pub struct TargetBuilder {
    host: String,
    config: Option<Arc<ScanConfig>>,
    credentials: Vec<Arc<Credential>>,
    profilers: Option<ProfilerRegistry>,
    backends: Option<Arc<dyn BackendFactory>>,
    patterns: Option<Arc<ElevationPatterns>>,
    scrub: Option<bool>,
}

impl TargetBuilder {
    /// Create a new target builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            config: None,
            credentials: Vec::new(),
            profilers: None,
            backends: None,
            patterns: None,
            scrub: None,
        }
    }

    /// Use shared scan options (default: `ScanConfig::default()`).
    pub fn config(mut self, config: Arc<ScanConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Append a credential after those in the scan options.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credentials.push(Arc::new(credential));
        self
    }

    /// Resolve against `registry` instead of the built-in profilers.
    ///
    /// A `profilers` list in the scan options still selects from it.
    pub fn profilers(mut self, registry: ProfilerRegistry) -> Self {
        self.profilers = Some(registry);
        self
    }

    /// Set the collaborator factory (default: SSH only).
    pub fn backends(mut self, backends: Arc<dyn BackendFactory>) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Set the elevation prompt patterns for shell sessions.
    pub fn elevation_patterns(mut self, patterns: ElevationPatterns) -> Self {
        self.patterns = Some(Arc::new(patterns));
        self
    }

    /// Override the `scrub` option.
    pub fn scrub(mut self, scrub: bool) -> Self {
        self.scrub = Some(scrub);
        self
    }

    /// Build the target.
    ///
    /// This validates every option but does not connect. Call `connect()`
    /// or `scan()` on the returned target.
    pub fn build(self) -> Result<Target> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidOption {
                key: "host".to_string(),
                message: "host must not be empty".to_string(),
            }
            .into());
        }

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let offset = config.credentials.len();
        for (index, credential) in self.credentials.iter().enumerate() {
            credential.validate(offset + index)?;
        }
        let credentials: Vec<_> = config
            .credentials
            .iter()
            .cloned()
            .chain(self.credentials)
            .collect();

        let registry = self.profilers.unwrap_or_else(ProfilerRegistry::builtin);
        let profilers = match &config.profilers {
            Some(names) if names.is_empty() => return Err(ProfilerError::MissingConfiguration.into()),
            Some(names) => registry.select(names)?,
            None => registry,
        };

        let backends = self.backends.unwrap_or_else(|| DefaultBackends::shared(&config));
        let patterns = self.patterns.unwrap_or_default();
        let scrub = self.scrub.unwrap_or(config.scrub);

        debug!(
            "target: {}: {} credential(s), profilers {:?}",
            self.host,
            credentials.len(),
            profilers.names().collect::<Vec<_>>()
        );

        Ok(Target::new(
            self.host,
            config,
            credentials,
            profilers,
            backends,
            patterns,
            scrub,
        ))
    }
}
