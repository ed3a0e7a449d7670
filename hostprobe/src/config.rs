//! Scan configuration and credentials.
//!
//! Configuration is validated eagerly: unknown keys and malformed
//! credentials are rejected before any connection attempt is made.
//!
//! ```toml
//! default_kinds = ["ssh", "wmi"]
//! profilers = ["linux", "windows"]
//! scrub = true
//! probe_ports = true
//! skip_categories = ["patches"]
//!
//! [ports]
//! ssh = 2222
//!
//! [[credentials]]
//! user = "inventory"
//! secret = "s3cret"
//! kinds = ["ssh"]
//!
//! [[credentials]]
//! user = "public"
//! kinds = ["snmp"]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::inventory::Category;
use crate::transport::{HostKeyVerification, TransportKind};

fn default_timeout_secs() -> u64 {
    30
}

/// A login to try against a host.
///
/// For SNMP the `user` is the community string.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credential {
    /// Login name.
    pub user: String,

    /// Password, elevation secret, or key passphrase.
    #[serde(default)]
    pub secret: Option<SecretString>,

    /// Permitted transport kinds, in attempt order. Empty means the
    /// configuration defaults apply.
    #[serde(default)]
    pub kinds: Vec<TransportKind>,

    /// Private key for SSH.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

impl Credential {
    /// Create a credential with only a user name.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            secret: None,
            kinds: Vec::new(),
            key_file: None,
        }
    }

    /// Set the secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Restrict the credential to these kinds, in order.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = TransportKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Set a private key file for SSH.
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    /// Kinds to attempt with this credential.
    ///
    /// Falls back to `defaults`, then to every known kind.
    pub fn permitted_kinds(&self, defaults: &[TransportKind]) -> Vec<TransportKind> {
        if !self.kinds.is_empty() {
            self.kinds.clone()
        } else if !defaults.is_empty() {
            defaults.to_vec()
        } else {
            TransportKind::ALL.to_vec()
        }
    }

    /// Check the credential is usable.
    pub fn validate(&self, index: usize) -> std::result::Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidCredential {
            index,
            message: message.to_string(),
        };

        if self.user.trim().is_empty() {
            return Err(invalid("user must not be empty"));
        }
        if self.user.chars().any(char::is_control) {
            return Err(invalid("user must not contain control characters"));
        }

        let mut seen = BTreeSet::new();
        for kind in &self.kinds {
            if !seen.insert(*kind) {
                return Err(invalid(&format!("transport kind '{kind}' listed twice")));
            }
        }

        if self.key_file.is_some() && !self.kinds.is_empty() && !self.kinds.contains(&TransportKind::Ssh) {
            return Err(invalid("key_file is only used by the ssh transport"));
        }

        Ok(())
    }
}

/// Per-kind port overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortOverrides {
    /// SSH port.
    pub ssh: Option<u16>,
    /// WMI (DCOM endpoint mapper) port.
    pub wmi: Option<u16>,
    /// SNMP port.
    pub snmp: Option<u16>,
}

impl PortOverrides {
    /// Override for `kind`, if any.
    pub fn get(&self, kind: TransportKind) -> Option<u16> {
        match kind {
            TransportKind::Ssh => self.ssh,
            TransportKind::Wmi => self.wmi,
            TransportKind::Snmp => self.snmp,
        }
    }
}

/// Options for scanning one or more targets.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Credentials, in attempt order.
    #[serde(default)]
    pub credentials: Vec<Arc<Credential>>,

    /// Kinds for credentials that list none.
    #[serde(default)]
    pub default_kinds: Vec<TransportKind>,

    /// Profiler names in priority order. `None` uses the registry order.
    #[serde(default)]
    pub profilers: Option<Vec<String>>,

    /// Run the scrubber after collection.
    #[serde(default)]
    pub scrub: bool,

    /// Check TCP reachability before each attempt.
    #[serde(default)]
    pub probe_ports: bool,

    /// Port overrides per kind.
    #[serde(default)]
    pub ports: PortOverrides,

    /// Connect and probe timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Categories left at their template defaults.
    #[serde(default)]
    pub skip_categories: BTreeSet<Category>,

    /// SSH host key checking mode.
    #[serde(default)]
    pub host_key_verification: HostKeyVerification,

    /// Alternate known_hosts file for SSH.
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
}

impl ScanConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: ScanConfig = toml::from_str(input).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let input = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&input)
    }

    /// Check every option.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (index, credential) in self.credentials.iter().enumerate() {
            credential.validate(index)?;
        }

        let mut seen = BTreeSet::new();
        for kind in &self.default_kinds {
            if !seen.insert(*kind) {
                return Err(ConfigError::InvalidOption {
                    key: "default_kinds".to_string(),
                    message: format!("'{kind}' listed twice"),
                });
            }
        }

        for kind in TransportKind::ALL {
            if self.ports.get(kind) == Some(0) {
                return Err(ConfigError::InvalidOption {
                    key: format!("ports.{kind}"),
                    message: "port must be non-zero".to_string(),
                });
            }
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidOption {
                key: "timeout_secs".to_string(),
                message: "timeout must be at least one second".to_string(),
            });
        }

        Ok(())
    }

    /// Port to use for `kind`.
    pub fn port(&self, kind: TransportKind) -> u16 {
        self.ports.get(kind).unwrap_or_else(|| kind.default_port())
    }

    /// Connect and probe timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            credentials: Vec::new(),
            default_kinds: Vec::new(),
            profilers: None,
            scrub: false,
            probe_ports: false,
            ports: PortOverrides::default(),
            timeout_secs: default_timeout_secs(),
            skip_categories: BTreeSet::new(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}
