//! Transport kinds and the collaborator traits behind each session variant.
//!
//! Sessions never talk to the network directly. Each variant drives a
//! collaborator trait object created by a [`BackendFactory`], which keeps the
//! session protocol testable and lets callers plug in their own WMI and SNMP
//! stacks. The SSH collaborator ships with the crate ([`SshBackend`]).

pub mod config;
pub mod probe;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshBackend;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{Credential, ScanConfig};
use crate::error::{ConfigError, TransportError};

/// One result row: named fields mapped to their textual values.
pub type Row = IndexMap<String, String>;

/// Transport kinds a target can be reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Interactive command shell over SSH.
    Ssh,
    /// Management-object queries (WMI).
    Wmi,
    /// Counter polling (SNMP).
    Snmp,
}

impl TransportKind {
    /// Every known kind, in default attempt order.
    pub const ALL: [TransportKind; 3] = [TransportKind::Ssh, TransportKind::Wmi, TransportKind::Snmp];

    /// Configuration name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Ssh => "ssh",
            TransportKind::Wmi => "wmi",
            TransportKind::Snmp => "snmp",
        }
    }

    /// Well-known port for this kind.
    pub fn default_port(&self) -> u16 {
        match self {
            TransportKind::Ssh => 22,
            TransportKind::Wmi => 135,
            TransportKind::Snmp => 161,
        }
    }

    /// Whether a non-retryable failure takes this kind out of rotation for a host.
    ///
    /// SNMP is exempt: community strings are stateless per attempt, so a
    /// later credential may succeed where an earlier one failed.
    pub fn is_circuit_breakable(&self) -> bool {
        !matches!(self, TransportKind::Snmp)
    }

    /// Whether reachability can be checked with a TCP connect.
    pub fn is_tcp(&self) -> bool {
        !matches!(self, TransportKind::Snmp)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(TransportKind::Ssh),
            "wmi" => Ok(TransportKind::Wmi),
            "snmp" => Ok(TransportKind::Snmp),
            other => Err(ConfigError::InvalidOption {
                key: "transport".to_string(),
                message: format!("unknown transport kind '{other}'"),
            }),
        }
    }
}

/// A chunk of output from a shell channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Standard output bytes.
    Stdout(Bytes),
    /// Error stream bytes.
    Stderr(Bytes),
}

/// An open exec channel for one shell command.
#[async_trait]
pub trait ShellChannel: Send {
    /// Next chunk of output, or `None` once the remote side is done.
    async fn next_event(&mut self) -> Result<Option<ChannelEvent>, TransportError>;

    /// Write raw bytes to the command's input.
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the channel. Further reads yield `None`.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Interactive-shell collaborator.
#[async_trait]
pub trait ShellBackend: Send {
    /// Connect and authenticate.
    ///
    /// Must report credential rejection as
    /// [`TransportError::AuthenticationFailed`] and host identity problems as
    /// [`TransportError::HostKeyChanged`] / [`TransportError::HostKeyUnknown`].
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Start a command and return its channel.
    async fn exec(&mut self, command: &str) -> Result<Box<dyn ShellChannel>, TransportError>;

    /// Tear down the connection.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Management-object-query collaborator.
///
/// Multi-valued properties are joined with `;` in the returned rows.
#[async_trait]
pub trait WmiBackend: Send {
    /// Connect and authenticate.
    ///
    /// Must report denied access as [`TransportError::AccessDenied`] and an
    /// unavailable service as [`TransportError::Refused`].
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Run a query and return one row per object.
    async fn query(&mut self, query: &str) -> Result<Vec<Row>, TransportError>;

    /// Enumerate subkey names below a registry path.
    async fn registry_keys(&mut self, path: &str) -> Result<Vec<String>, TransportError>;

    /// Read all values stored at a registry path.
    async fn registry_values(&mut self, path: &str) -> Result<Row, TransportError>;

    /// Tear down the connection.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// A single name/value pair from an SNMP walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    /// Numeric OID of the object.
    pub oid: String,
    /// Rendered value.
    pub value: String,
}

impl Varbind {
    /// Create a varbind.
    pub fn new(oid: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            value: value.into(),
        }
    }
}

/// Counter-polling collaborator.
#[async_trait]
pub trait SnmpBackend: Send {
    /// Prepare the client. A wrong community usually shows up as
    /// [`TransportError::Timeout`].
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Walk every object below `prefix`, in OID order.
    fn walk<'a>(&'a mut self, prefix: &'a str) -> BoxStream<'a, Result<Varbind, TransportError>>;
}

/// Where a session should connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or address.
    pub host: String,
    /// Port for the selected kind.
    pub port: u16,
}

/// Creates a fresh collaborator for each connection attempt.
///
/// Returning `None` means the kind cannot be served at all; the attempt is
/// then classified as protocol-unavailable.
pub trait BackendFactory: Send + Sync {
    /// Shell collaborator for `credential`.
    fn shell(&self, endpoint: &Endpoint, credential: &Credential) -> Option<Box<dyn ShellBackend>>;

    /// WMI collaborator for `credential`.
    fn wmi(&self, _endpoint: &Endpoint, _credential: &Credential) -> Option<Box<dyn WmiBackend>> {
        None
    }

    /// SNMP collaborator for `credential`.
    fn snmp(&self, _endpoint: &Endpoint, _credential: &Credential) -> Option<Box<dyn SnmpBackend>> {
        None
    }
}

/// Factory serving SSH through [`SshBackend`]; no WMI or SNMP stack.
#[derive(Debug, Clone, Default)]
pub struct DefaultBackends {
    template: SshConfig,
}

impl DefaultBackends {
    /// Build from the scan configuration's SSH settings.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            template: SshConfig {
                timeout: config.timeout(),
                host_key_verification: config.host_key_verification.clone(),
                known_hosts_path: config.known_hosts_path.clone(),
                ..SshConfig::default()
            },
        }
    }

    /// Shared handle for use with a target builder.
    pub fn shared(config: &ScanConfig) -> Arc<dyn BackendFactory> {
        Arc::new(Self::from_config(config))
    }
}

impl BackendFactory for DefaultBackends {
    fn shell(&self, endpoint: &Endpoint, credential: &Credential) -> Option<Box<dyn ShellBackend>> {
        let config = self.template.for_credential(endpoint, credential);
        Some(Box::new(SshBackend::new(config)))
    }
}
