//! Error types for hostprobe.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::inventory::Category;
use crate::transport::TransportKind;

/// Main error type for hostprobe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or arguments
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connection lifecycle errors
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Transport collaborator errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Profiler resolution errors
    #[error("Profiler error: {0}")]
    Profiler(#[from] ProfilerError),

    /// Category collection errors
    #[error("Collection error: {0}")]
    Collect(#[from] CollectError),
}

impl Error {
    /// Whether the session is gone and no further queries can succeed.
    ///
    /// Collection stops on fatal errors instead of degrading to defaults.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(
                TransportError::Disconnected
                    | TransportError::Ssh(russh::Error::Disconnect | russh::Error::SendError)
            ) | Error::Connection(ConnectionError::NotConnected)
        )
    }
}

/// Configuration errors. Always surfaced immediately, never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A credential failed validation
    #[error("Invalid credential #{index}: {message}")]
    InvalidCredential { index: usize, message: String },

    /// A query limit that is not a positive integer
    #[error("Query limit must be a positive integer, got {limit}")]
    InvalidLimit { limit: usize },

    /// A profiler name that is not in the registry
    #[error("Unknown profiler '{name}'")]
    UnknownProfiler { name: String },

    /// An option with an unusable value
    #[error("Invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// Malformed configuration document (includes unknown keys)
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] io::Error),
}

/// Connection lifecycle errors.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Target already holds a connected session
    #[error("Target already connected")]
    AlreadyConnected,

    /// No credentials configured for the target
    #[error("No credentials configured")]
    MissingCredentials,

    /// Session is not connected
    #[error("Session not connected - call connect() first")]
    NotConnected,

    /// Every credential and kind was tried without success
    #[error("No credential could connect to {host} ({attempts} attempt(s))")]
    Exhausted { host: String, attempts: usize },
}

/// Errors raised by transport collaborators.
///
/// During `connect()` these are classified into a
/// [`ConnectFailure`](crate::session::ConnectFailure); afterwards they
/// propagate to the caller.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to reach the host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Remote accepted the connection but denied access
    #[error("Access denied: {detail}")]
    AccessDenied { detail: String },

    /// Host key does not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host key is unknown and strict checking is enabled
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The remote explicitly refuses this protocol
    #[error("Protocol refused by remote: {detail}")]
    Refused { detail: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other collaborator failure
    #[error("{message}")]
    Other { message: String },
}

/// Profiler resolution errors. Always surfaced, never retried.
#[derive(Error, Debug)]
pub enum ProfilerError {
    /// Target has no connected session
    #[error("No active session")]
    NoActiveSession,

    /// No profiler descriptors configured
    #[error("No profilers configured")]
    MissingConfiguration,

    /// No descriptor matched the session
    #[error("No profiler matched host '{host}'")]
    NoProfilerDetected { host: String },

    /// Collection requested before a profiler was bound
    #[error("No profiler resolved - call resolve_profiler() first")]
    NotResolved,

    /// Forced descriptor does not speak the session's transport
    #[error("Profiler '{profiler}' requires {expected} but the session is {actual}")]
    KindMismatch {
        profiler: String,
        expected: TransportKind,
        actual: TransportKind,
    },

    /// Descriptor name registered twice
    #[error("Profiler '{name}' is already registered")]
    DuplicateDescriptor { name: String },
}

/// Errors raised while building category records.
///
/// The collection pass degrades these to template defaults.
#[derive(Error, Debug)]
pub enum CollectError {
    /// Field not present in the category template
    #[error("Field '{field}' is not part of the {category} template")]
    UnknownField { category: Category, field: String },

    /// Record built for a different category
    #[error("Expected {expected} records, got {actual}")]
    WrongCategory { expected: Category, actual: Category },

    /// Remote output could not be interpreted
    #[error("Malformed {category} response: {message}")]
    Malformed { category: Category, message: String },
}

/// Result type alias using hostprobe's Error.
pub type Result<T> = std::result::Result<T, Error>;
