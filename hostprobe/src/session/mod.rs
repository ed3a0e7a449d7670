//! Management sessions, one variant per transport kind.
//!
//! A [`Session`] wraps a transport collaborator with connection state, a
//! retry flag, and failure classification. All variants share one
//! contract: `connect`, `run`, `value_at`, `disconnect`.

mod shell;
mod snmp;
mod wmi;

pub use shell::{LINE_FIELD, ShellSession};
pub use snmp::{OID_FIELD, SnmpSession, VALUE_FIELD};
pub use wmi::WmiSession;

use log::warn;
use thiserror::Error;

use crate::error::{ConfigError, ConnectionError, Result, TransportError};
use crate::transport::{Row, TransportKind};

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Why a connect attempt failed, and whether trying again can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectFailure {
    /// The credential was refused; another credential may work.
    #[error("credentials rejected: {detail}")]
    CredentialsRejected { detail: String },

    /// Transient network problem.
    #[error("host unreachable: {detail}")]
    HostUnreachable { detail: String },

    /// The host will never accept this transport.
    #[error("protocol unavailable on host: {detail}")]
    ProtocolUnavailable { detail: String },

    /// Unrecognised failure, treated as retryable.
    #[error("unclassified failure: {detail}")]
    Ambiguous { detail: String },
}

impl ConnectFailure {
    /// Whether a different credential or a later attempt may succeed.
    pub fn retryable(&self) -> bool {
        !matches!(self, ConnectFailure::ProtocolUnavailable { .. })
    }

    /// Human-readable detail.
    pub fn detail(&self) -> &str {
        match self {
            ConnectFailure::CredentialsRejected { detail }
            | ConnectFailure::HostUnreachable { detail }
            | ConnectFailure::ProtocolUnavailable { detail }
            | ConnectFailure::Ambiguous { detail } => detail,
        }
    }
}

/// Reject a zero limit before any I/O.
pub(crate) fn check_limit(limit: Option<usize>) -> Result<()> {
    match limit {
        Some(0) => Err(ConfigError::InvalidLimit { limit: 0 }.into()),
        _ => Ok(()),
    }
}

/// A session over one of the supported transports.
pub enum Session {
    Ssh(ShellSession),
    Wmi(WmiSession),
    Snmp(SnmpSession),
}

impl Session {
    /// Transport kind of this session.
    pub fn kind(&self) -> TransportKind {
        match self {
            Session::Ssh(_) => TransportKind::Ssh,
            Session::Wmi(_) => TransportKind::Wmi,
            Session::Snmp(_) => TransportKind::Snmp,
        }
    }

    /// Host this session talks to.
    pub fn host(&self) -> &str {
        match self {
            Session::Ssh(s) => s.host(),
            Session::Wmi(s) => s.host(),
            Session::Snmp(s) => s.host(),
        }
    }

    /// User (or community) the session authenticated as.
    pub fn user(&self) -> &str {
        match self {
            Session::Ssh(s) => s.user(),
            Session::Wmi(s) => s.user(),
            Session::Snmp(s) => s.user(),
        }
    }

    /// Perform the handshake.
    pub async fn connect(&mut self) -> std::result::Result<(), ConnectFailure> {
        match self {
            Session::Ssh(s) => s.connect().await,
            Session::Wmi(s) => s.connect().await,
            Session::Snmp(s) => s.connect().await,
        }
    }

    /// Run one query or command.
    ///
    /// `limit` caps the number of rows and must be positive.
    pub async fn run(&mut self, query: &str, limit: Option<usize>) -> Result<Vec<Row>> {
        check_limit(limit)?;
        match self {
            Session::Ssh(s) => s.run(query, limit).await,
            Session::Wmi(s) => s.run(query, limit).await,
            Session::Snmp(s) => s.run(query, limit).await,
        }
    }

    /// First row of a query, if any.
    pub async fn value_at(&mut self, query: &str) -> Result<Option<Row>> {
        Ok(self.run(query, Some(1)).await?.into_iter().next())
    }

    /// Close the session. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        match self {
            Session::Ssh(s) => s.disconnect().await,
            Session::Wmi(s) => s.disconnect().await,
            Session::Snmp(s) => s.disconnect().await,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        match self {
            Session::Ssh(s) => s.state(),
            Session::Wmi(s) => s.state(),
            Session::Snmp(s) => s.state(),
        }
    }

    /// Check if the session is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Whether retrying this credential against this kind is worthwhile.
    pub fn is_retryable(&self) -> bool {
        match self {
            Session::Ssh(s) => s.is_retryable(),
            Session::Wmi(s) => s.is_retryable(),
            Session::Snmp(s) => s.is_retryable(),
        }
    }

    /// The shell variant, if this is one.
    pub fn as_shell_mut(&mut self) -> Option<&mut ShellSession> {
        match self {
            Session::Ssh(s) => Some(s),
            _ => None,
        }
    }

    /// The WMI variant, if this is one.
    pub fn as_wmi_mut(&mut self) -> Option<&mut WmiSession> {
        match self {
            Session::Wmi(s) => Some(s),
            _ => None,
        }
    }
}

/// Map a collaborator error raised during connect to a failure class.
pub(crate) fn classify(error: &TransportError) -> ConnectFailure {
    let detail = error.to_string();
    match error {
        TransportError::AuthenticationFailed { .. }
        | TransportError::AccessDenied { .. }
        | TransportError::Key(_) => ConnectFailure::CredentialsRejected { detail },

        TransportError::HostKeyChanged { .. }
        | TransportError::HostKeyUnknown { .. }
        | TransportError::KnownHosts(_)
        | TransportError::Refused { .. } => ConnectFailure::ProtocolUnavailable { detail },

        TransportError::ConnectionFailed { .. }
        | TransportError::Timeout(_)
        | TransportError::Io(_)
        | TransportError::Disconnected
        | TransportError::Ssh(russh::Error::Disconnect | russh::Error::SendError) => {
            ConnectFailure::HostUnreachable { detail }
        }

        TransportError::Ssh(_) | TransportError::Other { .. } => {
            warn!("session: unclassified connect failure: {}", detail);
            ConnectFailure::Ambiguous { detail }
        }
    }
}

/// Fail with `NotConnected` unless `state` is connected.
pub(crate) fn ensure_connected(state: SessionState) -> Result<()> {
    match state {
        SessionState::Connected => Ok(()),
        SessionState::Disconnected => Err(ConnectionError::NotConnected.into()),
    }
}
