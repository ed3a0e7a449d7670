//! Credential and transport selection.
//!
//! `connect` walks credentials in order and, for each, the kinds it may
//! use. The first attempt that connects wins. A kind that fails in a way
//! no other credential can fix is marked unavailable and skipped for the
//! rest of the target's life. SNMP is never marked: a wrong community and
//! an absent agent look the same. A credential whose elevation secret was
//! rejected on a live session is not tried again over that kind.

use std::sync::Arc;

use log::{debug, info, warn};

use super::Target;
use crate::config::Credential;
use crate::error::{ConnectionError, Result};
use crate::session::{ConnectFailure, Session, ShellSession, SnmpSession, WmiSession};
use crate::transport::{Endpoint, TransportKind, probe};

/// One connect attempt and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub user: String,
    pub kind: TransportKind,
    pub outcome: std::result::Result<(), ConnectFailure>,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl Target {
    /// Try credentials and kinds until one connects.
    ///
    /// Returns `Ok(false)` when every combination failed; the reasons are
    /// in [`attempts`](Target::attempts). A successful connect drops any
    /// previously bound profiler, since it belonged to the old session.
    pub async fn connect(&mut self) -> Result<bool> {
        if self.is_connected() {
            return Err(ConnectionError::AlreadyConnected.into());
        }
        if self.credentials.is_empty() {
            return Err(ConnectionError::MissingCredentials.into());
        }

        let credentials = self.credentials.clone();
        for (index, credential) in credentials.iter().enumerate() {
            for kind in credential.permitted_kinds(&self.config.default_kinds) {
                if self.unavailable.contains(&kind) {
                    debug!("connect: {}: skipping {} for {}, marked unavailable", self.host, kind, credential.user);
                    continue;
                }
                if self.spent.contains(&(index, kind)) {
                    debug!("connect: {}: skipping {} for {}, secret rejected earlier", self.host, kind, credential.user);
                    continue;
                }

                let port = self.config.port(kind);
                if self.config.probe_ports
                    && !probe::reachable(&self.host, kind, port, self.config.timeout()).await
                {
                    self.record(
                        credential,
                        kind,
                        Err(ConnectFailure::HostUnreachable {
                            detail: format!("port {port} closed"),
                        }),
                    );
                    continue;
                }

                let Some(mut session) = self.open(credential, kind, port) else {
                    self.record(
                        credential,
                        kind,
                        Err(ConnectFailure::ProtocolUnavailable {
                            detail: format!("no {kind} collaborator available"),
                        }),
                    );
                    self.mark_unavailable(kind);
                    continue;
                };

                match session.connect().await {
                    Ok(()) => {
                        info!("connect: {}: connected as {} over {}", self.host, credential.user, kind);
                        self.record(credential, kind, Ok(()));
                        self.session = Some(session);
                        self.connected_with = Some(index);
                        self.profiler = None;
                        return Ok(true);
                    }
                    Err(failure) => {
                        let retryable = session.is_retryable();
                        self.record(credential, kind, Err(failure));
                        if !retryable {
                            self.mark_unavailable(kind);
                        }
                    }
                }
            }
        }

        warn!(
            "connect: {}: no credential connected after {} attempt(s)",
            self.host,
            self.attempts.len()
        );
        Ok(false)
    }

    fn open(&self, credential: &Arc<Credential>, kind: TransportKind, port: u16) -> Option<Session> {
        let endpoint = Endpoint {
            host: self.host.clone(),
            port,
        };
        let session = match kind {
            TransportKind::Ssh => Session::Ssh(ShellSession::new(
                self.host.clone(),
                Arc::clone(credential),
                self.backends.shell(&endpoint, credential)?,
                Arc::clone(&self.patterns),
            )),
            TransportKind::Wmi => Session::Wmi(WmiSession::new(
                self.host.clone(),
                credential.user.clone(),
                self.backends.wmi(&endpoint, credential)?,
            )),
            // The user field carries the community string
            TransportKind::Snmp => Session::Snmp(SnmpSession::new(
                self.host.clone(),
                credential.user.clone(),
                self.backends.snmp(&endpoint, credential)?,
            )),
        };
        Some(session)
    }

    fn record(&mut self, credential: &Credential, kind: TransportKind, outcome: std::result::Result<(), ConnectFailure>) {
        if let Err(failure) = &outcome {
            warn!("connect: {}: {} over {} failed: {}", self.host, credential.user, kind, failure);
        }
        self.attempts.push(Attempt {
            user: credential.user.clone(),
            kind,
            outcome,
        });
    }

    /// Remember a credential found unusable after connecting.
    pub(super) fn mark_spent(&mut self, session: &Session) {
        let Some(index) = self.connected_with.take() else {
            return;
        };
        if !session.is_retryable() && self.spent.insert((index, session.kind())) {
            warn!(
                "connect: {}: {} over {} will not be tried again",
                self.host,
                session.user(),
                session.kind()
            );
        }
    }

    fn mark_unavailable(&mut self, kind: TransportKind) {
        if kind.is_circuit_breakable() && self.unavailable.insert(kind) {
            warn!("connect: {}: {} marked unavailable", self.host, kind);
        }
    }
}
