//! Counter-polling session.

use futures_util::StreamExt;
use log::{debug, info};

use super::{ConnectFailure, SessionState, classify, ensure_connected};
use crate::error::{Result, TransportError};
use crate::transport::{Row, SnmpBackend};

/// Field holding the object identifier in SNMP rows.
pub const OID_FIELD: &str = "oid";
/// Field holding the rendered value in SNMP rows.
pub const VALUE_FIELD: &str = "value";

/// An SNMP session. Queries are OID prefixes walked in order.
pub struct SnmpSession {
    host: String,
    community: String,
    backend: Box<dyn SnmpBackend>,
    state: SessionState,
    retryable: bool,
}

impl SnmpSession {
    /// Create a disconnected session.
    pub fn new(host: impl Into<String>, community: impl Into<String>, backend: Box<dyn SnmpBackend>) -> Self {
        Self {
            host: host.into(),
            community: community.into(),
            backend,
            state: SessionState::Disconnected,
            retryable: true,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.community
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub(super) async fn connect(&mut self) -> std::result::Result<(), ConnectFailure> {
        debug!("snmp: preparing client for {}", self.host);
        match self.backend.connect().await {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!("snmp: ready for {}", self.host);
                Ok(())
            }
            // Agents drop requests with an unknown community
            Err(TransportError::Timeout(after)) => {
                self.retryable = true;
                Err(ConnectFailure::CredentialsRejected {
                    detail: format!("no response within {after:?}"),
                })
            }
            Err(e) => {
                let failure = classify(&e);
                self.retryable = failure.retryable();
                Err(failure)
            }
        }
    }

    pub(super) async fn run(&mut self, prefix: &str, limit: Option<usize>) -> Result<Vec<Row>> {
        ensure_connected(self.state)?;
        debug!("snmp: {}: walking {}", self.host, prefix);

        let mut rows = Vec::new();
        let mut walk = self.backend.walk(prefix);
        while let Some(varbind) = walk.next().await {
            let varbind = varbind?;
            rows.push(Row::from([
                (OID_FIELD.to_string(), varbind.oid),
                (VALUE_FIELD.to_string(), varbind.value),
            ]));
            if limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
        }
        Ok(rows)
    }

    pub(super) async fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSnmp;
    use crate::transport::Varbind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_timeout_means_wrong_community() {
        let backend = MockSnmp::new().fail_connect(|| TransportError::Timeout(Duration::from_secs(2)));
        let mut session = SnmpSession::new("sw01", "privat", Box::new(backend));

        let failure = session.connect().await.unwrap_err();
        assert!(matches!(failure, ConnectFailure::CredentialsRejected { .. }));
        assert!(session.is_retryable());
    }

    #[tokio::test]
    async fn test_walk_error_propagates() {
        let backend = MockSnmp::new().walk_error("1.3.6.1.2.1.25.2.3", || TransportError::Disconnected);
        let mut session = SnmpSession::new("sw01", "public", Box::new(backend));
        session.connect().await.unwrap();

        let err = session.run("1.3.6.1.2.1.25.2.3", None).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_walk_returns_all_rows() {
        let backend = MockSnmp::new().walk(
            "1.3.6.1.2.1.1",
            vec![
                Varbind::new("1.3.6.1.2.1.1.1.0", "Cisco IOS"),
                Varbind::new("1.3.6.1.2.1.1.5.0", "core-sw"),
            ],
        );
        let mut session = SnmpSession::new("sw01", "public", Box::new(backend));
        session.connect().await.unwrap();

        let rows = session.run("1.3.6.1.2.1.1", None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][VALUE_FIELD], "core-sw");
    }
}
