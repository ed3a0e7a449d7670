//! Management-object query session.

use log::{debug, info};

use super::{ConnectFailure, SessionState, classify, ensure_connected};
use crate::error::Result;
use crate::transport::{Row, WmiBackend};

/// A WMI session. Rows are returned as produced by the collaborator.
pub struct WmiSession {
    host: String,
    user: String,
    backend: Box<dyn WmiBackend>,
    state: SessionState,
    retryable: bool,
}

impl WmiSession {
    /// Create a disconnected session.
    pub fn new(host: impl Into<String>, user: impl Into<String>, backend: Box<dyn WmiBackend>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            backend,
            state: SessionState::Disconnected,
            retryable: true,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub(super) async fn connect(&mut self) -> std::result::Result<(), ConnectFailure> {
        debug!("wmi: connecting to {} as {}", self.host, self.user);
        match self.backend.connect().await {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!("wmi: connected to {} as {}", self.host, self.user);
                Ok(())
            }
            Err(e) => {
                let failure = classify(&e);
                self.retryable = failure.retryable();
                Err(failure)
            }
        }
    }

    pub(super) async fn run(&mut self, query: &str, limit: Option<usize>) -> Result<Vec<Row>> {
        ensure_connected(self.state)?;
        debug!("wmi: {}: {}", self.host, query);

        let mut rows = self.backend.query(query).await?;
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    /// Subkey names below a registry path.
    pub async fn registry_keys(&mut self, path: &str) -> Result<Vec<String>> {
        ensure_connected(self.state)?;
        debug!("wmi: {}: enumerating {}", self.host, path);
        Ok(self.backend.registry_keys(path).await?)
    }

    /// Values stored at a registry path.
    pub async fn registry_values(&mut self, path: &str) -> Result<Row> {
        ensure_connected(self.state)?;
        Ok(self.backend.registry_values(path).await?)
    }

    pub(super) async fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        if let Err(e) = self.backend.disconnect().await {
            debug!("wmi: {}: disconnect failed: {}", self.host, e);
        }
        self.state = SessionState::Disconnected;
    }
}
