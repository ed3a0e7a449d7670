//! Interactive shell session.

use std::sync::Arc;

use log::{debug, info, warn};

use super::{ConnectFailure, SessionState, classify, ensure_connected};
use crate::channel::{ElevationPatterns, Exchange, ExchangeOutcome};
use crate::config::Credential;
use crate::error::Result;
use crate::transport::{Row, ShellBackend};

/// Field name of shell output rows.
pub const LINE_FIELD: &str = "line";

/// A shell session running one exec channel per command.
///
/// Commands that request elevation are answered with the credential's
/// secret. A rejected secret makes the session non-retryable.
pub struct ShellSession {
    host: String,
    credential: Arc<Credential>,
    backend: Box<dyn ShellBackend>,
    patterns: Arc<ElevationPatterns>,
    state: SessionState,
    retryable: bool,
    last_warnings: Vec<String>,
}

impl ShellSession {
    /// Create a disconnected session.
    pub fn new(
        host: impl Into<String>,
        credential: Arc<Credential>,
        backend: Box<dyn ShellBackend>,
        patterns: Arc<ElevationPatterns>,
    ) -> Self {
        Self {
            host: host.into(),
            credential,
            backend,
            patterns,
            state: SessionState::Disconnected,
            retryable: true,
            last_warnings: Vec::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.credential.user
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Warnings from the most recent command.
    pub fn last_warnings(&self) -> &[String] {
        &self.last_warnings
    }

    pub(super) async fn connect(&mut self) -> std::result::Result<(), ConnectFailure> {
        debug!("ssh: connecting to {} as {}", self.host, self.credential.user);
        match self.backend.connect().await {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!("ssh: connected to {} as {}", self.host, self.credential.user);
                Ok(())
            }
            Err(e) => {
                let failure = classify(&e);
                self.retryable = failure.retryable();
                Err(failure)
            }
        }
    }

    pub(super) async fn run(&mut self, command: &str, limit: Option<usize>) -> Result<Vec<Row>> {
        ensure_connected(self.state)?;
        debug!("ssh: {}: running {:?}", self.host, command);

        let mut channel = self.backend.exec(command).await?;
        let output = Exchange::new(&self.patterns, self.credential.secret.as_ref())
            .run(channel.as_mut(), limit)
            .await?;

        for warning in &output.warnings {
            warn!("ssh: {}: {:?}: {}", self.host, command, warning);
        }
        self.last_warnings = output.warnings;

        match output.outcome {
            ExchangeOutcome::Completed => {}
            ExchangeOutcome::ElevationUnavailable => {
                warn!("ssh: {}: {:?} needs elevation but no secret is configured", self.host, command);
            }
            ExchangeOutcome::ElevationRejected => {
                warn!("ssh: {}: elevation secret rejected for {}", self.host, self.credential.user);
                self.retryable = false;
            }
        }

        Ok(output
            .lines
            .into_iter()
            .map(|line| Row::from([(LINE_FIELD.to_string(), line)]))
            .collect())
    }

    pub(super) async fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        if let Err(e) = self.backend.disconnect().await {
            debug!("ssh: {}: disconnect failed: {}", self.host, e);
        }
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::mock::MockShell;
    use crate::session::Session;
    use tokio_test::assert_ok;

    fn session(backend: MockShell, secret: Option<&str>) -> Session {
        let mut credential = Credential::new("admin");
        if let Some(secret) = secret {
            credential = credential.with_secret(secret);
        }
        Session::Ssh(ShellSession::new(
            "web01",
            Arc::new(credential),
            Box::new(backend),
            Arc::new(ElevationPatterns::default()),
        ))
    }

    #[tokio::test]
    async fn test_rows_have_line_field() {
        let backend = MockShell::new().command("uname -r", &["6.1.0-18-amd64\n"]);
        let mut session = session(backend, None);
        assert_ok!(session.connect().await);

        let rows = session.run("uname -r", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][LINE_FIELD], "6.1.0-18-amd64");
    }

    #[tokio::test]
    async fn test_auth_failure_is_retryable() {
        let backend = MockShell::new().fail_connect(|| TransportError::AuthenticationFailed {
            user: "admin".to_string(),
        });
        let mut session = session(backend, None);

        let failure = session.connect().await.unwrap_err();
        assert!(matches!(failure, ConnectFailure::CredentialsRejected { .. }));
        assert!(session.is_retryable());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_host_key_change_is_not_retryable() {
        let backend = MockShell::new().fail_connect(|| TransportError::HostKeyChanged {
            host: "web01".to_string(),
            port: 22,
            line: 7,
        });
        let mut session = session(backend, None);

        let failure = session.connect().await.unwrap_err();
        assert!(matches!(failure, ConnectFailure::ProtocolUnavailable { .. }));
        assert!(!session.is_retryable());
    }

    #[tokio::test]
    async fn test_rejected_elevation_disables_retry() {
        let backend = MockShell::new().command(
            "sudo dmidecode -s system-serial-number",
            &["[sudo] password for admin: ", "\nSorry, try again.\n"],
        );
        let mut session = session(backend, Some("wrong"));
        assert_ok!(session.connect().await);

        let rows = session
            .run("sudo dmidecode -s system-serial-number", None)
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert!(!session.is_retryable());
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_missing_secret_yields_no_rows() {
        let backend = MockShell::new().command("sudo cat /etc/shadow", &["Password: ", "root:x\n"]);
        let mut session = session(backend, None);
        assert_ok!(session.connect().await);

        let rows = session.run("sudo cat /etc/shadow", None).await.unwrap();
        assert!(rows.is_empty());
        assert!(session.is_retryable());
    }

    #[tokio::test]
    async fn test_warnings_recorded() {
        let backend = MockShell::new().command(
            "find /etc -name '*.conf'",
            &["/etc/a.conf\n", "find: '/etc/ssl/private': Permission denied\n"],
        );
        let mut session = session(backend, None);
        assert_ok!(session.connect().await);

        let rows = session.run("find /etc -name '*.conf'", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        let shell = session.as_shell_mut().unwrap();
        assert_eq!(shell.last_warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_connection_is_fatal() {
        let backend = MockShell::new().command_dropped("df -PT", &["Filesystem Type\n", "/dev/sda1 ext4"]);
        let mut session = session(backend, None);
        assert_ok!(session.connect().await);

        let err = session.run("df -PT", None).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
