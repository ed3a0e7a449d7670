//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::Endpoint;
use crate::config::Credential;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and learn unknown keys, reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// SSH connection configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,

    /// Connection and inactivity timeout.
    pub timeout: Duration,

    /// Request a PTY for exec channels so elevation prompts reach stdout.
    pub request_pty: bool,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Derive a per-attempt config from this template.
    ///
    /// A key file takes precedence over the secret, which then serves as
    /// the key's passphrase.
    pub fn for_credential(&self, endpoint: &Endpoint, credential: &Credential) -> Self {
        let secret = credential
            .secret
            .as_ref()
            .map(|s| SecretString::from(s.expose_secret().to_owned()));

        let auth = match (&credential.key_file, secret) {
            (Some(path), passphrase) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase,
            },
            (None, Some(password)) => AuthMethod::Password(password),
            (None, None) => AuthMethod::None,
        };

        Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            username: credential.user.clone(),
            auth,
            ..self.clone()
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            auth: AuthMethod::None,
            timeout: Duration::from_secs(30),
            request_pty: true,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

/// Authentication method for SSH connections.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// No authentication (for testing only).
    None,

    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}
