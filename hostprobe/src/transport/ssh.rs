//! SSH shell collaborator implemented with russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use super::{ChannelEvent, ShellBackend, ShellChannel};
use crate::error::TransportError;

/// SSH extended-data stream number for stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Shell collaborator over an SSH connection.
///
/// One connection is reused for every command; each command gets its own
/// exec channel.
pub struct SshBackend {
    config: SshConfig,

    /// The russh session handle (None until connected).
    session: Option<Handle<SshHandler>>,
}

impl SshBackend {
    /// Create an unconnected backend.
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Configuration used for this backend.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Authenticate with the server.
    async fn authenticate(
        session: &mut Handle<SshHandler>,
        config: &SshConfig,
    ) -> Result<(), TransportError> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                let hash_alg = session.best_supported_rsa_hash().await?.flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ShellBackend for SshBackend {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let config = &self.config;
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("ssh: connecting to {}", config.socket_addr());

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic one
            let stored = host_key_error.lock().ok().and_then(|mut slot| slot.take());
            match (stored, e) {
                (Some(hk_err), _) => hk_err,
                (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                },
                (None, e) => TransportError::Ssh(e),
            }
        })?;

        Self::authenticate(&mut session, config).await?;

        self.session = Some(session);
        Ok(())
    }

    async fn exec(&mut self, command: &str) -> Result<Box<dyn ShellChannel>, TransportError> {
        let session = self.session.as_ref().ok_or(TransportError::Disconnected)?;

        if session.is_closed() {
            return Err(TransportError::Disconnected);
        }

        let channel = session.channel_open_session().await?;

        if self.config.request_pty {
            channel
                .request_pty(false, "vt100", 511, 24, 0, 0, &[])
                .await?;
        }

        channel.exec(true, command).await?;

        Ok(Box::new(SshChannel {
            channel,
            closed: false,
        }))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(session) = self.session.take() {
            session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await?;
        }
        Ok(())
    }
}

/// Exec channel for a single command.
struct SshChannel {
    channel: Channel<Msg>,
    closed: bool,
}

#[async_trait]
impl ShellChannel for SshChannel {
    async fn next_event(&mut self) -> Result<Option<ChannelEvent>, TransportError> {
        if self.closed {
            return Ok(None);
        }

        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    return Ok(Some(ChannelEvent::Stdout(Bytes::copy_from_slice(&data))));
                }
                Some(ChannelMsg::ExtendedData { data, ext }) if ext == SSH_EXTENDED_DATA_STDERR => {
                    return Ok(Some(ChannelEvent::Stderr(Bytes::copy_from_slice(&data))));
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!("ssh: command exited with status {}", exit_status);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) => {
                    self.closed = true;
                    return Ok(None);
                }
                // Sender dropped before eof or close: the connection is gone
                None => {
                    self.closed = true;
                    return Err(TransportError::Disconnected);
                }
                Some(_) => {}
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.channel.data(data).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.channel.close().await?;
        }
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Detailed host-key error for connect() to surface.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if the host is not listed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
