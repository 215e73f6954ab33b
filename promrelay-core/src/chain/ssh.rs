//! SSH hop transport built on `russh`
//!
//! The first hop is a plain TCP connection. Each following hop runs its SSH
//! session inside a `direct-tcpip` channel of the previous hop, so nothing but
//! the first relay needs to be reachable from this host.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::keys::{HashAlg, PrivateKey, PrivateKeyWithHashAlg, decode_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

use super::{ChainError, ChainResult, HopConnector, HopTransport};
use crate::exec::{CapturedOutput, ExecError};
use crate::models::{Hop, HopAddress, HopCredential, HostKeyPolicy};

/// Default time allowed for dialling and handshaking one hop
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential ready to present to the server
enum ResolvedCredential {
    Password(SecretString),
    Key(PrivateKey),
}

/// Connects hops over SSH
#[derive(Clone)]
pub struct SshConnector {
    config: Arc<client::Config>,
    connect_timeout: Duration,
}

impl SshConnector {
    /// Creates a connector with default settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Arc::new(client::Config::default()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the per-hop dial and handshake timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn handshake(
        &self,
        index: usize,
        hop: &Hop,
        via: Option<&SshTransport>,
    ) -> ChainResult<Handle<HopHandler>> {
        let address = hop.address.to_string();
        let dial_error = |reason: String| ChainError::Dial {
            hop: index,
            address: address.clone(),
            reason,
        };

        let rejected = Arc::new(OnceLock::new());
        let handler = HopHandler {
            policy: hop.host_key_policy.clone(),
            rejected: Arc::clone(&rejected),
        };

        let session = match via {
            None => {
                let stream = tokio::time::timeout(
                    self.connect_timeout,
                    TcpStream::connect((hop.address.host.as_str(), hop.address.port)),
                )
                .await
                .map_err(|_| dial_error(format!("timed out after {:?}", self.connect_timeout)))?
                .map_err(|e| dial_error(e.to_string()))?;
                tokio::time::timeout(
                    self.connect_timeout,
                    client::connect_stream(Arc::clone(&self.config), stream, handler),
                )
                .await
            }
            Some(relay) => {
                let channel = tokio::time::timeout(
                    self.connect_timeout,
                    relay.handle.channel_open_direct_tcpip(
                        hop.address.host.clone(),
                        u32::from(hop.address.port),
                        "127.0.0.1",
                        0,
                    ),
                )
                .await
                .map_err(|_| {
                    dial_error(format!(
                        "tunnel through {} timed out after {:?}",
                        relay.address, self.connect_timeout
                    ))
                })?
                .map_err(|e| dial_error(format!("tunnel through {}: {e}", relay.address)))?;
                tokio::time::timeout(
                    self.connect_timeout,
                    client::connect_stream(Arc::clone(&self.config), channel.into_stream(), handler),
                )
                .await
            }
        };

        let session = session.map_err(|_| ChainError::Handshake {
            hop: index,
            address: address.clone(),
            reason: format!("timed out after {:?}", self.connect_timeout),
        })?;

        session.map_err(|e| match rejected.get() {
            Some(fingerprint) => ChainError::HostKeyRejected {
                hop: index,
                address: address.clone(),
                fingerprint: fingerprint.clone(),
            },
            None => ChainError::Handshake {
                hop: index,
                address: address.clone(),
                reason: e.to_string(),
            },
        })
    }
}

impl std::fmt::Debug for SshConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnector")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HopConnector for SshConnector {
    type Transport = SshTransport;

    #[instrument(skip(self, hop, via), fields(address = %hop.address, user = %hop.user))]
    async fn connect(
        &self,
        index: usize,
        hop: &Hop,
        via: Option<&SshTransport>,
    ) -> ChainResult<SshTransport> {
        let credential = resolve_credential(index, &hop.credential).await?;
        let mut handle = self.handshake(index, hop, via).await?;

        let auth_error = || ChainError::Auth {
            hop: index,
            address: hop.address.to_string(),
            user: hop.user.clone(),
            method: hop.credential.method(),
        };

        let result = match credential {
            ResolvedCredential::Key(key) => {
                let hash = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(|_| auth_error())?
                    .flatten();
                handle
                    .authenticate_publickey(
                        hop.user.clone(),
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash),
                    )
                    .await
            }
            ResolvedCredential::Password(password) => {
                handle
                    .authenticate_password(hop.user.clone(), password.expose_secret())
                    .await
            }
        };

        match result {
            Ok(outcome) if outcome.success() => {}
            Ok(_) => return Err(auth_error()),
            Err(e) => {
                debug!(error = %e, "Authentication exchange failed");
                return Err(auth_error());
            }
        }

        debug!(method = hop.credential.method(), "Authenticated");
        Ok(SshTransport {
            handle,
            address: hop.address.clone(),
            index,
            close_timeout: self.connect_timeout,
        })
    }
}

/// An authenticated SSH connection to one hop
pub struct SshTransport {
    handle: Handle<HopHandler>,
    address: HopAddress,
    index: usize,
    close_timeout: Duration,
}

impl SshTransport {
    /// Address of the hop
    #[must_use]
    pub const fn address(&self) -> &HopAddress {
        &self.address
    }
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("address", &self.address)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HopTransport for SshTransport {
    async fn run_command(&self, command: &str) -> Result<CapturedOutput, ExecError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| ExecError::Session {
                reason: e.to_string(),
            })?;

        let result = drain(&mut channel, command).await;

        if let Err(e) = channel.close().await {
            debug!(hop = self.index, error = %e, "Session channel already closed");
        }
        result
    }

    async fn close(self) {
        let Self {
            handle,
            index,
            close_timeout,
            ..
        } = self;

        if let Err(e) = handle.disconnect(Disconnect::ByApplication, "", "en").await {
            debug!(hop = index, error = %e, "Disconnect failed");
        }

        // The handle resolves once the session task has flushed the
        // disconnect and shut its stream down.
        match tokio::time::timeout(close_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(hop = index, error = %e, "Session ended with an error"),
            Err(_) => warn!(
                hop = index,
                timeout = ?close_timeout,
                "Session did not end in time, abandoning it"
            ),
        }
    }
}

async fn drain(channel: &mut Channel<Msg>, command: &str) -> Result<CapturedOutput, ExecError> {
    channel
        .exec(true, command)
        .await
        .map_err(|e| ExecError::Execution {
            reason: e.to_string(),
        })?;

    let mut captured = CapturedOutput::default();
    while let Some(message) = channel.wait().await {
        match message {
            ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. } => {
                captured.output.extend_from_slice(&data);
            }
            ChannelMsg::ExitStatus { exit_status } => captured.exit_status = Some(exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                captured.exit_signal = Some(format!("{signal_name:?}"));
            }
            ChannelMsg::Failure => {
                return Err(ExecError::Execution {
                    reason: "server refused to execute the command".to_string(),
                });
            }
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    Ok(captured)
}

async fn resolve_credential(
    index: usize,
    credential: &HopCredential,
) -> ChainResult<ResolvedCredential> {
    match credential {
        HopCredential::Password(password) => Ok(ResolvedCredential::Password(password.clone())),
        HopCredential::PrivateKey { path, passphrase } => {
            let display = path.display().to_string();
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ChainError::KeyFileRead {
                    hop: index,
                    path: display.clone(),
                    source,
                })?;

            decode_secret_key(&text, passphrase.as_ref().map(|p| p.expose_secret()))
                .map(ResolvedCredential::Key)
                .map_err(|e| {
                    if passphrase.is_some() {
                        ChainError::Passphrase {
                            hop: index,
                            path: display,
                            reason: e.to_string(),
                        }
                    } else {
                        ChainError::KeyParse {
                            hop: index,
                            path: display,
                            reason: e.to_string(),
                        }
                    }
                })
        }
    }
}

/// Client handler that enforces the hop's host key policy
struct HopHandler {
    policy: HostKeyPolicy,
    rejected: Arc<OnceLock<String>>,
}

impl client::Handler for HopHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        if self.policy.accepts(&fingerprint) {
            debug!(%fingerprint, "Host key accepted");
            Ok(true)
        } else {
            let _ = self.rejected.set(fingerprint);
            Ok(false)
        }
    }
}
