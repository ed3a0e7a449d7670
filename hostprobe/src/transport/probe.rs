//! Reachability probing on fixed ports.

use std::time::Duration;

use log::debug;
use tokio::net::TcpStream;

use super::TransportKind;

/// Check whether `host:port` accepts TCP connections within `timeout`.
pub async fn port_open(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("probe: {}:{} refused: {}", host, port, e);
            false
        }
        Err(_) => {
            debug!("probe: {}:{} timed out after {:?}", host, port, timeout);
            false
        }
    }
}

/// Check whether `kind` looks reachable on `host`.
///
/// UDP kinds cannot be probed without speaking the protocol and are
/// assumed reachable.
pub async fn reachable(host: &str, kind: TransportKind, port: u16, timeout: Duration) -> bool {
    if !kind.is_tcp() {
        return true;
    }
    port_open(host, port, timeout).await
}
