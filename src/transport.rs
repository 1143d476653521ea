//! Connected socket factory
//!
//! Opens the datagram socket a server connection runs on: create, bind
//! the optional local port, connect to the endpoint's `host:port`. Any
//! failing step tears the socket down. DTLS session establishment
//! belongs to the transport layer above; both kinds share the same
//! connected UDP socket underneath.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::error::{Error, Result};
use crate::url::Endpoint;

/// Kind of socket to open for a server connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Plain UDP
    Udp,
    /// DTLS over UDP
    Dtls,
}

/// Local socket settings; opaque to the rest of the crate
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Local address to bind; defaults to the wildcard address of the
    /// remote's family
    pub bind_address: Option<IpAddr>,
}

fn resolve_remote(endpoint: &Endpoint) -> Result<SocketAddr> {
    let port = match endpoint.port() {
        Some(port) => port.parse::<u16>().map_err(|_| {
            log::error!("invalid port number: {}", port);
            Error::Transport(format!("invalid port number: {}", port))
        })?,
        None => endpoint.default_port().ok_or_else(|| {
            log::error!("no default port for scheme {}", endpoint.scheme());
            Error::Transport(format!(
                "no default port for scheme {}",
                endpoint.scheme()
            ))
        })?,
    };

    (endpoint.host(), port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            log::error!("could not resolve host {}", endpoint.host());
            Error::Transport(format!("could not resolve host {}", endpoint.host()))
        })
}

/// Open a socket for `endpoint` and connect it.
///
/// `bind_port` fixes the local port when given; otherwise the system
/// picks an ephemeral one. The socket is dropped on any failure.
pub fn create_connected_socket(
    _kind: SocketKind,
    bind_port: Option<u16>,
    config: &TransportConfig,
    endpoint: &Endpoint,
) -> Result<UdpSocket> {
    let remote = resolve_remote(endpoint)?;

    let local_ip = config.bind_address.unwrap_or(match remote {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    });

    let socket = UdpSocket::bind((local_ip, bind_port.unwrap_or(0))).map_err(|err| {
        log::error!("could not bind socket to port {:?}: {}", bind_port, err);
        Error::from(err)
    })?;

    socket.connect(remote).map_err(|err| {
        log::error!("could not connect to {}:{}: {}", endpoint.host(), remote.port(), err);
        Error::from(err)
    })?;

    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_socket_connects_to_loopback() {
        let endpoint = Endpoint::parse("coap://127.0.0.1:5683").unwrap();
        let socket = create_connected_socket(
            SocketKind::Udp,
            None,
            &TransportConfig::default(),
            &endpoint,
        )
        .unwrap();
        assert_eq!(socket.peer_addr().unwrap().port(), 5683);
    }

    #[test]
    fn test_dtls_kind_uses_same_datagram_socket() {
        let endpoint = Endpoint::parse("coaps://127.0.0.1").unwrap();
        let socket = create_connected_socket(
            SocketKind::Dtls,
            None,
            &TransportConfig::default(),
            &endpoint,
        )
        .unwrap();
        // no explicit port in the URL, so the scheme default applies
        assert_eq!(socket.peer_addr().unwrap().port(), 5684);
    }

    #[test]
    fn test_out_of_range_port_rejected() {
        let endpoint = Endpoint::parse("coap://127.0.0.1:99999").unwrap();
        let result = create_connected_socket(
            SocketKind::Udp,
            None,
            &TransportConfig::default(),
            &endpoint,
        );
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn test_unknown_scheme_without_port_rejected() {
        let endpoint = Endpoint::parse("http://127.0.0.1").unwrap();
        let result = create_connected_socket(
            SocketKind::Udp,
            None,
            &TransportConfig::default(),
            &endpoint,
        );
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
