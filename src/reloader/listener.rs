//! Listener types handed out by the [`Reloader`](crate::Reloader).

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReloadError;

/// Network family of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// TCP over IPv4 or IPv6.
    Tcp,
    /// TCP over IPv4 only.
    Tcp4,
    /// TCP over IPv6 only.
    Tcp6,
    /// Unix domain stream socket.
    Unix,
}

impl Network {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
            Network::Unix => "unix",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ReloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            "unix" => Ok(Network::Unix),
            other => Err(ReloadError::UnsupportedNetwork {
                network: other.to_string(),
            }),
        }
    }
}

/// An accepting socket, ready for use with tokio.
#[derive(Debug)]
pub enum Listener {
    /// TCP listener.
    Tcp(tokio::net::TcpListener),
    /// Unix domain socket listener.
    #[cfg(unix)]
    Unix(tokio::net::UnixListener),
}

impl Listener {
    /// Network name as reported in logs (`tcp` or `unix`).
    pub fn network(&self) -> &'static str {
        match self {
            Listener::Tcp(_) => "tcp",
            #[cfg(unix)]
            Listener::Unix(_) => "unix",
        }
    }

    /// Bound address of a TCP listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Listener::Tcp(l) => l.local_addr().ok(),
            #[cfg(unix)]
            Listener::Unix(_) => None,
        }
    }

    /// Bound address as text: `ip:port` or the socket path.
    pub fn address(&self) -> String {
        match self {
            Listener::Tcp(l) => l
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            #[cfg(unix)]
            Listener::Unix(l) => l
                .local_addr()
                .ok()
                .and_then(|a| a.as_pathname().map(|p| p.display().to_string()))
                .unwrap_or_default(),
        }
    }
}

impl From<tokio::net::TcpListener> for Listener {
    fn from(l: tokio::net::TcpListener) -> Self {
        Listener::Tcp(l)
    }
}

#[cfg(unix)]
impl From<tokio::net::UnixListener> for Listener {
    fn from(l: tokio::net::UnixListener) -> Self {
        Listener::Unix(l)
    }
}

/// Blocking socket kept by the registry; every handed out [`Listener`] is a dup of it.
#[derive(Debug)]
pub(crate) enum StdListener {
    Tcp(std::net::TcpListener),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixListener),
}

impl StdListener {
    pub(crate) fn bind(network: Network, address: &str) -> Result<Self, ReloadError> {
        let bind_err = |source| ReloadError::Bind {
            network: network.as_str(),
            address: address.to_string(),
            source,
        };

        match network {
            Network::Unix => Self::bind_unix(address).map_err(bind_err),
            tcp => {
                let addrs = resolve(tcp, address).map_err(bind_err)?;
                std::net::TcpListener::bind(&addrs[..])
                    .map(StdListener::Tcp)
                    .map_err(bind_err)
            }
        }
    }

    #[cfg(unix)]
    fn bind_unix(path: &str) -> io::Result<Self> {
        std::os::unix::net::UnixListener::bind(path).map(StdListener::Unix)
    }

    #[cfg(not(unix))]
    fn bind_unix(_path: &str) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not available on this platform",
        ))
    }

    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        match self {
            StdListener::Tcp(l) => l.try_clone().map(StdListener::Tcp),
            #[cfg(unix)]
            StdListener::Unix(l) => l.try_clone().map(StdListener::Unix),
        }
    }

    /// Registers the socket with the tokio reactor; must run inside a runtime.
    pub(crate) fn into_tokio(self) -> io::Result<Listener> {
        match self {
            StdListener::Tcp(l) => {
                l.set_nonblocking(true)?;
                tokio::net::TcpListener::from_std(l).map(Listener::Tcp)
            }
            #[cfg(unix)]
            StdListener::Unix(l) => {
                l.set_nonblocking(true)?;
                tokio::net::UnixListener::from_std(l).map(Listener::Unix)
            }
        }
    }

    pub(crate) fn local_address(&self) -> String {
        match self {
            StdListener::Tcp(l) => l.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            #[cfg(unix)]
            StdListener::Unix(l) => l
                .local_addr()
                .ok()
                .and_then(|a| a.as_pathname().map(|p| p.display().to_string()))
                .unwrap_or_default(),
        }
    }

    #[cfg(unix)]
    pub(crate) fn as_raw_fd(&self) -> std::os::fd::RawFd {
        use std::os::fd::AsRawFd;

        match self {
            StdListener::Tcp(l) => l.as_raw_fd(),
            StdListener::Unix(l) => l.as_raw_fd(),
        }
    }
}

/// Resolves a TCP address; `:port` means every interface of the family.
///
/// For `tcp` the IPv6 wildcard comes first (dual-stack where the host allows it),
/// with the IPv4 wildcard as fallback on hosts without IPv6.
fn resolve(network: Network, address: &str) -> io::Result<Vec<SocketAddr>> {
    let candidates = match (address.strip_prefix(':'), network) {
        (Some(port), Network::Tcp) => vec![format!("[::]:{port}"), format!("0.0.0.0:{port}")],
        (Some(port), Network::Tcp6) => vec![format!("[::]:{port}")],
        (Some(port), _) => vec![format!("0.0.0.0:{port}")],
        (None, _) => vec![address.to_string()],
    };

    let mut addrs = Vec::new();
    for candidate in &candidates {
        addrs.extend(candidate.to_socket_addrs()?.filter(|a| match network {
            Network::Tcp4 => a.is_ipv4(),
            Network::Tcp6 => a.is_ipv6(),
            _ => true,
        }));
    }

    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {network} address for {address}"),
        ));
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn networks_parse() {
        assert_eq!("tcp4".parse::<Network>().unwrap(), Network::Tcp4);
        assert_eq!(Network::Unix.to_string(), "unix");
        assert!(matches!(
            "udp".parse::<Network>(),
            Err(ReloadError::UnsupportedNetwork { network }) if network == "udp"
        ));
    }

    #[test]
    fn family_filters_apply() {
        let addrs = resolve(Network::Tcp4, ":0").unwrap();
        assert!(addrs.iter().all(SocketAddr::is_ipv4));

        let err = resolve(Network::Tcp6, "127.0.0.1:0").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
    }

    #[test]
    fn bare_port_prefers_the_dual_stack_wildcard() {
        let addrs = resolve(Network::Tcp, ":8080").unwrap();
        assert_eq!(
            addrs,
            vec![
                "[::]:8080".parse::<SocketAddr>().unwrap(),
                "0.0.0.0:8080".parse::<SocketAddr>().unwrap(),
            ]
        );

        // Falls back to IPv4 when the host has no IPv6.
        let socket = StdListener::bind(Network::Tcp, ":0").unwrap();
        let StdListener::Tcp(l) = socket else {
            panic!("expected a tcp listener");
        };
        assert!(l.local_addr().unwrap().ip().is_unspecified());
    }

    #[tokio::test]
    async fn bound_sockets_become_tokio_listeners() {
        let socket = StdListener::bind(Network::Tcp, "127.0.0.1:0").unwrap();
        let address = socket.local_address();
        let listener = socket.into_tokio().unwrap();

        assert_eq!(listener.network(), "tcp");
        assert_eq!(listener.address(), address);
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }
}
