//! Socket/transport builder: destination descriptor to channel pair.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpStream, UdpSocket, lookup_host};
use tracing::debug;

use crate::channel::{ChannelPair, FrameReader, FrameWriter};
use crate::config::TransportConfig;
use crate::error::{TlsError, TransportError};
use crate::url::{CotUrl, Scheme};

/// Resolves a destination into a concrete channel pair.
///
/// TLS destinations carry a client identity this builder does not have,
/// so they go through [`crate::tls::connect`] instead.
pub async fn resolve(
    url: &CotUrl,
    config: &TransportConfig,
) -> Result<ChannelPair, TransportError> {
    match url.scheme {
        Scheme::Tcp => Ok(split_tcp(tcp_connect(&url.host, url.port).await?)),
        Scheme::Tls => Err(TransportError::Tls(TlsError::Certificate(
            "tls destinations require a client identity; connect through the tls module".into(),
        ))),
        Scheme::Udp {
            broadcast,
            write_only,
        } => udp_channel(url, config, broadcast, write_only).await,
        Scheme::Log => log_channel(&url.host),
    }
}

/// Connects the underlying TCP leg for stream destinations, keeping
/// resolution failures distinct from connect failures.
pub(crate) async fn tcp_connect(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let addr = resolve_addr(host, port).await?;
    Ok(TcpStream::connect(addr).await?)
}

/// Splits a connected TCP stream into a channel pair. Also used by the
/// TLS builder for its underlying leg.
pub(crate) fn split_tcp(stream: TcpStream) -> ChannelPair {
    let (read, write) = stream.into_split();
    ChannelPair {
        reader: Some(FrameReader::stream(Box::new(read))),
        writer: FrameWriter::Stream(Box::new(write)),
    }
}

pub(crate) async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|source| TransportError::Address {
            host: host.to_string(),
            port,
            source,
        })?;
    addrs.next().ok_or_else(|| TransportError::Address {
        host: host.to_string(),
        port,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses returned"),
    })
}

fn log_channel(target: &str) -> Result<ChannelPair, TransportError> {
    let writer: Box<dyn tokio::io::AsyncWrite + Send + Unpin> = match target {
        "stderr" => Box::new(tokio::io::stderr()),
        _ => Box::new(tokio::io::stdout()),
    };
    Ok(ChannelPair::write_only(FrameWriter::Stream(writer)))
}

async fn udp_channel(
    url: &CotUrl,
    config: &TransportConfig,
    broadcast: bool,
    write_only: bool,
) -> Result<ChannelPair, TransportError> {
    let dest = resolve_addr(&url.host, url.port).await?;
    let multicast = match dest.ip() {
        IpAddr::V4(ip) => ip.is_multicast(),
        IpAddr::V6(ip) => ip.is_multicast(),
    };

    let writer = udp_writer(dest, config, broadcast, multicast, write_only).await?;
    if write_only {
        debug!(%dest, "write-only UDP channel, no receive socket bound");
        return Ok(ChannelPair::write_only(writer));
    }

    let reader = udp_reader(dest, config, broadcast, multicast).await?;
    Ok(ChannelPair {
        reader: Some(reader),
        writer,
    })
}

/// Builds the send socket: bound to an ephemeral local port and
/// connected to the destination.
async fn udp_writer(
    dest: SocketAddr,
    config: &TransportConfig,
    broadcast: bool,
    multicast: bool,
    write_only: bool,
) -> Result<FrameWriter, TransportError> {
    let socket = new_udp_socket()?;
    if broadcast {
        socket.set_broadcast(true).map_err(TransportError::Bind)?;
    }
    if multicast {
        socket
            .set_multicast_ttl_v4(config.multicast_ttl)
            .map_err(TransportError::Bind)?;
        if write_only {
            // Pin multicast egress to the configured interface so
            // co-located clients do not contend for the group port.
            socket
                .set_multicast_if_v4(&config.local_addr)
                .map_err(TransportError::Bind)?;
        }
    }
    let local = SocketAddr::new(IpAddr::V4(config.local_addr), 0);
    socket
        .bind(&local.into())
        .map_err(TransportError::Bind)?;

    let socket = into_tokio(socket)?;
    socket.connect(dest).await?;
    Ok(FrameWriter::Datagram(Arc::new(socket)))
}

/// Builds the receive socket: group/wildcard bound on the destination
/// port, with multicast membership where applicable.
async fn udp_reader(
    dest: SocketAddr,
    config: &TransportConfig,
    broadcast: bool,
    multicast: bool,
) -> Result<FrameReader, TransportError> {
    let socket = new_udp_socket()?;

    if broadcast {
        socket.set_broadcast(true).map_err(TransportError::Bind)?;
    }
    if broadcast || multicast {
        socket
            .set_reuse_address(true)
            .map_err(TransportError::Bind)?;
        #[cfg(unix)]
        {
            // Not every unix supports SO_REUSEPORT.
            let _ = socket.set_reuse_port(true);
        }
    }

    let bind_addr = if broadcast || multicast {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), dest.port())
    } else {
        dest
    };
    socket
        .bind(&bind_addr.into())
        .map_err(TransportError::Bind)?;

    if multicast {
        if let IpAddr::V4(group) = dest.ip() {
            socket
                .join_multicast_v4(&group, &config.local_addr)
                .map_err(TransportError::Bind)?;
        }
    }

    let socket = into_tokio(socket)?;
    Ok(FrameReader::Datagram(Arc::new(socket)))
}

fn new_udp_socket() -> Result<Socket, TransportError> {
    Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(TransportError::Bind)
}

fn into_tokio(socket: Socket) -> Result<UdpSocket, TransportError> {
    socket.set_nonblocking(true).map_err(TransportError::Bind)?;
    UdpSocket::from_std(socket.into()).map_err(TransportError::Bind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_resolve_connects_to_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let url = CotUrl::parse(&format!("tcp://127.0.0.1:{}", addr.port())).unwrap();
        let pair = resolve(&url, &TransportConfig::default()).await.unwrap();
        assert!(pair.reader.is_some());
        listener.accept().await.unwrap();
    }

    #[tokio::test]
    async fn multicast_write_only_has_no_reader() {
        let url = CotUrl::parse("udp+wo://239.2.3.1:6969").unwrap();
        let pair = resolve(&url, &TransportConfig::default()).await.unwrap();
        assert!(pair.reader.is_none());
        assert!(matches!(pair.writer, FrameWriter::Datagram(_)));
    }

    #[tokio::test]
    async fn udp_unicast_round_trip_on_loopback() {
        // Peer socket stands in for the remote side.
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = peer.local_addr().unwrap().port();

        let url = CotUrl::parse(&format!("udp+wo://127.0.0.1:{port}")).unwrap();
        let mut pair = resolve(&url, &TransportConfig::default()).await.unwrap();
        pair.writer.send(b"<event/>").await.unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"<event/>");
    }

    #[tokio::test]
    async fn log_scheme_is_writer_only() {
        let url = CotUrl::parse("log://stdout").unwrap();
        let pair = resolve(&url, &TransportConfig::default()).await.unwrap();
        assert!(pair.reader.is_none());
    }

    #[tokio::test]
    async fn tls_without_identity_is_a_certificate_error() {
        let url = CotUrl::parse("tls://tak.example.com:8089").unwrap();
        let err = resolve(&url, &TransportConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Tls(TlsError::Certificate(_))
        ));
    }

    #[tokio::test]
    async fn unresolvable_host_is_an_address_error() {
        let url = CotUrl::parse("tcp://no-such-host.invalid:1").unwrap();
        let err = resolve(&url, &TransportConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Address { .. }));
    }
}
