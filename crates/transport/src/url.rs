//! Destination URL grammar: `scheme://host:port` or `scheme:host:port`.

use std::net::IpAddr;

use cotwire_protocol::constants::{DEFAULT_BROADCAST_PORT, DEFAULT_COT_PORT};
use tracing::warn;

use crate::error::TransportError;

/// Recognized destination schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tcp,
    Tls,
    Udp { broadcast: bool, write_only: bool },
    /// Loopback sink writing raw frames to stdout or stderr.
    Log,
}

/// A parsed, immutable destination descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CotUrl {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl CotUrl {
    /// Parses a destination URL. The `//` after the scheme is optional.
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let (scheme_str, rest) = raw
            .split_once("://")
            .or_else(|| raw.split_once(':'))
            .ok_or_else(|| TransportError::UnsupportedScheme(raw.to_string()))?;

        let scheme = parse_scheme(scheme_str)
            .ok_or_else(|| TransportError::UnsupportedScheme(scheme_str.to_string()))?;

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    TransportError::UnsupportedScheme(format!("bad port in {raw}"))
                })?;
                (host.to_string(), port)
            }
            None => (rest.to_string(), default_port(scheme)),
        };

        if host.is_empty() {
            return Err(TransportError::UnsupportedScheme(format!(
                "missing host in {raw}"
            )));
        }

        Ok(Self { scheme, host, port })
    }

    /// Whether the destination address is an IP multicast group.
    pub fn is_multicast(&self) -> bool {
        self.host
            .parse::<IpAddr>()
            .map(|ip| ip.is_multicast())
            .unwrap_or(false)
    }
}

fn parse_scheme(s: &str) -> Option<Scheme> {
    let mut parts = s.to_ascii_lowercase();
    parts.retain(|c| !c.is_whitespace());
    let mut iter = parts.split('+');
    let base = iter.next()?;

    let mut broadcast = false;
    let mut write_only = false;
    for modifier in iter {
        match modifier {
            "broadcast" => broadcast = true,
            "wo" => write_only = true,
            // Multicast is detected from the destination address these
            // days; the modifier is accepted for old configurations.
            "multicast" => {
                warn!("'+multicast' is no longer needed; multicast is detected from the address");
                broadcast = true;
            }
            _ => return None,
        }
    }

    match base {
        "tcp" => (!broadcast && !write_only).then_some(Scheme::Tcp),
        "tls" | "ssl" => (!broadcast && !write_only).then_some(Scheme::Tls),
        "udp" => Some(Scheme::Udp {
            broadcast,
            write_only,
        }),
        "log" => (!broadcast && !write_only).then_some(Scheme::Log),
        _ => None,
    }
}

fn default_port(scheme: Scheme) -> u16 {
    match scheme {
        Scheme::Udp { broadcast: true, .. } => DEFAULT_BROADCAST_PORT,
        Scheme::Log => 0,
        _ => DEFAULT_COT_PORT,
    }
}
