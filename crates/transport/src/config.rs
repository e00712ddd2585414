//! Transport construction options.

use std::net::Ipv4Addr;

/// Options consumed while building sockets. Supplied once; read-only
/// thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Outbound TTL for multicast sends.
    pub multicast_ttl: u32,
    /// Local interface address for multicast membership and egress.
    /// `0.0.0.0` lets the OS pick; hosts without a default gateway need
    /// this set explicitly.
    pub local_addr: Ipv4Addr,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            multicast_ttl: 1,
            local_addr: Ipv4Addr::UNSPECIFIED,
        }
    }
}
