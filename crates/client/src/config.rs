//! Client configuration surface.
//!
//! All knobs can come from the process environment, a preference
//! package, or direct struct construction. Precedence is caller value,
//! then package value, then built-in default.

use std::path::PathBuf;
use std::time::Duration;

use cotwire_package::ImportedPackage;
use cotwire_protocol::constants::{
    DEFAULT_COT_URL, DEFAULT_MAX_IN_QUEUE, DEFAULT_MAX_OUT_QUEUE, DEFAULT_SLEEP,
};
use cotwire_protocol::TakProto;
use cotwire_transport::{TlsIdentity, TransportConfig};

use crate::pacing::Pacing;

#[derive(Debug, Clone)]
pub struct Config {
    /// Destination URL. `None` falls back to the preference package's
    /// URL, then to the default multicast destination.
    pub cot_url: Option<String>,
    /// Wire protocol version for outbound events.
    pub tak_proto: TakProto,
    /// Default staleness window, seconds.
    pub cot_stale: u64,
    /// Identifier stamped on the greeting event.
    pub host_id: String,
    /// Suppress the greeting event on startup.
    pub no_hello: bool,
    /// Fixed inter-transmit delay. Takes precedence over rate-limit
    /// compatibility pacing.
    pub tx_sleep: Option<Duration>,
    /// Sleep a random duration (up to `max_sleep`) between transmits,
    /// for servers that rate-limit inbound connections.
    pub rate_limit_compat: bool,
    /// Upper bound for randomized pacing.
    pub max_sleep: Duration,
    /// Multicast TTL and local interface selection.
    pub transport: TransportConfig,
    /// TLS client identity and verification policy.
    pub tls: TlsIdentity,
    /// Outbound queue depth. Zero means unbounded.
    pub max_out_queue: usize,
    /// Inbound queue depth. Zero means unbounded.
    pub max_in_queue: usize,
    /// Preference package to import during setup.
    pub pref_package: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cot_url: None,
            tak_proto: TakProto::default(),
            cot_stale: cotwire_protocol::constants::DEFAULT_COT_STALE,
            host_id: default_host_id(),
            no_hello: false,
            tx_sleep: None,
            rate_limit_compat: false,
            max_sleep: DEFAULT_SLEEP,
            transport: TransportConfig::default(),
            tls: TlsIdentity::default(),
            max_out_queue: DEFAULT_MAX_OUT_QUEUE,
            max_in_queue: DEFAULT_MAX_IN_QUEUE,
            pref_package: None,
        }
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration from an arbitrary key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        config.cot_url = lookup("COT_URL");
        if let Some(version) = lookup("TAK_PROTO").and_then(|v| v.parse::<u8>().ok()) {
            config.tak_proto = TakProto::from_version(version);
        }
        if let Some(stale) = lookup("COT_STALE").and_then(|v| v.parse().ok()) {
            config.cot_stale = stale;
        }
        if let Some(host_id) = lookup("COT_HOST_ID") {
            config.host_id = host_id;
        }
        config.no_hello = truthy(lookup("NO_HELLO"));
        config.tx_sleep = lookup("TX_SLEEP")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|s| *s > 0.0)
            .map(Duration::from_secs_f64);
        config.rate_limit_compat = truthy(lookup("FTS_COMPAT"));

        if let Some(ttl) = lookup("MULTICAST_TTL").and_then(|v| v.parse().ok()) {
            config.transport.multicast_ttl = ttl;
        }
        if let Some(addr) = lookup("MULTICAST_LOCAL_ADDR").and_then(|v| v.parse().ok()) {
            config.transport.local_addr = addr;
        }

        if let Some(cert) = lookup("TLS_CLIENT_CERT") {
            config.tls.cert_path = PathBuf::from(cert);
        }
        config.tls.key_path = lookup("TLS_CLIENT_KEY").map(PathBuf::from);
        config.tls.ca_path = lookup("TLS_CLIENT_CAFILE").map(PathBuf::from);
        config.tls.passphrase = lookup("TLS_CLIENT_PASSWORD");
        config.tls.expected_hostname = lookup("TLS_SERVER_EXPECTED_HOSTNAME");
        config.tls.ciphers = lookup("TLS_CLIENT_CIPHERS");
        config.tls.dont_verify = truthy(lookup("TLS_DONT_VERIFY"));
        config.tls.dont_check_hostname = truthy(lookup("TLS_DONT_CHECK_HOSTNAME"));

        if let Some(depth) = lookup("MAX_OUT_QUEUE").and_then(|v| v.parse().ok()) {
            config.max_out_queue = depth;
        }
        if let Some(depth) = lookup("MAX_IN_QUEUE").and_then(|v| v.parse().ok()) {
            config.max_in_queue = depth;
        }
        config.pref_package = lookup("PREF_PACKAGE").map(PathBuf::from);

        config
    }

    /// The effective destination URL after defaulting.
    pub fn effective_url(&self) -> &str {
        self.cot_url.as_deref().unwrap_or(DEFAULT_COT_URL)
    }

    /// Derives the transmit pacing policy.
    pub fn pacing(&self) -> Pacing {
        match (self.tx_sleep, self.rate_limit_compat) {
            (Some(delay), _) => Pacing::Fixed(delay),
            (None, true) => Pacing::Random(self.max_sleep),
            (None, false) => Pacing::Yield,
        }
    }

    /// Fills unset fields from an imported preference package.
    pub fn merge_package(&mut self, imported: &ImportedPackage) {
        if self.cot_url.is_none() {
            self.cot_url = imported.cot_url.clone();
        }
        imported.merge_identity(&mut self.tls);
    }
}

fn truthy(value: Option<String>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn default_host_id() -> String {
    match hostname::get() {
        Ok(node) if !node.is_empty() => format!("cotwire@{}", node.to_string_lossy()),
        _ => "cotwire".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_host_id_carries_the_machine_name() {
        let id = default_host_id();
        match hostname::get() {
            Ok(node) if !node.is_empty() => {
                assert_eq!(id, format!("cotwire@{}", node.to_string_lossy()));
            }
            _ => assert_eq!(id, "cotwire"),
        }
    }

    #[test]
    fn defaults_point_at_the_multicast_destination() {
        let config = Config::default();
        assert_eq!(config.effective_url(), DEFAULT_COT_URL);
        assert_eq!(config.tak_proto, TakProto::V0);
        assert!(matches!(config.pacing(), Pacing::Yield));
    }

    #[test]
    fn lookup_values_override_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("COT_URL", "tls://tak.example.com:8089"),
            ("TAK_PROTO", "1"),
            ("FTS_COMPAT", "1"),
            ("TLS_CLIENT_CERT", "/certs/client.pem"),
            ("TLS_DONT_VERIFY", "true"),
            ("MAX_OUT_QUEUE", "7"),
        ]));
        assert_eq!(config.effective_url(), "tls://tak.example.com:8089");
        assert_eq!(config.tak_proto, TakProto::V1);
        assert!(matches!(config.pacing(), Pacing::Random(_)));
        assert_eq!(config.tls.cert_path, PathBuf::from("/certs/client.pem"));
        assert!(config.tls.dont_verify);
        assert_eq!(config.max_out_queue, 7);
    }

    #[test]
    fn fixed_sleep_wins_over_compat_pacing() {
        let config = Config::from_lookup(lookup_from(&[
            ("TX_SLEEP", "2.5"),
            ("FTS_COMPAT", "1"),
        ]));
        assert!(matches!(
            config.pacing(),
            Pacing::Fixed(d) if d == Duration::from_millis(2500)
        ));
    }

    #[test]
    fn package_merge_respects_caller_url() {
        let imported = ImportedPackage {
            cot_url: Some("ssl://pkg.example.com:8089".into()),
            ..Default::default()
        };

        let mut config = Config::default();
        config.merge_package(&imported);
        assert_eq!(config.effective_url(), "ssl://pkg.example.com:8089");

        let mut config = Config {
            cot_url: Some("tcp://mine:8087".into()),
            ..Default::default()
        };
        config.merge_package(&imported);
        assert_eq!(config.effective_url(), "tcp://mine:8087");
    }
}
