//! Transport error taxonomy.

/// Errors from destination resolution and socket construction.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("cannot resolve {host}:{port}: {source}")]
    Address {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot bind local socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Errors from the TLS client builder.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// Certificate or key material is missing, malformed, or (for
    /// PKCS#12) the password is wrong.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// TLS negotiation failed, including peer verification failure.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// An optional capability (PKCS#12, encrypted keys) is not compiled
    /// in. Enable the `crypto-extras` feature.
    #[error("optional capability not available: {0} (enable the crypto-extras feature)")]
    DependencyMissing(&'static str),
}
