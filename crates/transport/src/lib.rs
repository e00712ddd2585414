//! Transport resolution for CoT destinations.
//!
//! Turns a destination URL into a [`ChannelPair`] over TCP, TLS, UDP
//! unicast/broadcast/multicast (including write-only variants) or a
//! loopback log sink. TLS client identities support PEM and PKCS#12
//! material with an injectable passphrase provider.

pub mod channel;
mod config;
mod error;
mod socket;
pub mod tls;
mod url;

pub use channel::{ChannelPair, FrameReader, FrameWriter};
pub use config::TransportConfig;
pub use error::{TlsError, TransportError};
pub use socket::resolve;
pub use tls::{ConfiguredPassphrase, PassphraseProvider, PromptPassphrase, TlsIdentity};
pub use url::{CotUrl, Scheme};
