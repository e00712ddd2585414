//! Protocol-wide defaults.

use std::time::Duration;

/// Default CoT destination: the ATAK mesh multicast group, write-only.
pub const DEFAULT_COT_URL: &str = "udp+wo://239.2.3.1:6969";

/// Default port for unicast CoT streams.
pub const DEFAULT_COT_PORT: u16 = 8087;

/// Default port for broadcast/multicast CoT.
pub const DEFAULT_BROADCAST_PORT: u16 = 6969;

/// Default seconds until a transmitted event goes stale.
pub const DEFAULT_COT_STALE: u64 = 120;

/// Sentinel for unknown circular/height/linear error values.
pub const UNKNOWN_COT_VAL: f64 = 9_999_999.0;

/// Upper bound for the random DoS-avoidance sleep.
pub const DEFAULT_SLEEP: Duration = Duration::from_secs(5);

/// Default capacity of the outbound event queue.
pub const DEFAULT_MAX_OUT_QUEUE: usize = 100;

/// Default capacity of the inbound event queue.
pub const DEFAULT_MAX_IN_QUEUE: usize = 500;

/// XML declaration prepended to every version 0 event.
pub const XML_DECLARATION: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\" ?>";

/// Terminator scanned for when framing version 0 events off a stream.
pub const EVENT_END_TAG: &[u8] = b"</event>";

/// Maximum bytes scanned for [`EVENT_END_TAG`] before the frame is
/// declared too long and discarded.
pub const MAX_FRAME: usize = 64 * 1024;

/// W3C XML Schema dateTime format with fractional seconds, UTC.
pub const W3C_XML_DATETIME: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
