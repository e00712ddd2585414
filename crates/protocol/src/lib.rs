//! Cursor-on-Target (CoT) event model and wire framing.
//!
//! Events are serialized as self-delimited XML (`<event …>…</event>`) for
//! TAK protocol version 0, or handed to an installed [`BinaryCodec`] for
//! the length-delimited version 1 protocol.

pub mod constants;
mod event;
mod frame;
mod time;

pub use event::{CotEvent, delete_event, hello_event, tak_pong};
pub use frame::{BinaryCodec, FrameError, FrameScanner, ProtoVariant, TakProto};
pub use time::cot_time;

/// Errors from CoT XML serialization.
#[derive(Debug, thiserror::Error)]
pub enum CotError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("not a CoT event: missing <event> element")]
    NotAnEvent,

    #[error("invalid {attr} attribute: {value}")]
    InvalidAttribute { attr: &'static str, value: String },
}
