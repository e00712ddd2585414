//! CoT event construction and XML serialization.

use chrono::{DateTime, Duration, Utc};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event as XmlEvent;
use serde::{Deserialize, Serialize};

use crate::CotError;
use crate::constants::{DEFAULT_COT_STALE, UNKNOWN_COT_VAL, XML_DECLARATION};
use crate::time;

/// A Cursor-on-Target event.
///
/// Carries the standard timestamp triad: `time` (creation), `start`
/// (validity) and `stale` (expiry deadline). Timestamps are truncated to
/// microseconds so an encode/decode round trip preserves equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CotEvent {
    pub uid: String,
    pub cot_type: String,
    pub how: String,
    pub time: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub stale: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    /// Circular error (m).
    pub ce: f64,
    /// Height above ellipsoid (m).
    pub hae: f64,
    /// Linear error (m).
    pub le: f64,
    pub callsign: Option<String>,
}

impl CotEvent {
    /// Creates an event stamped now, stale after the default 120 s.
    pub fn new(uid: impl Into<String>, cot_type: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            uid: uid.into(),
            cot_type: cot_type.into(),
            how: "m-g".into(),
            time: now,
            start: now,
            stale: now + Duration::seconds(DEFAULT_COT_STALE as i64),
            lat: 0.0,
            lon: 0.0,
            ce: UNKNOWN_COT_VAL,
            hae: UNKNOWN_COT_VAL,
            le: UNKNOWN_COT_VAL,
            callsign: None,
        }
    }

    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.lat = lat;
        self.lon = lon;
        self
    }

    /// Sets the stale deadline to `secs` after the event time.
    pub fn with_stale(mut self, secs: u64) -> Self {
        self.stale = self.time + Duration::seconds(secs as i64);
        self
    }

    pub fn with_callsign(mut self, callsign: impl Into<String>) -> Self {
        self.callsign = Some(callsign.into());
        self
    }

    /// Serializes the event as version 0 wire bytes: XML declaration plus
    /// a self-delimited `<event>…</event>` element.
    pub fn to_xml(&self) -> Vec<u8> {
        let mut out = String::with_capacity(384);
        out.push_str(std::str::from_utf8(XML_DECLARATION).unwrap_or_default());
        out.push('\n');
        out.push_str(&format!(
            "<event version=\"2.0\" type=\"{}\" uid=\"{}\" how=\"{}\" time=\"{}\" start=\"{}\" stale=\"{}\">",
            escape(self.cot_type.as_str()),
            escape(self.uid.as_str()),
            escape(self.how.as_str()),
            time::format(self.time),
            time::format(self.start),
            time::format(self.stale),
        ));
        out.push_str(&format!(
            "<point lat=\"{}\" lon=\"{}\" ce=\"{}\" hae=\"{}\" le=\"{}\"/>",
            self.lat, self.lon, self.ce, self.hae, self.le,
        ));
        out.push_str("<detail>");
        if let Some(callsign) = &self.callsign {
            out.push_str(&format!("<contact callsign=\"{}\"/>", escape(callsign.as_str())));
        }
        out.push_str("</detail>");
        out.push_str("</event>");
        out.into_bytes()
    }

    /// Parses version 0 wire bytes back into an event.
    ///
    /// Unknown `<detail>` children are ignored; only the attributes this
    /// model carries are recovered.
    pub fn from_xml(data: &[u8]) -> Result<Self, CotError> {
        let text = std::str::from_utf8(data).map_err(|_| CotError::NotAnEvent)?;
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut event: Option<CotEvent> = None;
        loop {
            match reader.read_event()? {
                XmlEvent::Start(e) | XmlEvent::Empty(e) => match e.name().as_ref() {
                    b"event" => {
                        let mut ev = CotEvent::new("", "");
                        for attr in e.attributes() {
                            let attr = attr?;
                            let value = attr.unescape_value()?;
                            match attr.key.as_ref() {
                                b"uid" => ev.uid = value.into_owned(),
                                b"type" => ev.cot_type = value.into_owned(),
                                b"how" => ev.how = value.into_owned(),
                                b"time" => ev.time = parse_time("time", &value)?,
                                b"start" => ev.start = parse_time("start", &value)?,
                                b"stale" => ev.stale = parse_time("stale", &value)?,
                                _ => {}
                            }
                        }
                        event = Some(ev);
                    }
                    b"point" => {
                        let ev = event.as_mut().ok_or(CotError::NotAnEvent)?;
                        for attr in e.attributes() {
                            let attr = attr?;
                            let value = attr.unescape_value()?;
                            match attr.key.as_ref() {
                                b"lat" => ev.lat = parse_num("lat", &value)?,
                                b"lon" => ev.lon = parse_num("lon", &value)?,
                                b"ce" => ev.ce = parse_num("ce", &value)?,
                                b"hae" => ev.hae = parse_num("hae", &value)?,
                                b"le" => ev.le = parse_num("le", &value)?,
                                _ => {}
                            }
                        }
                    }
                    b"contact" => {
                        let ev = event.as_mut().ok_or(CotError::NotAnEvent)?;
                        for attr in e.attributes() {
                            let attr = attr?;
                            if attr.key.as_ref() == b"callsign" {
                                ev.callsign = Some(attr.unescape_value()?.into_owned());
                            }
                        }
                    }
                    _ => {}
                },
                XmlEvent::Eof => break,
                _ => {}
            }
        }
        event.ok_or(CotError::NotAnEvent)
    }
}

fn parse_time(attr: &'static str, value: &str) -> Result<DateTime<Utc>, CotError> {
    time::parse(value).ok_or_else(|| CotError::InvalidAttribute {
        attr,
        value: value.to_string(),
    })
}

fn parse_num(attr: &'static str, value: &str) -> Result<f64, CotError> {
    value.parse().map_err(|_| CotError::InvalidAttribute {
        attr,
        value: value.to_string(),
    })
}

/// Greeting event announcing a client identity, type `t-x-d-d`.
pub fn hello_event(host_id: &str) -> Vec<u8> {
    let uid = if host_id.is_empty() { "takPing" } else { host_id };
    CotEvent::new(uid, "t-x-d-d").to_xml()
}

/// Reply to a TAK server ping.
pub fn tak_pong() -> Vec<u8> {
    CotEvent::new("takPong", "t-x-d-d").with_stale(3600).to_xml()
}

/// Deletion event instructing receivers to retract `uid` immediately,
/// without waiting for its stale deadline.
pub fn delete_event(uid: &str) -> Vec<u8> {
    let ev = CotEvent::new(uid, "t-x-d-d");
    let xml = ev.to_xml();
    // Splice the retraction link into the (empty) detail element.
    let detail = format!(
        "<detail><link uid=\"{}\" relation=\"none\" type=\"none\"/><__forcedelete/></detail>",
        escape(uid)
    );
    let text = String::from_utf8(xml).unwrap_or_default();
    text.replace("<detail></detail>", &detail).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_event() {
        let ev = CotEvent::new("unit-7", "a-f-G-U-C")
            .with_position(40.781789, -73.968698)
            .with_stale(60)
            .with_callsign("BRAVO7");
        let decoded = CotEvent::from_xml(&ev.to_xml()).unwrap();
        assert_eq!(decoded, ev);
    }

    #[test]
    fn round_trip_with_defaults() {
        let ev = CotEvent::new("x", "a-u-G");
        assert_eq!(CotEvent::from_xml(&ev.to_xml()).unwrap(), ev);
    }

    #[test]
    fn new_events_report_unknown_error_values() {
        let ev = CotEvent::new("x", "a-u-G");
        assert_eq!(ev.ce, UNKNOWN_COT_VAL);
        assert_eq!(ev.hae, UNKNOWN_COT_VAL);
        assert_eq!(ev.le, UNKNOWN_COT_VAL);
    }

    #[test]
    fn xml_shape_matches_cot_schema() {
        let xml = CotEvent::new("uid-1", "a-u-G").to_xml();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<event version=\"2.0\" type=\"a-u-G\" uid=\"uid-1\""));
        assert!(text.contains("<point "));
        assert!(text.ends_with("</event>"));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let ev = CotEvent::new("a&b", "a-u-G").with_callsign("<cs>");
        let text = String::from_utf8(ev.to_xml()).unwrap();
        assert!(text.contains("uid=\"a&amp;b\""));
        assert!(text.contains("callsign=\"&lt;cs&gt;\""));
        assert_eq!(CotEvent::from_xml(&ev.to_xml()).unwrap().uid, "a&b");
    }

    #[test]
    fn hello_event_is_ping_typed() {
        let text = String::from_utf8(hello_event("cotwire@host")).unwrap();
        assert!(text.contains("type=\"t-x-d-d\""));
        assert!(text.contains("uid=\"cotwire@host\""));
    }

    #[test]
    fn delete_event_links_target_uid() {
        let text = String::from_utf8(delete_event("gone-1")).unwrap();
        assert!(text.contains("<link uid=\"gone-1\""));
        assert!(text.contains("<__forcedelete/>"));
        assert!(text.ends_with("</event>"));
    }

    #[test]
    fn json_round_trip_for_application_interchange() {
        let ev = CotEvent::new("unit-9", "a-f-G").with_callsign("CHARLIE9");
        let json = serde_json::to_string(&ev).unwrap();
        let back: CotEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(CotEvent::from_xml(b"not xml at all").is_err());
        assert!(CotEvent::from_xml(b"<point lat=\"1\"/>").is_err());
    }
}
