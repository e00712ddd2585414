//! CoT timestamp helpers.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::constants::W3C_XML_DATETIME;

/// Current UTC time, truncated to microseconds.
///
/// The wire format carries six fractional digits, so anything finer
/// would not survive a round trip.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    let micros = now.nanosecond() / 1_000 * 1_000;
    now.with_nanosecond(micros).unwrap_or(now)
}

/// Formats the current UTC time, offset by `stale` seconds, as a W3C XML
/// Schema dateTime string. `stale` is how CoT expresses expiry deadlines.
pub fn cot_time(stale: Option<u64>) -> String {
    let mut t = now();
    if let Some(secs) = stale {
        t += Duration::seconds(secs as i64);
    }
    format(t)
}

pub(crate) fn format(t: DateTime<Utc>) -> String {
    t.format(W3C_XML_DATETIME).to_string()
}

pub(crate) fn parse(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cot_time_is_w3c_formatted() {
        let s = cot_time(None);
        // 2024-01-02T03:04:05.678901Z
        assert_eq!(s.len(), 27);
        assert!(s.ends_with('Z'));
        assert_eq!(&s[10..11], "T");
        assert_eq!(&s[19..20], ".");
    }

    #[test]
    fn stale_offset_is_in_the_future() {
        let now = cot_time(None);
        let later = cot_time(Some(120));
        assert!(later > now);
    }

    #[test]
    fn format_parse_round_trip() {
        let t = now();
        assert_eq!(parse(&format(t)), Some(t));
    }
}
