//! Settings-document parsing for preference packages.
//!
//! Two document shapes are recognized: the XML `*.pref` format used by
//! TAK data packages (`<preferences><preference><entry key="..">`) and a
//! flat `settings.ini` with the same configuration keys the client
//! reads from its environment.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::PackageError;

/// Raw key/value settings lifted out of a package, before certificate
/// paths are resolved against the extraction directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPrefs {
    pub connect_string: Option<String>,
    pub cot_url: Option<String>,
    pub client_password: Option<String>,
    pub certificate_location: Option<String>,
    pub key_location: Option<String>,
    pub ca_location: Option<String>,
}

impl RawPrefs {
    pub fn is_empty(&self) -> bool {
        *self == RawPrefs::default()
    }
}

/// Parses a TAK `*.pref` XML document.
pub fn parse_pref_xml(data: &str) -> Result<RawPrefs, PackageError> {
    let mut reader = Reader::from_str(data);
    reader.config_mut().trim_text(true);

    let mut prefs = RawPrefs::default();
    let mut current_key: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"entry" => {
                current_key = None;
                for attr in e.attributes() {
                    let attr =
                        attr.map_err(|e| PackageError::Settings(e.to_string()))?;
                    if attr.key.as_ref() == b"key" {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| PackageError::Settings(e.to_string()))?;
                        current_key = Some(value.into_owned());
                    }
                }
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| PackageError::Settings(e.to_string()))?
                    .into_owned();
                match current_key.as_deref() {
                    Some("connectString0") => prefs.connect_string = Some(value),
                    Some("clientPassword") => prefs.client_password = Some(value),
                    Some("certificateLocation") => {
                        prefs.certificate_location = Some(value)
                    }
                    Some("caLocation") => prefs.ca_location = Some(value),
                    _ => {}
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"entry" => {
                current_key = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(PackageError::Settings(e.to_string())),
        }
    }

    Ok(prefs)
}

/// Parses a flat `settings.ini`. Keys may live in any section.
pub fn parse_settings_ini(path: &Path) -> Result<RawPrefs, PackageError> {
    let ini = ini::Ini::load_from_file(path)
        .map_err(|e| PackageError::Settings(e.to_string()))?;

    let mut prefs = RawPrefs::default();
    let lookup = |key: &str| -> Option<String> {
        ini.iter()
            .find_map(|(_, props)| props.get(key))
            .map(str::to_string)
    };

    prefs.cot_url = lookup("COT_URL");
    prefs.certificate_location = lookup("TLS_CLIENT_CERT");
    prefs.key_location = lookup("TLS_CLIENT_KEY");
    prefs.ca_location = lookup("TLS_CLIENT_CAFILE");
    prefs.client_password = lookup("TLS_CLIENT_PASSWORD");

    Ok(prefs)
}

/// Converts a TAK connect string (`host:port:protocol`) into a
/// destination URL (`protocol://host:port`).
pub fn connect_string_to_url(conn: &str) -> Result<String, PackageError> {
    let mut parts = conn.split(':');
    let (Some(host), Some(port), Some(proto)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(PackageError::ConnectString(conn.to_string()));
    };
    if host.is_empty() || port.is_empty() || proto.is_empty() {
        return Err(PackageError::ConnectString(conn.to_string()));
    }
    Ok(format!("{proto}://{host}:{port}"))
}
