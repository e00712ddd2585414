//! Preference-package import.
//!
//! A preference package (also called a data package) is a zip archive
//! bundling connection settings and certificate material for one-step
//! client provisioning. Importing one extracts the archive, parses the
//! settings document, and returns a destination URL together with a
//! TLS identity whose paths point at the extracted files.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use cotwire_transport::TlsIdentity;

mod error;
mod settings;

pub use error::PackageError;
pub use settings::{RawPrefs, connect_string_to_url, parse_pref_xml, parse_settings_ini};

/// Result of importing a preference package.
#[derive(Debug, Clone, Default)]
pub struct ImportedPackage {
    /// Destination URL derived from the package's connect string.
    pub cot_url: Option<String>,
    /// TLS identity with paths rewritten to the extraction directory.
    pub identity: TlsIdentity,
    /// Where the archive contents now live on disk. The directory is
    /// kept so the identity paths stay valid for the TLS handshake.
    pub extracted_to: PathBuf,
}

impl ImportedPackage {
    /// Merges package values into a caller-held identity, filling only
    /// the fields the caller left unset.
    pub fn merge_identity(&self, target: &mut TlsIdentity) {
        if target.cert_path.as_os_str().is_empty() {
            target.cert_path = self.identity.cert_path.clone();
        }
        if target.key_path.is_none() {
            target.key_path = self.identity.key_path.clone();
        }
        if target.ca_path.is_none() {
            target.ca_path = self.identity.ca_path.clone();
        }
        if target.passphrase.is_none() {
            target.passphrase = self.identity.passphrase.clone();
        }
    }
}

/// Imports a preference package, extracting into a fresh temporary
/// directory that outlives the call.
pub fn import(archive: &Path) -> Result<ImportedPackage, PackageError> {
    if !archive.is_file() {
        return Err(PackageError::Open {
            path: archive.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    let dest = tempfile::Builder::new()
        .prefix("cotwire_dp_")
        .tempdir()?
        .keep();
    import_into(archive, &dest)
}

/// Imports a preference package, extracting into `dest`.
pub fn import_into(archive: &Path, dest: &Path) -> Result<ImportedPackage, PackageError> {
    let file = std::fs::File::open(archive).map_err(|source| PackageError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = zip::ZipArchive::new(file)?;
    zip.extract(dest)?;
    debug!(package = %archive.display(), dest = %dest.display(), "extracted preference package");

    let prefs = load_settings(dest)?;

    let cot_url = match (&prefs.cot_url, &prefs.connect_string) {
        (Some(url), _) => Some(url.clone()),
        (None, Some(conn)) => Some(connect_string_to_url(conn)?),
        (None, None) => None,
    };

    let mut identity = TlsIdentity {
        passphrase: prefs.client_password.clone(),
        ..Default::default()
    };
    if let Some(location) = &prefs.certificate_location {
        identity.cert_path = locate_cert(dest, location)?;
    }
    if let Some(location) = &prefs.key_location {
        identity.key_path = Some(locate_cert(dest, location)?);
    }
    if let Some(location) = &prefs.ca_location {
        identity.ca_path = Some(locate_cert(dest, location)?);
    }

    if identity
        .cert_path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("p12"))
        && !cfg!(feature = "crypto-extras")
    {
        return Err(PackageError::DependencyMissing("PKCS#12 decoding"));
    }

    info!(
        url = cot_url.as_deref().unwrap_or("<unset>"),
        cert = %identity.cert_path.display(),
        "imported preference package"
    );

    Ok(ImportedPackage {
        cot_url,
        identity,
        extracted_to: dest.to_path_buf(),
    })
}

/// Finds and parses the package's settings document: the first `*.pref`
/// entry, or a `settings.ini` fallback.
fn load_settings(dest: &Path) -> Result<RawPrefs, PackageError> {
    if let Some(pref_path) = find_file(dest, |name| name.ends_with(".pref")) {
        let data = std::fs::read_to_string(&pref_path)?;
        return parse_pref_xml(&data);
    }
    if let Some(ini_path) = find_file(dest, |name| name == "settings.ini") {
        return parse_settings_ini(&ini_path);
    }
    Err(PackageError::MissingSettings)
}

/// Resolves a settings-document certificate reference against the
/// extraction directory by basename, since package-internal paths are
/// written relative to the originating device.
fn locate_cert(dest: &Path, reference: &str) -> Result<PathBuf, PackageError> {
    let basename = Path::new(reference)
        .file_name()
        .ok_or_else(|| PackageError::MissingCertificate(reference.to_string()))?
        .to_string_lossy()
        .into_owned();
    find_file(dest, |name| name == basename)
        .ok_or_else(|| PackageError::MissingCertificate(reference.to_string()))
}

fn find_file(root: &Path, matches: impl Fn(&str) -> bool) -> Option<PathBuf> {
    fn walk(dir: &Path, matches: &dyn Fn(&str) -> bool) -> Option<PathBuf> {
        let mut entries: Vec<_> = std::fs::read_dir(dir).ok()?.flatten().collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in &entries {
            let path = entry.path();
            if path.is_dir() {
                if let Some(found) = walk(&path, matches) {
                    return Some(found);
                }
            } else if matches(&entry.file_name().to_string_lossy()) {
                return Some(path);
            }
        }
        None
    }
    walk(root, &matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_package(
        dir: &Path,
        entries: &[(&str, &str)],
    ) -> PathBuf {
        let path = dir.join("package.zip");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    const PREF: &str = r#"<?xml version='1.0' standalone='yes'?>
<preferences>
  <preference version="1" name="cot_streams">
    <entry key="connectString0" class="class java.lang.String">tak.example.com:8089:ssl</entry>
  </preference>
  <preference version="1" name="com.atakmap.app_preferences">
    <entry key="certificateLocation" class="class java.lang.String">cert/client.pem</entry>
    <entry key="clientPassword" class="class java.lang.String">atakatak</entry>
  </preference>
</preferences>
"#;

    #[test]
    fn pref_package_yields_url_and_extracted_identity() {
        let dir = tempfile::tempdir().unwrap();
        let package = build_package(
            dir.path(),
            &[
                ("example.pref", PREF),
                ("cert/client.pem", "-----BEGIN CERTIFICATE-----\n"),
            ],
        );

        let dest = dir.path().join("extracted");
        let imported = import_into(&package, &dest).unwrap();
        assert_eq!(
            imported.cot_url.as_deref(),
            Some("ssl://tak.example.com:8089")
        );
        assert!(imported.identity.cert_path.exists());
        assert_eq!(imported.identity.passphrase.as_deref(), Some("atakatak"));
    }

    #[test]
    fn settings_ini_package_is_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let package = build_package(
            dir.path(),
            &[
                (
                    "settings.ini",
                    "COT_URL=tls://h:1\nTLS_CLIENT_CERT=client.pem\n",
                ),
                ("client.pem", "-----BEGIN CERTIFICATE-----\n"),
            ],
        );

        let dest = dir.path().join("extracted");
        let imported = import_into(&package, &dest).unwrap();
        assert_eq!(imported.cot_url.as_deref(), Some("tls://h:1"));
        assert!(imported.identity.cert_path.exists());
    }

    #[test]
    fn package_without_settings_fails() {
        let dir = tempfile::tempdir().unwrap();
        let package = build_package(dir.path(), &[("readme.txt", "nothing here")]);
        let err = import_into(&package, &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, PackageError::MissingSettings));
    }

    #[test]
    fn referenced_cert_must_exist_in_archive() {
        let dir = tempfile::tempdir().unwrap();
        let package = build_package(dir.path(), &[("example.pref", PREF)]);
        let err = import_into(&package, &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, PackageError::MissingCertificate(_)), "{err}");
    }

    #[test]
    fn unreadable_archive_is_an_open_error() {
        let err = import(Path::new("/nonexistent/package.zip")).unwrap_err();
        assert!(matches!(err, PackageError::Open { .. }));
    }

    #[test]
    fn merge_preserves_caller_overrides() {
        let imported = ImportedPackage {
            cot_url: Some("ssl://tak.example.com:8089".into()),
            identity: TlsIdentity {
                cert_path: PathBuf::from("/pkg/client.pem"),
                passphrase: Some("frompackage".into()),
                ..Default::default()
            },
            extracted_to: PathBuf::from("/pkg"),
        };

        let mut target = TlsIdentity {
            passphrase: Some("mine".into()),
            ..Default::default()
        };
        imported.merge_identity(&mut target);
        assert_eq!(target.cert_path, PathBuf::from("/pkg/client.pem"));
        assert_eq!(target.passphrase.as_deref(), Some("mine"));
    }
}
