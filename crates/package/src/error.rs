use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("cannot open package {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("package archive is invalid: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("package i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("package has no recognizable settings document")]
    MissingSettings,

    #[error("settings document is malformed: {0}")]
    Settings(String),

    #[error("settings reference {0} but the package does not contain it")]
    MissingCertificate(String),

    #[error("connect string '{0}' is not host:port:protocol")]
    ConnectString(String),

    #[error("optional capability not built into this binary: {0}")]
    DependencyMissing(&'static str),
}
