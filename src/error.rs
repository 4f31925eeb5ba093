// src/error.rs

//! Error types for fomm
//!
//! Load failures are split between [`Error::FormatError`] (the document is
//! malformed) and [`Error::IncompatibleVersion`] (the document is well formed
//! but written for a different tool or schema) so callers can choose between
//! recovery and a hard abort.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by fomm
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed metadata, ledger or companion document
    #[error("Format error: {0}")]
    FormatError(String),

    /// Package requires a newer tool, or the ledger schema cannot be reconciled
    #[error("Incompatible version: {0}")]
    IncompatibleVersion(String),

    /// A required resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Archive mutation or state transition failed
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// A copy instruction cannot be applied to the tree
    #[error("Invalid copy instruction: {0}")]
    InvalidInstruction(String),

    /// Path is malformed or empty
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path tries to escape its root
    #[error("Path traversal detected: {0}")]
    PathTraversal(String),

    /// The installer collaborator failed
    #[error("Installer error: {0}")]
    Installer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::FormatError(msg.into())
    }

    /// Returns true for failures that must abort rather than be recovered from
    pub fn is_incompatible(&self) -> bool {
        matches!(self, Self::IncompatibleVersion(_))
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Self::TransactionError(format!("failed to replace file: {}", err.error))
    }
}
