//! Error types for the certreview crate
//!
//! Errors returned from this crate signal structural or configuration problems that prevent a
//! review from being performed at all, i.e., conditions detected before any diagnostics exist.
//! Problems found while reviewing a path are never surfaced as [`Error`] values; they are
//! accumulated as [`Finding`](crate::Finding) values in a
//! [`ReviewResults`](crate::ReviewResults) instance.

use core::fmt;

/// Result type for the certreview crate
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for the certreview crate
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// Certification path reviews require at least one certificate that is not a trust anchor
    EmptyPath,
    /// A search operation (trust anchor, CRL, callback) turned up nothing
    NotFound,
    /// Encountered a structure or value that is not supported
    Unrecognized,
    /// Signature verification failed or could not be performed
    SignatureVerificationFailure,
    /// Remote resources may only be fetched over HTTP or HTTPS
    InvalidUriScheme,
    /// Failed to fetch a remote resource
    NetworkError,
    /// A CRL is unusable for the certificate at hand
    CrlIncompatible,
    /// Propagates errors from the der crate
    Asn1Error(der::Error),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyPath => write!(f, "empty certification path"),
            Error::NotFound => write!(f, "not found"),
            Error::Unrecognized => write!(f, "unrecognized structure or value"),
            Error::SignatureVerificationFailure => write!(f, "signature verification failure"),
            Error::InvalidUriScheme => write!(f, "invalid URI scheme"),
            Error::NetworkError => write!(f, "network error"),
            Error::CrlIncompatible => write!(f, "CRL is incompatible with certificate"),
            Error::Asn1Error(e) => write!(f, "ASN.1 error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

#[test]
fn error_display() {
    use der::Tag;
    assert_eq!("empty certification path", Error::EmptyPath.to_string());
    assert_eq!("not found", Error::NotFound.to_string());
    assert_eq!(
        "signature verification failure",
        Error::SignatureVerificationFailure.to_string()
    );
    let asn1 = Error::from(der::Error::new(
        der::ErrorKind::TagUnexpected {
            expected: Some(Tag::Sequence),
            actual: Tag::Integer,
        },
        der::Length::ZERO,
    ));
    assert!(asn1.to_string().starts_with("ASN.1 error:"));
}
