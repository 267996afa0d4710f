//! Wrappers around ASN.1 encoder/decoder structures to support certification path review

use std::collections::BTreeMap;

use der::asn1::ObjectIdentifier;
use x509_cert::ext::{pkix::crl::CrlDistributionPoints, pkix::*};

use crate::util::error::*;

/// The [`ExtensionProcessing`] trait provides a common means of extracting typed extensions from
/// objects that feature extensions and that retain copies of the decoded extension structures,
/// like [`ParsedCertificate`](crate::ParsedCertificate).
///
/// Prior to reviewing a path, the parse_extensions method should be used to parse the extensions
/// that will be consulted during the review. The decoded extensions are cached and accessed via
/// the get_extension function.
pub trait ExtensionProcessing {
    /// `get_extension` takes an ObjectIdentifier that identifies an extension type and returns a
    /// previously parsed [`ParsedExtension`] instance containing the decoded extension if the
    /// extension was present.
    fn get_extension(&self, oid: &ObjectIdentifier) -> Result<Option<&ParsedExtension>>;

    /// `parse_extension` takes an ObjectIdentifier that identifies an extension type and returns a
    /// [`ParsedExtension`] containing the decoded extension if the extension was present.
    fn parse_extension(&mut self, oid: &ObjectIdentifier) -> Result<Option<&ParsedExtension>>;

    /// `parse_extensions` parses and caches each of the indicated extension types that are present.
    fn parse_extensions(&mut self, oids: &[ObjectIdentifier]);
}

/// [`ParsedExtensions`] is a typedef of a BTreeMap that associates [`ParsedExtension`] objects
/// with object identifier values. This is used to avoid parsing extensions repeatedly while
/// reviewing a certification path.
pub type ParsedExtensions = BTreeMap<ObjectIdentifier, ParsedExtension>;

/// [`ParsedExtension`] provides a wrapper for the extension types consulted during a path review.
#[derive(PartialEq, Clone, Eq)]
pub enum ParsedExtension {
    /// Parsed BasicConstraints extension
    BasicConstraints(BasicConstraints),
    /// Parsed SubjectKeyIdentifier extension
    SubjectKeyIdentifier(SubjectKeyIdentifier),
    /// Parsed ExtendedKeyUsage extension
    ExtendedKeyUsage(ExtendedKeyUsage),
    /// Parsed AuthorityInfoAccessSyntax extension
    AuthorityInfoAccessSyntax(AuthorityInfoAccessSyntax),
    /// Parsed KeyUsage extension
    KeyUsage(KeyUsage),
    /// Parsed SubjectAltName extension
    SubjectAltName(SubjectAltName),
    /// Parsed NameConstraints extension
    NameConstraints(NameConstraints),
    /// Parsed CertificatePolicies extension
    CertificatePolicies(CertificatePolicies),
    /// Parsed PolicyMappings extension
    PolicyMappings(PolicyMappings),
    /// Parsed AuthorityKeyIdentifier extension
    AuthorityKeyIdentifier(AuthorityKeyIdentifier),
    /// Parsed PolicyConstraints extension
    PolicyConstraints(PolicyConstraints),
    /// Parsed InhibitAnyPolicy extension
    InhibitAnyPolicy(InhibitAnyPolicy),
    /// Parsed CRLDistributionPoints extension
    CrlDistributionPoints(CrlDistributionPoints),
    /// Unparsed, unrecognized extension
    Unrecognized(),
}
