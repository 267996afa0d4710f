//! Trust anchor representations and anchor matching used when reviewing the end of a path

use const_oid::db::rfc5912::{ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_SUBJECT_KEY_IDENTIFIER};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::KeyUsage;
use x509_cert::name::Name;

use crate::util::error::*;
use crate::util::path_utilities::compare_names;
use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::parsed_extension::{ExtensionProcessing, ParsedExtension};

/// [`TrustAnchor`] represents a trust anchor either as a full certificate or as a raw name and
/// public key pair, as accepted by RFC 5280 section 6.1.1 (d).
#[derive(Clone, Eq, PartialEq)]
pub enum TrustAnchor {
    /// Trust anchor represented as a certificate
    Certificate(Box<ParsedCertificate>),
    /// Trust anchor represented as a distinguished name and public key
    NameAndKey {
        /// Name of the trust anchor
        name: Name,
        /// Public key of the trust anchor
        spki: SubjectPublicKeyInfoOwned,
    },
}

impl TrustAnchor {
    /// Prepares a [`TrustAnchor`] from a buffer containing a binary DER-encoded certificate.
    pub fn from_certificate(enc_cert: &[u8]) -> Result<TrustAnchor> {
        let cert = ParsedCertificate::try_from(enc_cert)?;
        Ok(TrustAnchor::Certificate(Box::new(cert)))
    }

    /// Returns the subject name of the trust anchor.
    pub fn subject_name(&self) -> &Name {
        match self {
            TrustAnchor::Certificate(cert) => cert.subject(),
            TrustAnchor::NameAndKey { name, .. } => name,
        }
    }

    /// Returns the public key of the trust anchor.
    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        match self {
            TrustAnchor::Certificate(cert) => cert.subject_public_key_info(),
            TrustAnchor::NameAndKey { spki, .. } => spki,
        }
    }

    /// Returns the key usage extension from the trust anchor certificate, if the anchor is a
    /// certificate and the extension is present.
    pub fn key_usage(&self) -> Option<KeyUsage> {
        if let TrustAnchor::Certificate(cert) = self {
            if let Ok(Some(ParsedExtension::KeyUsage(ku))) =
                cert.get_extension(&const_oid::db::rfc5912::ID_CE_KEY_USAGE)
            {
                return Some(ku.clone());
            }
        }
        None
    }

    /// Returns true if this trust anchor plausibly issued `cert`.
    ///
    /// The issuer name of `cert` must match the anchor's subject name. When `cert` carries an
    /// authority key identifier, the serial number field is compared against the anchor
    /// certificate's serial number when present, else the key identifier field is compared
    /// against the anchor certificate's subject key identifier. An anchor without a certificate
    /// is matched by name alone.
    pub fn matches_issuer(&self, cert: &ParsedCertificate) -> bool {
        if !compare_names(self.subject_name(), cert.issuer()) {
            return false;
        }

        let anchor_cert = match self {
            TrustAnchor::Certificate(c) => c,
            TrustAnchor::NameAndKey { .. } => return true,
        };

        let aki = match cert.get_extension(&ID_CE_AUTHORITY_KEY_IDENTIFIER) {
            Ok(Some(ParsedExtension::AuthorityKeyIdentifier(aki))) => aki.clone(),
            _ => return true,
        };

        if let Some(serial) = &aki.authority_cert_serial_number {
            return serial == &anchor_cert.decoded.tbs_certificate.serial_number;
        }

        if let Some(key_id) = &aki.key_identifier {
            if let Ok(Some(ParsedExtension::SubjectKeyIdentifier(skid))) =
                anchor_cert.get_extension(&ID_CE_SUBJECT_KEY_IDENTIFIER)
            {
                return key_id.as_bytes() == skid.0.as_bytes();
            }
        }

        true
    }
}
