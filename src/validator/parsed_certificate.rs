//! Certificate wrapper that caches the encoded form and the decoded extensions consulted during review

use der::asn1::{BitString, ObjectIdentifier};
use der::{Decode, Encode};

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES,
    ID_CE_CRL_DISTRIBUTION_POINTS, ID_CE_EXT_KEY_USAGE, ID_CE_INHIBIT_ANY_POLICY, ID_CE_KEY_USAGE,
    ID_CE_NAME_CONSTRAINTS, ID_CE_POLICY_CONSTRAINTS, ID_CE_POLICY_MAPPINGS,
    ID_CE_SUBJECT_ALT_NAME, ID_CE_SUBJECT_KEY_IDENTIFIER, ID_PE_AUTHORITY_INFO_ACCESS,
};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::ext::{pkix::crl::CrlDistributionPoints, pkix::*};
use x509_cert::{name::Name, Certificate};

use crate::util::error::*;
use crate::validator::parsed_extension::*;
use crate::validator::path_reviewer::EXTS_OF_INTEREST;

/// [`ParsedCertificate`] aggregates a binary DER-encoded Certificate, the decoded Certificate and
/// the parsed extensions consulted during a path review.
///
/// The parsed extensions are those listed in [`EXTS_OF_INTEREST`]. Retaining the encoded form
/// avoids re-encoding the TBSCertificate when verifying signatures.
#[derive(Clone, Eq, PartialEq)]
pub struct ParsedCertificate {
    /// Binary, encoded Certificate object
    pub encoded: Vec<u8>,
    /// Decoded Certificate object
    pub decoded: Certificate,
    /// Parsed extensions from the Certificate
    pub parsed_extensions: ParsedExtensions,
}

impl TryFrom<&[u8]> for ParsedCertificate {
    type Error = der::Error;

    fn try_from(enc_cert: &[u8]) -> der::Result<Self> {
        let cert = Certificate::from_der(enc_cert)?;
        let mut parsed = ParsedCertificate {
            encoded: enc_cert.to_vec(),
            decoded: cert,
            parsed_extensions: Default::default(),
        };
        parsed.parse_extensions(EXTS_OF_INTEREST);
        Ok(parsed)
    }
}

impl TryFrom<Certificate> for ParsedCertificate {
    type Error = der::Error;

    fn try_from(cert: Certificate) -> der::Result<Self> {
        let enc_cert = cert.to_der()?;
        let mut parsed = ParsedCertificate {
            encoded: enc_cert,
            decoded: cert,
            parsed_extensions: Default::default(),
        };
        parsed.parse_extensions(EXTS_OF_INTEREST);
        Ok(parsed)
    }
}

impl ParsedCertificate {
    /// Returns the subject field from the certificate.
    pub fn subject(&self) -> &Name {
        &self.decoded.tbs_certificate.subject
    }

    /// Returns the issuer field from the certificate.
    pub fn issuer(&self) -> &Name {
        &self.decoded.tbs_certificate.issuer
    }

    /// Returns the subjectPublicKeyInfo field from the certificate.
    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.decoded.tbs_certificate.subject_public_key_info
    }

    /// Returns true if the extension identified by `oid` is present and marked critical.
    pub fn is_critical(&self, oid: &ObjectIdentifier) -> bool {
        if let Some(exts) = self.decoded.tbs_certificate.extensions.as_ref() {
            if let Some(ext) = exts.iter().find(|&ext| ext.extn_id == *oid) {
                return ext.critical;
            }
        }
        false
    }
}

impl ExtensionProcessing for ParsedCertificate {
    fn get_extension(&self, oid: &ObjectIdentifier) -> Result<Option<&'_ ParsedExtension>> {
        if self.parsed_extensions.contains_key(oid) {
            if let Some(ext) = self.parsed_extensions.get(oid) {
                return Ok(Some(ext));
            }
        }
        Ok(None)
    }

    fn parse_extensions(&'_ mut self, oids: &[ObjectIdentifier]) {
        for oid in oids {
            let _r = self.parse_extension(oid);
        }
    }

    fn parse_extension(&mut self, oid: &ObjectIdentifier) -> Result<Option<&ParsedExtension>> {
        macro_rules! add_and_return {
            ($pe:ident, $v:ident, $oid:ident, $t:ident) => {
                match $t::from_der($v) {
                    Ok(r) => {
                        let ext = ParsedExtension::$t(r);
                        $pe.insert(*oid, ext);
                        return Ok(Some(&$pe[oid]));
                    }
                    Err(e) => {
                        return Err(Error::Asn1Error(e));
                    }
                }
            };
        }

        let pe = &mut self.parsed_extensions;
        if pe.contains_key(oid) {
            return Ok(pe.get(oid));
        }

        if let Some(exts) = self.decoded.tbs_certificate.extensions.as_ref() {
            if let Some(i) = exts.iter().find(|&ext| ext.extn_id == *oid) {
                let v = i.extn_value.as_bytes();
                match *oid {
                    ID_CE_BASIC_CONSTRAINTS => {
                        add_and_return!(pe, v, ID_CE_BASIC_CONSTRAINTS, BasicConstraints);
                    }
                    ID_CE_SUBJECT_KEY_IDENTIFIER => {
                        add_and_return!(pe, v, ID_CE_SUBJECT_KEY_IDENTIFIER, SubjectKeyIdentifier);
                    }
                    ID_CE_EXT_KEY_USAGE => {
                        add_and_return!(pe, v, ID_CE_EXT_KEY_USAGE, ExtendedKeyUsage);
                    }
                    ID_PE_AUTHORITY_INFO_ACCESS => {
                        add_and_return!(
                            pe,
                            v,
                            ID_PE_AUTHORITY_INFO_ACCESS,
                            AuthorityInfoAccessSyntax
                        );
                    }
                    ID_CE_KEY_USAGE => {
                        add_and_return!(pe, v, ID_CE_KEY_USAGE, KeyUsage);
                    }
                    ID_CE_SUBJECT_ALT_NAME => {
                        add_and_return!(pe, v, ID_CE_SUBJECT_ALT_NAME, SubjectAltName);
                    }
                    ID_CE_NAME_CONSTRAINTS => {
                        add_and_return!(pe, v, ID_CE_NAME_CONSTRAINTS, NameConstraints);
                    }
                    ID_CE_CERTIFICATE_POLICIES => {
                        add_and_return!(pe, v, ID_CE_CERTIFICATE_POLICIES, CertificatePolicies);
                    }
                    ID_CE_POLICY_MAPPINGS => {
                        add_and_return!(pe, v, ID_CE_POLICY_MAPPINGS, PolicyMappings);
                    }
                    ID_CE_AUTHORITY_KEY_IDENTIFIER => {
                        add_and_return!(
                            pe,
                            v,
                            ID_CE_AUTHORITY_KEY_IDENTIFIER,
                            AuthorityKeyIdentifier
                        );
                    }
                    ID_CE_POLICY_CONSTRAINTS => {
                        add_and_return!(pe, v, ID_CE_POLICY_CONSTRAINTS, PolicyConstraints);
                    }
                    ID_CE_INHIBIT_ANY_POLICY => {
                        add_and_return!(pe, v, ID_CE_INHIBIT_ANY_POLICY, InhibitAnyPolicy);
                    }
                    ID_CE_CRL_DISTRIBUTION_POINTS => {
                        add_and_return!(
                            pe,
                            v,
                            ID_CE_CRL_DISTRIBUTION_POINTS,
                            CrlDistributionPoints
                        );
                    }
                    _ => {
                        pe.insert(*oid, ParsedExtension::Unrecognized());
                    }
                }
            }
        }
        Ok(None)
    }
}

/// [`DeferDecodeSigned`] is used to parse only the top-level structure of a signed object, i.e.,
/// a Certificate or CertificateList, without parsing the details of the signed field.
///
/// Deferred decoding is useful when verifying signatures to avoid re-encoding the signed field
/// (and potentially encountering problems with structures that were not DER-encoded prior to
/// signing). This is intended to be used in tandem with a fully-decoded structure.
pub struct DeferDecodeSigned {
    /// tbsCertificate       TBSCertificate (or tbsCertList CertificateList)
    pub tbs_field: Vec<u8>,
    /// signatureAlgorithm   AlgorithmIdentifier,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    /// signature            BIT STRING
    pub signature: BitString,
}

impl ::der::FixedTag for DeferDecodeSigned {
    const TAG: ::der::Tag = ::der::Tag::Sequence;
}

impl<'a> ::der::DecodeValue<'a> for DeferDecodeSigned {
    fn decode_value<R: ::der::Reader<'a>>(
        reader: &mut R,
        header: ::der::Header,
    ) -> ::der::Result<Self> {
        use ::der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_field = reader.tlv_bytes()?;
            let signature_algorithm = reader.decode()?;
            let signature = reader.decode()?;
            Ok(Self {
                tbs_field: tbs_field.to_vec(),
                signature_algorithm,
                signature,
            })
        })
    }
}

/// `parse_certificate` takes a buffer containing a binary DER-encoded certificate and returns a
/// [`ParsedCertificate`] containing the decoded certificate if parsing was successful.
pub fn parse_certificate(buffer: &[u8]) -> Result<ParsedCertificate> {
    ParsedCertificate::try_from(buffer).map_err(Error::Asn1Error)
}
