//! Findings emitted by a path review and the per-certificate collections that hold them

use core::fmt;

/// [`FindingClass`] identifies the review sweep or concern that produced a [`Finding`], allowing
/// callers to group or filter diagnostics without matching on every variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FindingClass {
    /// Trust anchor discovery and anchor-related observations
    Trust,
    /// Issuer/subject chaining and signature verification
    Chaining,
    /// Certificate validity window checks
    Validity,
    /// Name constraints processing
    NameConstraints,
    /// Path length processing
    PathLength,
    /// Certificate policy processing
    Policy,
    /// Critical extension processing
    Extensions,
    /// Revocation status determination
    Revocation,
    /// Resource location notifications (CRL distribution points, OCSP responders)
    Resource,
}

/// [`Finding`] is a symbolic diagnostic produced while reviewing a certification path. Each
/// variant carries the arguments needed to render a human-readable message via [`fmt::Display`],
/// and callers that want to branch on outcomes can match on the variant instead of parsing text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Finding {
    /// No trust anchor with a subject matching the last certificate's issuer was found
    NoTrustAnchorFound {
        /// Issuer name from the certificate that could not be anchored
        issuer: String,
        /// Number of anchors that were considered
        anchor_count: usize,
    },
    /// More than one trust anchor matched the last certificate's issuer
    ConflictingTrustAnchors {
        /// Number of anchors that matched
        matching: usize,
    },
    /// The last certificate's signature did not verify under the trust anchor key
    TrustAnchorSignatureFailure,
    /// The trust anchor certificate has a key usage extension without keyCertSign
    TrustAnchorKeyUsage,
    /// The last certificate verifies under its own key but is not among the trust anchors
    RootKeyValidButNotTrustAnchor,
    /// The certificate signature could not be verified under the working public key
    SignatureNotVerified,
    /// No public key was available to verify the certificate signature
    NoIssuerPublicKey {
        /// Serial number from the authority key identifier, rendered as hex, if present
        aki_serial: Option<String>,
        /// Authority certificate issuer from the authority key identifier, if present
        aki_issuer: Option<String>,
    },
    /// The certificate issuer does not match the subject of the certificate that follows it
    IssuerMismatch {
        /// Subject of the issuing certificate
        expected: String,
        /// Issuer asserted by the certificate under review
        found: String,
    },
    /// An intermediate certificate is a version 1 certificate or asserts cA=false
    NotCa,
    /// An intermediate certificate lacks a basic constraints extension
    MissingBasicConstraints,
    /// An intermediate certificate has a key usage extension without keyCertSign
    NoCertSignBit,
    /// The certificate is not yet valid at the time of interest
    NotYetValid {
        /// notBefore in seconds since the Unix epoch
        not_before: u64,
    },
    /// The certificate is expired at the time of interest
    Expired {
        /// notAfter in seconds since the Unix epoch
        not_after: u64,
    },
    /// The review is being performed for a time other than the current time
    ValidityDates {
        /// Time of interest in seconds since the Unix epoch
        valid_date: u64,
        /// Current time in seconds since the Unix epoch
        current_date: u64,
    },
    /// A subject or subject alternative name is not within the permitted subtrees
    NameNotPermitted {
        /// Rendering of the offending name
        name: String,
    },
    /// A subject or subject alternative name is within the excluded subtrees
    NameExcluded {
        /// Rendering of the offending name
        name: String,
    },
    /// The subject alternative name extension carries too many names to examine
    SubjectAltNameTooLarge {
        /// Number of names present in the extension
        count: usize,
    },
    /// A non-self-issued intermediate certificate appears beyond the permitted path length
    PathLengthExceeded,
    /// Total path length notification, reported against the whole path
    TotalPathLength {
        /// Number of non-self-issued intermediate certificates in the path
        length: usize,
    },
    /// Explicit policy is required but the valid policy tree is empty
    NoValidPolicyTree,
    /// Explicit policy is required but the certificate asserts no acceptable policy
    ExplicitPolicyViolation,
    /// A policy mappings extension maps to or from anyPolicy
    InvalidPolicyMapping,
    /// A critical extension was not consumed by any processing step
    UnknownCriticalExtension {
        /// Object identifier of the unprocessed extension
        oid: String,
    },
    /// A registered path checker rejected the certificate
    PathCheckerFailure {
        /// Message from the failing checker
        msg: String,
    },
    /// The certificate asserts the ETSI qualified certificate compliance statement
    QcEuCompliance,
    /// The certificate asserts that the private key resides in a secure signature creation device
    QcSscd,
    /// The certificate asserts a transaction value limit
    QcLimitValue {
        /// ISO 4217 currency code
        currency: String,
        /// Limit amount
        amount: i64,
        /// Limit exponent, the limit is amount * 10^exponent
        exponent: i64,
    },
    /// The certificate carries a QC statement that was not recognized
    QcUnknownStatement {
        /// Object identifier of the unrecognized statement
        oid: String,
    },
    /// The qcStatements extension could not be decoded
    QcStatementsDecodeFailure,
    /// A CRL distribution point location from the certificate
    CrlDistributionPoint {
        /// URI of the distribution point
        uri: String,
    },
    /// An OCSP responder location from the certificate
    OcspLocation {
        /// URI of the responder
        uri: String,
    },
    /// No CRL for the certificate's issuer was found in the local stores
    NoCrlInStore,
    /// A current CRL was found in a local store
    LocalValidCrl {
        /// thisUpdate from the CRL in seconds since the Unix epoch
        this_update: u64,
    },
    /// A CRL found in a local store was not current
    LocalInvalidCrl {
        /// nextUpdate from the CRL in seconds since the Unix epoch, if present
        next_update: Option<u64>,
    },
    /// A current CRL was fetched from a distribution point
    OnlineValidCrl {
        /// URI the CRL was fetched from
        uri: String,
    },
    /// A CRL fetched from a distribution point was not current
    OnlineInvalidCrl {
        /// URI the CRL was fetched from
        uri: String,
    },
    /// A CRL fetched from a distribution point was issued by a different CA
    OnlineCrlWrongCa {
        /// URI the CRL was fetched from
        uri: String,
    },
    /// A CRL could not be fetched from a distribution point
    CrlFetchFailure {
        /// URI that could not be fetched
        uri: String,
    },
    /// The CRL issuer's certificate has a key usage extension without cRLSign
    NoCrlSigningPermitted,
    /// The CRL signature did not verify under the issuer's public key
    CrlSignatureFailure,
    /// No public key was available to verify the CRL signature
    CrlNoIssuerPublicKey,
    /// The certificate was revoked before the time of interest
    CertificateRevoked {
        /// Revocation date in seconds since the Unix epoch
        date: u64,
        /// Revocation reason string
        reason: String,
    },
    /// The certificate was revoked, but after the time of interest
    RevokedAfterValidation {
        /// Revocation date in seconds since the Unix epoch
        date: u64,
        /// Revocation reason string
        reason: String,
    },
    /// The certificate does not appear on the examined CRL
    NotRevoked,
    /// The examined CRL is overdue for an update
    CrlUpdateAvailable {
        /// nextUpdate from the CRL in seconds since the Unix epoch
        next_update: u64,
    },
    /// A delta CRL was found but no suitable base CRL was available
    NoBaseCrl,
    /// The CRL scope covers only end-entity certificates
    CrlScopeOnlyUserCerts,
    /// The CRL scope covers only CA certificates
    CrlScopeOnlyCaCerts,
    /// The CRL scope covers only attribute certificates
    CrlScopeOnlyAttributeCerts,
    /// No current CRL covering the certificate was found anywhere
    NoValidCrlFound,
}

impl Finding {
    /// Returns the [`FindingClass`] for this finding.
    pub fn class(&self) -> FindingClass {
        match self {
            Finding::NoTrustAnchorFound { .. }
            | Finding::ConflictingTrustAnchors { .. }
            | Finding::TrustAnchorSignatureFailure
            | Finding::TrustAnchorKeyUsage
            | Finding::RootKeyValidButNotTrustAnchor => FindingClass::Trust,
            Finding::SignatureNotVerified
            | Finding::NoIssuerPublicKey { .. }
            | Finding::IssuerMismatch { .. }
            | Finding::NotCa
            | Finding::MissingBasicConstraints
            | Finding::NoCertSignBit => FindingClass::Chaining,
            Finding::NotYetValid { .. } | Finding::Expired { .. } | Finding::ValidityDates { .. } => {
                FindingClass::Validity
            }
            Finding::NameNotPermitted { .. }
            | Finding::NameExcluded { .. }
            | Finding::SubjectAltNameTooLarge { .. } => FindingClass::NameConstraints,
            Finding::PathLengthExceeded | Finding::TotalPathLength { .. } => FindingClass::PathLength,
            Finding::NoValidPolicyTree
            | Finding::ExplicitPolicyViolation
            | Finding::InvalidPolicyMapping => FindingClass::Policy,
            Finding::UnknownCriticalExtension { .. }
            | Finding::PathCheckerFailure { .. }
            | Finding::QcEuCompliance
            | Finding::QcSscd
            | Finding::QcLimitValue { .. }
            | Finding::QcUnknownStatement { .. }
            | Finding::QcStatementsDecodeFailure => FindingClass::Extensions,
            Finding::CrlDistributionPoint { .. } | Finding::OcspLocation { .. } => {
                FindingClass::Resource
            }
            _ => FindingClass::Revocation,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::NoTrustAnchorFound { issuer, anchor_count } => write!(
                f,
                "No trust anchor with subject \"{issuer}\" was found among the {anchor_count} provided anchors"
            ),
            Finding::ConflictingTrustAnchors { matching } => write!(
                f,
                "{matching} trust anchors matched the last certificate's issuer, unable to select one"
            ),
            Finding::TrustAnchorSignatureFailure => {
                write!(f, "Certificate signature could not be verified under the trust anchor public key")
            }
            Finding::TrustAnchorKeyUsage => {
                write!(f, "Trust anchor certificate has a key usage extension that does not permit certificate signing")
            }
            Finding::RootKeyValidButNotTrustAnchor => {
                write!(f, "Certificate is self-signed with a valid signature but is not among the provided trust anchors")
            }
            Finding::SignatureNotVerified => {
                write!(f, "Certificate signature could not be verified")
            }
            Finding::NoIssuerPublicKey { aki_serial, aki_issuer } => {
                write!(f, "No public key was available to verify the certificate signature")?;
                if let Some(serial) = aki_serial {
                    write!(f, "; authority key identifier names serial number {serial}")?;
                }
                if let Some(issuer) = aki_issuer {
                    write!(f, "; authority key identifier names issuer \"{issuer}\"")?;
                }
                Ok(())
            }
            Finding::IssuerMismatch { expected, found } => write!(
                f,
                "Certificate issuer \"{found}\" does not match the issuing certificate subject \"{expected}\""
            ),
            Finding::NotCa => write!(f, "Intermediate certificate is not a CA certificate"),
            Finding::MissingBasicConstraints => {
                write!(f, "Intermediate certificate lacks a basic constraints extension")
            }
            Finding::NoCertSignBit => write!(
                f,
                "Intermediate certificate has a key usage extension that does not permit certificate signing"
            ),
            Finding::NotYetValid { not_before } => {
                write!(f, "Certificate is not yet valid, notBefore is {not_before}")
            }
            Finding::Expired { not_after } => {
                write!(f, "Certificate is expired, notAfter is {not_after}")
            }
            Finding::ValidityDates { valid_date, current_date } => write!(
                f,
                "Path review performed for time {valid_date} rather than the current time {current_date}"
            ),
            Finding::NameNotPermitted { name } => {
                write!(f, "Name \"{name}\" is not within the permitted subtrees")
            }
            Finding::NameExcluded { name } => {
                write!(f, "Name \"{name}\" is within the excluded subtrees")
            }
            Finding::SubjectAltNameTooLarge { count } => write!(
                f,
                "Subject alternative name extension contains {count} names, too many to examine"
            ),
            Finding::PathLengthExceeded => {
                write!(f, "Certificate appears beyond the maximum permitted path length")
            }
            Finding::TotalPathLength { length } => {
                write!(f, "Path contains {length} non-self-issued intermediate certificates")
            }
            Finding::NoValidPolicyTree => {
                write!(f, "Explicit policy is required but the valid policy tree is empty")
            }
            Finding::ExplicitPolicyViolation => write!(
                f,
                "Explicit policy is required but the certificate asserts no acceptable policy"
            ),
            Finding::InvalidPolicyMapping => {
                write!(f, "Policy mappings extension maps to or from anyPolicy")
            }
            Finding::UnknownCriticalExtension { oid } => {
                write!(f, "Critical extension {oid} was not processed")
            }
            Finding::PathCheckerFailure { msg } => {
                write!(f, "Path checker rejected the certificate: {msg}")
            }
            Finding::QcEuCompliance => write!(
                f,
                "Certificate asserts compliance with the EU qualified certificate directive"
            ),
            Finding::QcSscd => write!(
                f,
                "Certificate asserts that its private key resides in a secure signature creation device"
            ),
            Finding::QcLimitValue { currency, amount, exponent } => write!(
                f,
                "Certificate asserts a transaction value limit of {amount} * 10^{exponent} {currency}"
            ),
            Finding::QcUnknownStatement { oid } => {
                write!(f, "Certificate carries unrecognized QC statement {oid}")
            }
            Finding::QcStatementsDecodeFailure => {
                write!(f, "qcStatements extension could not be decoded")
            }
            Finding::CrlDistributionPoint { uri } => {
                write!(f, "Certificate names CRL distribution point {uri}")
            }
            Finding::OcspLocation { uri } => {
                write!(f, "Certificate names OCSP responder {uri}")
            }
            Finding::NoCrlInStore => {
                write!(f, "No CRL for the certificate issuer was found in the local stores")
            }
            Finding::LocalValidCrl { this_update } => {
                write!(f, "Current CRL issued at {this_update} was found in a local store")
            }
            Finding::LocalInvalidCrl { next_update } => match next_update {
                Some(nu) => write!(f, "CRL found in a local store expired at {nu}"),
                None => write!(f, "CRL found in a local store is not current"),
            },
            Finding::OnlineValidCrl { uri } => {
                write!(f, "Current CRL was fetched from {uri}")
            }
            Finding::OnlineInvalidCrl { uri } => {
                write!(f, "CRL fetched from {uri} is not current")
            }
            Finding::OnlineCrlWrongCa { uri } => {
                write!(f, "CRL fetched from {uri} was issued by a different CA")
            }
            Finding::CrlFetchFailure { uri } => {
                write!(f, "CRL could not be fetched from {uri}")
            }
            Finding::NoCrlSigningPermitted => write!(
                f,
                "CRL issuer certificate has a key usage extension that does not permit CRL signing"
            ),
            Finding::CrlSignatureFailure => {
                write!(f, "CRL signature could not be verified under the issuer public key")
            }
            Finding::CrlNoIssuerPublicKey => {
                write!(f, "No public key was available to verify the CRL signature")
            }
            Finding::CertificateRevoked { date, reason } => {
                write!(f, "Certificate was revoked at {date}, reason: {reason}")
            }
            Finding::RevokedAfterValidation { date, reason } => write!(
                f,
                "Certificate was revoked at {date}, after the time of interest, reason: {reason}"
            ),
            Finding::NotRevoked => write!(f, "Certificate does not appear on the examined CRL"),
            Finding::CrlUpdateAvailable { next_update } => {
                write!(f, "An update for the examined CRL was expected at {next_update}")
            }
            Finding::NoBaseCrl => {
                write!(f, "Delta CRL was found but no suitable base CRL was available")
            }
            Finding::CrlScopeOnlyUserCerts => {
                write!(f, "CRL scope covers only end-entity certificates")
            }
            Finding::CrlScopeOnlyCaCerts => write!(f, "CRL scope covers only CA certificates"),
            Finding::CrlScopeOnlyAttributeCerts => {
                write!(f, "CRL scope covers only attribute certificates")
            }
            Finding::NoValidCrlFound => {
                write!(f, "No current CRL covering the certificate was found")
            }
        }
    }
}

/// [`ReviewResults`] collects [`Finding`] values produced while reviewing a path. Findings are
/// held in two collections of buckets, errors and notifications, with one bucket per certificate
/// plus one bucket for findings that apply to the path as a whole.
///
/// Certificates are indexed with the end-entity certificate at index 0 and the certificate
/// closest to the trust anchor at index n-1. Index -1 addresses the whole-path bucket.
#[derive(Clone, Eq, PartialEq)]
pub struct ReviewResults {
    cert_count: usize,
    errors: Vec<Vec<Finding>>,
    notifications: Vec<Vec<Finding>>,
}

impl ReviewResults {
    /// Returns a new [`ReviewResults`] with empty buckets for a path of `cert_count` certificates.
    pub fn new(cert_count: usize) -> Self {
        ReviewResults {
            cert_count,
            errors: vec![Vec::new(); cert_count + 1],
            notifications: vec![Vec::new(); cert_count + 1],
        }
    }

    /// Returns the number of certificates the buckets cover.
    pub fn cert_count(&self) -> usize {
        self.cert_count
    }

    fn bucket(index: isize) -> usize {
        (index + 1) as usize
    }

    /// Records an error against certificate `index`, or against the whole path when `index` is -1.
    pub fn add_error(&mut self, index: isize, finding: Finding) {
        let b = Self::bucket(index);
        if b < self.errors.len() {
            self.errors[b].push(finding);
        }
    }

    /// Records a notification against certificate `index`, or against the whole path when `index` is -1.
    pub fn add_notification(&mut self, index: isize, finding: Finding) {
        let b = Self::bucket(index);
        if b < self.notifications.len() {
            self.notifications[b].push(finding);
        }
    }

    /// Returns the errors recorded against certificate `index`, or against the whole path when
    /// `index` is -1. Out of range indices yield an empty slice.
    pub fn errors_at(&self, index: isize) -> &[Finding] {
        let b = Self::bucket(index);
        match self.errors.get(b) {
            Some(v) => v,
            None => &[],
        }
    }

    /// Returns the notifications recorded against certificate `index`, or against the whole path
    /// when `index` is -1. Out of range indices yield an empty slice.
    pub fn notifications_at(&self, index: isize) -> &[Finding] {
        let b = Self::bucket(index);
        match self.notifications.get(b) {
            Some(v) => v,
            None => &[],
        }
    }

    /// Returns all errors, flattened across buckets.
    pub fn all_errors(&self) -> Vec<&Finding> {
        self.errors.iter().flatten().collect()
    }

    /// Returns all notifications, flattened across buckets.
    pub fn all_notifications(&self) -> Vec<&Finding> {
        self.notifications.iter().flatten().collect()
    }

    /// Returns true if no errors were recorded in any bucket. Notifications do not affect validity.
    pub fn is_valid(&self) -> bool {
        self.errors.iter().all(|b| b.is_empty())
    }
}
