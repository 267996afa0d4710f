//! Trait and function-pointer definitions implemented by [`PkiEnvironment`] collaborators

use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;

use crate::environment::pki_environment::PkiEnvironment;
use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::path_settings::ObjectIdentifierSet;
use crate::Result;

/// `VerifySignatureMessage` provides a function signature for calculating a digest over a message
/// then verifying a signature using that digest.
///
/// Signature verification is a collaborator concern: register one or more implementations backed
/// by whatever cryptographic library is in use via
/// [`PkiEnvironment::add_verify_signature_message_callback`].
pub type VerifySignatureMessage = fn(
    pe: &PkiEnvironment,
    message_to_verify: &[u8],                 // buffer to hash and verify
    signature: &[u8],                         // signature
    signature_alg: &AlgorithmIdentifierOwned, // signature algorithm
    spki: &SubjectPublicKeyInfoOwned,         // public key
) -> Result<()>;

/// Provides CRLs from some store, i.e., a database, folder or in-memory collection.
pub trait CrlSource {
    /// Retrieves encoded CRLs whose issuer field matches the presented name.
    fn crls_for_issuer(&self, issuer: &Name) -> Result<Vec<Vec<u8>>>;
}

/// Retrieves CRLs from remote locations named by distribution point URIs.
pub trait CrlFetch {
    /// Fetches an encoded CRL from the presented URI.
    fn fetch_crl(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Per-certificate check run during the critical extension sweep.
///
/// Implementations receive each certificate in the path along with the set of critical extension
/// OIDs not consumed by the reviewer itself and may remove the OIDs they process. OIDs left in the
/// set after all checkers run are reported as unknown critical extensions.
pub trait PathChecker {
    /// Checks the presented certificate, removing any critical extension OIDs the implementation
    /// consumed from `unresolved_critical_extensions`.
    fn check(
        &self,
        cert: &ParsedCertificate,
        unresolved_critical_extensions: &mut ObjectIdentifierSet,
    ) -> Result<()>;
}
