//! Structures and functions related to switchboard functionality used during certification path review

use log::debug;

use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;

use crate::environment::pki_environment_traits::*;
use crate::{Error, Result};

/// `PkiEnvironment` provides a switchboard of callbacks and trait objects that supply the
/// collaborators a [`PathReviewer`](crate::PathReviewer) needs: signature verification, CRL
/// stores, CRL fetchers and per-certificate path checkers.
///
/// An empty environment performs no signature verification (every verification attempt returns
/// [`Error::NotFound`]); register at least one [`VerifySignatureMessage`] callback before
/// reviewing paths.
#[derive(Default)]
pub struct PkiEnvironment {
    /// List of functions that provide signature verification across a message
    verify_signature_message_callbacks: Vec<VerifySignatureMessage>,

    /// List of trait objects that provide access to stored CRLs
    crl_sources: Vec<Box<dyn CrlSource + Sync + Send>>,

    /// List of trait objects that retrieve CRLs from distribution points
    crl_fetchers: Vec<Box<dyn CrlFetch + Sync + Send>>,

    /// List of trait objects run during the critical extension sweep
    path_checkers: Vec<Box<dyn PathChecker + Sync + Send>>,
}

impl PkiEnvironment {
    /// PkiEnvironment constructor yielding an empty switchboard.
    pub fn new() -> PkiEnvironment {
        PkiEnvironment::default()
    }

    /// Adds a [`VerifySignatureMessage`] callback to the list used by [`verify_signature_message`](Self::verify_signature_message).
    pub fn add_verify_signature_message_callback(&mut self, c: VerifySignatureMessage) {
        self.verify_signature_message_callbacks.push(c);
    }

    /// Clears the list of [`VerifySignatureMessage`] callbacks.
    pub fn clear_verify_signature_message_callbacks(&mut self) {
        self.verify_signature_message_callbacks.clear();
    }

    /// verify_signature_message iterates over registered callbacks until one successfully verifies
    /// the signature or all have failed to do so.
    pub fn verify_signature_message(
        &self,
        pe: &PkiEnvironment,
        message_to_verify: &[u8],
        signature: &[u8],
        signature_alg: &AlgorithmIdentifierOwned,
        spki: &SubjectPublicKeyInfoOwned,
    ) -> Result<()> {
        let mut err = Error::NotFound;
        for f in &self.verify_signature_message_callbacks {
            match f(pe, message_to_verify, signature, signature_alg, spki) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("verify_signature_message callback failed with: {}", e);
                    err = e;
                }
            }
        }
        Err(err)
    }

    /// Adds a [`CrlSource`] object to the list used by [`get_crls`](Self::get_crls).
    pub fn add_crl_source(&mut self, c: Box<dyn CrlSource + Sync + Send>) {
        self.crl_sources.push(c);
    }

    /// Clears the list of [`CrlSource`] objects.
    pub fn clear_crl_sources(&mut self) {
        self.crl_sources.clear();
    }

    /// get_crls returns all stored CRLs for the presented issuer name, aggregated across
    /// registered sources. Sources that fail are skipped.
    pub fn get_crls(&self, issuer: &Name) -> Vec<Vec<u8>> {
        let mut retval = vec![];
        for s in &self.crl_sources {
            match s.crls_for_issuer(issuer) {
                Ok(mut crls) => retval.append(&mut crls),
                Err(e) => debug!("CRL source failed with: {}", e),
            }
        }
        retval
    }

    /// Returns true if at least one [`CrlSource`] has been registered.
    pub fn has_crl_sources(&self) -> bool {
        !self.crl_sources.is_empty()
    }

    /// Adds a [`CrlFetch`] object to the list used by [`fetch_crl`](Self::fetch_crl).
    pub fn add_crl_fetcher(&mut self, c: Box<dyn CrlFetch + Sync + Send>) {
        self.crl_fetchers.push(c);
    }

    /// Clears the list of [`CrlFetch`] objects.
    pub fn clear_crl_fetchers(&mut self) {
        self.crl_fetchers.clear();
    }

    /// fetch_crl iterates over registered fetchers until one returns an encoded CRL or all have
    /// failed to do so.
    pub fn fetch_crl(&self, uri: &str) -> Result<Vec<u8>> {
        let mut err = Error::NotFound;
        for f in &self.crl_fetchers {
            match f.fetch_crl(uri) {
                Ok(crl) => return Ok(crl),
                Err(e) => {
                    debug!("CRL fetch from {} failed with: {}", uri, e);
                    err = e;
                }
            }
        }
        Err(err)
    }

    /// Adds a [`PathChecker`] object to the list run during the critical extension sweep.
    pub fn add_path_checker(&mut self, c: Box<dyn PathChecker + Sync + Send>) {
        self.path_checkers.push(c);
    }

    /// Clears the list of [`PathChecker`] objects.
    pub fn clear_path_checkers(&mut self) {
        self.path_checkers.clear();
    }

    /// Returns the registered [`PathChecker`] objects.
    pub fn path_checkers(&self) -> &[Box<dyn PathChecker + Sync + Send>] {
        &self.path_checkers
    }
}
