//! Certification path review with exhaustive diagnostics per RFC 5280 Section 6

use std::time::SystemTime;

use log::{debug, info};

use const_oid::db::rfc5912::*;
use der::asn1::ObjectIdentifier;
use der::Decode;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::{KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::certificate::Version;

use crate::asn1::qc_statements::*;
use crate::environment::pki_environment::PkiEnvironment;
use crate::util::error::*;
use crate::util::path_utilities::*;
use crate::validator::name_constraints_set::NameConstraintsSet;
use crate::validator::parsed_certificate::{DeferDecodeSigned, ParsedCertificate};
use crate::validator::parsed_extension::{ExtensionProcessing, ParsedExtension};
use crate::validator::path_settings::{ObjectIdentifierSet, PathReviewSettings};
use crate::validator::policy_tree::{check_policy_processing, FinalPolicyTree};
use crate::validator::review_results::{Finding, ReviewResults};
use crate::validator::trust_anchor::TrustAnchor;

#[cfg(feature = "revocation")]
use crate::revocation::check_revocation::check_certificate_revocation;

/// `EXTS_OF_INTEREST` lists the extensions that are automatically parsed when preparing a
/// [`ParsedCertificate`] instance. These extensions are consulted during path review and are
/// subsequently available via get_extension without re-parsing.
pub const EXTS_OF_INTEREST: &[ObjectIdentifier] = &[
    ID_CE_SUBJECT_KEY_IDENTIFIER,
    ID_CE_AUTHORITY_KEY_IDENTIFIER,
    ID_CE_BASIC_CONSTRAINTS,
    ID_CE_NAME_CONSTRAINTS,
    ID_CE_SUBJECT_ALT_NAME,
    ID_CE_EXT_KEY_USAGE,
    ID_CE_KEY_USAGE,
    ID_CE_POLICY_CONSTRAINTS,
    ID_CE_CERTIFICATE_POLICIES,
    ID_CE_POLICY_MAPPINGS,
    ID_CE_INHIBIT_ANY_POLICY,
    ID_CE_CRL_DISTRIBUTION_POINTS,
    ID_PE_AUTHORITY_INFO_ACCESS,
];

/// Cap on the number of names examined per certificate during the name constraints sweep.
/// Certificates carrying more names than this are rejected rather than examined.
pub(crate) const NAME_CHECK_MAX: usize = 1 << 10;

/// Critical extension OIDs consumed by the review sweeps themselves.
const CONSUMED_EXTS: &[ObjectIdentifier] = &[
    ID_CE_KEY_USAGE,
    ID_CE_BASIC_CONSTRAINTS,
    ID_CE_NAME_CONSTRAINTS,
    ID_CE_CERTIFICATE_POLICIES,
    ID_CE_POLICY_MAPPINGS,
    ID_CE_POLICY_CONSTRAINTS,
    ID_CE_INHIBIT_ANY_POLICY,
    ID_CE_SUBJECT_ALT_NAME,
    ID_CE_CRL_DISTRIBUTION_POINTS,
    ID_PE_AUTHORITY_INFO_ACCESS,
    ID_CE_ISSUING_DISTRIBUTION_POINT,
    ID_CE_DELTA_CRL_INDICATOR,
];

/// [`PathReviewer`] reviews a certification path against RFC 5280 Section 6 and reports every
/// problem it can find rather than stopping at the first. Each review runs five independent
/// sweeps: signatures/validity/revocation, name constraints, path length, certificate policies,
/// and critical extensions, so a failure in one sweep does not mask findings from another.
///
/// Certificates are presented end-entity first, with the certificate closest to the trust anchor
/// last. Findings are available per certificate via [`errors_at`](Self::errors_at) and
/// [`notifications_at`](Self::notifications_at), with index -1 addressing the path as a whole.
///
/// Checks run once on first access and the results are memoized.
pub struct PathReviewer<'a> {
    pe: &'a PkiEnvironment,
    certs: Vec<ParsedCertificate>,
    anchors: Vec<TrustAnchor>,
    settings: PathReviewSettings,
    valid_date: u64,
    current_date: u64,
    results: Option<ReviewResults>,
    resolved_anchor: Option<usize>,
    end_entity_key: Option<SubjectPublicKeyInfoOwned>,
    final_policy_tree: Option<FinalPolicyTree>,
}

impl<'a> PathReviewer<'a> {
    /// Prepares a reviewer for the presented path. `certs` is ordered with the end-entity
    /// certificate first. Certificates that are byte-equal to a trust anchor certificate are
    /// dropped from the path before review.
    ///
    /// Returns [`Error::EmptyPath`] when no certificates remain to review.
    pub fn new(
        pe: &'a PkiEnvironment,
        certs: Vec<ParsedCertificate>,
        anchors: Vec<TrustAnchor>,
        settings: PathReviewSettings,
    ) -> Result<Self> {
        if certs.is_empty() {
            return Err(Error::EmptyPath);
        }

        let certs: Vec<ParsedCertificate> = certs
            .into_iter()
            .filter(|c| {
                !anchors.iter().any(|a| match a {
                    TrustAnchor::Certificate(ac) => ac.encoded == c.encoded,
                    TrustAnchor::NameAndKey { .. } => false,
                })
            })
            .collect();
        if certs.is_empty() {
            return Err(Error::EmptyPath);
        }

        let current_date = match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
            Ok(d) => d.as_secs(),
            Err(_) => 0,
        };
        let valid_date = settings.valid_date.unwrap_or(current_date);

        Ok(PathReviewer {
            pe,
            certs,
            anchors,
            settings,
            valid_date,
            current_date,
            results: None,
            resolved_anchor: None,
            end_entity_key: None,
            final_policy_tree: None,
        })
    }

    /// Returns the number of certificates under review.
    pub fn certificate_count(&self) -> usize {
        self.certs.len()
    }

    /// Returns true if the review recorded no errors. Notifications do not affect validity.
    pub fn is_valid(&mut self) -> bool {
        self.do_checks();
        match &self.results {
            Some(r) => r.is_valid(),
            None => false,
        }
    }

    /// Returns the full review results, running the checks if they have not yet run.
    pub fn results(&mut self) -> &ReviewResults {
        self.do_checks();
        // do_checks always populates results
        self.results.get_or_insert_with(|| ReviewResults::new(0))
    }

    /// Returns the errors recorded against certificate `index` (0 = end entity, -1 = whole path).
    pub fn errors_at(&mut self, index: isize) -> &[Finding] {
        self.results().errors_at(index)
    }

    /// Returns the notifications recorded against certificate `index` (0 = end entity, -1 =
    /// whole path).
    pub fn notifications_at(&mut self, index: isize) -> &[Finding] {
        self.results().notifications_at(index)
    }

    /// Returns the trust anchor the path resolved to, if exactly one anchor matched.
    pub fn trust_anchor(&mut self) -> Option<&TrustAnchor> {
        self.do_checks();
        self.resolved_anchor.map(|i| &self.anchors[i])
    }

    /// Returns the subject public key of the end-entity certificate.
    pub fn subject_public_key(&mut self) -> Option<&SubjectPublicKeyInfoOwned> {
        self.do_checks();
        self.end_entity_key.as_ref()
    }

    /// Returns the valid policy tree remaining after the wrap-up procedure, if it is not NULL.
    pub fn policy_tree(&mut self) -> Option<&FinalPolicyTree> {
        self.do_checks();
        self.final_policy_tree.as_ref()
    }

    fn do_checks(&mut self) {
        if self.results.is_some() {
            return;
        }
        info!(
            "Reviewing path with {} certificate(s) against {} trust anchor(s)",
            self.certs.len(),
            self.anchors.len()
        );
        let mut results = ReviewResults::new(self.certs.len());
        let (resolved_anchor, end_entity_key) = self.check_signatures(&mut results);
        self.check_name_constraints(&mut results);
        self.check_path_length(&mut results);
        self.final_policy_tree = check_policy_processing(&self.certs, &self.settings, &mut results);
        self.check_critical_extensions(&mut results);
        self.resolved_anchor = resolved_anchor;
        self.end_entity_key = end_entity_key;
        self.results = Some(results);
    }

    //----------------------------------------------------------------------------
    // signature / validity / revocation sweep
    //----------------------------------------------------------------------------
    fn check_signatures(
        &self,
        results: &mut ReviewResults,
    ) -> (Option<usize>, Option<SubjectPublicKeyInfoOwned>) {
        let n = self.certs.len();

        if self.valid_date != self.current_date {
            results.add_notification(
                -1,
                Finding::ValidityDates {
                    valid_date: self.valid_date,
                    current_date: self.current_date,
                },
            );
        }

        // anchor discovery against the certificate closest to the anchor
        let last = &self.certs[n - 1];
        let matching: Vec<usize> = self
            .anchors
            .iter()
            .enumerate()
            .filter(|(_, a)| a.matches_issuer(last))
            .map(|(i, _)| i)
            .collect();

        let resolved_anchor = match matching.len() {
            0 => {
                results.add_error(
                    -1,
                    Finding::NoTrustAnchorFound {
                        issuer: name_to_string(last.issuer()),
                        anchor_count: self.anchors.len(),
                    },
                );
                if is_self_issued(&last.decoded)
                    && self
                        .verify_cert_signature(last, last.subject_public_key_info())
                        .is_ok()
                {
                    results.add_notification(
                        (n - 1) as isize,
                        Finding::RootKeyValidButNotTrustAnchor,
                    );
                }
                None
            }
            1 => Some(matching[0]),
            _ => {
                results.add_error(
                    -1,
                    Finding::ConflictingTrustAnchors {
                        matching: matching.len(),
                    },
                );
                None
            }
        };

        let mut working_spki: Option<SubjectPublicKeyInfoOwned> = None;
        let mut working_issuer = None;
        let mut issuer_ku: Option<KeyUsage> = None;
        if let Some(anchor_index) = resolved_anchor {
            let anchor = &self.anchors[anchor_index];
            working_spki = Some(anchor.subject_public_key_info().clone());
            working_issuer = Some(anchor.subject_name().clone());
            issuer_ku = anchor.key_usage();
            if let Some(ku) = &issuer_ku {
                if !ku.0.contains(KeyUsages::KeyCertSign) {
                    results.add_notification(-1, Finding::TrustAnchorKeyUsage);
                }
            }
        }

        for index in (0..n).rev() {
            let cert = &self.certs[index];
            let pos = index as isize;

            match &working_spki {
                Some(spki) => {
                    if let Err(e) = self.verify_cert_signature(cert, spki) {
                        debug!("signature verification at index {} failed: {}", index, e);
                        if index == n - 1 && resolved_anchor.is_some() {
                            results.add_error(pos, Finding::TrustAnchorSignatureFailure);
                        } else {
                            results.add_error(pos, Finding::SignatureNotVerified);
                        }
                    }
                }
                None => {
                    // only the topmost certificate can lack a working key. A self-issued root
                    // is judged by its own signature; anchor discovery above already noted a
                    // verifying root key.
                    if is_self_issued(&cert.decoded) {
                        if self
                            .verify_cert_signature(cert, cert.subject_public_key_info())
                            .is_err()
                        {
                            results.add_error(pos, Finding::SignatureNotVerified);
                        }
                    } else {
                        let (aki_serial, aki_issuer) = self.aki_hints(cert);
                        results.add_error(
                            pos,
                            Finding::NoIssuerPublicKey {
                                aki_serial,
                                aki_issuer,
                            },
                        );
                    }
                }
            }

            if let Some(wi) = &working_issuer {
                if !compare_names(wi, cert.issuer()) {
                    results.add_error(
                        pos,
                        Finding::IssuerMismatch {
                            expected: name_to_string(wi),
                            found: name_to_string(cert.issuer()),
                        },
                    );
                }
            }

            let validity = &cert.decoded.tbs_certificate.validity;
            let nb = validity.not_before.to_unix_duration().as_secs();
            let na = validity.not_after.to_unix_duration().as_secs();
            if self.valid_date < nb {
                results.add_error(pos, Finding::NotYetValid { not_before: nb });
            }
            if self.valid_date > na {
                results.add_error(pos, Finding::Expired { not_after: na });
            }

            for uri in get_crl_dp_uris(cert) {
                results.add_notification(pos, Finding::CrlDistributionPoint { uri });
            }
            for uri in get_ocsp_aia_uris(cert) {
                results.add_notification(pos, Finding::OcspLocation { uri });
            }

            #[cfg(feature = "revocation")]
            if self.settings.check_revocation {
                check_certificate_revocation(
                    self.pe,
                    cert,
                    pos,
                    working_spki.as_ref(),
                    issuer_ku.as_ref(),
                    self.valid_date,
                    results,
                );
            }

            if index != 0 {
                if cert.decoded.tbs_certificate.version != Version::V3 {
                    results.add_error(pos, Finding::NotCa);
                } else {
                    match cert.get_extension(&ID_CE_BASIC_CONSTRAINTS) {
                        Ok(Some(ParsedExtension::BasicConstraints(bc))) => {
                            if !bc.ca {
                                results.add_error(pos, Finding::NotCa);
                            }
                        }
                        _ => results.add_error(pos, Finding::MissingBasicConstraints),
                    }
                }
                if let Ok(Some(ParsedExtension::KeyUsage(ku))) =
                    cert.get_extension(&ID_CE_KEY_USAGE)
                {
                    if !ku.0.contains(KeyUsages::KeyCertSign) {
                        results.add_error(pos, Finding::NoCertSignBit);
                    }
                }
            }

            // advance the working state to this certificate for the next iteration
            working_issuer = Some(cert.subject().clone());
            working_spki = Some(cert.subject_public_key_info().clone());
            issuer_ku = match cert.get_extension(&ID_CE_KEY_USAGE) {
                Ok(Some(ParsedExtension::KeyUsage(ku))) => Some(ku.clone()),
                _ => None,
            };
        }

        let end_entity_key = Some(self.certs[0].subject_public_key_info().clone());
        (resolved_anchor, end_entity_key)
    }

    fn aki_hints(&self, cert: &ParsedCertificate) -> (Option<String>, Option<String>) {
        if let Ok(Some(ParsedExtension::AuthorityKeyIdentifier(aki))) =
            cert.get_extension(&ID_CE_AUTHORITY_KEY_IDENTIFIER)
        {
            let serial = aki
                .authority_cert_serial_number
                .as_ref()
                .map(|s| buffer_to_hex(s.as_bytes()));
            let issuer = aki
                .authority_cert_issuer
                .as_ref()
                .and_then(|gns| gns.first())
                .map(general_name_to_string);
            (serial, issuer)
        } else {
            (None, None)
        }
    }

    fn verify_cert_signature(
        &self,
        cert: &ParsedCertificate,
        spki: &SubjectPublicKeyInfoOwned,
    ) -> Result<()> {
        let defer = DeferDecodeSigned::from_der(&cert.encoded)?;
        let sig = match defer.signature.as_bytes() {
            Some(s) => s,
            None => return Err(Error::SignatureVerificationFailure),
        };
        self.pe.verify_signature_message(
            self.pe,
            &defer.tbs_field,
            sig,
            &defer.signature_algorithm,
            spki,
        )
    }

    //----------------------------------------------------------------------------
    // name constraints sweep
    //----------------------------------------------------------------------------
    fn check_name_constraints(&self, results: &mut ReviewResults) {
        let n = self.certs.len();
        let mut permitted = NameConstraintsSet::default();
        let mut excluded = NameConstraintsSet::default();

        for index in (0..n).rev() {
            let cert = &self.certs[index];
            let pos = index as isize;

            // self-issued intermediates are exempt; the end entity is always checked
            if index == 0 || !is_self_issued(&cert.decoded) {
                let subject = cert.subject();

                if !permitted.subject_within_permitted_subtrees(subject) {
                    results.add_error(
                        pos,
                        Finding::NameNotPermitted {
                            name: name_to_string(subject),
                        },
                    );
                    return;
                }
                if excluded.subject_within_excluded_subtrees(subject) {
                    results.add_error(
                        pos,
                        Finding::NameExcluded {
                            name: name_to_string(subject),
                        },
                    );
                    return;
                }

                if let Ok(Some(ParsedExtension::SubjectAltName(san))) =
                    cert.get_extension(&ID_CE_SUBJECT_ALT_NAME)
                {
                    if san.0.len() > NAME_CHECK_MAX {
                        results.add_error(
                            pos,
                            Finding::SubjectAltNameTooLarge { count: san.0.len() },
                        );
                        return;
                    }
                    for gn in san.0.iter() {
                        let single = SubjectAltName(vec![gn.clone()]);
                        if !permitted.san_within_permitted_subtrees(&Some(&single)) {
                            results.add_error(
                                pos,
                                Finding::NameNotPermitted {
                                    name: general_name_to_string(gn),
                                },
                            );
                            return;
                        }
                        if excluded.san_within_excluded_subtrees(&Some(&single)) {
                            results.add_error(
                                pos,
                                Finding::NameExcluded {
                                    name: general_name_to_string(gn),
                                },
                            );
                            return;
                        }
                    }
                }
            }

            if index != 0 {
                if let Ok(Some(ParsedExtension::NameConstraints(nc))) =
                    cert.get_extension(&ID_CE_NAME_CONSTRAINTS)
                {
                    if let Some(perm) = &nc.permitted_subtrees {
                        permitted.calculate_intersection(perm);
                    }
                    if let Some(excl) = &nc.excluded_subtrees {
                        excluded.calculate_union(excl);
                    }
                }
            }
        }
    }

    //----------------------------------------------------------------------------
    // path length sweep
    //----------------------------------------------------------------------------
    fn check_path_length(&self, results: &mut ReviewResults) {
        let n = self.certs.len();
        let mut max_path_length = n as i64;
        let mut total = 0usize;

        for index in (1..n).rev() {
            let cert = &self.certs[index];

            if !is_self_issued(&cert.decoded) {
                total += 1;
                if max_path_length <= 0 {
                    results.add_error(index as isize, Finding::PathLengthExceeded);
                } else {
                    max_path_length -= 1;
                }
            }

            if let Ok(Some(ParsedExtension::BasicConstraints(bc))) =
                cert.get_extension(&ID_CE_BASIC_CONSTRAINTS)
            {
                if let Some(plc) = bc.path_len_constraint {
                    max_path_length = max_path_length.min(plc as i64);
                }
            }
        }

        results.add_notification(-1, Finding::TotalPathLength { length: total });
    }

    //----------------------------------------------------------------------------
    // critical extension sweep
    //----------------------------------------------------------------------------
    fn check_critical_extensions(&self, results: &mut ReviewResults) {
        for index in (0..self.certs.len()).rev() {
            let cert = &self.certs[index];
            let pos = index as isize;

            let mut unresolved: ObjectIdentifierSet = match &cert.decoded.tbs_certificate.extensions
            {
                Some(exts) => exts
                    .iter()
                    .filter(|e| e.critical)
                    .map(|e| e.extn_id)
                    .collect(),
                None => Default::default(),
            };

            for oid in CONSUMED_EXTS {
                unresolved.remove(oid);
            }
            if index == 0 {
                // extended key usage is consumed at the end entity
                unresolved.remove(&ID_CE_EXT_KEY_USAGE);
            }
            if unresolved.contains(&ID_PE_QC_STATEMENTS)
                && self.process_qc_statements(cert, pos, results)
            {
                unresolved.remove(&ID_PE_QC_STATEMENTS);
            }

            for checker in self.pe.path_checkers() {
                if let Err(e) = checker.check(cert, &mut unresolved) {
                    results.add_error(pos, Finding::PathCheckerFailure { msg: e.to_string() });
                }
            }

            for oid in unresolved {
                results.add_error(
                    pos,
                    Finding::UnknownCriticalExtension {
                        oid: oid.to_string(),
                    },
                );
            }
        }
    }

    /// Processes a critical qcStatements extension. Returns true when the extension decoded and
    /// every statement in it was recognized, so the caller can treat the extension as resolved.
    fn process_qc_statements(
        &self,
        cert: &ParsedCertificate,
        pos: isize,
        results: &mut ReviewResults,
    ) -> bool {
        let exts = match &cert.decoded.tbs_certificate.extensions {
            Some(exts) => exts,
            None => return false,
        };
        let ext = match exts.iter().find(|e| e.extn_id == ID_PE_QC_STATEMENTS) {
            Some(ext) => ext,
            None => return false,
        };

        let statements = match QcStatements::from_der(ext.extn_value.as_bytes()) {
            Ok(s) => s,
            Err(e) => {
                debug!("qcStatements decode failed: {}", e);
                results.add_error(pos, Finding::QcStatementsDecodeFailure);
                return false;
            }
        };

        let mut all_known = true;
        for stmt in &statements {
            match stmt.statement_id {
                ID_QCS_PKIX_QC_SYNTAX_V1 => {}
                ID_ETSI_QCS_QC_COMPLIANCE => {
                    results.add_notification(pos, Finding::QcEuCompliance);
                }
                ID_ETSI_QCS_QC_SSCD => {
                    results.add_notification(pos, Finding::QcSscd);
                }
                ID_ETSI_QCS_QC_LIMIT_VALUE => match &stmt.statement_info {
                    Some(info) => match info.decode_as::<MonetaryValue>() {
                        Ok(mv) => {
                            results.add_notification(
                                pos,
                                Finding::QcLimitValue {
                                    currency: mv.currency.to_display_string(),
                                    amount: mv.amount,
                                    exponent: mv.exponent,
                                },
                            );
                        }
                        Err(e) => {
                            debug!("QcLimitValue decode failed: {}", e);
                            results.add_error(pos, Finding::QcStatementsDecodeFailure);
                        }
                    },
                    None => {
                        results.add_error(pos, Finding::QcStatementsDecodeFailure);
                    }
                },
                other => {
                    all_known = false;
                    results.add_notification(
                        pos,
                        Finding::QcUnknownStatement {
                            oid: other.to_string(),
                        },
                    );
                }
            }
        }
        all_known
    }
}
