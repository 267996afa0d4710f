//! Revocation status determination for a certificate under review

use log::debug;

use const_oid::db::rfc5912::ID_CE_BASIC_CONSTRAINTS;
use der::Decode;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::crl::CertificateList;
use x509_cert::ext::pkix::{KeyUsage, KeyUsages};

use crate::environment::pki_environment::PkiEnvironment;
use crate::revocation::crl::*;
use crate::util::path_utilities::{compare_names, get_crl_dp_uris};
use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::parsed_extension::{ExtensionProcessing, ParsedExtension};
use crate::validator::review_results::{Finding, ReviewResults};

/// An encoded CRL together with its decoded form, retained so signatures can be verified over
/// the bytes as signed.
struct CrlCandidate {
    encoded: Vec<u8>,
    decoded: CertificateList,
}

/// `check_certificate_revocation` determines the revocation status of one certificate in the
/// path using CRLs from the registered stores and, failing that, CRLs fetched from the
/// certificate's distribution points.
///
/// A current CRL is preferred; when only stale CRLs are available they are examined anyway so
/// that a revocation present on a stale CRL is still surfaced, and a [`Finding::NoValidCrlFound`]
/// error is recorded. Findings are recorded against certificate `pos`.
pub(crate) fn check_certificate_revocation(
    pe: &PkiEnvironment,
    cert: &ParsedCertificate,
    pos: isize,
    issuer_spki: Option<&SubjectPublicKeyInfoOwned>,
    issuer_ku: Option<&KeyUsage>,
    valid_date: u64,
    results: &mut ReviewResults,
) {
    let mut fresh: Option<CrlCandidate> = None;
    let mut stale: Vec<CrlCandidate> = vec![];

    // local stores first
    let local = pe.get_crls(cert.issuer());
    if local.is_empty() {
        results.add_notification(pos, Finding::NoCrlInStore);
    }
    for encoded in local {
        let decoded = match CertificateList::from_der(&encoded) {
            Ok(crl) => crl,
            Err(e) => {
                debug!("skipping undecodable CRL from store: {}", e);
                continue;
            }
        };
        if !compare_names(&decoded.tbs_cert_list.issuer, cert.issuer()) {
            continue;
        }
        if crl_is_fresh(&decoded, valid_date) {
            results.add_notification(
                pos,
                Finding::LocalValidCrl {
                    this_update: decoded.tbs_cert_list.this_update.to_unix_duration().as_secs(),
                },
            );
            fresh = Some(CrlCandidate { encoded, decoded });
            break;
        } else {
            results.add_notification(
                pos,
                Finding::LocalInvalidCrl {
                    next_update: crl_next_update(&decoded),
                },
            );
            stale.push(CrlCandidate { encoded, decoded });
        }
    }

    // fall back to distribution points
    if fresh.is_none() {
        for uri in get_crl_dp_uris(cert) {
            let encoded = match pe.fetch_crl(&uri) {
                Ok(enc) => enc,
                Err(e) => {
                    debug!("CRL fetch from {} failed: {}", uri, e);
                    results.add_notification(pos, Finding::CrlFetchFailure { uri });
                    continue;
                }
            };
            let decoded = match CertificateList::from_der(&encoded) {
                Ok(crl) => crl,
                Err(e) => {
                    debug!("skipping undecodable CRL from {}: {}", uri, e);
                    results.add_notification(pos, Finding::CrlFetchFailure { uri });
                    continue;
                }
            };
            if !compare_names(&decoded.tbs_cert_list.issuer, cert.issuer()) {
                results.add_notification(pos, Finding::OnlineCrlWrongCa { uri });
                continue;
            }
            if crl_is_fresh(&decoded, valid_date) {
                results.add_notification(pos, Finding::OnlineValidCrl { uri });
                fresh = Some(CrlCandidate { encoded, decoded });
                break;
            } else {
                results.add_notification(pos, Finding::OnlineInvalidCrl { uri });
                stale.push(CrlCandidate { encoded, decoded });
            }
        }
    }

    match fresh {
        Some(candidate) => {
            if let Some(fatal) =
                examine_crl(pe, cert, &candidate, issuer_spki, issuer_ku, valid_date, pos, results)
            {
                results.add_error(pos, fatal);
            }
        }
        None => {
            // stale CRLs are examined anyway so a revocation is not missed, but the path is
            // still short a current CRL
            for candidate in &stale {
                if let Some(fatal) =
                    examine_crl(pe, cert, candidate, issuer_spki, issuer_ku, valid_date, pos, results)
                {
                    results.add_error(pos, fatal);
                    return;
                }
            }
            results.add_error(pos, Finding::NoValidCrlFound);
        }
    }
}

/// Examines one CRL for the certificate under review. Notifications are recorded directly;
/// a returned finding is fatal and is recorded as an error by the caller.
#[allow(clippy::too_many_arguments)]
fn examine_crl(
    pe: &PkiEnvironment,
    cert: &ParsedCertificate,
    candidate: &CrlCandidate,
    issuer_spki: Option<&SubjectPublicKeyInfoOwned>,
    issuer_ku: Option<&KeyUsage>,
    valid_date: u64,
    pos: isize,
    results: &mut ReviewResults,
) -> Option<Finding> {
    let crl = &candidate.decoded;

    if let Some(ku) = issuer_ku {
        if !ku.0.contains(KeyUsages::CRLSign) {
            return Some(Finding::NoCrlSigningPermitted);
        }
    }

    match issuer_spki {
        Some(spki) => {
            if let Err(e) = verify_crl_signature(pe, &candidate.encoded, spki) {
                debug!("CRL signature verification failed: {}", e);
                return Some(Finding::CrlSignatureFailure);
            }
        }
        None => return Some(Finding::CrlNoIssuerPublicKey),
    }

    // delta CRLs require a suitable base
    let mut base: Option<CertificateList> = None;
    if let Some(indicator) = delta_crl_indicator(crl) {
        match find_base_crl(pe, crl, &indicator) {
            Some(b) => base = Some(b),
            None => return Some(Finding::NoBaseCrl),
        }
    }

    if let Some(idp) = idp(crl) {
        let cert_is_ca = match cert.get_extension(&ID_CE_BASIC_CONSTRAINTS) {
            Ok(Some(ParsedExtension::BasicConstraints(bc))) => bc.ca,
            _ => false,
        };
        if idp.only_contains_user_certs && cert_is_ca {
            return Some(Finding::CrlScopeOnlyUserCerts);
        }
        if idp.only_contains_ca_certs && !cert_is_ca {
            return Some(Finding::CrlScopeOnlyCaCerts);
        }
        if idp.only_contains_attribute_certs {
            return Some(Finding::CrlScopeOnlyAttributeCerts);
        }
    }

    let serial = &cert.decoded.tbs_certificate.serial_number;
    let entry = find_revoked_entry(crl, serial)
        .or_else(|| base.as_ref().and_then(|b| find_revoked_entry(b, serial)));

    match entry {
        Some(entry) => {
            let date = entry.revocation_date.to_unix_duration().as_secs();
            let reason = entry_reason_string(entry);
            if date <= valid_date {
                return Some(Finding::CertificateRevoked { date, reason });
            }
            results.add_notification(pos, Finding::RevokedAfterValidation { date, reason });
        }
        None => {
            results.add_notification(pos, Finding::NotRevoked);
        }
    }

    if let Some(nu) = crl_next_update(crl) {
        if nu <= valid_date {
            results.add_notification(pos, Finding::CrlUpdateAvailable { next_update: nu });
        }
    }

    None
}

/// Searches the registered stores for a base CRL suitable for the presented delta CRL: same
/// issuer, not itself a delta, byte-equal issuing distribution point, and a cRLNumber at least
/// the delta indicator but below the delta's own cRLNumber.
fn find_base_crl(
    pe: &PkiEnvironment,
    delta: &CertificateList,
    indicator: &[u8],
) -> Option<CertificateList> {
    let delta_number = crl_number(delta)?;
    let delta_idp = idp_raw(delta);

    for encoded in pe.get_crls(&delta.tbs_cert_list.issuer) {
        let cand = match CertificateList::from_der(&encoded) {
            Ok(crl) => crl,
            Err(_) => continue,
        };
        if !compare_names(&cand.tbs_cert_list.issuer, &delta.tbs_cert_list.issuer) {
            continue;
        }
        if delta_crl_indicator(&cand).is_some() {
            continue;
        }
        if idp_raw(&cand) != delta_idp {
            continue;
        }
        let number = match crl_number(&cand) {
            Some(n) => n,
            None => continue,
        };
        if cmp_uint(&number, indicator) != core::cmp::Ordering::Less
            && cmp_uint(&number, &delta_number) == core::cmp::Ordering::Less
        {
            return Some(cand);
        }
    }
    None
}
