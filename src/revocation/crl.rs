//! CRL inspection utilities used while determining revocation status

use core::cmp::Ordering;

use const_oid::db::rfc5912::{
    ID_CE_CRL_NUMBER, ID_CE_CRL_REASONS, ID_CE_DELTA_CRL_INDICATOR,
    ID_CE_ISSUING_DISTRIBUTION_POINT,
};
use der::asn1::{ObjectIdentifier, Uint};
use der::Decode;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::crl::{CertificateList, RevokedCert};
use x509_cert::ext::pkix::crl::CrlReason;
use x509_cert::ext::pkix::IssuingDistributionPoint;
use x509_cert::serial_number::SerialNumber;

use crate::environment::pki_environment::PkiEnvironment;
use crate::util::error::*;
use crate::validator::parsed_certificate::DeferDecodeSigned;

/// Verifies the signature on an encoded CRL using the presented public key. The encoded form is
/// used so the TBSCertList is verified as signed, without re-encoding.
pub(crate) fn verify_crl_signature(
    pe: &PkiEnvironment,
    enc_crl: &[u8],
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let defer = DeferDecodeSigned::from_der(enc_crl)?;
    let sig = match defer.signature.as_bytes() {
        Some(s) => s,
        None => return Err(Error::SignatureVerificationFailure),
    };
    pe.verify_signature_message(pe, &defer.tbs_field, sig, &defer.signature_algorithm, spki)
}

/// Returns true if the CRL is current at the time of interest, i.e., nextUpdate is absent or
/// later than the time of interest.
pub(crate) fn crl_is_fresh(crl: &CertificateList, valid_date: u64) -> bool {
    match &crl.tbs_cert_list.next_update {
        Some(nu) => nu.to_unix_duration().as_secs() > valid_date,
        None => true,
    }
}

/// Returns nextUpdate from the CRL in seconds since the Unix epoch, if present.
pub(crate) fn crl_next_update(crl: &CertificateList) -> Option<u64> {
    crl.tbs_cert_list
        .next_update
        .as_ref()
        .map(|nu| nu.to_unix_duration().as_secs())
}

fn crl_extension_value(crl: &CertificateList, oid: &ObjectIdentifier) -> Option<Vec<u8>> {
    crl.tbs_cert_list
        .crl_extensions
        .as_ref()?
        .iter()
        .find(|e| e.extn_id == *oid)
        .map(|e| e.extn_value.as_bytes().to_vec())
}

/// Returns the big-endian cRLNumber value from the CRL, if present.
pub(crate) fn crl_number(crl: &CertificateList) -> Option<Vec<u8>> {
    let v = crl_extension_value(crl, &ID_CE_CRL_NUMBER)?;
    Uint::from_der(&v).ok().map(|u| u.as_bytes().to_vec())
}

/// Returns the big-endian deltaCRLIndicator value from the CRL, if present.
pub(crate) fn delta_crl_indicator(crl: &CertificateList) -> Option<Vec<u8>> {
    let v = crl_extension_value(crl, &ID_CE_DELTA_CRL_INDICATOR)?;
    Uint::from_der(&v).ok().map(|u| u.as_bytes().to_vec())
}

/// Returns the raw encoded issuing distribution point extension value, if present. The raw form
/// is compared byte-wise when pairing delta CRLs with base CRLs.
pub(crate) fn idp_raw(crl: &CertificateList) -> Option<Vec<u8>> {
    crl_extension_value(crl, &ID_CE_ISSUING_DISTRIBUTION_POINT)
}

/// Returns the decoded issuing distribution point extension, if present.
pub(crate) fn idp(crl: &CertificateList) -> Option<IssuingDistributionPoint> {
    let v = crl_extension_value(crl, &ID_CE_ISSUING_DISTRIBUTION_POINT)?;
    IssuingDistributionPoint::from_der(&v).ok()
}

/// Compares two big-endian unsigned integer values.
pub(crate) fn cmp_uint(left: &[u8], right: &[u8]) -> Ordering {
    let l = strip_leading_zeros(left);
    let r = strip_leading_zeros(right);
    match l.len().cmp(&r.len()) {
        Ordering::Equal => l.cmp(r),
        other => other,
    }
}

fn strip_leading_zeros(v: &[u8]) -> &[u8] {
    let start = v.iter().position(|b| *b != 0).unwrap_or(v.len());
    &v[start..]
}

/// Returns the CRL entry for the presented serial number, if the certificate appears on the CRL.
pub(crate) fn find_revoked_entry<'a>(
    crl: &'a CertificateList,
    serial: &SerialNumber,
) -> Option<&'a RevokedCert> {
    crl.tbs_cert_list
        .revoked_certificates
        .as_ref()?
        .iter()
        .find(|rc| &rc.serial_number == serial)
}

/// Renders the reason code from a CRL entry, defaulting to "unspecified" when absent.
pub(crate) fn entry_reason_string(entry: &RevokedCert) -> String {
    let reason = entry
        .crl_entry_extensions
        .as_ref()
        .and_then(|exts| exts.iter().find(|e| e.extn_id == ID_CE_CRL_REASONS))
        .and_then(|e| CrlReason::from_der(e.extn_value.as_bytes()).ok())
        .unwrap_or(CrlReason::Unspecified);
    let s = match reason {
        CrlReason::Unspecified => "unspecified",
        CrlReason::KeyCompromise => "keyCompromise",
        CrlReason::CaCompromise => "cACompromise",
        CrlReason::AffiliationChanged => "affiliationChanged",
        CrlReason::Superseded => "superseded",
        CrlReason::CessationOfOperation => "cessationOfOperation",
        CrlReason::CertificateHold => "certificateHold",
        CrlReason::RemoveFromCRL => "removeFromCRL",
        CrlReason::PrivilegeWithdrawn => "privilegeWithdrawn",
        CrlReason::AaCompromise => "aACompromise",
    };
    s.to_string()
}
