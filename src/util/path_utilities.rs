//! Utility functions supporting certification path review

use std::str::FromStr;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use url::Url;

use const_oid::db::rfc5912::{
    ID_AD_OCSP, ID_CE_CRL_DISTRIBUTION_POINTS, ID_PE_AUTHORITY_INFO_ACCESS,
};
use der::asn1::{Ia5String, PrintableString, Utf8StringRef};
use der::{Encode, Tagged};
use subtle_encoding::hex;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::constraints::name::GeneralSubtrees;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::parsed_extension::{ExtensionProcessing, ParsedExtension};
use crate::{Error, Result};

/// `buffer_to_hex` takes a byte array and returns a string featuring upper case ASCII hex characters
/// (without commas, spaces, or brackets).
/// ```
/// use certreview::buffer_to_hex;
/// let buf: [u8; 3] = [1, 2, 3];
/// assert_eq!(buffer_to_hex(&buf), "010203");
/// ```
pub fn buffer_to_hex(buffer: &[u8]) -> String {
    let hex = hex::encode_upper(buffer);
    let r = std::str::from_utf8(hex.as_slice());
    if let Ok(s) = r {
        s.to_string()
    } else {
        String::new()
    }
}

/// `is_self_issued` returns true if the subject field of the given certificate matches the issuer
/// field and false otherwise.
pub fn is_self_issued(cert: &Certificate) -> bool {
    compare_names(
        &cert.tbs_certificate.issuer,
        &cert.tbs_certificate.subject,
    )
}

/// `name_to_string` returns a string representation of given Name value.
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// get_value_from_rdn returns the value from AttributeTypeAndValue as a string for use in comparing
/// values where leading whitespace may be a factor
pub fn get_value_from_rdn(atav: &AttributeTypeAndValue) -> Result<String> {
    let val = match atav.value.tag() {
        der::Tag::PrintableString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: PrintableString| s.to_string()),
        der::Tag::Utf8String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Utf8StringRef<'_>| s.to_string()),
        der::Tag::Ia5String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Ia5String| s.to_string()),
        _ => None,
    };

    let mut s = "".to_string();
    if let Some(val) = val {
        let mut iter = val.char_indices().peekable();
        while let Some((i, c)) = iter.next() {
            match c {
                '#' if i == 0 => s.push_str("\\#"),
                ' ' if i == 0 || iter.peek().is_none() => s.push_str("\\ "),
                '"' | '+' | ',' | ';' | '<' | '>' | '\\' => s.push_str(format!("\\{}", c).as_str()),
                '\x00'..='\x1f' | '\x7f' => s.push_str(format!("\\{:02x}", c as u8).as_str()),
                _ => s.push(c),
            }
        }
    } else {
        match atav.value.to_der() {
            Ok(val) => {
                s.push_str(format!("{}=#", atav.oid).as_str());
                for c in val {
                    s.push_str(format!("{:02x}", c).as_str());
                }
            }
            Err(e) => {
                return Err(Error::Asn1Error(e));
            }
        }
    }
    Ok(s)
}

/// [`compare_names`] compares two Name values returning true if they match and false otherwise.
///
/// Comparison is whitespace-insensitive and case-insensitive so that names that differ only in
/// character set or capitalization still chain.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    // no match if not the same number of RDNs
    if left.0.len() != right.0.len() {
        return false;
    }

    for i in 0..left.0.len() {
        let lrdn = &left.0[i];
        let rrdn = &right.0[i];

        if lrdn.0.len() != rrdn.0.len() {
            return false;
        }

        if lrdn != rrdn {
            // only do the whitespace and case insensitive work if the simpler compare fails
            for j in 0..lrdn.0.len() {
                let (l, r) = match (lrdn.0.get(j), rrdn.0.get(j)) {
                    (Some(l), Some(r)) => (l, r),
                    (None, None) => continue,
                    _ => return false,
                };

                if l.oid != r.oid {
                    return false;
                }

                let l_str_val = match get_value_from_rdn(l) {
                    Ok(val) => val.replace("\\ ", " "),
                    Err(_e) => {
                        return false;
                    }
                };
                let r_str_val = match get_value_from_rdn(r) {
                    Ok(val) => val.replace("\\ ", " "),
                    Err(_e) => {
                        return false;
                    }
                };

                let l_val = l_str_val.trim().to_lowercase();
                let r_val = r_str_val.trim().to_lowercase();

                if l_val != r_val {
                    lazy_static! {
                        static ref WS_RE: Regex = Regex::new(r"\s+").unwrap();
                    }

                    //collapse multiple whitespace instances into one and compare again
                    let l_str_val = WS_RE.replace_all(l_val.as_str(), " ");
                    let r_str_val = WS_RE.replace_all(r_val.as_str(), " ");
                    if l_str_val != r_str_val {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// `descended_from_dn` returns true if name is equal to or descended from subtree and false otherwise.
pub(crate) fn descended_from_dn(subtree: &Name, name: &Name, min: u32, max: Option<u32>) -> bool {
    //if descendant has fewer RDNs then it is not a descendant
    if subtree.0.len() > name.0.len() {
        return false;
    }

    let diff = (name.0.len() - subtree.0.len()) as u32;
    if diff < min {
        return false;
    }
    if let Some(max) = max {
        if diff > max {
            return false;
        }
    }

    for i in 0..subtree.0.len() {
        if subtree.0[i] != name.0[i] {
            let mut let_it_slide = false;

            // some folks can't manage to use the same character set in a name constraint and subject name
            // allow this practice to not break stuff
            let l = &subtree.0[i];
            let r = &name.0[i];
            if l.0.len() != r.0.len() {
                // diff number of attributes
                return false;
            }
            for j in 0..l.0.len() {
                let (lau, rau) = match (l.0.get(j), r.0.get(j)) {
                    (Some(l), Some(r)) => (l, r),
                    _ => return false,
                };
                if lau.oid != rau.oid {
                    // if the type of attribute, i.e., c, cn, o, is different, return false
                    return false;
                }
                let lav = &lau.value;
                let rav = &rau.value;
                //not checking tag on the any since that is where the issue is most likely
                if lav.value() == rav.value() {
                    if lav.tag() != rav.tag() {
                        debug!("Permitting a DN name constraint match despite different character sets");
                        let_it_slide = true;
                    }
                } else {
                    let llav = lau.to_string();
                    let rlav = rau.to_string();
                    if llav.to_lowercase() == rlav.to_lowercase() {
                        debug!("Permitting a DN name constraint match despite different capitalization");
                        let_it_slide = true;
                    }
                }
            }

            if !let_it_slide {
                return false;
            }
        }
    }

    true
}

/// `descended_from_host` returns true if cand is equal to or descended from the host indicated by
/// prev_name and false otherwise.
pub(crate) fn descended_from_host(prev_name: &Ia5String, cand: &str, is_uri: bool) -> bool {
    let base = prev_name.to_string();

    let mut filter = regex::escape(base.as_str());
    filter.push('$');
    let filter_re = Regex::new(filter.as_str());
    if let Ok(fe) = filter_re {
        if let Some(parts) = fe.captures(cand) {
            if cand.len() == base.len() {
                return true;
            }

            let match_start = if let Some(part) = parts.get(0) {
                part.start()
            } else {
                return false;
            };

            if !is_uri {
                let cand_next_to_last_char = if match_start != 0 {
                    cand.chars().nth(match_start - 1).unwrap_or(' ')
                } else {
                    ' '
                };
                if cand_next_to_last_char == '.' {
                    return true;
                }
            } else {
                let cand_last_char = if match_start != 0 {
                    cand.chars().nth(match_start).unwrap_or(' ')
                } else {
                    ' '
                };
                if cand_last_char == '.' {
                    return true;
                }
            }
        }
    }
    false
}

/// `is_email` returns true if addr appears to be an email address.
pub(crate) fn is_email(addr: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            "^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([-.]{1}[a-z0-9]+)*.[a-z]{2,6})"
        )
        .unwrap();
    }

    if let Some(_parts) = EMAIL_RE.captures(addr) {
        return true;
    }

    false
}

/// `descended_from_rfc822` returns true if new_name is equal to or descended from prev_name and
/// false otherwise.
pub(crate) fn descended_from_rfc822(prev_name: &Ia5String, new_name: &Ia5String) -> bool {
    let cand = new_name.to_string();
    let base = prev_name.to_string();

    let mut filter = regex::escape(base.as_str());
    filter.push('$');
    let filter_re = Regex::new(filter.as_str());
    if let Ok(fe) = filter_re {
        if let Some(parts) = fe.captures(cand.as_str()) {
            if is_email(base.as_str()) && cand.len() == base.len() {
                return true;
            }

            let match_start = if let Some(part) = parts.get(0) {
                part.start()
            } else {
                return false;
            };

            let base_first_char = if let Some(part) = base.chars().next() {
                part
            } else {
                return false;
            };

            let cand_last_char = if match_start != 0 {
                cand.chars().nth(match_start - 1).unwrap_or(' ')
            } else {
                ' '
            };

            if base_first_char != '.' {
                if base_first_char == '@' {
                    return true;
                }

                if '@' == cand_last_char {
                    return true;
                }
            } else if '@' != cand_last_char {
                return true;
            }
        }
    }
    false
}

/// `host_from_uri` extracts the host component of a URI, if any.
pub(crate) fn host_from_uri(uri: &str) -> Option<String> {
    match Url::parse(uri) {
        Ok(url) => url.host().map(|h| h.to_string()),
        Err(_e) => None,
    }
}

/// `has_rfc822` returns true if the given GeneralSubtrees contains at least one RFC822 name
pub(crate) fn has_rfc822(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|s| matches!(&s.base, GeneralName::Rfc822Name(_)))
}

/// `has_dns_name` returns true if the given GeneralSubtrees contains at least one DNS name
pub(crate) fn has_dns_name(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|s| matches!(&s.base, GeneralName::DnsName(_)))
}

/// `has_dn` returns true if the given GeneralSubtrees contains at least one DN
pub(crate) fn has_dn(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|s| matches!(&s.base, GeneralName::DirectoryName(_)))
}

/// `has_uri` returns true if the given GeneralSubtrees contains at least one URI
pub(crate) fn has_uri(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|s| matches!(&s.base, GeneralName::UniformResourceIdentifier(_)))
}

/// `get_crl_dp_uris` collects unique HTTP URIs from the CRL distribution points extension of the
/// presented certificate.
pub fn get_crl_dp_uris(cert: &ParsedCertificate) -> Vec<String> {
    let mut retval: Vec<String> = vec![];
    if let Ok(Some(ParsedExtension::CrlDistributionPoints(crl_dps))) =
        cert.get_extension(&ID_CE_CRL_DISTRIBUTION_POINTS)
    {
        for crl_dp in &crl_dps.0 {
            if let Some(DistributionPointName::FullName(gns)) = &crl_dp.distribution_point {
                for gn in gns {
                    if let GeneralName::UniformResourceIdentifier(uri) = gn {
                        let s = uri.to_string();
                        if !retval.contains(&s) && s.starts_with("http") {
                            retval.push(s);
                        }
                    }
                }
            }
        }
    }
    retval
}

/// `get_ocsp_aia_uris` collects unique HTTP URIs for OCSP responders from the authority information
/// access extension of the presented certificate.
pub fn get_ocsp_aia_uris(cert: &ParsedCertificate) -> Vec<String> {
    let mut retval: Vec<String> = vec![];
    if let Ok(Some(ParsedExtension::AuthorityInfoAccessSyntax(aia))) =
        cert.get_extension(&ID_PE_AUTHORITY_INFO_ACCESS)
    {
        for ad in &aia.0 {
            if ID_AD_OCSP == ad.access_method {
                if let GeneralName::UniformResourceIdentifier(uri) = &ad.access_location {
                    let s = uri.to_string();
                    if !retval.contains(&s) && s.starts_with("http") {
                        retval.push(s);
                    }
                }
            }
        }
    }
    retval
}

/// `general_name_to_string` renders a GeneralName for use in diagnostic messages.
pub(crate) fn general_name_to_string(gn: &GeneralName) -> String {
    match gn {
        GeneralName::DirectoryName(dn) => name_to_string(dn),
        GeneralName::DnsName(dns) => dns.to_string(),
        GeneralName::Rfc822Name(rfc822) => rfc822.to_string(),
        GeneralName::UniformResourceIdentifier(uri) => uri.to_string(),
        GeneralName::OtherName(_) => "otherName".to_string(),
        GeneralName::RegisteredId(rid) => rid.to_string(),
        GeneralName::IpAddress(ip) => buffer_to_hex(ip.as_bytes()),
        GeneralName::EdiPartyName(_) => "ediPartyName".to_string(),
    }
}

/// `oid_from_string` parses a dotted decimal string into an ObjectIdentifier.
pub fn oid_from_string(oid_str: &str) -> Result<der::asn1::ObjectIdentifier> {
    match der::asn1::ObjectIdentifier::from_str(oid_str) {
        Ok(oid) => Ok(oid),
        Err(_e) => Err(Error::Unrecognized),
    }
}
