//! End-to-end path review scenarios over programmatically built certificates.
//!
//! Signature verification is exercised through a stub callback that accepts a signature when its
//! bytes equal the signer's public key bytes, so chains can be expressed without real keys.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use der::asn1::{BitString, Ia5String, OctetString, SetOfVec, UtcTime};
use der::{Any, Encode, Tag};

use const_oid::db::rfc5912::*;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::certpolicy::PolicyInformation;
use x509_cert::ext::pkix::constraints::name::GeneralSubtree;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, CertificatePolicies, KeyUsage, KeyUsages,
    NameConstraints, PolicyConstraints, SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

use certreview::{
    parse_certificate, Error, Finding, ObjectIdentifierSet, ParsedCertificate, PathChecker,
    PathReviewSettings, PathReviewer, PkiEnvironment, TrustAnchor,
};

const NOT_BEFORE: u64 = 1_000_000_000;
const NOT_AFTER: u64 = 2_000_000_000;
const VALID_DATE: u64 = 1_600_000_000;

const SIG_ALG: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

fn rdn(oid: &str, val: &str) -> RelativeDistinguishedName {
    let atav = AttributeTypeAndValue {
        oid: oid.parse().unwrap(),
        value: Any::new(Tag::Utf8String, val.as_bytes()).unwrap(),
    };
    RelativeDistinguishedName(SetOfVec::try_from(vec![atav]).unwrap())
}

fn dn(cn: &str) -> Name {
    RdnSequence(vec![rdn("2.5.4.6", "US"), rdn("2.5.4.3", cn)])
}

fn dn_c(country: &str, cn: &str) -> Name {
    RdnSequence(vec![rdn("2.5.4.6", country), rdn("2.5.4.3", cn)])
}

fn alg() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: SIG_ALG,
        parameters: None,
    }
}

fn spki(key: &[u8]) -> SubjectPublicKeyInfoOwned {
    SubjectPublicKeyInfoOwned {
        algorithm: alg(),
        subject_public_key: BitString::from_bytes(key).unwrap(),
    }
}

fn time(secs: u64) -> Time {
    Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
}

fn ext<T: Encode>(oid: der::asn1::ObjectIdentifier, critical: bool, value: &T) -> Extension {
    Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(value.to_der().unwrap()).unwrap(),
    }
}

fn bc_ext(ca: bool, path_len_constraint: Option<u8>) -> Extension {
    ext(
        ID_CE_BASIC_CONSTRAINTS,
        true,
        &BasicConstraints {
            ca,
            path_len_constraint,
        },
    )
}

fn ku_ext(ku: KeyUsage) -> Extension {
    ext(ID_CE_KEY_USAGE, true, &ku)
}

fn san_ext(names: Vec<GeneralName>) -> Extension {
    ext(ID_CE_SUBJECT_ALT_NAME, false, &SubjectAltName(names))
}

fn nc_ext(
    permitted: Option<Vec<GeneralSubtree>>,
    excluded: Option<Vec<GeneralSubtree>>,
) -> Extension {
    ext(
        ID_CE_NAME_CONSTRAINTS,
        true,
        &NameConstraints {
            permitted_subtrees: permitted,
            excluded_subtrees: excluded,
        },
    )
}

fn cp_ext(policies: &[der::asn1::ObjectIdentifier]) -> Extension {
    ext(
        ID_CE_CERTIFICATE_POLICIES,
        false,
        &CertificatePolicies(
            policies
                .iter()
                .map(|p| PolicyInformation {
                    policy_identifier: *p,
                    policy_qualifiers: None,
                })
                .collect(),
        ),
    )
}

fn dns_subtree(host: &str) -> GeneralSubtree {
    GeneralSubtree {
        base: GeneralName::DnsName(Ia5String::new(host).unwrap()),
        minimum: 0,
        maximum: None,
    }
}

fn dn_subtree(name: Name) -> GeneralSubtree {
    GeneralSubtree {
        base: GeneralName::DirectoryName(name),
        minimum: 0,
        maximum: None,
    }
}

/// Builds an encoded certificate whose signature equals the signer's public key bytes, matching
/// the stub verifier convention.
#[allow(clippy::too_many_arguments)]
fn make_cert(
    subject: Name,
    issuer: Name,
    serial: u8,
    key: &[u8],
    signer_key: &[u8],
    not_before: u64,
    not_after: u64,
    extensions: Vec<Extension>,
) -> Vec<u8> {
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&[serial]).unwrap(),
        signature: alg(),
        issuer,
        validity: Validity {
            not_before: time(not_before),
            not_after: time(not_after),
        },
        subject,
        subject_public_key_info: spki(key),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        },
    };
    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm: alg(),
        signature: BitString::from_bytes(signer_key).unwrap(),
    };
    cert.to_der().unwrap()
}

fn stub_verify(
    _pe: &PkiEnvironment,
    _message: &[u8],
    signature: &[u8],
    _alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> certreview::Result<()> {
    match spki.subject_public_key.as_bytes() {
        Some(k) if k == signature => Ok(()),
        _ => Err(Error::SignatureVerificationFailure),
    }
}

fn environment() -> PkiEnvironment {
    let mut pe = PkiEnvironment::new();
    pe.add_verify_signature_message_callback(stub_verify);
    pe
}

fn settings() -> PathReviewSettings {
    PathReviewSettings {
        valid_date: Some(VALID_DATE),
        check_revocation: false,
        ..Default::default()
    }
}

const ROOT_KEY: &[u8] = &[1u8; 8];
const INTER_KEY: &[u8] = &[2u8; 8];
const LEAF_KEY: &[u8] = &[3u8; 8];

fn ca_exts() -> Vec<Extension> {
    vec![
        bc_ext(true, None),
        ku_ext(KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign)),
    ]
}

fn root_der() -> Vec<u8> {
    make_cert(
        dn("Root CA"),
        dn("Root CA"),
        1,
        ROOT_KEY,
        ROOT_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        ca_exts(),
    )
}

fn inter_der(extra: Vec<Extension>) -> Vec<u8> {
    let mut exts = ca_exts();
    exts.extend(extra);
    make_cert(
        dn("Intermediate CA"),
        dn("Root CA"),
        2,
        INTER_KEY,
        ROOT_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        exts,
    )
}

fn leaf_der(extra: Vec<Extension>) -> Vec<u8> {
    make_cert(
        dn("End Entity"),
        dn("Intermediate CA"),
        3,
        LEAF_KEY,
        INTER_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        extra,
    )
}

fn parse(der: &[u8]) -> ParsedCertificate {
    parse_certificate(der).unwrap()
}

fn anchor() -> TrustAnchor {
    TrustAnchor::from_certificate(&root_der()).unwrap()
}

fn reviewer<'a>(
    pe: &'a PkiEnvironment,
    certs: Vec<ParsedCertificate>,
    anchors: Vec<TrustAnchor>,
    settings: PathReviewSettings,
) -> PathReviewer<'a> {
    PathReviewer::new(pe, certs, anchors, settings).unwrap()
}

#[test]
fn valid_chain() {
    let pe = environment();
    let certs = vec![parse(&leaf_der(vec![])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(r.is_valid());
    assert_eq!(2, r.certificate_count());
    assert!(r.errors_at(-1).is_empty());
    assert!(r.errors_at(0).is_empty());
    assert!(r.errors_at(1).is_empty());
    assert!(r.trust_anchor().is_some());
    assert_eq!(
        BitString::from_bytes(LEAF_KEY).unwrap(),
        r.subject_public_key().unwrap().subject_public_key
    );
    assert!(r
        .notifications_at(-1)
        .contains(&Finding::TotalPathLength { length: 1 }));
}

#[test]
fn empty_path_is_rejected() {
    let pe = environment();
    assert_eq!(
        Err(Error::EmptyPath),
        PathReviewer::new(&pe, vec![], vec![anchor()], settings()).map(|_| ())
    );

    // a path containing only the anchor certificate is empty after filtering
    let certs = vec![parse(&root_der())];
    assert_eq!(
        Err(Error::EmptyPath),
        PathReviewer::new(&pe, certs, vec![anchor()], settings()).map(|_| ())
    );
}

#[test]
fn expired_certificate() {
    let pe = environment();
    let expired = make_cert(
        dn("End Entity"),
        dn("Intermediate CA"),
        3,
        LEAF_KEY,
        INTER_KEY,
        NOT_BEFORE,
        VALID_DATE - 1000,
        vec![],
    );
    let certs = vec![parse(&expired), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert!(matches!(r.errors_at(0)[0], Finding::Expired { .. }));
    assert!(r.errors_at(1).is_empty());
}

#[test]
fn no_trust_anchor() {
    let pe = environment();
    let certs = vec![parse(&leaf_der(vec![])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![], settings());

    assert!(!r.is_valid());
    assert!(matches!(
        r.errors_at(-1)[0],
        Finding::NoTrustAnchorFound { anchor_count: 0, .. }
    ));
    // without a working key nothing below can be verified either
    assert!(r
        .errors_at(1)
        .iter()
        .any(|f| matches!(f, Finding::NoIssuerPublicKey { .. })));
}

#[test]
fn self_signed_root_without_anchor_is_noted() {
    let pe = environment();
    let certs = vec![parse(&inter_der(vec![])), parse(&root_der())];
    let mut r = reviewer(&pe, certs, vec![], settings());

    assert!(!r.is_valid());
    assert!(r
        .notifications_at(1)
        .contains(&Finding::RootKeyValidButNotTrustAnchor));
    // the root is judged by its own key, so no missing-issuer-key error is recorded
    assert!(r.errors_at(1).is_empty());
}

#[test]
fn self_issued_root_with_broken_self_signature() {
    let pe = environment();
    let bad_root = make_cert(
        dn("Root CA"),
        dn("Root CA"),
        1,
        ROOT_KEY,
        &[8u8; 8], // self signature does not verify
        NOT_BEFORE,
        NOT_AFTER,
        ca_exts(),
    );
    let certs = vec![parse(&inter_der(vec![])), parse(&bad_root)];
    let mut r = reviewer(&pe, certs, vec![], settings());

    assert!(!r.is_valid());
    assert!(r.errors_at(1).contains(&Finding::SignatureNotVerified));
    assert!(!r
        .errors_at(1)
        .iter()
        .any(|f| matches!(f, Finding::NoIssuerPublicKey { .. })));
}

#[test]
fn conflicting_trust_anchors() {
    let pe = environment();
    let other_root = make_cert(
        dn("Root CA"),
        dn("Root CA"),
        9,
        &[9u8; 8],
        &[9u8; 8],
        NOT_BEFORE,
        NOT_AFTER,
        ca_exts(),
    );
    let anchors = vec![anchor(), TrustAnchor::from_certificate(&other_root).unwrap()];
    let certs = vec![parse(&leaf_der(vec![])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, anchors, settings());

    assert!(!r.is_valid());
    assert!(r
        .errors_at(-1)
        .contains(&Finding::ConflictingTrustAnchors { matching: 2 }));
}

#[test]
fn authority_key_identifier_disambiguates_anchors() {
    let pe = environment();
    let mut root_exts = ca_exts();
    root_exts.push(ext(
        ID_CE_SUBJECT_KEY_IDENTIFIER,
        false,
        &SubjectKeyIdentifier(OctetString::new(vec![0xAA]).unwrap()),
    ));
    let root = make_cert(
        dn("Root CA"),
        dn("Root CA"),
        1,
        ROOT_KEY,
        ROOT_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        root_exts,
    );
    let mut other_exts = ca_exts();
    other_exts.push(ext(
        ID_CE_SUBJECT_KEY_IDENTIFIER,
        false,
        &SubjectKeyIdentifier(OctetString::new(vec![0xBB]).unwrap()),
    ));
    let other_root = make_cert(
        dn("Root CA"),
        dn("Root CA"),
        9,
        &[9u8; 8],
        &[9u8; 8],
        NOT_BEFORE,
        NOT_AFTER,
        other_exts,
    );

    let mut inter_exts = ca_exts();
    inter_exts.push(ext(
        ID_CE_AUTHORITY_KEY_IDENTIFIER,
        false,
        &AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(vec![0xAA]).unwrap()),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        },
    ));
    let inter = make_cert(
        dn("Intermediate CA"),
        dn("Root CA"),
        2,
        INTER_KEY,
        ROOT_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        inter_exts,
    );

    let anchors = vec![
        TrustAnchor::from_certificate(&root).unwrap(),
        TrustAnchor::from_certificate(&other_root).unwrap(),
    ];
    let certs = vec![parse(&leaf_der(vec![])), parse(&inter)];
    let mut r = reviewer(&pe, certs, anchors, settings());

    assert!(r.is_valid());
    match r.trust_anchor().unwrap() {
        TrustAnchor::Certificate(c) => {
            assert_eq!(SerialNumber::new(&[1]).unwrap(), c.decoded.tbs_certificate.serial_number)
        }
        _ => panic!("expected certificate anchor"),
    }
}

#[test]
fn broken_signature_mid_chain() {
    let pe = environment();
    let bad_leaf = make_cert(
        dn("End Entity"),
        dn("Intermediate CA"),
        3,
        LEAF_KEY,
        &[77u8; 8], // signed by nobody in the path
        NOT_BEFORE,
        NOT_AFTER,
        vec![],
    );
    let certs = vec![parse(&bad_leaf), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert!(r.errors_at(0).contains(&Finding::SignatureNotVerified));
    assert!(r.errors_at(1).is_empty());
}

#[test]
fn intermediate_must_be_a_ca() {
    let pe = environment();

    // cA=false
    let not_ca = make_cert(
        dn("Intermediate CA"),
        dn("Root CA"),
        2,
        INTER_KEY,
        ROOT_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        vec![bc_ext(false, None)],
    );
    let certs = vec![parse(&leaf_der(vec![])), parse(&not_ca)];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());
    assert!(r.errors_at(1).contains(&Finding::NotCa));

    // basic constraints absent entirely
    let no_bc = make_cert(
        dn("Intermediate CA"),
        dn("Root CA"),
        2,
        INTER_KEY,
        ROOT_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        vec![],
    );
    let certs = vec![parse(&leaf_der(vec![])), parse(&no_bc)];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());
    assert!(r.errors_at(1).contains(&Finding::MissingBasicConstraints));

    // key usage without keyCertSign
    let bad_ku = make_cert(
        dn("Intermediate CA"),
        dn("Root CA"),
        2,
        INTER_KEY,
        ROOT_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        vec![
            bc_ext(true, None),
            ku_ext(KeyUsage(KeyUsages::DigitalSignature.into())),
        ],
    );
    let certs = vec![parse(&leaf_der(vec![])), parse(&bad_ku)];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());
    assert!(r.errors_at(1).contains(&Finding::NoCertSignBit));
}

#[test]
fn issuer_mismatch_is_reported() {
    let pe = environment();
    let stray_leaf = make_cert(
        dn("End Entity"),
        dn("Some Other CA"),
        3,
        LEAF_KEY,
        INTER_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        vec![],
    );
    let certs = vec![parse(&stray_leaf), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert!(r
        .errors_at(0)
        .iter()
        .any(|f| matches!(f, Finding::IssuerMismatch { .. })));
}

#[test]
fn name_constraints_dns() {
    let pe = environment();
    let constrained =
        inter_der(vec![nc_ext(Some(vec![dns_subtree("example.com")]), None)]);

    // a SAN inside the permitted subtree passes
    let good = leaf_der(vec![san_ext(vec![GeneralName::DnsName(
        Ia5String::new("www.example.com").unwrap(),
    )])]);
    let certs = vec![parse(&good), parse(&constrained)];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());
    assert!(r.is_valid());

    // a SAN outside it is flagged at the end entity
    let bad = leaf_der(vec![san_ext(vec![GeneralName::DnsName(
        Ia5String::new("www.example.org").unwrap(),
    )])]);
    let certs = vec![parse(&bad), parse(&constrained)];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());
    assert!(!r.is_valid());
    assert_eq!(
        vec![Finding::NameNotPermitted {
            name: "www.example.org".to_string()
        }],
        r.errors_at(0).to_vec()
    );
}

#[test]
fn name_constraints_excluded_dn() {
    let pe = environment();
    let constrained = inter_der(vec![nc_ext(
        None,
        Some(vec![dn_subtree(RdnSequence(vec![rdn("2.5.4.6", "CA")]))]),
    )]);
    let excluded_leaf = make_cert(
        dn_c("CA", "End Entity"),
        dn("Intermediate CA"),
        3,
        LEAF_KEY,
        INTER_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        vec![],
    );
    let certs = vec![parse(&excluded_leaf), parse(&constrained)];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert!(r
        .errors_at(0)
        .iter()
        .any(|f| matches!(f, Finding::NameExcluded { .. })));
}

#[test]
fn path_length_violation_is_positional() {
    let pe = environment();
    let inter_a = make_cert(
        dn("Intermediate A"),
        dn("Root CA"),
        2,
        INTER_KEY,
        ROOT_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        vec![bc_ext(true, Some(0)), ku_ext(KeyUsage(KeyUsages::KeyCertSign.into()))],
    );
    let inter_b_key: &[u8] = &[4u8; 8];
    let inter_b = make_cert(
        dn("Intermediate B"),
        dn("Intermediate A"),
        4,
        inter_b_key,
        INTER_KEY,
        NOT_BEFORE,
        NOT_AFTER,
        ca_exts(),
    );
    let leaf = make_cert(
        dn("End Entity"),
        dn("Intermediate B"),
        3,
        LEAF_KEY,
        inter_b_key,
        NOT_BEFORE,
        NOT_AFTER,
        vec![],
    );
    let certs = vec![parse(&leaf), parse(&inter_b), parse(&inter_a)];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert!(r.errors_at(1).contains(&Finding::PathLengthExceeded));
    assert!(r.errors_at(2).is_empty());
    assert!(r
        .notifications_at(-1)
        .contains(&Finding::TotalPathLength { length: 2 }));
}

const P1: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.1");
const P2: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.2");

#[test]
fn explicit_policy_without_policies() {
    let pe = environment();
    let certs = vec![parse(&leaf_der(vec![])), parse(&inter_der(vec![]))];
    let mut s = settings();
    s.require_explicit_policy = true;
    let mut r = reviewer(&pe, certs, vec![anchor()], s);

    assert!(!r.is_valid());
    // an empty tree under required explicit policy condemns the path as a whole
    assert!(r.errors_at(-1).contains(&Finding::NoValidPolicyTree));
    assert!(r.policy_tree().is_none());
}

#[test]
fn policy_tree_is_built() {
    let pe = environment();
    let certs = vec![
        parse(&leaf_der(vec![cp_ext(&[P1])])),
        parse(&inter_der(vec![cp_ext(&[const_oid::db::rfc5280::ANY_POLICY])])),
    ];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(r.is_valid());
    let tree = r.policy_tree().unwrap();
    assert_eq!(3, tree.len());
    assert_eq!(1, tree[2].len());
    assert_eq!(P1, tree[2][0].valid_policy);
}

#[test]
fn initial_policy_set_prunes_tree() {
    let pe = environment();
    let certs = vec![
        parse(&leaf_der(vec![cp_ext(&[P1])])),
        parse(&inter_der(vec![cp_ext(&[const_oid::db::rfc5280::ANY_POLICY])])),
    ];
    let mut s = settings();
    s.initial_policy_set = ObjectIdentifierSet::from([P2]);
    let mut r = reviewer(&pe, certs, vec![anchor()], s);

    // explicit policy was not required, so an empty intersection is not an error
    assert!(r.is_valid());
    assert!(r.policy_tree().is_none());
}

#[test]
fn explicit_policy_violation_with_disjoint_policies() {
    let pe = environment();
    let certs = vec![
        parse(&leaf_der(vec![cp_ext(&[P1])])),
        parse(&inter_der(vec![cp_ext(&[P2])])),
    ];
    let mut s = settings();
    s.require_explicit_policy = true;
    let mut r = reviewer(&pe, certs, vec![anchor()], s);

    assert!(!r.is_valid());
    assert!(r
        .errors_at(-1)
        .iter()
        .any(|f| matches!(f, Finding::NoValidPolicyTree | Finding::ExplicitPolicyViolation)));
}

#[test]
fn require_explicit_policy_from_extension() {
    let pe = environment();
    // intermediate demands explicit policy immediately but no policies are asserted
    let constrained = inter_der(vec![ext(
        ID_CE_POLICY_CONSTRAINTS,
        true,
        &PolicyConstraints {
            require_explicit_policy: Some(0),
            inhibit_policy_mapping: None,
        },
    )]);
    let certs = vec![parse(&leaf_der(vec![])), parse(&constrained)];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert!(r.errors_at(-1).contains(&Finding::NoValidPolicyTree));
}

#[test]
fn wrap_up_keeps_one_node_per_policy() {
    let pe = environment();
    let certs = vec![
        parse(&leaf_der(vec![cp_ext(&[
            P1,
            const_oid::db::rfc5280::ANY_POLICY,
        ])])),
        parse(&inter_der(vec![cp_ext(&[const_oid::db::rfc5280::ANY_POLICY])])),
    ];
    let mut s = settings();
    s.initial_policy_set = ObjectIdentifierSet::from([P1]);
    let mut r = reviewer(&pe, certs, vec![anchor()], s);

    // the retained policy is already represented in the final row; replacing the anyPolicy
    // node must not add a second node for it
    assert!(r.is_valid());
    let tree = r.policy_tree().unwrap();
    assert_eq!(1, tree[2].len());
    assert_eq!(P1, tree[2][0].valid_policy);
}

#[test]
fn unknown_critical_extension() {
    let pe = environment();
    let unknown = Extension {
        extn_id: "1.3.6.1.4.1.99999.1".parse().unwrap(),
        critical: true,
        extn_value: OctetString::new(vec![0x05, 0x00]).unwrap(),
    };
    let certs = vec![parse(&leaf_der(vec![unknown])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert_eq!(
        vec![Finding::UnknownCriticalExtension {
            oid: "1.3.6.1.4.1.99999.1".to_string()
        }],
        r.errors_at(0).to_vec()
    );
}

struct ConsumingChecker;

impl PathChecker for ConsumingChecker {
    fn check(
        &self,
        _cert: &ParsedCertificate,
        unresolved_critical_extensions: &mut ObjectIdentifierSet,
    ) -> certreview::Result<()> {
        unresolved_critical_extensions.remove(&"1.3.6.1.4.1.99999.1".parse().unwrap());
        Ok(())
    }
}

struct RejectingChecker;

impl PathChecker for RejectingChecker {
    fn check(
        &self,
        _cert: &ParsedCertificate,
        _unresolved_critical_extensions: &mut ObjectIdentifierSet,
    ) -> certreview::Result<()> {
        Err(Error::Unrecognized)
    }
}

#[test]
fn path_checker_consumes_critical_extension() {
    let mut pe = environment();
    pe.add_path_checker(Box::new(ConsumingChecker));
    let unknown = Extension {
        extn_id: "1.3.6.1.4.1.99999.1".parse().unwrap(),
        critical: true,
        extn_value: OctetString::new(vec![0x05, 0x00]).unwrap(),
    };
    let certs = vec![parse(&leaf_der(vec![unknown])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(r.is_valid());
}

#[test]
fn path_checker_failure_is_reported() {
    let mut pe = environment();
    pe.add_path_checker(Box::new(RejectingChecker));
    let certs = vec![parse(&leaf_der(vec![])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert!(r
        .errors_at(0)
        .iter()
        .any(|f| matches!(f, Finding::PathCheckerFailure { .. })));
}

#[test]
fn qc_statements_are_reported() {
    use certreview::{
        Iso4217CurrencyCode, MonetaryValue, QcStatement, QcStatements, ID_ETSI_QCS_QC_COMPLIANCE,
        ID_ETSI_QCS_QC_LIMIT_VALUE, ID_ETSI_QCS_QC_SSCD, ID_PE_QC_STATEMENTS,
    };

    let pe = environment();
    let statements: QcStatements = vec![
        QcStatement {
            statement_id: ID_ETSI_QCS_QC_COMPLIANCE,
            statement_info: None,
        },
        QcStatement {
            statement_id: ID_ETSI_QCS_QC_SSCD,
            statement_info: None,
        },
        QcStatement {
            statement_id: ID_ETSI_QCS_QC_LIMIT_VALUE,
            statement_info: Some(
                Any::encode_from(&MonetaryValue {
                    currency: Iso4217CurrencyCode::Alphabetic(
                        der::asn1::PrintableString::new("EUR").unwrap(),
                    ),
                    amount: 100,
                    exponent: 2,
                })
                .unwrap(),
            ),
        },
    ];
    let qc = ext(ID_PE_QC_STATEMENTS, true, &statements);
    let certs = vec![parse(&leaf_der(vec![qc])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(r.is_valid());
    let notes = r.notifications_at(0);
    assert!(notes.contains(&Finding::QcEuCompliance));
    assert!(notes.contains(&Finding::QcSscd));
    assert!(notes.contains(&Finding::QcLimitValue {
        currency: "EUR".to_string(),
        amount: 100,
        exponent: 2
    }));
}

#[test]
fn unknown_qc_statement_leaves_extension_unresolved() {
    use certreview::{QcStatement, QcStatements, ID_PE_QC_STATEMENTS};

    let pe = environment();
    let statements: QcStatements = vec![QcStatement {
        statement_id: "1.3.6.1.4.1.99999.7".parse().unwrap(),
        statement_info: None,
    }];
    let qc = ext(ID_PE_QC_STATEMENTS, true, &statements);
    let certs = vec![parse(&leaf_der(vec![qc])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    assert!(r
        .errors_at(0)
        .iter()
        .any(|f| matches!(f, Finding::UnknownCriticalExtension { .. })));
    assert!(r
        .notifications_at(0)
        .iter()
        .any(|f| matches!(f, Finding::QcUnknownStatement { .. })));
}

#[test]
fn qc_statements_on_intermediates_are_processed() {
    use certreview::{QcStatement, QcStatements, ID_ETSI_QCS_QC_COMPLIANCE, ID_PE_QC_STATEMENTS};

    let pe = environment();
    let statements: QcStatements = vec![QcStatement {
        statement_id: ID_ETSI_QCS_QC_COMPLIANCE,
        statement_info: None,
    }];
    let qc = ext(ID_PE_QC_STATEMENTS, true, &statements);
    let certs = vec![parse(&leaf_der(vec![])), parse(&inter_der(vec![qc]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(r.is_valid());
    assert!(r.notifications_at(1).contains(&Finding::QcEuCompliance));
}

#[test]
fn undecodable_qc_statements_stay_unresolved() {
    use certreview::ID_PE_QC_STATEMENTS;

    let pe = environment();
    let qc = Extension {
        extn_id: ID_PE_QC_STATEMENTS,
        critical: true,
        extn_value: OctetString::new(vec![0x05, 0x00]).unwrap(),
    };
    let certs = vec![parse(&leaf_der(vec![qc])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(!r.is_valid());
    let errors = r.errors_at(0).to_vec();
    assert!(errors.contains(&Finding::QcStatementsDecodeFailure));
    assert!(errors
        .iter()
        .any(|f| matches!(f, Finding::UnknownCriticalExtension { .. })));
}

#[test]
fn extension_dispatch_yields_typed_extensions() {
    use certreview::{ExtensionProcessing, ParsedExtension};

    let skid = ext(
        ID_CE_SUBJECT_KEY_IDENTIFIER,
        false,
        &SubjectKeyIdentifier(OctetString::new(vec![0xCC]).unwrap()),
    );
    let san = san_ext(vec![GeneralName::DnsName(
        Ia5String::new("example.com").unwrap(),
    )]);
    let cp = cp_ext(&[P1]);
    let cert = parse(&leaf_der(vec![skid, san, cp]));

    assert!(matches!(
        cert.get_extension(&ID_CE_SUBJECT_KEY_IDENTIFIER),
        Ok(Some(ParsedExtension::SubjectKeyIdentifier(_)))
    ));
    assert!(matches!(
        cert.get_extension(&ID_CE_SUBJECT_ALT_NAME),
        Ok(Some(ParsedExtension::SubjectAltName(_)))
    ));
    assert!(matches!(
        cert.get_extension(&ID_CE_CERTIFICATE_POLICIES),
        Ok(Some(ParsedExtension::CertificatePolicies(_)))
    ));
}

static VERIFY_CALLS: AtomicUsize = AtomicUsize::new(0);

fn counting_verify(
    pe: &PkiEnvironment,
    message: &[u8],
    signature: &[u8],
    alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> certreview::Result<()> {
    VERIFY_CALLS.fetch_add(1, Ordering::SeqCst);
    stub_verify(pe, message, signature, alg, spki)
}

#[test]
fn checks_run_once() {
    let mut pe = PkiEnvironment::new();
    pe.add_verify_signature_message_callback(counting_verify);
    let certs = vec![parse(&leaf_der(vec![])), parse(&inter_der(vec![]))];
    let mut r = reviewer(&pe, certs, vec![anchor()], settings());

    assert!(r.is_valid());
    let calls = VERIFY_CALLS.load(Ordering::SeqCst);
    assert!(calls > 0);
    assert!(r.is_valid());
    let _ = r.results();
    assert_eq!(calls, VERIFY_CALLS.load(Ordering::SeqCst));
}
