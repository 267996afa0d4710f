//! Structures and functions related to configuring a path review operation

use std::collections::BTreeSet;

use const_oid::db::rfc5280::ANY_POLICY;
use der::asn1::ObjectIdentifier;

/// `ObjectIdentifierSet` is a typedef for a set of object identifiers, as used for the initial
/// policy set and for tracking unresolved critical extensions.
pub type ObjectIdentifierSet = BTreeSet<ObjectIdentifier>;

/// [`PathReviewSettings`] holds the inputs to certification path review that are defined in
/// RFC 5280 section 6.1.1 plus a few operational knobs.
#[derive(Clone, Eq, PartialEq)]
pub struct PathReviewSettings {
    /// user-initial-policy-set from RFC 5280 section 6.1.1 (c)
    pub initial_policy_set: ObjectIdentifierSet,
    /// initial-explicit-policy from RFC 5280 section 6.1.1 (f)
    pub require_explicit_policy: bool,
    /// initial-policy-mapping-inhibit from RFC 5280 section 6.1.1 (e)
    pub inhibit_policy_mapping: bool,
    /// initial-any-policy-inhibit from RFC 5280 section 6.1.1 (g)
    pub inhibit_any_policy: bool,
    /// Governs whether revocation status is determined during the review
    pub check_revocation: bool,
    /// Time of interest expressed in seconds since the Unix epoch, or None to use the time at
    /// which the review is performed
    pub valid_date: Option<u64>,
}

impl Default for PathReviewSettings {
    fn default() -> Self {
        let mut initial_policy_set = ObjectIdentifierSet::new();
        initial_policy_set.insert(ANY_POLICY);
        PathReviewSettings {
            initial_policy_set,
            require_explicit_policy: false,
            inhibit_policy_mapping: false,
            inhibit_any_policy: false,
            check_revocation: cfg!(feature = "revocation"),
            valid_date: None,
        }
    }
}

impl PathReviewSettings {
    /// Returns a new [`PathReviewSettings`] with default values.
    pub fn new() -> Self {
        Default::default()
    }
}
