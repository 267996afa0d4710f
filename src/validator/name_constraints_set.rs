//! Structures and functions related to processing name constraints

use x509_cert::ext::pkix::{
    constraints::name::{GeneralSubtree, GeneralSubtrees},
    name::GeneralName,
    SubjectAltName,
};
use x509_cert::name::Name;

use crate::util::path_utilities::*;

/// The [`NameConstraintsSet`] structure tracks the permitted_subtrees and excluded_subtrees state
/// variables while reviewing a certification path.
///
/// For each field except not_supported, an empty vector indicates nothing has been set (i.e., no
/// excluded names and infinite permitted names) and the corresponding `_null` flag indicates an
/// intersection operation produced the empty set.
///
/// The not_supported field collects name constraint values in forms that are not supported, so
/// that names in those forms can fail closed rather than pass unexamined.
///
/// [RFC 5280 Section 6.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1>
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct NameConstraintsSet {
    /// rfc822_name governs use of email addresses in SANs
    pub rfc822_name: Vec<GeneralSubtree>, //t = 2
    /// rfc822_name_null is set to true if an intersection operation yields the empty set
    pub rfc822_name_null: bool,
    /// dns_name governs use of DNS names in SANs
    pub dns_name: Vec<GeneralSubtree>, //t = 3
    /// dns_name_null is set to true if an intersection operation yields the empty set
    pub dns_name_null: bool,
    /// directory_name governs use of DNs in SANs and subject fields
    pub directory_name: Vec<GeneralSubtree>, //t = 5
    /// directory_name_null is set to true if an intersection operation yields the empty set
    pub directory_name_null: bool,
    /// uniform_resource_identifier governs use of URIs in SANs
    pub uniform_resource_identifier: Vec<GeneralSubtree>, //t = 7
    /// uniform_resource_identifier_null is set to true if an intersection operation yields the empty set
    pub uniform_resource_identifier_null: bool,
    /// not_supported accumulates constraint values in unsupported name forms
    pub not_supported: Vec<GeneralSubtree>, //t = everything else
}

impl NameConstraintsSet {
    //----------------------------------------------------------------------------
    // public
    //----------------------------------------------------------------------------
    /// `calculate_intersection` calculates the intersection of self and ext and saves the result in self.
    pub(crate) fn calculate_intersection(&mut self, ext: &GeneralSubtrees) {
        self.calculate_intersection_dn(ext);
        self.calculate_intersection_rfc822(ext);
        self.calculate_intersection_dns_name(ext);
        self.calculate_intersection_uri(ext);

        for subtree in ext {
            match subtree.base {
                GeneralName::Rfc822Name(_)
                | GeneralName::DnsName(_)
                | GeneralName::DirectoryName(_)
                | GeneralName::UniformResourceIdentifier(_) => {}
                _ => self.not_supported.push(subtree.clone()),
            }
        }
    }

    /// `calculate_union` calculates the union of self and ext and saves the result in self.
    pub(crate) fn calculate_union(&mut self, ext: &GeneralSubtrees) {
        for subtree in ext {
            let gn = &subtree.base;

            // accumulate names in the appropriate buckets. skip buckets already marked null as
            // null signifies a failure.
            match gn {
                GeneralName::Rfc822Name(_rfc822) => {
                    if !self.rfc822_name_null {
                        self.rfc822_name.push(subtree.clone());
                    }
                }
                GeneralName::DnsName(_dns) => {
                    if !self.dns_name_null {
                        self.dns_name.push(subtree.clone());
                    }
                }
                GeneralName::DirectoryName(_dn) => {
                    if !self.directory_name_null {
                        self.directory_name.push(subtree.clone());
                    }
                }
                GeneralName::UniformResourceIdentifier(_uri) => {
                    if !self.uniform_resource_identifier_null {
                        self.uniform_resource_identifier.push(subtree.clone());
                    }
                }
                // not supporting name constraints for otherName, x400Address, ediPartyName,
                // iPAddress or registeredID
                _ => {
                    self.not_supported.push(subtree.clone());
                }
            }
        }
    }

    /// `are_any_empty` returns true if any of the supported name constraints buckets have been
    /// reduced to the empty set, which signifies failure.
    pub fn are_any_empty(&self) -> bool {
        self.rfc822_name_null
            || self.dns_name_null
            || self.directory_name_null
            || self.uniform_resource_identifier_null
    }

    /// `subject_within_permitted_subtrees` returns true if subject is within at least one
    /// permitted subtree known to self.
    pub fn subject_within_permitted_subtrees(&self, subject: &Name) -> bool {
        if subject.0.is_empty() {
            // NULL subjects get a free pass
            return true;
        }

        if self.directory_name_null {
            return false;
        }

        if self.directory_name.is_empty() {
            return true;
        }

        for gn_state in &self.directory_name {
            if let GeneralName::DirectoryName(dn_state) = &gn_state.base {
                if descended_from_dn(dn_state, subject, gn_state.minimum, gn_state.maximum) {
                    return true;
                }
            }
        }
        false
    }

    /// `subject_within_excluded_subtrees` returns true if subject is within at least one excluded
    /// subtree known to self.
    pub fn subject_within_excluded_subtrees(&self, subject: &Name) -> bool {
        if subject.0.is_empty() {
            return false;
        }

        if self.directory_name_null || self.directory_name.is_empty() {
            return false;
        }

        for gn_state in &self.directory_name {
            if let GeneralName::DirectoryName(dn_state) = &gn_state.base {
                if descended_from_dn(dn_state, subject, gn_state.minimum, gn_state.maximum) {
                    return true;
                }
            }
        }
        false
    }

    /// `san_within_permitted_subtrees` returns true if every name in san is within at least one
    /// permitted subtree known to self.
    pub fn san_within_permitted_subtrees(&self, san: &Option<&SubjectAltName>) -> bool {
        if let Some(gn_san) = san {
            for subtree_san in gn_san.0.iter() {
                match subtree_san {
                    GeneralName::DirectoryName(dn_san) => {
                        if self.directory_name_null {
                            return false;
                        }

                        if self.directory_name.is_empty() {
                            continue;
                        }

                        let mut permitted = false;
                        for gn_state in &self.directory_name {
                            if let GeneralName::DirectoryName(dn_state) = &gn_state.base {
                                if descended_from_dn(
                                    dn_state,
                                    dn_san,
                                    gn_state.minimum,
                                    gn_state.maximum,
                                ) {
                                    permitted = true;
                                    break;
                                }
                            }
                        }
                        if !permitted {
                            return false;
                        }
                    } // end GeneralName::DirectoryName

                    GeneralName::Rfc822Name(rfc822_san) => {
                        if self.rfc822_name_null {
                            return false;
                        }

                        if self.rfc822_name.is_empty() {
                            continue;
                        }

                        let mut permitted = false;
                        for gn_state in &self.rfc822_name {
                            if let GeneralName::Rfc822Name(rfc822_state) = &gn_state.base {
                                if descended_from_rfc822(rfc822_state, rfc822_san) {
                                    permitted = true;
                                    break;
                                }
                            }
                        }
                        if !permitted {
                            return false;
                        }
                    } // end GeneralName::Rfc822Name

                    GeneralName::DnsName(dns_san) => {
                        if self.dns_name_null {
                            return false;
                        }

                        if self.dns_name.is_empty() {
                            continue;
                        }

                        let mut permitted = false;
                        for gn_state in &self.dns_name {
                            if let GeneralName::DnsName(dns_state) = &gn_state.base {
                                if descended_from_host(dns_state, dns_san.as_str(), false) {
                                    permitted = true;
                                    break;
                                }
                            }
                        }
                        if !permitted {
                            return false;
                        }
                    } // end GeneralName::DnsName

                    GeneralName::UniformResourceIdentifier(uri_san) => {
                        if self.uniform_resource_identifier_null {
                            return false;
                        }

                        if self.uniform_resource_identifier.is_empty() {
                            continue;
                        }

                        let mut permitted = false;
                        for gn_state in &self.uniform_resource_identifier {
                            if let GeneralName::UniformResourceIdentifier(uri_state) =
                                &gn_state.base
                            {
                                if let Some(host) = host_from_uri(uri_san.as_str()) {
                                    if descended_from_host(uri_state, host.as_str(), true) {
                                        permitted = true;
                                        break;
                                    }
                                }
                            }
                        }
                        if !permitted {
                            return false;
                        }
                    } // end GeneralName::UniformResourceIdentifier
                    GeneralName::IpAddress(_) => {
                        // fail closed when IP address constraints were asserted but unsupported
                        for ns in &self.not_supported {
                            if let GeneralName::IpAddress(_) = ns.base {
                                return false;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        // does not match a supported constraint so is unconstrained
        true
    }

    /// `san_within_excluded_subtrees` returns true if any name in san is within at least one
    /// excluded subtree known to self.
    pub fn san_within_excluded_subtrees(&self, san: &Option<&SubjectAltName>) -> bool {
        if let Some(gn_san) = san {
            for subtree_san in gn_san.0.iter() {
                match subtree_san {
                    GeneralName::DirectoryName(dn_san) => {
                        for gn_state in &self.directory_name {
                            if let GeneralName::DirectoryName(dn_state) = &gn_state.base {
                                if descended_from_dn(
                                    dn_state,
                                    dn_san,
                                    gn_state.minimum,
                                    gn_state.maximum,
                                ) {
                                    return true;
                                }
                            }
                        }
                    }
                    GeneralName::Rfc822Name(rfc822_san) => {
                        for gn_state in &self.rfc822_name {
                            if let GeneralName::Rfc822Name(rfc822_state) = &gn_state.base {
                                if descended_from_rfc822(rfc822_state, rfc822_san) {
                                    return true;
                                }
                            }
                        }
                    }
                    GeneralName::DnsName(dns_san) => {
                        for gn_state in &self.dns_name {
                            if let GeneralName::DnsName(dns_state) = &gn_state.base {
                                if descended_from_host(dns_state, dns_san.as_str(), false) {
                                    return true;
                                }
                            }
                        }
                    }
                    GeneralName::UniformResourceIdentifier(uri_san) => {
                        for gn_state in &self.uniform_resource_identifier {
                            if let GeneralName::UniformResourceIdentifier(uri_state) =
                                &gn_state.base
                            {
                                if let Some(host) = host_from_uri(uri_san.as_str()) {
                                    if descended_from_host(uri_state, host.as_str(), true) {
                                        return true;
                                    }
                                }
                            }
                        }
                    }
                    GeneralName::IpAddress(_) => {
                        for ns in &self.not_supported {
                            if let GeneralName::IpAddress(_) = ns.base {
                                return true;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        false
    }

    //----------------------------------------------------------------------------
    // private
    //----------------------------------------------------------------------------
    fn calculate_intersection_rfc822(&mut self, new_names: &GeneralSubtrees) {
        if self.rfc822_name_null || !has_rfc822(new_names) {
            // nothing to intersect (either state has become NULL or there are no names to add)
            return;
        }

        let mut new_set = Vec::new();

        for new_name in new_names {
            if let GeneralName::Rfc822Name(new_rfc822) = &new_name.base {
                if self.rfc822_name.is_empty() {
                    new_set.push(new_name.clone());
                } else {
                    for prev_name in &self.rfc822_name {
                        if let GeneralName::Rfc822Name(prev_rfc822) = &prev_name.base {
                            if new_name == prev_name
                                || descended_from_rfc822(prev_rfc822, new_rfc822)
                            {
                                new_set.push(prev_name.clone());
                            }
                        }
                    }
                }
            }
        }

        if !new_set.is_empty() {
            self.rfc822_name = new_set;
        } else {
            self.rfc822_name_null = true;
        }
    }

    fn calculate_intersection_dns_name(&mut self, new_names: &GeneralSubtrees) {
        if self.dns_name_null || !has_dns_name(new_names) {
            return;
        }

        let mut new_set = Vec::new();

        for new_name in new_names {
            if let GeneralName::DnsName(new_dns) = &new_name.base {
                if self.dns_name.is_empty() {
                    new_set.push(new_name.clone());
                } else {
                    for prev_name in &self.dns_name {
                        if let GeneralName::DnsName(prev_dns) = &prev_name.base {
                            if new_name == prev_name
                                || descended_from_host(prev_dns, new_dns.as_str(), false)
                            {
                                new_set.push(prev_name.clone());
                            }
                        }
                    }
                }
            }
        }

        if !new_set.is_empty() {
            self.dns_name = new_set;
        } else {
            self.dns_name_null = true;
        }
    }

    fn calculate_intersection_dn(&mut self, new_names: &GeneralSubtrees) {
        if self.directory_name_null || !has_dn(new_names) {
            return;
        }

        let mut new_set = Vec::new();

        for new_name in new_names {
            if let GeneralName::DirectoryName(new_dn) = &new_name.base {
                if self.directory_name.is_empty() {
                    new_set.push(new_name.clone());
                } else {
                    for prev_name in &self.directory_name {
                        if let GeneralName::DirectoryName(prev_dn) = &prev_name.base {
                            if new_name == prev_name {
                                new_set.push(prev_name.clone());
                            } else if descended_from_dn(
                                prev_dn,
                                new_dn,
                                prev_name.minimum,
                                prev_name.maximum,
                            ) {
                                new_set.push(new_name.clone());
                            }
                        }
                    }
                }
            }
        }

        if !new_set.is_empty() {
            self.directory_name = new_set;
        } else {
            self.directory_name_null = true;
        }
    }

    fn calculate_intersection_uri(&mut self, new_names: &GeneralSubtrees) {
        if self.uniform_resource_identifier_null || !has_uri(new_names) {
            return;
        }

        let mut new_set = Vec::new();

        for new_name in new_names {
            if let GeneralName::UniformResourceIdentifier(new_uri) = &new_name.base {
                if self.uniform_resource_identifier.is_empty() {
                    new_set.push(new_name.clone());
                } else {
                    for prev_name in &self.uniform_resource_identifier {
                        if let GeneralName::UniformResourceIdentifier(prev_uri) = &prev_name.base {
                            if new_name == prev_name
                                || descended_from_host(prev_uri, new_uri.as_str(), true)
                            {
                                new_set.push(prev_name.clone());
                            }
                        }
                    }
                }
            }
        }

        if !new_set.is_empty() {
            self.uniform_resource_identifier = new_set;
        } else {
            self.uniform_resource_identifier_null = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::asn1::{Ia5String, SetOfVec};
    use der::Any;
    use x509_cert::attr::AttributeTypeAndValue;
    use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

    fn rdn(oid: &str, val: &str) -> RelativeDistinguishedName {
        let atav = AttributeTypeAndValue {
            oid: oid.parse().unwrap(),
            value: Any::new(der::Tag::Utf8String, val.as_bytes()).unwrap(),
        };
        RelativeDistinguishedName(SetOfVec::try_from(vec![atav]).unwrap())
    }

    fn dn(parts: &[(&str, &str)]) -> Name {
        RdnSequence(parts.iter().map(|(o, v)| rdn(o, v)).collect())
    }

    fn dn_subtree(parts: &[(&str, &str)]) -> GeneralSubtree {
        GeneralSubtree {
            base: GeneralName::DirectoryName(dn(parts)),
            minimum: 0,
            maximum: None,
        }
    }

    fn dns_subtree(host: &str) -> GeneralSubtree {
        GeneralSubtree {
            base: GeneralName::DnsName(Ia5String::new(host).unwrap()),
            minimum: 0,
            maximum: None,
        }
    }

    #[test]
    fn intersection_narrows_and_nulls() {
        let mut set = NameConstraintsSet::default();
        set.calculate_intersection(&vec![dn_subtree(&[("2.5.4.6", "US")])]);
        assert_eq!(1, set.directory_name.len());
        assert!(!set.are_any_empty());

        // narrower constraint under the existing one survives
        set.calculate_intersection(&vec![dn_subtree(&[
            ("2.5.4.6", "US"),
            ("2.5.4.10", "Example"),
        ])]);
        assert_eq!(1, set.directory_name.len());

        // disjoint constraint empties the bucket
        set.calculate_intersection(&vec![dn_subtree(&[("2.5.4.6", "CA")])]);
        assert!(set.directory_name_null);
        assert!(set.are_any_empty());
    }

    #[test]
    fn subject_checks() {
        let mut permitted = NameConstraintsSet::default();
        permitted.calculate_intersection(&vec![dn_subtree(&[("2.5.4.6", "US")])]);

        assert!(permitted.subject_within_permitted_subtrees(&dn(&[
            ("2.5.4.6", "US"),
            ("2.5.4.3", "Alice")
        ])));
        assert!(!permitted.subject_within_permitted_subtrees(&dn(&[("2.5.4.6", "CA")])));
        // empty subject passes
        assert!(permitted.subject_within_permitted_subtrees(&RdnSequence(vec![])));

        let mut excluded = NameConstraintsSet::default();
        excluded.calculate_union(&vec![dn_subtree(&[("2.5.4.6", "CA")])]);
        assert!(excluded.subject_within_excluded_subtrees(&dn(&[
            ("2.5.4.6", "CA"),
            ("2.5.4.3", "Bob")
        ])));
        assert!(!excluded.subject_within_excluded_subtrees(&dn(&[("2.5.4.6", "US")])));
    }

    #[test]
    fn san_dns_checks() {
        let mut permitted = NameConstraintsSet::default();
        permitted.calculate_intersection(&vec![dns_subtree("example.com")]);

        let good = SubjectAltName(vec![GeneralName::DnsName(
            Ia5String::new("host.example.com").unwrap(),
        )]);
        let bad = SubjectAltName(vec![GeneralName::DnsName(
            Ia5String::new("example.org").unwrap(),
        )]);

        assert!(permitted.san_within_permitted_subtrees(&Some(&good)));
        assert!(!permitted.san_within_permitted_subtrees(&Some(&bad)));
        assert!(permitted.san_within_permitted_subtrees(&None));

        let mut excluded = NameConstraintsSet::default();
        excluded.calculate_union(&vec![dns_subtree("example.org")]);
        assert!(excluded.san_within_excluded_subtrees(&Some(&bad)));
        assert!(!excluded.san_within_excluded_subtrees(&Some(&good)));
    }
}
