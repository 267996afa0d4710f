//! Certificate policy processing in support of certification path review

use core::cell::RefCell;

use const_oid::db::rfc5280::ANY_POLICY;
use const_oid::db::rfc5912::{
    ID_CE_CERTIFICATE_POLICIES, ID_CE_INHIBIT_ANY_POLICY, ID_CE_POLICY_CONSTRAINTS,
    ID_CE_POLICY_MAPPINGS,
};
use der::asn1::ObjectIdentifier;
use der::Encode;

use crate::util::path_utilities::is_self_issued;
use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::parsed_extension::{ExtensionProcessing, ParsedExtension};
use crate::validator::path_settings::{ObjectIdentifierSet, PathReviewSettings};
use crate::validator::review_results::{Finding, ReviewResults};

/// [`FinalPolicyTreeNode`] is the caller-visible rendering of a node in the valid_policy_tree
/// that remains after the wrap-up procedure. The fields correspond to Figure 3 in section 6.1.2
/// of RFC 5280.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FinalPolicyTreeNode {
    /// Policy asserted by the node
    pub valid_policy: ObjectIdentifier,
    /// Encoded policy qualifiers associated with the node, if any
    pub qualifier_set: Option<Vec<u8>>,
    /// Policies expected in the next certificate
    pub expected_policy_set: ObjectIdentifierSet,
    /// Criticality of the certificate policies extension that produced the node
    pub critical: bool,
}

/// [`FinalPolicyTree`] holds the rows of the valid_policy_tree that remains after the wrap-up
/// procedure, with row 0 containing the anyPolicy root.
pub type FinalPolicyTree = Vec<Vec<FinalPolicyTreeNode>>;

/// PolicyNodeData is the node type in the valid_policy_tree while it is under construction.
/// The first three fields correspond to the three fields shown in Figure 3 in section 6.1.2 of
/// RFC 5280. The depth field indicates the row in the valid_policy_tree where the node was added.
/// All nodes except the root have a parent. Child-less nodes are periodically pruned.
///
/// The valid_policy_tree is backed by a PolicyPool instance that owns all nodes, with rows and
/// parent/child links expressed as indices into the pool.
#[derive(Clone)]
pub(crate) struct PolicyNodeData {
    pub(crate) valid_policy: ObjectIdentifier,
    pub(crate) qualifier_set: Option<Vec<u8>>,
    pub(crate) expected_policy_set: ObjectIdentifierSet,
    pub(crate) depth: u8,
    pub(crate) critical: bool,
    pub(crate) parent: Option<usize>,
    pub(crate) children: RefCell<Vec<usize>>,
}

impl PartialEq for PolicyNodeData {
    fn eq(&self, other: &Self) -> bool {
        self.valid_policy == other.valid_policy
    }
}

/// Owns the PolicyNodeData instances that comprise a valid_policy_tree.
pub(crate) type PolicyPool = Vec<PolicyNodeData>;

/// A row of the valid_policy_tree. Each element is an index into the backing PolicyPool.
pub(crate) type PolicyTreeRow = Vec<usize>;

pub(crate) fn has_child_node(
    pool: &PolicyPool,
    children: &RefCell<Vec<usize>>,
    oid: &ObjectIdentifier,
) -> bool {
    for ps_index in children.borrow().iter() {
        let ps = &pool[*ps_index];
        if ps.valid_policy == *oid {
            return true;
        }
    }
    false
}

/// Adds the node to the child list unless a child with the same policy is already present.
/// Returns true if the node was added.
pub(crate) fn add_child_if_not_present(
    pool: &PolicyPool,
    children: &RefCell<Vec<usize>>,
    new_child_index: usize,
) -> bool {
    let new_child = &pool[new_child_index];
    if !has_child_node(pool, children, &new_child.valid_policy) {
        children.borrow_mut().push(new_child_index);
        return true;
    }
    false
}

pub(crate) fn row_elem_is_policy(pool: &PolicyPool, elem: &usize, oid: ObjectIdentifier) -> bool {
    pool[*elem].valid_policy == oid
}

/// Searches row for policy_oid and returns the index of the node in the pool if it is found.
pub(crate) fn policy_tree_row_contains_policy(
    pool: &PolicyPool,
    row: &PolicyTreeRow,
    policy_oid: ObjectIdentifier,
) -> Option<usize> {
    for item_index in row {
        let item = &pool[*item_index];
        if item.valid_policy == policy_oid {
            return Some(*item_index);
        }
    }
    None
}

pub(crate) fn num_kids_is_zero(pool: &PolicyPool, index: usize) -> bool {
    match pool.get(index) {
        Some(p) => p.children.borrow().is_empty(),
        None => true,
    }
}

pub(crate) fn new_policy_node_in_pool(
    pm: &mut PolicyPool,
    valid_policy: ObjectIdentifier,
    qualifiers: &Option<Vec<u8>>,
    expected_policy_set: ObjectIdentifierSet,
    depth: u8,
    critical: bool,
    parent: &Option<usize>,
) -> usize {
    let node = PolicyNodeData {
        valid_policy,
        qualifier_set: qualifiers.clone(),
        expected_policy_set,
        depth,
        critical,
        parent: *parent,
        children: RefCell::new(vec![]),
    };
    let cur_index = pm.len();
    pm.push(node);
    cur_index
}

pub(crate) fn new_policy_node(
    valid_policy: ObjectIdentifier,
    qualifiers: &Option<Vec<u8>>,
    expected_policy_set: ObjectIdentifierSet,
    depth: u8,
    critical: bool,
    parent: &Option<usize>,
) -> PolicyNodeData {
    PolicyNodeData {
        valid_policy,
        qualifier_set: qualifiers.clone(),
        expected_policy_set,
        depth,
        critical,
        parent: *parent,
        children: RefCell::new(vec![]),
    }
}

/// Collects the indices of all nodes whose parent chain descends from an anyPolicy node, i.e.,
/// the valid_policy_node_set from step (g)(iii)1 of section 6.1.5.
pub(crate) fn harvest_valid_policy_node_set(
    pool: &PolicyPool,
    cur_node: &PolicyNodeData,
    valid_policy_node_set: &mut Vec<usize>,
) {
    if cur_node.valid_policy == ANY_POLICY {
        for c_index in cur_node.children.borrow().iter() {
            valid_policy_node_set.push(*c_index);
            let c = &pool[*c_index];
            harvest_valid_policy_node_set(pool, c, valid_policy_node_set);
        }
    }
}

pub(crate) fn purge_policies(
    pool: &PolicyPool,
    retained_policy_set: &ObjectIdentifierSet,
    valid_policy_node_set: &[usize],
    valid_policy_tree: &mut [PolicyTreeRow],
) {
    for pol in valid_policy_node_set {
        let p = &pool[*pol];
        if p.valid_policy != ANY_POLICY && !retained_policy_set.contains(&p.valid_policy) {
            if let Some(parent_index) = p.parent {
                let parent = &pool[parent_index];
                parent
                    .children
                    .borrow_mut()
                    .retain(|x| !row_elem_is_policy(pool, x, p.valid_policy));
                remove_node_and_children(pool, valid_policy_tree, p, pol);
            }
        }
    }
}

pub(crate) fn remove_node_and_children(
    pool: &PolicyPool,
    valid_policy_tree: &mut [PolicyTreeRow],
    node: &PolicyNodeData,
    node_index: &usize,
) {
    let kids = node.children.borrow().clone();
    for c_index in &kids {
        let c = &pool[*c_index];
        remove_node_and_children(pool, valid_policy_tree, c, c_index);
    }
    node.children.borrow_mut().clear();
    valid_policy_tree[node.depth as usize].retain(|x| *x != *node_index);
}

fn encode_qualifiers<T: Encode>(qualifiers: &Option<T>) -> Option<Vec<u8>> {
    match qualifiers {
        // ignore qualifiers that don't encode
        Some(q) => q.to_der().ok(),
        None => None,
    }
}

/// `check_policy_processing` performs the certificate policy processing steps from sections
/// 6.1.3 (d) through (f), 6.1.4 (a) and (b) and 6.1.5 (a), (b) and (g) of RFC 5280 over a path
/// presented with the end-entity certificate at index 0.
///
/// Policy mapping errors are recorded in `results` against the certificate that caused them;
/// a NULL valid_policy_tree or an empty policy intersection when explicit policy is required is
/// recorded against the path as a whole. Returns the valid_policy_tree remaining after the
/// wrap-up procedure, or None when the tree is NULL.
pub(crate) fn check_policy_processing(
    certs: &[ParsedCertificate],
    settings: &PathReviewSettings,
    results: &mut ReviewResults,
) -> Option<FinalPolicyTree> {
    let n = certs.len();
    if n == 0 {
        return None;
    }
    let certs_in_cert_path = n as u32;
    let initial_policy_set = &settings.initial_policy_set;

    // vector to own nodes that appear in the valid_policy_tree
    let pool = RefCell::new(PolicyPool::new());
    let pm = &mut pool.borrow_mut();

    // Initialize state variables (RFC 5280 6.1.2 a, d, e, and f)
    let mut valid_policy_tree = Vec::<PolicyTreeRow>::new();
    let mut explicit_policy: u32 = if settings.require_explicit_policy {
        0
    } else {
        certs_in_cert_path + 1
    };
    let mut inhibit_any_policy: u32 = if settings.inhibit_any_policy {
        0
    } else {
        certs_in_cert_path + 1
    };
    let mut policy_mapping: u32 = if settings.inhibit_policy_mapping {
        0
    } else {
        certs_in_cert_path + 1
    };

    // The initial value of the valid_policy_tree is a single node with valid_policy anyPolicy,
    // an empty qualifier_set, and an expected_policy_set with the single value anyPolicy. This
    // node is considered to be at depth zero.
    let root_index = new_policy_node_in_pool(
        pm,
        ANY_POLICY,
        &None,
        ObjectIdentifierSet::from([ANY_POLICY]),
        0,
        false,
        &None,
    );
    valid_policy_tree.push(PolicyTreeRow::from([root_index]));
    let mut valid_policy_tree_is_null = false;

    // running intersection of the policies asserted by each certificate, used by the wrap-up
    // procedure when the caller accepts any policy
    let mut acceptable_policies: Option<ObjectIdentifierSet> = None;

    // walk from the certificate closest to the trust anchor (depth 1) down to the end entity
    // (depth n)
    for pos in 0..n {
        let i = pos + 1;
        let cert = &certs[n - i];
        let cert_index = (n - i) as isize;

        // has_any_policy is used to signify when anyPolicy appears in a cert. ap_q captures the
        // encoded qualifiers, if present.
        let mut has_any_policy = false;
        let mut ap_q: Option<Vec<u8>> = None;

        valid_policy_tree.push(PolicyTreeRow::new());
        let row = valid_policy_tree.len() - 1;

        let cp_ext = match cert.get_extension(&ID_CE_CERTIFICATE_POLICIES) {
            Ok(Some(ParsedExtension::CertificatePolicies(cp_ext))) => Some(cp_ext),
            _ => None,
        };

        let cp_critical = cert.is_critical(&ID_CE_CERTIFICATE_POLICIES);

        if let Some(cp_ext) = cp_ext {
            let declared: ObjectIdentifierSet =
                cp_ext.0.iter().map(|p| p.policy_identifier).collect();
            acceptable_policies = match acceptable_policies.take() {
                None => Some(declared.clone()),
                Some(acc) => {
                    if declared.contains(&ANY_POLICY) {
                        Some(acc)
                    } else if acc.contains(&ANY_POLICY) {
                        Some(declared.clone())
                    } else {
                        Some(acc.intersection(&declared).copied().collect())
                    }
                }
            };

            if !valid_policy_tree_is_null {
                // (d) If the certificate policies extension is present in the certificate and
                // the valid_policy_tree is not NULL, process the policy information by
                // performing the following steps in order:
                for pi in cp_ext.0.iter() {
                    if ANY_POLICY != pi.policy_identifier {
                        // (1) For each policy P not equal to anyPolicy in the certificate
                        // policies extension, let P-OID denote the OID for policy P and P-Q
                        // denote the qualifier set for policy P.
                        let p_oid = &pi.policy_identifier;
                        let p_q = encode_qualifiers(&pi.policy_qualifiers);

                        // (i) For each node of depth i-1 in the valid_policy_tree where P-OID
                        // is in the expected_policy_set, create a child node as follows: set
                        // the valid_policy to P-OID, set the qualifier_set to P-Q, and set
                        // the expected_policy_set to {P-OID}.
                        let mut prospective_parents = PolicyTreeRow::new();
                        let mut match_found = false;
                        for ps_index in &valid_policy_tree[i - 1] {
                            let ps = &pm[*ps_index];
                            if ps.expected_policy_set.contains(p_oid) {
                                prospective_parents.push(*ps_index);
                                match_found = true;
                            }
                        }

                        // (ii) If there was no match in step (i) and the valid_policy_tree
                        // includes a node of depth i-1 with the valid_policy anyPolicy,
                        // generate a child node with the same values.
                        if !match_found {
                            if let Some(parent_index) = policy_tree_row_contains_policy(
                                pm,
                                &valid_policy_tree[i - 1],
                                ANY_POLICY,
                            ) {
                                prospective_parents.push(parent_index);
                            }
                        }

                        for p in prospective_parents {
                            let new_node_index = new_policy_node_in_pool(
                                pm,
                                *p_oid,
                                &p_q,
                                ObjectIdentifierSet::from([*p_oid]),
                                row as u8,
                                cp_critical,
                                &Some(p),
                            );
                            let parent = &pm[p];
                            add_child_if_not_present(pm, &parent.children, new_node_index);
                            valid_policy_tree[row].push(new_node_index);
                        }
                    } else {
                        // save indication that anyPolicy was observed along with qualifiers,
                        // if present, for use when processing step (2) below
                        has_any_policy = true;
                        ap_q = encode_qualifiers(&pi.policy_qualifiers);
                    }
                }

                // (2) If the certificate policies extension includes the policy anyPolicy
                // with the qualifier set AP-Q and either (a) inhibit_anyPolicy is greater
                // than 0 or (b) i<n and the certificate is self-issued, then for each node
                // in the valid_policy_tree of depth i-1, for each value in the
                // expected_policy_set (including anyPolicy) that does not appear in a child
                // node, create a child node.
                let mut nodes_to_add = vec![];
                if has_any_policy
                    && (inhibit_any_policy > 0 || (i < n && is_self_issued(&cert.decoded)))
                {
                    for p_index in &valid_policy_tree[i - 1] {
                        let parent = &pm[*p_index];
                        for ep in &parent.expected_policy_set {
                            if !has_child_node(pm, &parent.children, ep) {
                                nodes_to_add.push(new_policy_node(
                                    *ep,
                                    &ap_q,
                                    ObjectIdentifierSet::from([*ep]),
                                    row as u8,
                                    cp_critical,
                                    &Some(*p_index),
                                ));
                            }
                        }
                    }
                }

                for node in nodes_to_add {
                    let parent_index = node.parent;
                    let node_index = pm.len();
                    pm.push(node);
                    if let Some(parent_index) = parent_index {
                        let parent = &pm[parent_index];
                        add_child_if_not_present(pm, &parent.children, node_index);
                    }
                    valid_policy_tree[i].push(node_index);
                }

                // (3) If there is a node in the valid_policy_tree of depth i-1 or less
                // without any child nodes, delete that node. Repeat this step until there
                // are no nodes of depth i-1 or less without children.
                for r in &mut valid_policy_tree[0..i] {
                    r.retain(|x| !num_kids_is_zero(pm, *x));
                }
                if valid_policy_tree[i].is_empty() {
                    valid_policy_tree_is_null = true;
                }
            }
        } else {
            // (e) If the certificate policies extension is not present, set the
            // valid_policy_tree to NULL.
            valid_policy_tree_is_null = true;
        }

        if explicit_policy == 0 && valid_policy_tree_is_null {
            results.add_error(-1, Finding::NoValidPolicyTree);
            return None;
        }

        if i != n {
            // 6.1.4 preparation for the next certificate
            if let Ok(Some(ParsedExtension::PolicyMappings(policy_mappings))) =
                cert.get_extension(&ID_CE_POLICY_MAPPINGS)
            {
                // collect everything that maps to a given issuer domain policy for convenience
                // while looking for anyPolicy in the extension
                let mut mappings: std::collections::BTreeMap<ObjectIdentifier, ObjectIdentifierSet> =
                    Default::default();

                // (a) If a policy mappings extension is present, verify that the special
                // value anyPolicy does not appear as an issuerDomainPolicy or a
                // subjectDomainPolicy.
                for mapping in policy_mappings.0.iter() {
                    if ANY_POLICY == mapping.issuer_domain_policy
                        || ANY_POLICY == mapping.subject_domain_policy
                    {
                        results.add_error(cert_index, Finding::InvalidPolicyMapping);
                    } else {
                        mappings
                            .entry(mapping.issuer_domain_policy)
                            .or_default()
                            .insert(mapping.subject_domain_policy);
                    }
                }

                // (b) If a policy mappings extension is present, then for each
                // issuerDomainPolicy ID-P in the policy mappings extension:
                if policy_mapping > 0 {
                    // (1) If the policy_mapping variable is greater than 0, for each node in
                    // the valid_policy_tree of depth i where ID-P is the valid_policy, set
                    // expected_policy_set to the set of subjectDomainPolicy values that are
                    // specified as equivalent to ID-P by the policy mappings extension.
                    let mut ap: Option<usize> = None;
                    for p_index in &valid_policy_tree[i] {
                        let p = &mut pm[*p_index];
                        if let Some(subject_policies) = mappings.remove(&p.valid_policy) {
                            p.expected_policy_set = subject_policies;
                        }
                        if ANY_POLICY == p.valid_policy {
                            ap = Some(*p_index);
                        }
                    }

                    // If no node of depth i has a valid_policy of ID-P but there is a node of
                    // depth i with a valid_policy of anyPolicy, generate a child node of the
                    // node of depth i-1 that has a valid_policy of anyPolicy with the
                    // anyPolicy qualifiers from certificate i.
                    if !mappings.is_empty() {
                        if let Some(parent_index) = ap {
                            let mut nodes_to_add = vec![];
                            let parent = &pm[parent_index];
                            for m in mappings {
                                nodes_to_add.push(new_policy_node(
                                    m.0,
                                    &parent.qualifier_set,
                                    m.1,
                                    row as u8,
                                    parent.critical,
                                    &parent.parent,
                                ));
                            }
                            for node in nodes_to_add {
                                let parent_index = node.parent;
                                let node_index = pm.len();
                                pm.push(node);
                                if let Some(parent_index) = parent_index {
                                    let parent = &pm[parent_index];
                                    add_child_if_not_present(pm, &parent.children, node_index);
                                }
                                valid_policy_tree[row].push(node_index);
                            }
                        }
                    }
                } else {
                    // (2) If the policy_mapping variable is equal to 0, delete each node of
                    // depth i in the valid_policy_tree where ID-P is the valid_policy, then
                    // prune nodes of depth i-1 or less without children.
                    for m in mappings {
                        valid_policy_tree[i].retain(|x| !row_elem_is_policy(pm, x, m.0))
                    }

                    for r in &mut valid_policy_tree[0..i] {
                        r.retain(|x| !num_kids_is_zero(pm, *x));
                    }
                    if valid_policy_tree[i].is_empty() {
                        valid_policy_tree_is_null = true;
                    }
                }
            }

            // (h) If certificate i is not self-issued, decrement the counters that are
            // greater than zero
            if !is_self_issued(&cert.decoded) {
                if explicit_policy > 0 {
                    explicit_policy -= 1;
                }
                if inhibit_any_policy > 0 {
                    inhibit_any_policy -= 1;
                }
                if policy_mapping > 0 {
                    policy_mapping -= 1;
                }
            }

            // (i) policy constraints and (j) inhibit anyPolicy
            if let Ok(Some(ParsedExtension::PolicyConstraints(pc))) =
                cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)
            {
                if let Some(rep) = pc.require_explicit_policy {
                    explicit_policy = explicit_policy.min(rep)
                }
                if let Some(ipm) = pc.inhibit_policy_mapping {
                    policy_mapping = policy_mapping.min(ipm)
                }
            }
            if let Ok(Some(ParsedExtension::InhibitAnyPolicy(iap))) =
                cert.get_extension(&ID_CE_INHIBIT_ANY_POLICY)
            {
                inhibit_any_policy = inhibit_any_policy.min(iap.0);
            }
        } else {
            // 6.1.5 wrap-up procedure

            // (a) If explicit_policy is not 0, decrement explicit_policy by 1.
            if explicit_policy > 0 {
                explicit_policy -= 1;
            }

            // (b) If a policy constraints extension is included in the certificate and
            // requireExplicitPolicy is present and has a value of 0, set the explicit_policy
            // state variable to 0.
            if let Ok(Some(ParsedExtension::PolicyConstraints(pc))) =
                cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)
            {
                if let Some(rep) = pc.require_explicit_policy {
                    explicit_policy = explicit_policy.min(rep)
                }
            }

            // (g) Calculate the intersection of the valid_policy_tree and the
            // user-initial-policy-set. When the caller accepts any policy, the running
            // intersection of the policies asserted along the path constrains the tree
            // instead.
            let retained_policy_set = if !initial_policy_set.contains(&ANY_POLICY) {
                Some(initial_policy_set.clone())
            } else {
                match &acceptable_policies {
                    Some(acc) if !acc.contains(&ANY_POLICY) => Some(acc.clone()),
                    _ => None,
                }
            };

            if !valid_policy_tree_is_null && valid_policy_tree.len() > 1 {
                if let Some(retained) = retained_policy_set {
                    // 1. Determine the set of policy nodes whose parent nodes have a
                    // valid_policy of anyPolicy. This is the valid_policy_node_set.
                    let mut valid_policy_node_set: Vec<usize> = Vec::new();
                    let valid_policy_root = &pm[root_index];
                    harvest_valid_policy_node_set(pm, valid_policy_root, &mut valid_policy_node_set);

                    // 2. If the valid_policy of any node in the valid_policy_node_set is not
                    // in the retained set and is not anyPolicy, delete this node and all its
                    // children.
                    purge_policies(pm, &retained, &valid_policy_node_set, &mut valid_policy_tree);

                    // 4. If there is a node in the valid_policy_tree of depth n-1 or less
                    // without any child nodes, delete that node. Repeat until there are no
                    // nodes of depth n-1 or less without children.
                    for r in &mut valid_policy_tree[0..i] {
                        r.retain(|x| !num_kids_is_zero(pm, *x));
                    }

                    // 3. If the valid_policy_tree includes a node of depth n with the
                    // valid_policy anyPolicy, replace it with a child of the depth n-1
                    // anyPolicy node for each retained policy not already represented.
                    let mut nodes_to_add = vec![];
                    if let Some(any_index) =
                        policy_tree_row_contains_policy(pm, &valid_policy_tree[i], ANY_POLICY)
                    {
                        let parent = &pm[any_index];
                        let p_q = &parent.qualifier_set;

                        for p in &retained {
                            nodes_to_add.push(new_policy_node(
                                *p,
                                p_q,
                                ObjectIdentifierSet::from([*p]),
                                row as u8,
                                parent.critical,
                                &parent.parent,
                            ));
                        }
                        valid_policy_tree[row].retain(|x| *x != any_index);
                    }

                    for node in nodes_to_add {
                        let parent_index = node.parent;
                        let node_index = pm.len();
                        pm.push(node);
                        // a retained policy may already be represented in the row; only nodes
                        // actually inserted as children appear in the final tree
                        let added = match parent_index {
                            Some(parent_index) => {
                                let parent = &pm[parent_index];
                                add_child_if_not_present(pm, &parent.children, node_index)
                            }
                            None => true,
                        };
                        if added {
                            valid_policy_tree[row].push(node_index);
                        }
                    }

                    if valid_policy_tree[row].is_empty() {
                        valid_policy_tree_is_null = true;
                    }
                }
            }

            if explicit_policy == 0 {
                if valid_policy_tree_is_null {
                    results.add_error(-1, Finding::NoValidPolicyTree);
                    return None;
                }
                if let Some(acc) = &acceptable_policies {
                    if acc.is_empty() {
                        results.add_error(-1, Finding::ExplicitPolicyViolation);
                    }
                }
            }
        }
    }

    if valid_policy_tree_is_null {
        return None;
    }

    let mut final_tree: FinalPolicyTree = FinalPolicyTree::new();
    for row in valid_policy_tree {
        let mut new_row = Vec::new();
        for node in row {
            let p = &pm[node];
            new_row.push(FinalPolicyTreeNode {
                valid_policy: p.valid_policy,
                qualifier_set: p.qualifier_set.clone(),
                expected_policy_set: p.expected_policy_set.clone(),
                critical: p.critical,
            });
        }
        final_tree.push(new_row);
    }
    Some(final_tree)
}
