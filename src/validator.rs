//! Diagnostics-first certification path review per RFC 5280 Section 6

pub mod name_constraints_set;
pub mod parsed_certificate;
pub mod parsed_extension;
pub mod path_reviewer;
pub mod path_settings;
pub mod policy_tree;
pub mod review_results;
pub mod trust_anchor;

pub use crate::{
    validator::name_constraints_set::*, validator::parsed_certificate::*,
    validator::parsed_extension::*, validator::path_reviewer::*, validator::path_settings::*,
    validator::policy_tree::*, validator::review_results::*, validator::trust_anchor::*,
};
