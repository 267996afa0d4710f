//! Revocation status determination using CRLs

pub mod check_revocation;
pub mod crl;

#[cfg(feature = "remote")]
pub mod fetch;

#[cfg(feature = "remote")]
pub use crate::revocation::fetch::*;
