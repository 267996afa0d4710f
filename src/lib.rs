#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod asn1;
pub mod environment;
pub mod util;
pub mod validator;

#[cfg(feature = "revocation")]
pub mod revocation;

pub use crate::asn1::*;

pub use crate::environment::*;

#[cfg(feature = "revocation")]
pub use crate::revocation::*;

pub use crate::{util::*, validator::*};
