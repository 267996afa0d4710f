//! Basic utility functionality supporting certification path review

pub mod error;
pub mod path_utilities;

pub use crate::{util::error::*, util::path_utilities::*};
