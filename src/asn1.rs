//! ASN.1 encoders and decoders for structures not included in a RustCrypto formats repo

pub mod qc_statements;

pub use crate::asn1::qc_statements::*;
