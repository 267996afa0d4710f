//! Qualified certificate statement structures from RFC 3739 and ETSI TS 101 862

use der::asn1::{ObjectIdentifier, PrintableString};
use der::{Any, Choice, Sequence};

/// qcStatements extension OID from RFC 3739: 1.3.6.1.5.5.7.1.3
pub const ID_PE_QC_STATEMENTS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.1.3");

/// id-qcs-pkixQCSyntax-v1 from RFC 3039: 1.3.6.1.5.5.7.11.1
pub const ID_QCS_PKIX_QC_SYNTAX_V1: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.11.1");

/// id-etsi-qcs-QcCompliance from ETSI TS 101 862: 0.4.0.1862.1.1
pub const ID_ETSI_QCS_QC_COMPLIANCE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("0.4.0.1862.1.1");

/// id-etsi-qcs-QcLimitValue from ETSI TS 101 862: 0.4.0.1862.1.2
pub const ID_ETSI_QCS_QC_LIMIT_VALUE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("0.4.0.1862.1.2");

/// id-etsi-qcs-QcSSCD from ETSI TS 101 862: 0.4.0.1862.1.4
pub const ID_ETSI_QCS_QC_SSCD: ObjectIdentifier = ObjectIdentifier::new_unwrap("0.4.0.1862.1.4");

/// QCStatement as defined in [RFC 3739 Section 3.2.6].
///
/// ```text
/// QCStatement ::= SEQUENCE {
///     statementId        OBJECT IDENTIFIER,
///     statementInfo      ANY DEFINED BY statementId OPTIONAL }
/// ```
///
/// [RFC 3739 Section 3.2.6]: https://datatracker.ietf.org/doc/html/rfc3739#section-3.2.6
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct QcStatement {
    /// statementId        OBJECT IDENTIFIER
    pub statement_id: ObjectIdentifier,
    /// statementInfo      ANY DEFINED BY statementId OPTIONAL
    #[asn1(optional = "true")]
    pub statement_info: Option<Any>,
}

/// QCStatements ::= SEQUENCE OF QCStatement
pub type QcStatements = Vec<QcStatement>;

/// Iso4217CurrencyCode as defined in ETSI TS 101 862.
///
/// ```text
/// Iso4217CurrencyCode ::= CHOICE {
///     alphabetic    PrintableString (SIZE 3),
///     numeric       INTEGER (1..999) }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum Iso4217CurrencyCode {
    /// alphabetic    PrintableString (SIZE 3)
    Alphabetic(PrintableString),
    /// numeric       INTEGER (1..999)
    Numeric(u16),
}

impl Iso4217CurrencyCode {
    /// Returns a display string for the currency code.
    pub fn to_display_string(&self) -> String {
        match self {
            Iso4217CurrencyCode::Alphabetic(s) => s.to_string(),
            Iso4217CurrencyCode::Numeric(n) => n.to_string(),
        }
    }
}

/// MonetaryValue as defined in ETSI TS 101 862.
///
/// ```text
/// MonetaryValue ::= SEQUENCE {
///     currency              Iso4217CurrencyCode,
///     amount               INTEGER,
///     exponent             INTEGER }
/// ```
///
/// The monetary limit is amount * 10^exponent in the indicated currency.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MonetaryValue {
    /// currency              Iso4217CurrencyCode
    pub currency: Iso4217CurrencyCode,
    /// amount               INTEGER
    pub amount: i64,
    /// exponent             INTEGER
    pub exponent: i64,
}
