use thiserror::Error;

/// A byte-level decoding error.
///
/// Every variant carries the name of the field being read and the cursor
/// position at which the read was attempted, so a failing block or
/// transaction can be located in the raw hex without re-parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input ended before the field could be read in full.
    #[error("unexpected end of input reading {field} at byte {position}")]
    Truncated {
        field: &'static str,
        position: usize,
    },

    /// The bytes were present but their value is not acceptable.
    #[error("malformed {field} at byte {position}: {reason}")]
    Malformed {
        field: &'static str,
        position: usize,
        reason: &'static str,
    },

    /// A count or length exceeded its sanity cap.
    ///
    /// Caps protect against blind preallocation from corrupt counts; an
    /// honest chain never comes near them.
    #[error("{field} at byte {position} exceeds sanity cap: {actual} > {limit}")]
    SanityCap {
        field: &'static str,
        position: usize,
        limit: u64,
        actual: u64,
    },

    /// The block contained bytes after the last transaction.
    #[error("{extra} trailing bytes after final transaction")]
    TrailingBytes { extra: usize },
}
