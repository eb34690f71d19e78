// Error type shared by every job and builder.
//
// The engine fails closed: the first error ends the job and is returned from
// `Job::iter` (or the builder call) unchanged.  Nothing is retried.

use std::collections::TryReserveError;
use std::io;

use crate::format::varint::VarIntError;
use crate::hash::table::TableFull;

/// Everything that can go wrong while building, loading or applying
/// signatures and deltas.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// Signature header has the wrong magic, or signature parameters are
    /// outside their valid range.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Input ended in the middle of a record or command.
    #[error("truncated {0}")]
    TruncatedRecord(&'static str),

    /// Delta stream contains an unknown opcode, an unencodable value or
    /// bytes after `END`.
    #[error("corrupt command stream: {0}")]
    CorruptCommand(String),

    /// A copy command reaches outside the basis.
    #[error(
        "copy of {length} bytes at offset {offset} is outside the basis ({})",
        describe_len(.basis_len)
    )]
    OutOfRangeCopy {
        offset: u64,
        length: u64,
        basis_len: Option<u64>,
    },

    /// The block index ran out of slots.
    #[error("block index full ({size} slots)")]
    TableFull { size: usize },

    /// Reading or writing an underlying stream failed.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] io::Error),

    /// A buffer or table could not be allocated.
    #[error("allocation failure: {0}")]
    AllocFailure(#[from] TryReserveError),
}

impl DeltaError {
    /// Copy outside the basis; `basis_len` is `None` when the source cannot
    /// report its size.
    pub fn out_of_range(offset: u64, length: u64, basis_len: Option<u64>) -> Self {
        Self::OutOfRangeCopy {
            offset,
            length,
            basis_len,
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedHeader(_) => "malformed_header",
            Self::TruncatedRecord(_) => "truncated_record",
            Self::CorruptCommand(_) => "corrupt_command",
            Self::OutOfRangeCopy { .. } => "out_of_range_copy",
            Self::TableFull { .. } => "table_full",
            Self::IoFailure(_) => "io_failure",
            Self::AllocFailure(_) => "alloc_failure",
        }
    }
}

impl From<TableFull> for DeltaError {
    fn from(e: TableFull) -> Self {
        Self::TableFull { size: e.size }
    }
}

impl From<VarIntError> for DeltaError {
    fn from(e: VarIntError) -> Self {
        match e {
            VarIntError::Underflow => Self::TruncatedRecord("varint"),
            VarIntError::Overflow => Self::CorruptCommand("varint overflows 64 bits".into()),
        }
    }
}

impl From<DeltaError> for io::Error {
    fn from(e: DeltaError) -> io::Error {
        match e {
            DeltaError::IoFailure(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

fn describe_len(len: &Option<u64>) -> String {
    match len {
        Some(n) => format!("{n} bytes"),
        None => "length unknown".to_string(),
    }
}

pub type Result<T, E = DeltaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = DeltaError::out_of_range(100, 50, Some(120));
        assert_eq!(
            e.to_string(),
            "copy of 50 bytes at offset 100 is outside the basis (120 bytes)"
        );
        assert_eq!(e.kind(), "out_of_range_copy");
        let e = DeltaError::out_of_range(0, 1, None);
        assert!(e.to_string().contains("unknown"));
        assert_eq!(
            DeltaError::TruncatedRecord("signature header").to_string(),
            "truncated signature header"
        );
    }

    #[test]
    fn conversions() {
        let e: DeltaError = TableFull { size: 8 }.into();
        assert!(matches!(e, DeltaError::TableFull { size: 8 }));
        let e: DeltaError = VarIntError::Underflow.into();
        assert!(matches!(e, DeltaError::TruncatedRecord(_)));
        let e: DeltaError = io::Error::other("boom").into();
        assert_eq!(e.kind(), "io_failure");
        let back: io::Error = e.into();
        assert_eq!(back.to_string(), "boom");
        let back: io::Error = DeltaError::CorruptCommand("x".into()).into();
        assert_eq!(back.kind(), io::ErrorKind::InvalidData);
    }
}
