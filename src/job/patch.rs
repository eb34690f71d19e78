// Patch application.
//
// Replays the command stream against a random-access basis.  Operands are
// parsed through the scoop so a command may be split anywhere; literal and
// copy data are streamed straight into the caller's output buffer without
// intermediate copies.

use log::trace;

use super::{Buffers, Progress, Scoop, Stats};
use crate::error::DeltaError;
use crate::format::command::{OP_COPY, OP_END, OP_LITERAL};
use crate::format::varint::{self, MAX_VARINT_LEN};

/// Random-access source of basis bytes for patching.
pub trait BasisSource {
    /// Total length, if known up front.  Copies are range-checked against it
    /// before any data is read.
    fn len(&self) -> Option<u64>;

    /// Fill `buf` with the bytes at `offset`.  Fails with
    /// [`DeltaError::OutOfRangeCopy`] if the basis cannot supply all of them.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeltaError>;
}

impl BasisSource for &[u8] {
    fn len(&self) -> Option<u64> {
        Some(<[u8]>::len(self) as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeltaError> {
        let basis_len = <[u8]>::len(self) as u64;
        let end = offset.checked_add(buf.len() as u64);
        match end {
            Some(end) if end <= basis_len => {
                buf.copy_from_slice(&self[offset as usize..end as usize]);
                Ok(())
            }
            _ => Err(DeltaError::out_of_range(offset, buf.len() as u64, Some(basis_len))),
        }
    }
}

impl BasisSource for Vec<u8> {
    fn len(&self) -> Option<u64> {
        Some(Vec::len(self) as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeltaError> {
        self.as_slice().read_at(offset, buf)
    }
}

impl<B: BasisSource + ?Sized> BasisSource for Box<B> {
    fn len(&self) -> Option<u64> {
        (**self).len()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeltaError> {
        (**self).read_at(offset, buf)
    }
}

enum Phase {
    Opcode,
    CopyOffset,
    CopyLength { offset: u64 },
    CopyData { offset: u64, remaining: u64 },
    LiteralLength,
    LiteralData { remaining: u64 },
    /// END seen; only end of input may follow.
    Trailer,
}

pub(crate) struct PatchApply<'a> {
    basis: Box<dyn BasisSource + Send + 'a>,
    phase: Phase,
}

impl<'a> PatchApply<'a> {
    pub fn new(basis: Box<dyn BasisSource + Send + 'a>) -> Self {
        Self {
            basis,
            phase: Phase::Opcode,
        }
    }

    pub fn step(
        &mut self,
        scoop: &mut Scoop,
        bufs: &mut Buffers<'_>,
        stats: &mut Stats,
    ) -> Result<Progress, DeltaError> {
        loop {
            match self.phase {
                Phase::Opcode => {
                    let Some(&[op]) = scoop.readahead(bufs, 1) else {
                        return if bufs.eof_in() {
                            Err(DeltaError::TruncatedRecord("delta (missing END)"))
                        } else {
                            Ok(Progress::Blocked)
                        };
                    };
                    scoop.consume(bufs, 1);
                    self.phase = match op {
                        OP_END => {
                            trace!("END");
                            Phase::Trailer
                        }
                        OP_LITERAL => Phase::LiteralLength,
                        OP_COPY => Phase::CopyOffset,
                        other => {
                            return Err(DeltaError::CorruptCommand(format!(
                                "unknown opcode {other:#04x}"
                            )));
                        }
                    };
                }
                Phase::CopyOffset => {
                    let Some(offset) = read_operand(scoop, bufs, "copy offset")? else {
                        return Ok(Progress::Blocked);
                    };
                    self.phase = Phase::CopyLength { offset };
                }
                Phase::CopyLength { offset } => {
                    let Some(length) = read_operand(scoop, bufs, "copy length")? else {
                        return Ok(Progress::Blocked);
                    };
                    let basis_len = self.basis.len();
                    let in_range = match (offset.checked_add(length), basis_len) {
                        (None, _) => false,
                        (Some(end), Some(len)) => end <= len,
                        (Some(_), None) => true,
                    };
                    if !in_range {
                        return Err(DeltaError::out_of_range(offset, length, basis_len));
                    }
                    trace!("COPY {offset} {length}");
                    stats.copy_cmds += 1;
                    stats.copy_bytes += length;
                    self.phase = Phase::CopyData {
                        offset,
                        remaining: length,
                    };
                }
                Phase::CopyData { offset, remaining } => {
                    if remaining == 0 {
                        self.phase = Phase::Opcode;
                        continue;
                    }
                    let space = bufs.output_space();
                    if space.is_empty() {
                        return Ok(Progress::Blocked);
                    }
                    let n = usize::try_from(remaining).unwrap_or(usize::MAX).min(space.len());
                    self.basis.read_at(offset, &mut space[..n])?;
                    bufs.advance_output(n);
                    self.phase = Phase::CopyData {
                        offset: offset + n as u64,
                        remaining: remaining - n as u64,
                    };
                }
                Phase::LiteralLength => {
                    let Some(length) = read_operand(scoop, bufs, "literal length")? else {
                        return Ok(Progress::Blocked);
                    };
                    trace!("LITERAL {length}");
                    stats.lit_cmds += 1;
                    stats.lit_bytes += length;
                    self.phase = Phase::LiteralData { remaining: length };
                }
                Phase::LiteralData { remaining } => {
                    if remaining == 0 {
                        self.phase = Phase::Opcode;
                        continue;
                    }
                    if bufs.avail_out() == 0 {
                        return Ok(Progress::Blocked);
                    }
                    let want = usize::try_from(remaining)
                        .unwrap_or(usize::MAX)
                        .min(bufs.avail_out());
                    let data = scoop.peek(bufs, want);
                    if data.is_empty() {
                        return if bufs.eof_in() {
                            Err(DeltaError::TruncatedRecord("literal data"))
                        } else {
                            Ok(Progress::Blocked)
                        };
                    }
                    let n = bufs.write_output(data);
                    scoop.consume(bufs, n);
                    self.phase = Phase::LiteralData {
                        remaining: remaining - n as u64,
                    };
                }
                Phase::Trailer => {
                    if scoop.available(bufs) > 0 {
                        return Err(DeltaError::CorruptCommand(format!(
                            "{} bytes after END",
                            scoop.available(bufs)
                        )));
                    }
                    return Ok(if bufs.eof_in() {
                        Progress::Finished
                    } else {
                        Progress::Blocked
                    });
                }
            }
        }
    }
}

/// Parse one varint operand, gathering its bytes across calls.
///
/// `Ok(None)` means more input is needed; everything available has been
/// stashed in the scoop.
fn read_operand(
    scoop: &mut Scoop,
    bufs: &mut Buffers<'_>,
    what: &'static str,
) -> Result<Option<u64>, DeltaError> {
    let data = scoop.peek(bufs, MAX_VARINT_LEN);
    if let Some(len) = varint::complete_len(data)? {
        let (value, _) = varint::read_u64(&data[..len])?;
        scoop.consume(bufs, len);
        return Ok(Some(value));
    }
    if bufs.eof_in() {
        return Err(DeltaError::TruncatedRecord(what));
    }
    scoop.stash(bufs);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_basis_bounds() {
        let mut basis: &[u8] = b"0123456789";
        assert_eq!(BasisSource::len(&basis), Some(10));
        let mut buf = [0u8; 4];
        basis.read_at(6, &mut buf).unwrap();
        assert_eq!(&buf, b"6789");
        assert!(matches!(
            basis.read_at(7, &mut buf),
            Err(DeltaError::OutOfRangeCopy {
                offset: 7,
                length: 4,
                basis_len: Some(10)
            })
        ));
        assert!(basis.read_at(u64::MAX, &mut buf).is_err());
    }

    #[test]
    fn vec_and_box_basis_delegate() {
        let mut basis: Box<dyn BasisSource> = Box::new(b"abcdef".to_vec());
        assert_eq!(basis.len(), Some(6));
        let mut buf = [0u8; 2];
        basis.read_at(2, &mut buf).unwrap();
        assert_eq!(&buf, b"cd");
    }
}
