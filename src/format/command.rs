// Delta command encoding.
//
// A delta is a flat sequence of commands with no header:
//
//   END      0x00
//   LITERAL  0x01  length:varint  bytes[length]
//   COPY     0x02  offset:varint  length:varint
//
// Exactly one END terminates the stream and nothing may follow it.  An empty
// new file produces the single byte 0x00.

use std::fmt;

use super::varint;
use crate::error::DeltaError;

pub const OP_END: u8 = 0x00;
pub const OP_LITERAL: u8 = 0x01;
pub const OP_COPY: u8 = 0x02;

/// One decoded delta command.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Copy `length` bytes from the basis starting at `offset`.
    Copy { offset: u64, length: u64 },
    /// Append these bytes verbatim.
    Literal(&'a [u8]),
    /// End of the delta.
    End,
}

impl Command<'_> {
    /// Number of output bytes this command produces.
    pub fn output_len(&self) -> u64 {
        match self {
            Command::Copy { length, .. } => *length,
            Command::Literal(bytes) => bytes.len() as u64,
            Command::End => 0,
        }
    }

    /// Append the wire encoding of this command to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Command::Copy { offset, length } => encode_copy(out, offset, length),
            Command::Literal(bytes) => {
                encode_literal_header(out, bytes.len() as u64);
                out.extend_from_slice(bytes);
            }
            Command::End => out.push(OP_END),
        }
    }
}

impl fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Copy { offset, length } => write!(f, "Copy({offset}, {length})"),
            Command::Literal(bytes) => write!(f, "Literal({} bytes)", bytes.len()),
            Command::End => write!(f, "End"),
        }
    }
}

/// Append a COPY command.
pub fn encode_copy(out: &mut Vec<u8>, offset: u64, length: u64) {
    out.push(OP_COPY);
    varint::push_u64(out, offset);
    varint::push_u64(out, length);
}

/// Append a LITERAL opcode and length; the caller appends the bytes.
pub fn encode_literal_header(out: &mut Vec<u8>, length: u64) {
    out.push(OP_LITERAL);
    varint::push_u64(out, length);
}

/// Iterate over the commands of a complete delta held in memory.
pub fn commands(delta: &[u8]) -> CommandIter<'_> {
    CommandIter {
        data: delta,
        pos: 0,
        finished: false,
    }
}

/// Iterator returned by [`commands`].
///
/// Yields `Command::End` last.  A missing END, bytes after END, an unknown
/// opcode or a malformed operand is yielded as an error, after which the
/// iterator is exhausted.
pub struct CommandIter<'a> {
    data: &'a [u8],
    pos: usize,
    finished: bool,
}

impl<'a> CommandIter<'a> {
    /// Byte offset of the next command.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn operand(&mut self) -> Result<u64, DeltaError> {
        let (val, len) = varint::read_u64(&self.data[self.pos..]).map_err(|e| match e {
            varint::VarIntError::Underflow => DeltaError::TruncatedRecord("command operand"),
            other => other.into(),
        })?;
        self.pos += len;
        Ok(val)
    }

    fn next_command(&mut self) -> Result<Command<'a>, DeltaError> {
        let Some(&op) = self.data.get(self.pos) else {
            return Err(DeltaError::TruncatedRecord("delta (missing END)"));
        };
        let at = self.pos;
        self.pos += 1;
        match op {
            OP_END => {
                if self.pos != self.data.len() {
                    return Err(DeltaError::CorruptCommand(format!(
                        "{} bytes after END at offset {at}",
                        self.data.len() - self.pos
                    )));
                }
                Ok(Command::End)
            }
            OP_LITERAL => {
                let length = self.operand()?;
                let remaining = (self.data.len() - self.pos) as u64;
                if length > remaining {
                    return Err(DeltaError::TruncatedRecord("literal data"));
                }
                let start = self.pos;
                self.pos += length as usize;
                Ok(Command::Literal(&self.data[start..self.pos]))
            }
            OP_COPY => {
                let offset = self.operand()?;
                let length = self.operand()?;
                Ok(Command::Copy { offset, length })
            }
            other => Err(DeltaError::CorruptCommand(format!(
                "unknown opcode {other:#04x} at offset {at}"
            ))),
        }
    }
}

impl<'a> Iterator for CommandIter<'a> {
    type Item = Result<Command<'a>, DeltaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_command();
        if !matches!(result, Ok(Command::Copy { .. } | Command::Literal(_))) {
            self.finished = true;
        }
        Some(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(delta: &[u8]) -> Vec<Result<Command<'_>, DeltaError>> {
        commands(delta).collect()
    }

    #[test]
    fn empty_delta_is_single_end() {
        let mut out = Vec::new();
        Command::End.encode(&mut out);
        assert_eq!(out, [OP_END]);
        let cmds = collect(&out);
        assert_eq!(cmds.len(), 1);
        assert_eq!(*cmds[0].as_ref().unwrap(), Command::End);
    }

    #[test]
    fn encodes_and_parses_sequence() {
        let mut out = Vec::new();
        Command::Copy { offset: 0, length: 512 }.encode(&mut out);
        Command::Literal(b"xyz").encode(&mut out);
        Command::Copy { offset: 300, length: 1 }.encode(&mut out);
        Command::End.encode(&mut out);
        assert_eq!(&out[..4], &[OP_COPY, 0x00, 0x84, 0x00]);
        let cmds: Vec<Command<'_>> = commands(&out).map(Result::unwrap).collect();
        assert_eq!(
            cmds,
            vec![
                Command::Copy { offset: 0, length: 512 },
                Command::Literal(b"xyz"),
                Command::Copy { offset: 300, length: 1 },
                Command::End,
            ]
        );
        let total: u64 = cmds.iter().map(Command::output_len).sum();
        assert_eq!(total, 516);
    }

    #[test]
    fn missing_end_is_truncated() {
        let mut out = Vec::new();
        Command::Literal(b"abc").encode(&mut out);
        let cmds = collect(&out);
        assert_eq!(cmds.len(), 2);
        assert!(matches!(cmds[1], Err(DeltaError::TruncatedRecord(_))));
    }

    #[test]
    fn short_literal_is_truncated() {
        let out = [OP_LITERAL, 5, b'a', b'b'];
        assert!(matches!(
            collect(&out)[0],
            Err(DeltaError::TruncatedRecord("literal data"))
        ));
    }

    #[test]
    fn short_copy_operand_is_truncated() {
        let out = [OP_COPY, 0x05, 0x81];
        assert!(matches!(
            collect(&out)[0],
            Err(DeltaError::TruncatedRecord("command operand"))
        ));
    }

    #[test]
    fn bytes_after_end_are_corrupt() {
        let out = [OP_END, OP_END];
        let cmds = collect(&out);
        assert_eq!(cmds.len(), 1);
        assert!(matches!(cmds[0], Err(DeltaError::CorruptCommand(_))));
    }

    #[test]
    fn unknown_opcode_is_corrupt() {
        let out = [0x7E];
        let cmds = collect(&out);
        assert_eq!(cmds.len(), 1);
        let err = cmds.into_iter().next().unwrap().unwrap_err();
        assert!(err.to_string().contains("0x7e"));
    }
}
