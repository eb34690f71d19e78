// Delta generation.
//
// Greedy single pass over the new stream.  A window of `block_len` bytes is
// slid along the input; its weak checksum is rolled one byte at a time while
// nothing matches and recomputed from scratch after each matched block.  A
// weak hit is confirmed by the (lazily computed, truncated) strong digest
// before any COPY is emitted.
//
// Pending work is either a literal run being accumulated or a copy that may
// still grow, never both: a hit flushes the literal, a miss flushes the copy.

use log::trace;

use super::{Buffers, Progress, Scoop, Stats};
use crate::error::DeltaError;
use crate::format::command;
use crate::hash::rolling::RollingChecksum;
use crate::hash::strong::{StrongDigest, StrongSum};
use crate::index::BlockIndex;
use crate::signature::{Block, Signature, truncate_strong};

enum Phase {
    /// Accumulating unmatched bytes into `literal`.
    Scanning,
    /// The last window matched; the copy may still be extended by the next
    /// contiguous block.
    MatchedCopy { offset: u64, length: u64 },
    /// Input exhausted; emit what is pending and the END command.
    Flushing,
    Done,
}

pub(crate) struct DeltaGen<'s> {
    index: BlockIndex<'s>,
    phase: Phase,
    literal: Vec<u8>,
    /// Sum over the current window, or `None` to recompute.
    rolling: Option<RollingChecksum>,
    /// Byte that left the window on the last miss.
    rolled_out: Option<u8>,
}

impl<'s> DeltaGen<'s> {
    pub fn new(signature: &'s Signature) -> Result<Self, DeltaError> {
        Ok(Self {
            index: BlockIndex::build(signature)?,
            phase: Phase::Scanning,
            literal: Vec::new(),
            rolling: None,
            rolled_out: None,
        })
    }

    pub fn step(
        &mut self,
        scoop: &mut Scoop,
        bufs: &mut Buffers<'_>,
        out: &mut Vec<u8>,
        stats: &mut Stats,
    ) -> Result<Progress, DeltaError> {
        let block_len = self.index.signature().block_len() as usize;
        loop {
            match self.phase {
                Phase::Scanning | Phase::MatchedCopy { .. } => {
                    let Some(window) = scoop.readahead(bufs, block_len) else {
                        if !bufs.eof_in() {
                            return Ok(Progress::Blocked);
                        }
                        // A copy still pending here must go out before the tail.
                        self.flush_copy(out, stats);
                        self.phase = Phase::Flushing;
                        continue;
                    };
                    let advance = self.scan_window(window, out, stats);
                    scoop.consume(bufs, advance);
                    if !out.is_empty() {
                        return Ok(Progress::Continue);
                    }
                }
                Phase::Flushing => {
                    // Everything left is shorter than a block.
                    let tail = scoop.peek(bufs, block_len);
                    let tail_len = tail.len();
                    self.literal.extend_from_slice(tail);
                    scoop.consume(bufs, tail_len);
                    self.flush_literal(out, stats);
                    trace!("END");
                    out.push(command::OP_END);
                    self.phase = Phase::Done;
                    return Ok(Progress::Finished);
                }
                Phase::Done => return Ok(Progress::Finished),
            }
        }
    }

    /// Process the window at the current position.  Returns how many bytes
    /// to advance: a whole block on a match, one byte otherwise.
    fn scan_window(&mut self, window: &[u8], out: &mut Vec<u8>, stats: &mut Stats) -> usize {
        let rolled_out = self.rolled_out.take();
        let weak = match (&mut self.rolling, rolled_out) {
            (Some(sum), Some(out_byte)) => {
                sum.roll(out_byte, window[window.len() - 1]);
                sum.digest()
            }
            (slot, _) => {
                let sum = RollingChecksum::of(window);
                *slot = Some(sum);
                sum.digest()
            }
        };

        match self.find_block(weak, window, stats) {
            Some(block) => {
                self.flush_literal(out, stats);
                self.extend_copy(block.offset, window.len() as u64, out, stats);
                self.rolling = None;
                window.len()
            }
            None => {
                self.flush_copy(out, stats);
                self.literal.push(window[0]);
                self.rolled_out = Some(window[0]);
                1
            }
        }
    }

    /// Verified block for the window, preferring the one right after the
    /// pending copy so contiguous runs merge.
    fn find_block(&mut self, weak: u32, window: &[u8], stats: &mut Stats) -> Option<&'s Block> {
        let signature = self.index.signature();
        let strong_len = signature.strong_len() as usize;
        let mut strong: Option<StrongSum> = None;
        let mut false_matches = 0u64;
        let mut verify = |block: &Block| {
            if block.length as usize != window.len() {
                return false;
            }
            let sum = strong
                .get_or_insert_with(|| truncate_strong(&StrongDigest::digest(window), strong_len));
            if block.strong == *sum {
                true
            } else {
                false_matches += 1;
                trace!("false match: weak={weak:#010x} block @{}", block.offset);
                false
            }
        };

        let next_at = match self.phase {
            Phase::MatchedCopy { offset, length } => Some(offset + length),
            _ => None,
        };
        let next = next_at
            .and_then(|at| signature.block_at(at))
            .filter(|b| b.weak == weak && verify(*b));
        // The contiguous block has been tried already; each candidate is
        // verified at most once.
        let found = next.or_else(|| {
            self.index
                .find(weak, |b| Some(b.offset) != next_at && verify(b))
        });
        stats.false_matches += false_matches;
        found
    }

    fn extend_copy(&mut self, offset: u64, length: u64, out: &mut Vec<u8>, stats: &mut Stats) {
        if let Phase::MatchedCopy { offset: start, length: run } = &mut self.phase
            && *start + *run == offset
        {
            *run += length;
            return;
        }
        self.flush_copy(out, stats);
        self.phase = Phase::MatchedCopy { offset, length };
    }

    fn flush_copy(&mut self, out: &mut Vec<u8>, stats: &mut Stats) {
        if let Phase::MatchedCopy { offset, length } = self.phase {
            trace!("COPY {offset} {length}");
            command::encode_copy(out, offset, length);
            stats.copy_cmds += 1;
            stats.copy_bytes += length;
            self.phase = Phase::Scanning;
        }
    }

    fn flush_literal(&mut self, out: &mut Vec<u8>, stats: &mut Stats) {
        if self.literal.is_empty() {
            return;
        }
        let len = self.literal.len() as u64;
        trace!("LITERAL {len}");
        command::encode_literal_header(out, len);
        out.append(&mut self.literal);
        stats.lit_cmds += 1;
        stats.lit_bytes += len;
    }
}
