// Signature build and load jobs.

use log::{debug, trace};

use super::{Buffers, Progress, Scoop, Stats};
use crate::error::DeltaError;
use crate::format::header::{self, SIG_HEADER_LEN};
use crate::hash::config::SignatureConfig;
use crate::hash::rolling::RollingChecksum;
use crate::hash::strong::StrongDigest;
use crate::signature::Signature;

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Hashes the basis block by block.
///
/// Input is fed straight into the running weak and strong sums, so a block
/// may be split across any number of calls without being buffered.
pub(crate) struct SigBuilder {
    config: SignatureConfig,
    header_written: bool,
    weak: RollingChecksum,
    strong: StrongDigest,
    filled: u32,
    signature: Option<Signature>,
}

impl SigBuilder {
    pub fn new(config: SignatureConfig) -> Result<Self, DeltaError> {
        Ok(Self {
            config,
            header_written: false,
            weak: RollingChecksum::new(),
            strong: StrongDigest::new(),
            filled: 0,
            signature: Some(Signature::new(config)?),
        })
    }

    pub fn step(
        &mut self,
        bufs: &mut Buffers<'_>,
        out: &mut Vec<u8>,
        stats: &mut Stats,
    ) -> Result<Progress, DeltaError> {
        if !self.header_written {
            out.extend_from_slice(&header::encode_header(&self.config));
            self.header_written = true;
            return Ok(Progress::Continue);
        }

        let want = (self.config.block_len - self.filled) as usize;
        let chunk = bufs.take_input(want);
        self.weak.update(chunk);
        self.strong.update(chunk);
        self.filled += chunk.len() as u32;

        if self.filled == self.config.block_len {
            self.finish_block(out, stats);
            return Ok(Progress::Continue);
        }
        if !bufs.eof_in() {
            return Ok(Progress::Blocked);
        }
        if self.filled > 0 {
            self.finish_block(out, stats);
        }
        Ok(Progress::Finished)
    }

    fn finish_block(&mut self, out: &mut Vec<u8>, stats: &mut Stats) {
        let weak = std::mem::take(&mut self.weak).digest();
        let strong = std::mem::take(&mut self.strong).finish();
        let length = std::mem::take(&mut self.filled);
        if let Some(sig) = self.signature.as_mut() {
            sig.push_block(length, weak, &strong);
            if let Some(block) = sig.blocks().last() {
                trace!("block {} @{}: weak={weak:#010x}", sig.len() - 1, block.offset);
                header::push_record(out, weak, &block.strong[..self.config.strong_len as usize]);
            }
        }
        stats.sig_blocks += 1;
    }

    pub fn take_signature(&mut self) -> Option<Signature> {
        self.signature.take()
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parses a signature stream into a [`Signature`].
pub(crate) struct SigLoader {
    signature: Option<Signature>,
    header_read: bool,
}

impl SigLoader {
    pub fn new() -> Self {
        Self {
            signature: None,
            header_read: false,
        }
    }

    pub fn step(
        &mut self,
        scoop: &mut Scoop,
        bufs: &mut Buffers<'_>,
        stats: &mut Stats,
    ) -> Result<Progress, DeltaError> {
        if !self.header_read {
            let Some(head) = scoop.readahead(bufs, SIG_HEADER_LEN) else {
                return if bufs.eof_in() {
                    Err(DeltaError::TruncatedRecord("signature header"))
                } else {
                    Ok(Progress::Blocked)
                };
            };
            let head: [u8; SIG_HEADER_LEN] = head
                .try_into()
                .map_err(|_| DeltaError::TruncatedRecord("signature header"))?;
            let config = header::decode_header(&head)?;
            scoop.consume(bufs, SIG_HEADER_LEN);
            debug!(
                "signature header: block_len={}, strong_len={}",
                config.block_len, config.strong_len
            );
            stats.block_len = config.block_len;
            self.signature = Some(Signature::new(config)?);
            self.header_read = true;
            return Ok(Progress::Continue);
        }

        let Some(sig) = self.signature.as_mut() else {
            return Ok(Progress::Finished);
        };
        let rec_len = header::record_len(&sig.config());
        loop {
            if let Some(rec) = scoop.readahead(bufs, rec_len) {
                sig.push_record(rec);
                scoop.consume(bufs, rec_len);
                stats.sig_blocks += 1;
                continue;
            }
            if !bufs.eof_in() {
                return Ok(Progress::Blocked);
            }
            if scoop.is_empty() {
                return Ok(Progress::Finished);
            }
            return Err(DeltaError::TruncatedRecord("signature block record"));
        }
    }

    pub fn take_signature(&mut self) -> Option<Signature> {
        self.signature.take()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
