// Basis signatures.
//
// A signature describes a basis as a list of fixed-size blocks, each with a
// weak rolling checksum and a (possibly truncated) strong digest.  It is
// immutable once built or loaded; the block index used for matching borrows
// it (see `index.rs`).

use std::fmt;

use crate::error::DeltaError;
use crate::format::header::{self, SIG_HEADER_LEN};
use crate::hash::config::SignatureConfig;
use crate::hash::rolling::weak_sum;
use crate::hash::strong::{STRONG_SUM_LEN, StrongDigest, StrongSum};

/// One basis block.
///
/// `strong` holds the leading `strong_len` digest bytes followed by zeros, so
/// two blocks (or a block and a truncated window digest) can be compared as
/// whole arrays.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    pub offset: u64,
    pub length: u32,
    pub weak: u32,
    pub strong: StrongSum,
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("weak", &format_args!("{:#010x}", self.weak))
            .finish_non_exhaustive()
    }
}

/// Keep the leading `strong_len` bytes of `sum` and zero the rest.
#[inline]
pub fn truncate_strong(sum: &StrongSum, strong_len: usize) -> StrongSum {
    let mut out = [0u8; STRONG_SUM_LEN];
    out[..strong_len].copy_from_slice(&sum[..strong_len]);
    out
}

/// Ordered per-block checksums of a basis.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    config: SignatureConfig,
    blocks: Vec<Block>,
}

impl Signature {
    /// Empty signature with validated parameters.
    pub fn new(config: SignatureConfig) -> Result<Self, DeltaError> {
        header::check_config(&config)?;
        Ok(Self {
            config,
            blocks: Vec::new(),
        })
    }

    /// Build the signature of a basis held in memory.
    pub fn build(basis: &[u8], config: SignatureConfig) -> Result<Self, DeltaError> {
        let mut sig = Self::new(config)?;
        let count = basis.len().div_ceil(config.block_len as usize);
        sig.blocks.try_reserve_exact(count)?;
        for chunk in basis.chunks(config.block_len as usize) {
            sig.push_block(chunk.len() as u32, weak_sum(chunk), &StrongDigest::digest(chunk));
        }
        Ok(sig)
    }

    /// Decode a complete signature stream.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeltaError> {
        let head: &[u8; SIG_HEADER_LEN] = bytes
            .get(..SIG_HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(DeltaError::TruncatedRecord("signature header"))?;
        let config = header::decode_header(head)?;
        let mut sig = Self::new(config)?;

        let body = &bytes[SIG_HEADER_LEN..];
        let rec_len = header::record_len(&config);
        if body.len() % rec_len != 0 {
            return Err(DeltaError::TruncatedRecord("signature block record"));
        }
        sig.blocks.try_reserve_exact(body.len() / rec_len)?;
        for rec in body.chunks_exact(rec_len) {
            sig.push_record(rec);
        }
        Ok(sig)
    }

    /// Append a block computed by the caller; `strong` is the full digest.
    pub(crate) fn push_block(&mut self, length: u32, weak: u32, strong: &StrongSum) {
        let offset = self.blocks.len() as u64 * u64::from(self.config.block_len);
        self.blocks.push(Block {
            offset,
            length,
            weak,
            strong: truncate_strong(strong, self.config.strong_len as usize),
        });
    }

    /// Append a block decoded from one wire record.
    ///
    /// The wire format does not carry block lengths, so every loaded block is
    /// taken to be `block_len` long.
    pub(crate) fn push_record(&mut self, rec: &[u8]) {
        let strong_len = self.config.strong_len as usize;
        let mut strong = [0u8; STRONG_SUM_LEN];
        strong[..strong_len].copy_from_slice(&rec[header::WEAK_SUM_LEN..][..strong_len]);
        let offset = self.blocks.len() as u64 * u64::from(self.config.block_len);
        self.blocks.push(Block {
            offset,
            length: self.config.block_len,
            weak: header::be_u32(rec),
            strong,
        });
    }

    pub fn config(&self) -> SignatureConfig {
        self.config
    }

    pub fn block_len(&self) -> u32 {
        self.config.block_len
    }

    pub fn strong_len(&self) -> u32 {
        self.config.strong_len
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The block starting exactly at `offset`, if any.
    pub fn block_at(&self, offset: u64) -> Option<&Block> {
        let index = offset / u64::from(self.config.block_len);
        let block = self.blocks.get(usize::try_from(index).ok()?)?;
        (block.offset == offset).then_some(block)
    }

    /// Size of the wire encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        SIG_HEADER_LEN + self.blocks.len() * header::record_len(&self.config)
    }

    /// Append the wire encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.reserve(self.encoded_len());
        out.extend_from_slice(&header::encode_header(&self.config));
        let strong_len = self.config.strong_len as usize;
        for block in &self.blocks {
            header::push_record(out, block.weak, &block.strong[..strong_len]);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("block_len", &self.config.block_len)
            .field("strong_len", &self.config.strong_len)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
