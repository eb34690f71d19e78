// Signature stream header and block records.
//
// Layout (all integers big-endian):
//
//   magic       u32   0x72730136
//   block_len   u32
//   strong_len  u32
//   then per block:
//     weak      u32
//     strong    [u8; strong_len]
//
// There is no block count; the record list ends at end of stream.

use crate::error::DeltaError;
use crate::hash::config::SignatureConfig;
use crate::hash::strong::STRONG_SUM_LEN;

/// Signature stream magic ("rs" 0x01 0x36).
pub const SIG_MAGIC: u32 = 0x7273_0136;

/// Encoded header length in bytes.
pub const SIG_HEADER_LEN: usize = 12;

/// Encoded weak-sum length in bytes.
pub const WEAK_SUM_LEN: usize = 4;

/// Encode the header for `cfg`.
pub fn encode_header(cfg: &SignatureConfig) -> [u8; SIG_HEADER_LEN] {
    let mut out = [0u8; SIG_HEADER_LEN];
    out[0..4].copy_from_slice(&SIG_MAGIC.to_be_bytes());
    out[4..8].copy_from_slice(&cfg.block_len.to_be_bytes());
    out[8..12].copy_from_slice(&cfg.strong_len.to_be_bytes());
    out
}

/// Decode and validate a header.
pub fn decode_header(bytes: &[u8; SIG_HEADER_LEN]) -> Result<SignatureConfig, DeltaError> {
    let magic = be_u32(&bytes[0..4]);
    if magic != SIG_MAGIC {
        return Err(DeltaError::MalformedHeader(format!(
            "bad magic {magic:#010x}, expected {SIG_MAGIC:#010x}"
        )));
    }
    let cfg = SignatureConfig::new(be_u32(&bytes[4..8]), be_u32(&bytes[8..12]));
    check_config(&cfg)?;
    Ok(cfg)
}

/// Reject parameters no signature can be built from or loaded with.
pub fn check_config(cfg: &SignatureConfig) -> Result<(), DeltaError> {
    if cfg.block_len == 0 {
        return Err(DeltaError::MalformedHeader("block length is zero".into()));
    }
    if cfg.strong_len == 0 || cfg.strong_len as usize > STRONG_SUM_LEN {
        return Err(DeltaError::MalformedHeader(format!(
            "strong sum length {} not in 1..={STRONG_SUM_LEN}",
            cfg.strong_len
        )));
    }
    Ok(())
}

/// Encoded length of one block record.
#[inline]
pub fn record_len(cfg: &SignatureConfig) -> usize {
    WEAK_SUM_LEN + cfg.strong_len as usize
}

/// Append one block record.
pub fn push_record(out: &mut Vec<u8>, weak: u32, strong: &[u8]) {
    out.extend_from_slice(&weak.to_be_bytes());
    out.extend_from_slice(strong);
}

/// Big-endian u32 from the first four bytes of `b`.
#[inline]
pub(crate) fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
