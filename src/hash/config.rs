// Signature parameters.
//
// Block length trades signature size against match granularity; strong
// length trades signature size against the chance of a false block match.

use super::strong::STRONG_SUM_LEN;

/// Block length used when nothing is known about the basis.
pub const DEFAULT_BLOCK_LEN: u32 = 2048;

/// Smallest block length `recommended` will pick.
pub const MIN_RECOMMENDED_BLOCK_LEN: u32 = 256;

/// Recommended block lengths are rounded up to a multiple of this.
pub const BLOCK_LEN_GRANULARITY: u32 = 128;

/// Parameters for building a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureConfig {
    /// Bytes per basis block (the last block may be shorter).
    pub block_len: u32,
    /// Leading bytes of the strong digest kept per block (1..=16).
    pub strong_len: u32,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            block_len: DEFAULT_BLOCK_LEN,
            strong_len: STRONG_SUM_LEN as u32,
        }
    }
}

impl SignatureConfig {
    pub fn new(block_len: u32, strong_len: u32) -> Self {
        Self {
            block_len,
            strong_len,
        }
    }

    /// Pick parameters for a basis of `basis_len` bytes, if known.
    ///
    /// The block length grows with the square root of the basis size so the
    /// block count and the block size stay balanced.  The full strong digest
    /// is kept.
    pub fn recommended(basis_len: Option<u64>) -> Self {
        let block_len = match basis_len {
            Some(len) if len > 0 => {
                let root = isqrt(len).min(u64::from(u32::MAX / 2)) as u32;
                root.div_ceil(BLOCK_LEN_GRANULARITY)
                    .saturating_mul(BLOCK_LEN_GRANULARITY)
                    .max(MIN_RECOMMENDED_BLOCK_LEN)
            }
            _ => DEFAULT_BLOCK_LEN,
        };
        Self {
            block_len,
            strong_len: STRONG_SUM_LEN as u32,
        }
    }

    /// Same block length, strong length cut down to the minimum considered
    /// safe for a basis of `basis_len` bytes.
    pub fn with_minimal_strong_len(self, basis_len: u64) -> Self {
        Self {
            strong_len: minimal_strong_len(basis_len, self.block_len),
            ..self
        }
    }

    /// Whether the parameters can produce a valid signature.
    pub fn is_valid(&self) -> bool {
        self.block_len > 0 && (1..=STRONG_SUM_LEN as u32).contains(&self.strong_len)
    }
}

/// Shortest strong-digest truncation that keeps the false-match probability
/// negligible for a basis of `basis_len` bytes split into `block_len` blocks.
///
/// Counts bits for the number of candidate positions (basis size, with a
/// 16 MiB floor) plus bits for the number of blocks, adds two bytes of
/// margin, and clamps to the full digest width.
pub fn minimal_strong_len(basis_len: u64, block_len: u32) -> u32 {
    let block_len = u64::from(block_len.max(1));
    let bits = ilog2(basis_len.saturating_add(1 << 24)) + ilog2(basis_len / block_len + 1);
    (2 + bits.div_ceil(8)).min(STRONG_SUM_LEN as u32)
}

fn ilog2(v: u64) -> u32 {
    if v == 0 { 0 } else { v.ilog2() }
}

fn isqrt(v: u64) -> u64 {
    if v < 2 {
        return v;
    }
    // Newton iteration from a power-of-two estimate above the root.
    let mut x = 1u64 << (v.ilog2() / 2 + 1);
    loop {
        let y = (x + v / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = SignatureConfig::default();
        assert!(cfg.is_valid());
        assert_eq!(cfg.block_len, 2048);
        assert_eq!(cfg.strong_len, 16);
    }

    #[test]
    fn invalid_parameters() {
        assert!(!SignatureConfig::new(0, 8).is_valid());
        assert!(!SignatureConfig::new(64, 0).is_valid());
        assert!(!SignatureConfig::new(64, 17).is_valid());
        assert!(SignatureConfig::new(1, 1).is_valid());
    }

    #[test]
    fn isqrt_is_floor_root() {
        for v in [0u64, 1, 2, 3, 4, 15, 16, 17, 1 << 20, (1 << 40) + 12345, u64::MAX] {
            let r = isqrt(v);
            assert!(r.checked_mul(r).is_some_and(|sq| sq <= v), "v={v} r={r}");
            let next = r + 1;
            assert!(next.checked_mul(next).is_none_or(|sq| sq > v), "v={v} r={r}");
        }
    }

    #[test]
    fn recommended_block_len() {
        assert_eq!(SignatureConfig::recommended(None).block_len, DEFAULT_BLOCK_LEN);
        assert_eq!(SignatureConfig::recommended(Some(0)).block_len, DEFAULT_BLOCK_LEN);
        // Small inputs hit the floor.
        assert_eq!(SignatureConfig::recommended(Some(1000)).block_len, 256);
        // 1 GiB -> sqrt = 32768, already a multiple of 128.
        assert_eq!(SignatureConfig::recommended(Some(1 << 30)).block_len, 32768);
        // 1 MB -> sqrt = 1000 -> 1024.
        assert_eq!(SignatureConfig::recommended(Some(1_000_000)).block_len, 1024);
    }

    #[test]
    fn minimal_strong_len_grows_with_size() {
        let small = minimal_strong_len(0, 2048);
        let large = minimal_strong_len(1 << 40, 2048);
        assert!(small >= 3);
        assert!(large > small);
        assert!(large <= 16);
        let cfg = SignatureConfig::default().with_minimal_strong_len(1 << 20);
        assert_eq!(cfg.strong_len, minimal_strong_len(1 << 20, 2048));
        assert!(cfg.is_valid());
    }
}
