// Strong per-block digest.
//
// MD4, the classic rsync block digest: 128-bit output, fast, and adequate
// for confirming a weak-hash candidate.  The hasher buffers any partial
// 64-byte compression block between `update` calls and only pads at
// `finish`, so it can be fed an accumulating stream of unknown length.

use md4::{Digest, Md4};

/// Width of the full strong digest in bytes.
pub const STRONG_SUM_LEN: usize = 16;

/// Full-width strong digest value.
pub type StrongSum = [u8; STRONG_SUM_LEN];

/// Incremental strong digest.
///
/// Cloning captures the partial state, which lets a suspended job resume
/// hashing exactly where it left off.
#[derive(Clone, Default)]
pub struct StrongDigest {
    inner: Md4,
    len: u64,
}

impl StrongDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pad, finalize and return the 128-bit digest.
    pub fn finish(self) -> StrongSum {
        self.inner.finalize().into()
    }

    /// One-shot digest of `data`.
    pub fn digest(data: &[u8]) -> StrongSum {
        Md4::digest(data).into()
    }
}

impl std::fmt::Debug for StrongDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongDigest")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Render a digest (or a truncated prefix of one) as lowercase hex.
pub fn to_hex(sum: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(sum.len() * 2);
    for b in sum {
        let _ = write!(out, "{b:02x}");
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 1320 test suite.
    #[test]
    fn rfc1320_vectors() {
        let cases: &[(&[u8], &str)] = &[
            (b"", "31d6cfe0d16ae931b73c59d7e0c089c0"),
            (b"a", "bde52cb31de33e46245e05fbdbd6fb24"),
            (b"abc", "a448017aaf21d8525fc10ae87aa6729d"),
            (b"message digest", "d9130a8164549fe818874806e1c7014b"),
            (
                b"abcdefghijklmnopqrstuvwxyz",
                "d79e1c308aa5bbcdeea8ed63df412da9",
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(to_hex(&StrongDigest::digest(input)), *expected);
        }
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        for split in [0, 1, 63, 64, 65, 500, 999, 1000] {
            let mut d = StrongDigest::new();
            d.update(&data[..split]);
            d.update(&data[split..]);
            assert_eq!(d.len(), data.len() as u64);
            assert_eq!(d.finish(), StrongDigest::digest(&data), "split {split}");
        }
    }

    #[test]
    fn clone_resumes_partial_state() {
        let mut d = StrongDigest::new();
        d.update(b"partial ");
        let resumed = {
            let mut c = d.clone();
            c.update(b"block");
            c.finish()
        };
        assert_eq!(resumed, StrongDigest::digest(b"partial block"));
        d.update(b"other");
        assert_eq!(d.finish(), StrongDigest::digest(b"partial other"));
    }
}
