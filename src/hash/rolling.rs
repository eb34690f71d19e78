// Weak rolling checksum for block matching.
//
// rsync-style checksum over a sliding window: `s1` is the sum of the window
// bytes and `s2` the sum of the running `s1` values.  Every byte is biased by
// CHAR_OFFSET so that runs of zero bytes still produce a non-trivial sum.
// The digest packs the low 16 bits of each sum into one 32-bit value.
//
// All arithmetic wraps modulo 2^32; only the low 16 bits of each sum reach
// the digest, so the wrapping is invisible to callers.

/// Bias added to every byte before it enters the sums.
pub const CHAR_OFFSET: u32 = 31;

/// Rolling weak checksum over a window of bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RollingChecksum {
    s1: u32,
    s2: u32,
    count: u64,
}

impl RollingChecksum {
    /// Create an empty checksum (window length 0).
    pub const fn new() -> Self {
        Self {
            s1: 0,
            s2: 0,
            count: 0,
        }
    }

    /// Compute the checksum of `window` from scratch.
    pub fn of(window: &[u8]) -> Self {
        let mut sum = Self::new();
        sum.update(window);
        sum
    }

    /// Discard the current state and establish the sums over `window`.
    pub fn reset(&mut self, window: &[u8]) {
        *self = Self::of(window);
    }

    /// Append `buf` to the leading edge of the window.
    pub fn update(&mut self, buf: &[u8]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;
        for &b in buf {
            s1 = s1.wrapping_add(u32::from(b));
            s2 = s2.wrapping_add(s1);
        }

        // Apply the per-byte offset in closed form instead of inside the loop:
        // each new byte adds OFFSET to s1, and the running s1 values each
        // pick up the triangular number of offsets seen so far.
        let len = buf.len() as u64;
        let tri = if len % 2 == 0 {
            (len / 2).wrapping_mul(len + 1)
        } else {
            len.wrapping_mul(len.div_ceil(2))
        };
        s1 = s1.wrapping_add((len as u32).wrapping_mul(CHAR_OFFSET));
        s2 = s2.wrapping_add((tri as u32).wrapping_mul(CHAR_OFFSET));

        self.s1 = s1;
        self.s2 = s2;
        self.count += len;
    }

    /// Slide the window by one byte: drop `out` at the trailing edge and
    /// take `inp` at the leading edge.  O(1).
    #[inline(always)]
    pub fn roll(&mut self, out: u8, inp: u8) {
        let out = u32::from(out);
        self.s1 = self.s1.wrapping_add(u32::from(inp)).wrapping_sub(out);
        self.s2 = self.s2.wrapping_add(self.s1).wrapping_sub(
            (self.count as u32).wrapping_mul(out.wrapping_add(CHAR_OFFSET)),
        );
    }

    /// Grow the window by one byte at the leading edge.
    #[inline]
    pub fn roll_in(&mut self, inp: u8) {
        self.s1 = self
            .s1
            .wrapping_add(u32::from(inp))
            .wrapping_add(CHAR_OFFSET);
        self.s2 = self.s2.wrapping_add(self.s1);
        self.count += 1;
    }

    /// Shrink the window by one byte at the trailing edge.
    #[inline]
    pub fn roll_out(&mut self, out: u8) {
        debug_assert!(self.count > 0, "roll_out on empty window");
        let out = u32::from(out).wrapping_add(CHAR_OFFSET);
        self.s1 = self.s1.wrapping_sub(out);
        self.s2 = self
            .s2
            .wrapping_sub((self.count as u32).wrapping_mul(out));
        self.count -= 1;
    }

    /// Number of bytes in the current window.
    pub fn len(&self) -> u64 {
        self.count
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The packed 32-bit weak hash.
    #[inline(always)]
    pub fn digest(&self) -> u32 {
        (self.s2 << 16) | (self.s1 & 0xFFFF)
    }
}

/// One-shot weak checksum of `buf`.
pub fn weak_sum(buf: &[u8]) -> u32 {
    RollingChecksum::of(buf).digest()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
