// Variable-length integers used by the delta command stream.
//
// Base-128, big-endian: most-significant group first.
// Each byte has bit 7 set except the final byte.  A u64 needs at most
// ten bytes.

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

/// Overflow guard for the 64-bit accumulator: if these bits are set before a
/// shift, the next `<< 7` would overflow.
const U64_OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `num` into the tail of `buf`.  Returns the number of bytes used
/// (1..=10); the encoding is `buf[MAX_VARINT_LEN - len..]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F; // clear MSB on last byte
    MAX_VARINT_LEN - i
}

/// Append the encoding of `num` to `out`.
pub fn push_u64(out: &mut Vec<u8>, num: u64) {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    out.extend_from_slice(&buf[MAX_VARINT_LEN - len..]);
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a `u64` from the front of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(VarIntError::Overflow);
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Underflow)
}

/// Length of the varint at the front of `data`, if its final byte is
/// already present.
///
/// Used by incremental parsers to find out how many bytes to gather before
/// decoding.  Ten continuation bytes in a row can never terminate a u64 and
/// are reported as overflow straight away.
pub fn complete_len(data: &[u8]) -> Result<Option<usize>, VarIntError> {
    match data.iter().take(MAX_VARINT_LEN).position(|&b| b & 0x80 == 0) {
        Some(i) => Ok(Some(i + 1)),
        None if data.len() >= MAX_VARINT_LEN => Err(VarIntError::Overflow),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Return the encoded byte-length of a `u64` value.
#[inline]
pub fn sizeof_u64(num: u64) -> usize {
    let bits = 64 - num.leading_zeros();
    (bits.max(1).div_ceil(7) as usize).min(MAX_VARINT_LEN)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarIntError {
    /// Not enough input bytes to complete the integer.
    Underflow,
    /// Value would overflow the target integer type.
    Overflow,
}

impl std::fmt::Display for VarIntError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarIntError::Underflow => write!(f, "varint underflow (truncated input)"),
            VarIntError::Overflow => write!(f, "varint overflow"),
        }
    }
}

impl std::error::Error for VarIntError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values() {
        let cases: &[u64] = &[0, 1, 127, 128, 16383, 16384, u32::MAX as u64, u64::MAX];
        for &val in cases {
            let mut out = Vec::new();
            push_u64(&mut out, val);
            assert_eq!(out.len(), sizeof_u64(val), "sizeof mismatch for {val}");
            assert_eq!(complete_len(&out), Ok(Some(out.len())));
            assert_eq!(read_u64(&out), Ok((val, out.len())), "decode failed for {val}");
        }
    }

    #[test]
    fn encoding_is_big_endian() {
        // 300 = 0b100101100 = two groups: (10) (0101100) = 0x82 0x2C
        let mut out = Vec::new();
        push_u64(&mut out, 300);
        assert_eq!(out, [0x82, 0x2C]);
    }

    #[test]
    fn max_value_takes_ten_bytes() {
        assert_eq!(sizeof_u64(u64::MAX), MAX_VARINT_LEN);
        let mut out = Vec::new();
        push_u64(&mut out, u64::MAX);
        assert_eq!(out[0], 0x81);
        assert!(out[1..9].iter().all(|&b| b == 0xFF));
        assert_eq!(out[9], 0x7F);
    }

    #[test]
    fn single_byte_values() {
        for val in 0..=127u64 {
            let mut out = Vec::new();
            push_u64(&mut out, val);
            assert_eq!(out, [val as u8]);
        }
    }

    #[test]
    fn overflow_detection() {
        // Eleven groups cannot fit in 64 bits.
        let mut data = vec![0xFFu8; 10];
        data.push(0x7F);
        assert_eq!(read_u64(&data), Err(VarIntError::Overflow));
        assert_eq!(complete_len(&data), Err(VarIntError::Overflow));
    }

    #[test]
    fn underflow_detection() {
        // Truncated: all continuation bytes, no terminator.
        let data = [0x80, 0x80, 0x80];
        assert_eq!(read_u64(&data), Err(VarIntError::Underflow));
        assert_eq!(complete_len(&data), Ok(None));
        assert_eq!(complete_len(&[]), Ok(None));
    }

    #[test]
    fn complete_len_ignores_trailing_bytes() {
        assert_eq!(complete_len(&[0x82, 0x2C, 0x01, 0x02]), Ok(Some(2)));
        assert_eq!(read_u64(&[0x82, 0x2C, 0x01]), Ok((300, 2)));
    }
}
