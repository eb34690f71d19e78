// Whole-stream drivers and in-memory helpers.
//
// Jobs are driven by repeated `iter` calls over caller-owned buffers.  This
// module provides the two common ways of doing that:
//   - `drive`: pump any `Read` through a job into any `Write` with fixed-size
//     buffers
//   - `signature` / `load_signature` / `delta` / `patch`: run a job over a
//     byte slice and collect the output in memory

use std::io::{self, Read, Write};

use crate::error::DeltaError;
use crate::hash::config::SignatureConfig;
use crate::job::{self, BasisSource, Buffers, Job, JobStatus, Stats};
use crate::signature::Signature;

/// Default I/O buffer size for `drive` (64 KiB).
pub const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Drive options
// ---------------------------------------------------------------------------

/// Buffer sizes used by [`drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveOptions {
    /// Bytes read from the source per refill.
    pub in_buf_size: usize,
    /// Output bytes the job may produce per `iter` call.
    pub out_buf_size: usize,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            in_buf_size: BUF_SIZE,
            out_buf_size: BUF_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// drive
// ---------------------------------------------------------------------------

/// Run `job` to completion, reading its input from `reader` and writing its
/// output to `writer`.  The writer is flushed on success.
pub fn drive<R, W>(
    job: &mut Job<'_>,
    reader: &mut R,
    writer: &mut W,
    opts: &DriveOptions,
) -> Result<(), DeltaError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut inbuf = vec![0u8; opts.in_buf_size.max(1)];
    let mut outbuf = vec![0u8; opts.out_buf_size.max(1)];
    let (mut start, mut end) = (0usize, 0usize);
    let mut eof = false;

    loop {
        // Refill whenever there is free space, after compacting away what
        // the job has consumed.
        if !eof && (end < inbuf.len() || start > 0) {
            if start > 0 {
                inbuf.copy_within(start..end, 0);
                end -= start;
                start = 0;
            }
            let n = read_retrying(reader, &mut inbuf[end..])?;
            if n == 0 {
                eof = true;
            }
            end += n;
        }

        let (status, consumed, produced) = {
            let mut bufs = Buffers::new(&inbuf[start..end], eof, &mut outbuf);
            let status = job.iter(&mut bufs)?;
            (status, bufs.input_consumed(), bufs.output_produced())
        };
        start += consumed;
        writer.write_all(&outbuf[..produced])?;

        match status {
            JobStatus::Done => {
                writer.flush()?;
                return Ok(());
            }
            JobStatus::Blocked if eof && consumed == 0 && produced == 0 => {
                return Err(DeltaError::IoFailure(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{} job stalled at end of input", job.stats().op),
                )));
            }
            JobStatus::Blocked => {}
        }
    }
}

fn read_retrying<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory helpers
// ---------------------------------------------------------------------------

/// Run `job` over the whole of `input` and return everything it writes.
pub fn run(job: &mut Job<'_>, input: &[u8]) -> Result<Vec<u8>, DeltaError> {
    let mut output = Vec::new();
    let mut chunk = vec![0u8; BUF_SIZE];
    let mut pos = 0;
    loop {
        let mut bufs = Buffers::new(&input[pos..], true, &mut chunk);
        let status = job.iter(&mut bufs)?;
        pos += bufs.input_consumed();
        let produced = bufs.output_produced();
        output.extend_from_slice(&chunk[..produced]);
        if status == JobStatus::Done {
            return Ok(output);
        }
    }
}

/// Signature stream of `basis`.
pub fn signature(basis: &[u8], config: SignatureConfig) -> Result<Vec<u8>, DeltaError> {
    let mut job = job::begin_signature(config)?;
    run(&mut job, basis)
}

/// Parse a complete signature stream.
pub fn load_signature(bytes: &[u8]) -> Result<Signature, DeltaError> {
    let mut job = job::begin_load_signature();
    run(&mut job, bytes)?;
    job.take_signature()
        .ok_or(DeltaError::TruncatedRecord("signature header"))
}

/// Delta of `new` against `signature`, with the job's statistics.
pub fn delta_with_stats(
    signature: &Signature,
    new: &[u8],
) -> Result<(Vec<u8>, Stats), DeltaError> {
    let mut job = job::begin_delta(signature)?;
    let delta = run(&mut job, new)?;
    Ok((delta, job.stats().clone()))
}

/// Delta of `new` against `signature`.
pub fn delta(signature: &Signature, new: &[u8]) -> Result<Vec<u8>, DeltaError> {
    delta_with_stats(signature, new).map(|(delta, _)| delta)
}

/// Apply `delta` to `basis`.
pub fn patch<B>(basis: B, delta: &[u8]) -> Result<Vec<u8>, DeltaError>
where
    B: BasisSource + Send,
{
    let mut job = job::begin_patch(basis);
    run(&mut job, delta)
}

/// Signature of `basis` followed by the delta of `new` against it, all in
/// memory.
pub fn diff(basis: &[u8], new: &[u8], config: SignatureConfig) -> Result<Vec<u8>, DeltaError> {
    let sig = Signature::build(basis, config)?;
    delta(&sig, new)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::command::{Command, commands};

    fn roundtrip_with(basis: &[u8], new: &[u8], config: SignatureConfig) -> Vec<u8> {
        let sig_bytes = signature(basis, config).expect("signature failed");
        let sig = load_signature(&sig_bytes).expect("load failed");
        let delta = delta(&sig, new).expect("delta failed");
        let rebuilt = patch(basis, &delta).expect("patch failed");
        assert_eq!(
            rebuilt,
            new,
            "roundtrip mismatch (basis={}, new={}, delta={})",
            basis.len(),
            new.len(),
            delta.len()
        );
        delta
    }

    fn roundtrip(basis: &[u8], new: &[u8]) -> Vec<u8> {
        roundtrip_with(basis, new, SignatureConfig::new(16, 8))
    }

    fn lcg(n: usize, seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (state >> 16) as u8
            })
            .collect()
    }

    fn decode(delta: &[u8]) -> Vec<Command<'_>> {
        commands(delta).collect::<Result<_, _>>().expect("bad delta")
    }

    #[test]
    fn roundtrip_identical() {
        let data = b"The quick brown fox jumps over the lazy dog, twice over.";
        roundtrip(data, data);
    }

    #[test]
    fn roundtrip_small_edit() {
        let basis = b"Hello, world! This is a test of the delta engine.";
        let new = b"Hello, earth! This is a test of the delta engine.";
        roundtrip(basis, new);
    }

    #[test]
    fn roundtrip_no_basis() {
        roundtrip(b"", b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");
    }

    #[test]
    fn roundtrip_empty_new() {
        let delta = roundtrip(b"some basis", b"");
        assert_eq!(delta, [0x00]);
    }

    #[test]
    fn roundtrip_binary_data() {
        let basis: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let mut new = basis.clone();
        new[100] = 0xFF;
        new[200] = 0x00;
        new[1000] = 0x42;
        roundtrip(&basis, &new);
    }

    #[test]
    fn roundtrip_shifted_content() {
        let basis = lcg(20_000, 7);
        let mut new = b"inserted prefix ".to_vec();
        new.extend_from_slice(&basis[..9_000]);
        new.extend_from_slice(&basis[9_500..]);
        let delta = roundtrip_with(&basis, &new, SignatureConfig::new(256, 16));
        assert!(delta.len() < new.len() / 10, "delta {} bytes", delta.len());
    }

    #[test]
    fn empty_basis_and_empty_new() {
        let sig = Signature::build(b"", SignatureConfig::default()).unwrap();
        let delta = delta(&sig, b"").unwrap();
        assert_eq!(delta, [0x00]);
        assert_eq!(patch(&b""[..], &delta).unwrap(), b"");
    }

    #[test]
    fn identical_basis_is_one_copy() {
        let basis = lcg(64 * 32, 1);
        let sig = Signature::build(&basis, SignatureConfig::new(64, 16)).unwrap();
        let delta = delta(&sig, &basis).unwrap();
        assert_eq!(
            decode(&delta),
            [Command::Copy { offset: 0, length: 2048 }, Command::End]
        );
    }

    #[test]
    fn copy_pending_at_end_of_input_is_emitted() {
        let basis = lcg(256, 21);
        let sig = Signature::build(&basis, SignatureConfig::new(64, 16)).unwrap();
        assert_eq!(
            decode(&delta(&sig, &basis).unwrap()),
            [Command::Copy { offset: 0, length: 256 }, Command::End]
        );

        let mut new = basis.clone();
        new.extend_from_slice(b"xyz");
        let delta = delta(&sig, &new).unwrap();
        assert_eq!(
            decode(&delta),
            [
                Command::Copy { offset: 0, length: 256 },
                Command::Literal(b"xyz"),
                Command::End
            ]
        );
        assert_eq!(patch(&basis[..], &delta).unwrap(), new);
    }

    #[test]
    fn single_changed_byte_in_zeros() {
        let basis = vec![0u8; 1024];
        let mut new = basis.clone();
        new[512] = 1;
        let sig = Signature::build(&basis, SignatureConfig::new(64, 16)).unwrap();
        let (delta, stats) = delta_with_stats(&sig, &new).unwrap();
        assert_eq!(patch(&basis[..], &delta).unwrap(), new);
        let cmds = decode(&delta);
        assert_eq!(cmds[0], Command::Copy { offset: 0, length: 512 });
        assert_eq!(cmds[1], Command::Literal(&[1]));
        assert_eq!(*cmds.last().unwrap(), Command::End);
        assert_eq!(stats.lit_bytes, 64);
        assert_eq!(stats.copy_bytes, 960);
        assert_eq!(stats.false_matches, 0);
    }

    #[test]
    fn random_new_is_one_literal() {
        let basis = lcg(4096, 3);
        let new = lcg(3000, 99);
        let sig = Signature::build(&basis, SignatureConfig::new(64, 16)).unwrap();
        let delta = delta(&sig, &new).unwrap();
        assert_eq!(decode(&delta), [Command::Literal(&new), Command::End]);
    }

    #[test]
    fn short_strong_sum_roundtrips() {
        // Weak-only hits are frequent with small blocks; the two-byte strong
        // prefix must still reject them.
        let basis = lcg(50_000, 11);
        let mut new = basis.clone();
        for i in (0..new.len()).step_by(997) {
            new[i] ^= 0x5A;
        }
        roundtrip_with(&basis, &new, SignatureConfig::new(32, 2));
    }

    #[test]
    fn patch_rejects_out_of_range_copy() {
        let mut delta = Vec::new();
        Command::Copy { offset: 8, length: 4 }.encode(&mut delta);
        Command::End.encode(&mut delta);
        let err = patch(&b"0123456789"[..], &delta).unwrap_err();
        assert!(matches!(
            err,
            DeltaError::OutOfRangeCopy {
                offset: 8,
                length: 4,
                basis_len: Some(10)
            }
        ));
    }

    #[test]
    fn patch_rejects_overflowing_copy() {
        let mut delta = Vec::new();
        Command::Copy { offset: u64::MAX, length: 2 }.encode(&mut delta);
        Command::End.encode(&mut delta);
        assert!(matches!(
            patch(&b"abc"[..], &delta),
            Err(DeltaError::OutOfRangeCopy { .. })
        ));
    }

    #[test]
    fn patch_rejects_garbage() {
        let cases: [(&[u8], &str); 5] = [
            (&[0x09], "corrupt_command"),
            (&[0x00, 0x00], "corrupt_command"),
            (&[0x01, 0x05, b'a'], "truncated_record"),
            (&[0x02, 0x81], "truncated_record"),
            (&[], "truncated_record"),
        ];
        for (delta, kind) in cases {
            let err = patch(&b"basis"[..], delta).unwrap_err();
            assert_eq!(err.kind(), kind, "delta {delta:02x?}");
        }
    }

    #[test]
    fn drive_with_tiny_buffers() {
        let basis = lcg(10_000, 5);
        let mut new = basis[2_000..].to_vec();
        new.extend_from_slice(b"tail bytes");
        let config = SignatureConfig::new(128, 6);
        let expected_sig = signature(&basis, config).unwrap();

        for (in_size, out_size) in [(1, 1), (3, 7), (127, 129), (BUF_SIZE, BUF_SIZE)] {
            let opts = DriveOptions {
                in_buf_size: in_size,
                out_buf_size: out_size,
            };

            let mut sig_bytes = Vec::new();
            let mut job = job::begin_signature(config).unwrap();
            drive(&mut job, &mut &basis[..], &mut sig_bytes, &opts).unwrap();
            assert_eq!(sig_bytes, expected_sig);

            let mut job = job::begin_load_signature();
            drive(&mut job, &mut &sig_bytes[..], &mut io::sink(), &opts).unwrap();
            let sig = job.take_signature().unwrap();

            let mut delta_bytes = Vec::new();
            let mut job = job::begin_delta(&sig).unwrap();
            drive(&mut job, &mut &new[..], &mut delta_bytes, &opts).unwrap();
            assert_eq!(delta_bytes, delta(&sig, &new).unwrap());

            let mut rebuilt = Vec::new();
            let mut job = job::begin_patch(&basis[..]);
            drive(&mut job, &mut &delta_bytes[..], &mut rebuilt, &opts).unwrap();
            assert_eq!(rebuilt, new, "in={in_size} out={out_size}");
        }
    }

    #[test]
    fn drive_input_larger_than_buffer() {
        let basis = lcg(100_000, 9);
        let config = SignatureConfig::new(1024, 8);
        let expected = signature(&basis, config).unwrap();
        for opts in [
            DriveOptions::default(),
            DriveOptions {
                in_buf_size: 4096,
                out_buf_size: 512,
            },
        ] {
            let mut sig_bytes = Vec::new();
            let mut job = job::begin_signature(config).unwrap();
            drive(&mut job, &mut &basis[..], &mut sig_bytes, &opts).unwrap();
            assert_eq!(sig_bytes, expected, "{opts:?}");
        }
    }
}
