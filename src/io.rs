// File-level I/O helpers for signatures, deltas and patches.
//
// Provides `signature_file()`, `delta_file()` and `patch_file()` convenience
// functions that run the jobs over files with buffered I/O.  The basis for
// patching is read through `FileBasis` (seek + read), so it is never loaded
// whole.  Optionally computes a streaming SHA-256 of the produced file
// (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::engine::{self, BUF_SIZE, DriveOptions};
use crate::error::DeltaError;
use crate::hash::config::SignatureConfig;
use crate::job::{self, BasisSource, Stats};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by the file helpers.
#[derive(Debug, Clone)]
pub struct FileStats {
    /// Counters from the job that produced the output.
    pub job: Stats,
    /// Size of the streamed input file in bytes.
    pub input_size: u64,
    /// Size of the written output file in bytes.
    pub output_size: u64,
    /// SHA-256 of the output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations.
#[derive(Debug)]
pub enum IoError {
    /// I/O error (file open, create, metadata).
    Io(io::Error),
    /// Signature, delta or patch failure.
    Delta(DeltaError),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Delta(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Delta(e) => Some(e),
        }
    }
}

impl From<io::Error> for IoError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<DeltaError> for IoError {
    fn from(e: DeltaError) -> Self {
        Self::Delta(e)
    }
}

// ---------------------------------------------------------------------------
// FileBasis
// ---------------------------------------------------------------------------

/// Random-access basis backed by a seekable reader.
pub struct FileBasis<F> {
    inner: F,
    len: u64,
    /// Current position of `inner`, if known.
    pos: Option<u64>,
}

impl FileBasis<File> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<F: Read + Seek> FileBasis<F> {
    pub fn new(mut inner: F) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self {
            inner,
            len,
            pos: None,
        })
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: Read + Seek> BasisSource for FileBasis<F> {
    fn len(&self) -> Option<u64> {
        Some(self.len)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeltaError> {
        let length = buf.len() as u64;
        if offset.checked_add(length).is_none_or(|end| end > self.len) {
            return Err(DeltaError::out_of_range(offset, length, Some(self.len)));
        }
        if self.pos != Some(offset) {
            self.pos = None;
            self.inner.seek(SeekFrom::Start(offset))?;
        }
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos = Some(offset + length);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // The file shrank underneath us.
                self.pos = None;
                Err(DeltaError::out_of_range(offset, length, Some(self.len)))
            }
            Err(e) => {
                self.pos = None;
                Err(e.into())
            }
        }
    }
}

impl<F> std::fmt::Debug for FileBasis<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBasis")
            .field("len", &self.len)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// signature_file
// ---------------------------------------------------------------------------

/// Write the signature of `basis_path` to `sig_path`.
///
/// With no explicit config, parameters are picked from the basis size.
pub fn signature_file(
    basis_path: &Path,
    sig_path: &Path,
    config: Option<SignatureConfig>,
) -> Result<FileStats, IoError> {
    let basis = File::open(basis_path)?;
    let input_size = basis.metadata()?.len();
    let config = config.unwrap_or_else(|| SignatureConfig::recommended(Some(input_size)));
    let mut job = job::begin_signature(config)?;
    run_file_job(&mut job, basis, input_size, sig_path)
}

// ---------------------------------------------------------------------------
// delta_file
// ---------------------------------------------------------------------------

/// Write the delta of `new_path` against the signature in `sig_path` to
/// `delta_path`.
pub fn delta_file(sig_path: &Path, new_path: &Path, delta_path: &Path) -> Result<FileStats, IoError> {
    let mut loader = job::begin_load_signature();
    let mut sig_reader = BufReader::with_capacity(BUF_SIZE, File::open(sig_path)?);
    engine::drive(
        &mut loader,
        &mut sig_reader,
        &mut io::sink(),
        &DriveOptions::default(),
    )?;
    let signature = loader
        .take_signature()
        .ok_or(DeltaError::TruncatedRecord("signature header"))?;

    let new_file = File::open(new_path)?;
    let input_size = new_file.metadata()?.len();
    let mut job = job::begin_delta(&signature)?;
    run_file_job(&mut job, new_file, input_size, delta_path)
}

// ---------------------------------------------------------------------------
// patch_file
// ---------------------------------------------------------------------------

/// Apply the delta in `delta_path` to `basis_path`, writing the result to
/// `output_path`.
pub fn patch_file(
    basis_path: &Path,
    delta_path: &Path,
    output_path: &Path,
) -> Result<FileStats, IoError> {
    let basis = FileBasis::open(basis_path)?;
    let delta = File::open(delta_path)?;
    let input_size = delta.metadata()?.len();
    let mut job = job::begin_patch(basis);
    run_file_job(&mut job, delta, input_size, output_path)
}

/// Stream `input` through `job` into a new file at `output_path`.
fn run_file_job(
    job: &mut job::Job<'_>,
    input: File,
    input_size: u64,
    output_path: &Path,
) -> Result<FileStats, IoError> {
    let mut reader = BufReader::with_capacity(BUF_SIZE, input);
    let output_file = File::create(output_path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, output_file);
    let opts = DriveOptions::default();

    #[cfg(feature = "file-io")]
    let output_sha256 = {
        let mut hasher = sha2::Sha256::new();
        let mut hashing_writer = HashingWriter {
            inner: &mut writer,
            hasher: &mut hasher,
        };
        engine::drive(job, &mut reader, &mut hashing_writer, &opts)?;
        Some(hasher.finalize().into())
    };

    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = {
        engine::drive(job, &mut reader, &mut writer, &opts)?;
        None
    };

    let output_size = writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .metadata()?
        .len();

    Ok(FileStats {
        job: job.stats().clone(),
        input_size,
        output_size,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Lowercase hex rendering of a SHA-256 digest.
pub fn sha256_hex(sum: &[u8; 32]) -> String {
    crate::hash::strong::to_hex(sum)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn signature_delta_patch_files_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let basis_data: Vec<u8> = (0..200_000u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 7) as u8)
            .collect();
        let mut new_data = basis_data[1_000..150_000].to_vec();
        new_data.extend_from_slice(b"appended trailer");

        let basis = write_file(dir.path(), "basis.bin", &basis_data);
        let new = write_file(dir.path(), "new.bin", &new_data);
        let sig = dir.path().join("basis.sig");
        let delta = dir.path().join("new.delta");
        let out = dir.path().join("out.bin");

        let sig_stats = signature_file(&basis, &sig, None).unwrap();
        assert_eq!(sig_stats.input_size, basis_data.len() as u64);
        assert_eq!(sig_stats.job.block_len, 512);
        assert_eq!(sig_stats.job.sig_blocks, 391);

        let delta_stats = delta_file(&sig, &new, &delta).unwrap();
        assert_eq!(delta_stats.input_size, new_data.len() as u64);
        assert!(delta_stats.job.copy_bytes > 140_000);
        assert!(delta_stats.output_size < 5_000);

        let patch_stats = patch_file(&basis, &delta, &out).unwrap();
        assert_eq!(patch_stats.output_size, new_data.len() as u64);
        assert_eq!(std::fs::read(&out).unwrap(), new_data);
    }

    #[test]
    fn explicit_config_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let basis = write_file(dir.path(), "b", &[7u8; 1000]);
        let sig = dir.path().join("b.sig");
        let stats = signature_file(&basis, &sig, Some(SignatureConfig::new(100, 4))).unwrap();
        assert_eq!(stats.job.sig_blocks, 10);
        assert_eq!(stats.output_size, 12 + 10 * 8);
    }

    #[test]
    fn corrupt_delta_file_reports_delta_error() {
        let dir = tempfile::tempdir().unwrap();
        let basis = write_file(dir.path(), "basis", b"0123456789");
        let delta = write_file(dir.path(), "delta", &[0x02, 0x05, 0x10, 0x00]);
        let out = dir.path().join("out");
        let err = patch_file(&basis, &delta, &out).unwrap_err();
        match err {
            IoError::Delta(DeltaError::OutOfRangeCopy { offset, length, .. }) => {
                assert_eq!((offset, length), (5, 16));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = signature_file(&dir.path().join("nope"), &dir.path().join("sig"), None)
            .unwrap_err();
        assert!(matches!(err, IoError::Io(_)));
    }

    #[test]
    fn file_basis_reads_and_bounds() {
        let mut basis = FileBasis::new(Cursor::new(b"abcdefghij".to_vec())).unwrap();
        assert_eq!(basis.len(), Some(10));
        let mut buf = [0u8; 3];
        basis.read_at(7, &mut buf).unwrap();
        assert_eq!(&buf, b"hij");
        basis.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        // Sequential read without a seek.
        basis.read_at(3, &mut buf).unwrap();
        assert_eq!(&buf, b"def");
        assert!(matches!(
            basis.read_at(8, &mut buf),
            Err(DeltaError::OutOfRangeCopy { .. })
        ));
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn sha256_of_patched_output_matches_new() {
        let dir = tempfile::tempdir().unwrap();
        let basis = write_file(dir.path(), "basis", b"source for checksum test");
        let new = write_file(dir.path(), "new", b"target for checksum test");
        let sig = dir.path().join("sig");
        let delta = dir.path().join("delta");
        let out = dir.path().join("out");

        signature_file(&basis, &sig, Some(SignatureConfig::new(8, 16))).unwrap();
        delta_file(&sig, &new, &delta).unwrap();
        let stats = patch_file(&basis, &delta, &out).unwrap();

        let expected: [u8; 32] = sha2::Sha256::digest(b"target for checksum test").into();
        assert_eq!(stats.output_sha256, Some(expected));
        assert_eq!(sha256_hex(&expected).len(), 64);
    }
}
