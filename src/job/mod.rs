// Incremental jobs.
//
// Every operation (signature build, signature load, delta, patch) runs as a
// `Job` driven by repeated `iter` calls.  Each call gets whatever input and
// output space the caller has; the job consumes and produces as much as it
// can and reports `Blocked` when it needs more of either.  Record and
// command boundaries may fall anywhere relative to call boundaries.
//
// Output that cannot be written yet is held in a small pending buffer and
// drained at the start of the next call before any new work happens.

mod delta;
mod patch;
mod scoop;
mod sig;
mod stats;

use std::io;

use log::debug;

pub use patch::BasisSource;
pub use scoop::Scoop;
pub use stats::Stats;

use crate::error::DeltaError;
use crate::hash::config::SignatureConfig;
use crate::signature::Signature;

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Input and output windows for one `Job::iter` call.
///
/// The job advances `input_consumed` and `output_produced`; the caller keeps
/// any unconsumed input and presents it again (with more appended) on the
/// next call.
#[derive(Debug)]
pub struct Buffers<'a> {
    input: &'a [u8],
    in_pos: usize,
    eof_in: bool,
    output: &'a mut [u8],
    out_pos: usize,
}

impl<'a> Buffers<'a> {
    /// `eof_in` declares that `input` holds the last bytes of the stream.
    pub fn new(input: &'a [u8], eof_in: bool, output: &'a mut [u8]) -> Self {
        Self {
            input,
            in_pos: 0,
            eof_in,
            output,
            out_pos: 0,
        }
    }

    pub fn eof_in(&self) -> bool {
        self.eof_in
    }

    pub fn input_consumed(&self) -> usize {
        self.in_pos
    }

    pub fn output_produced(&self) -> usize {
        self.out_pos
    }

    pub fn avail_in(&self) -> usize {
        self.input.len() - self.in_pos
    }

    pub fn avail_out(&self) -> usize {
        self.output.len() - self.out_pos
    }

    /// Input not yet consumed.
    pub fn remaining_input(&self) -> &'a [u8] {
        &self.input[self.in_pos..]
    }

    /// Output written so far.
    pub fn produced(&self) -> &[u8] {
        &self.output[..self.out_pos]
    }

    /// Consume up to `n` input bytes and return them.
    pub(crate) fn take_input(&mut self, n: usize) -> &'a [u8] {
        let n = n.min(self.avail_in());
        let input: &'a [u8] = self.input;
        let taken = &input[self.in_pos..self.in_pos + n];
        self.in_pos += n;
        taken
    }

    /// Copy as much of `data` as fits; returns the count written.
    pub(crate) fn write_output(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.avail_out());
        self.output[self.out_pos..self.out_pos + n].copy_from_slice(&data[..n]);
        self.out_pos += n;
        n
    }

    /// Unwritten output space, to be filled in place and committed with
    /// `advance_output`.
    pub(crate) fn output_space(&mut self) -> &mut [u8] {
        &mut self.output[self.out_pos..]
    }

    pub(crate) fn advance_output(&mut self, n: usize) {
        debug_assert!(n <= self.avail_out());
        self.out_pos += n;
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Outcome of one successful `Job::iter` call.  Failures are the `Err` arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// The job has finished and all of its output has been produced.
    Done,
    /// More input or more output space is needed to make progress.
    Blocked,
}

/// Result of one internal work step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    /// Work was done (possibly queueing output); call again.
    Continue,
    /// No progress possible with these buffers.
    Blocked,
    /// The operation is complete.
    Finished,
}

// ---------------------------------------------------------------------------
// Pending output
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Pending {
    buf: Vec<u8>,
    pos: usize,
}

impl Pending {
    /// Write as much as fits.  Returns true once nothing is left.
    fn drain(&mut self, bufs: &mut Buffers<'_>) -> bool {
        if self.pos < self.buf.len() {
            self.pos += bufs.write_output(&self.buf[self.pos..]);
        }
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

enum Op<'a> {
    Signature(sig::SigBuilder),
    LoadSignature(sig::SigLoader),
    Delta(delta::DeltaGen<'a>),
    Patch(patch::PatchApply<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Finished,
    Failed,
}

/// A resumable signature, delta or patch operation.
pub struct Job<'a> {
    op: Op<'a>,
    scoop: Scoop,
    pending: Pending,
    stats: Stats,
    state: State,
}

/// Start building a signature of the basis fed as input.  The job writes
/// the signature stream and also keeps the decoded signature, available from
/// [`Job::take_signature`] once done.
pub fn begin_signature(config: SignatureConfig) -> Result<Job<'static>, DeltaError> {
    let builder = sig::SigBuilder::new(config)?;
    let mut stats = Stats::new("signature");
    stats.block_len = config.block_len;
    Ok(Job::new(Op::Signature(builder), stats))
}

/// Start loading a signature stream fed as input.  Produces no output; the
/// result comes from [`Job::take_signature`].
pub fn begin_load_signature() -> Job<'static> {
    Job::new(Op::LoadSignature(sig::SigLoader::new()), Stats::new("loadsig"))
}

/// Start computing a delta of the new file fed as input against
/// `signature`.
pub fn begin_delta(signature: &Signature) -> Result<Job<'_>, DeltaError> {
    let generator = delta::DeltaGen::new(signature)?;
    let mut stats = Stats::new("delta");
    stats.block_len = signature.block_len();
    Ok(Job::new(Op::Delta(generator), stats))
}

/// Start applying the delta fed as input to `basis`.
pub fn begin_patch<'a, B>(basis: B) -> Job<'a>
where
    B: BasisSource + Send + 'a,
{
    Job::new(
        Op::Patch(patch::PatchApply::new(Box::new(basis))),
        Stats::new("patch"),
    )
}

impl<'a> Job<'a> {
    fn new(op: Op<'a>, stats: Stats) -> Self {
        Self {
            op,
            scoop: Scoop::new(),
            pending: Pending::default(),
            stats,
            state: State::Running,
        }
    }

    /// Advance the job as far as `bufs` allows.
    ///
    /// The first error is final: the job is poisoned and later calls fail.
    pub fn iter(&mut self, bufs: &mut Buffers<'_>) -> Result<JobStatus, DeltaError> {
        if self.state == State::Failed {
            return Err(DeltaError::IoFailure(io::Error::other(format!(
                "{} job already failed",
                self.stats.op
            ))));
        }
        let (in_before, out_before) = (bufs.input_consumed(), bufs.output_produced());
        let result = self.run(bufs);
        self.stats.in_bytes += (bufs.input_consumed() - in_before) as u64;
        self.stats.out_bytes += (bufs.output_produced() - out_before) as u64;
        match &result {
            Err(e) => {
                debug!("{} job failed: {e}", self.stats.op);
                self.state = State::Failed;
            }
            Ok(JobStatus::Done) => debug!("{}", self.stats),
            Ok(JobStatus::Blocked) => {}
        }
        result
    }

    fn run(&mut self, bufs: &mut Buffers<'_>) -> Result<JobStatus, DeltaError> {
        loop {
            if !self.pending.drain(bufs) {
                return Ok(JobStatus::Blocked);
            }
            if self.state == State::Finished {
                return Ok(JobStatus::Done);
            }
            let out = &mut self.pending.buf;
            let progress = match &mut self.op {
                Op::Signature(b) => b.step(bufs, out, &mut self.stats)?,
                Op::LoadSignature(l) => l.step(&mut self.scoop, bufs, &mut self.stats)?,
                Op::Delta(d) => d.step(&mut self.scoop, bufs, out, &mut self.stats)?,
                Op::Patch(p) => p.step(&mut self.scoop, bufs, &mut self.stats)?,
            };
            match progress {
                Progress::Continue => {}
                Progress::Blocked => return Ok(JobStatus::Blocked),
                Progress::Finished => self.state = State::Finished,
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Finished && self.pending.buf.is_empty()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The signature built or loaded by a finished signature job.
    pub fn take_signature(&mut self) -> Option<Signature> {
        if !self.is_done() {
            return None;
        }
        match &mut self.op {
            Op::Signature(b) => b.take_signature(),
            Op::LoadSignature(l) => l.take_signature(),
            Op::Delta(_) | Op::Patch(_) => None,
        }
    }
}

impl std::fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("op", &self.stats.op)
            .field("state", &self.state)
            .field("scoop", &self.scoop.len())
            .field("pending", &(self.pending.buf.len() - self.pending.pos))
            .finish()
    }
}
