// Command-line interface for rsdelta.
//
// Explicit subcommands mirroring the three-step rsync workflow
// (signature, delta, patch) plus an inspection command for debugging
// signature and delta files.  Paths default to stdin/stdout; `-` selects
// them explicitly.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::engine::{self, BUF_SIZE, DriveOptions};
use crate::format::command::{Command as DeltaCommand, commands};
use crate::format::header::SIG_MAGIC;
use crate::hash::config::SignatureConfig;
use crate::hash::strong::{STRONG_SUM_LEN, to_hex};
use crate::io::FileBasis;
use crate::job::{self, Job, Stats};
use crate::signature::Signature;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

fn parse_block_size(s: &str) -> Result<u32, String> {
    let size = parse_byte_size(s)?;
    match u32::try_from(size) {
        Ok(0) => Err("block size must be positive".into()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("block size too large: '{s}'")),
    }
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// rsync-style binary delta tool.
#[derive(Parser, Debug)]
#[command(
    name = "rsdelta",
    version,
    about = "Compute and apply rsync-style binary deltas",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Print job statistics to stderr.
    #[arg(short = 's', long, global = true)]
    stats: bool,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write the signature of a basis file.
    Signature(SignatureArgs),
    /// Write the delta of a new file against a signature.
    Delta(DeltaArgs),
    /// Apply a delta to a basis file.
    Patch(PatchArgs),
    /// Describe a signature or delta file.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct SignatureArgs {
    /// Block size in bytes (supports K/M/G suffix; default: from basis size).
    #[arg(long = "block-size", short = 'b', value_parser = parse_block_size)]
    block_len: Option<u32>,

    /// Strong sum bytes kept per block (default: all 16).
    #[arg(long = "sum-size", short = 'S', value_parser = clap::value_parser!(u32).range(1..=STRONG_SUM_LEN as i64))]
    strong_len: Option<u32>,

    /// Use the shortest strong sum considered safe for this basis.
    #[arg(long = "minimal-sum", conflicts_with = "strong_len")]
    minimal_sum: bool,

    /// Basis file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    basis: Option<PathBuf>,

    /// Signature output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    signature: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DeltaArgs {
    /// Signature of the basis.
    #[arg(value_hint = ValueHint::FilePath)]
    signature: PathBuf,

    /// New file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    new: Option<PathBuf>,

    /// Delta output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    delta: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Basis file (must be seekable).
    #[arg(value_hint = ValueHint::FilePath)]
    basis: PathBuf,

    /// Delta file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    delta: Option<PathBuf>,

    /// Reconstructed output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    new: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Signature or delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Signature,
    Delta,
    Patch,
    Inspect,
}

#[derive(Debug, Clone)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    show_stats: bool,
    json_output: bool,
    block_len: Option<u32>,
    strong_len: Option<u32>,
    minimal_sum: bool,
    /// Basis for `patch`, signature for `delta`.
    reference_file: Option<PathBuf>,
    /// `None` means stdin.
    input_file: Option<PathBuf>,
    /// `None` means stdout.
    output_file: Option<PathBuf>,
}

/// `-` selects the standard stream.
fn file_arg(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| p.as_os_str() != "-")
}

fn resolve_options(cli: Cli) -> Options {
    let base = Options {
        command: Command::Inspect,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        show_stats: cli.stats,
        json_output: cli.json_output,
        block_len: None,
        strong_len: None,
        minimal_sum: false,
        reference_file: None,
        input_file: None,
        output_file: None,
    };
    match cli.command {
        Cmd::Signature(args) => Options {
            command: Command::Signature,
            block_len: args.block_len,
            strong_len: args.strong_len,
            minimal_sum: args.minimal_sum,
            input_file: file_arg(args.basis),
            output_file: file_arg(args.signature),
            ..base
        },
        Cmd::Delta(args) => Options {
            command: Command::Delta,
            reference_file: Some(args.signature),
            input_file: file_arg(args.new),
            output_file: file_arg(args.delta),
            ..base
        },
        Cmd::Patch(args) => Options {
            command: Command::Patch,
            reference_file: Some(args.basis),
            input_file: file_arg(args.delta),
            output_file: file_arg(args.new),
            ..base
        },
        Cmd::Inspect(args) => Options {
            command: Command::Inspect,
            input_file: Some(args.input),
            ..base
        },
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("rsdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = signature_config(&opts, None);
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn fail(msg: impl std::fmt::Display) -> i32 {
    eprintln!("rsdelta: {msg}");
    1
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>, String> {
    match path {
        Some(path) => File::open(path)
            .map(|f| Box::new(BufReader::with_capacity(BUF_SIZE, f)) as Box<dyn Read>)
            .map_err(|e| format!("input file: {}: {e}", path.display())),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: Option<&Path>, force: bool) -> Result<Box<dyn Write>, String> {
    match path {
        None => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        Some(path) => {
            if path.exists() && !force {
                return Err(format!(
                    "output file exists, use -f to overwrite: {}",
                    path.display()
                ));
            }
            File::create(path)
                .map(|f| Box::new(BufWriter::with_capacity(BUF_SIZE, f)) as Box<dyn Write>)
                .map_err(|e| format!("output file: {}: {e}", path.display()))
        }
    }
}

/// Pump the input through `job` into the output.
fn run_job(job: &mut Job<'_>, opts: &Options) -> Result<(), String> {
    let mut reader = open_input(opts.input_file.as_deref())?;
    let mut writer = open_output(opts.output_file.as_deref(), opts.force)?;
    engine::drive(job, &mut reader, &mut writer, &DriveOptions::default())
        .map_err(|e| format!("{}: {e}", job.stats().op))
}

fn report(opts: &Options, stats: &Stats) {
    if (opts.show_stats || opts.verbose > 0) && !opts.quiet {
        eprintln!("rsdelta: {stats}");
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": stats.op,
            "in_bytes": stats.in_bytes,
            "out_bytes": stats.out_bytes,
            "literal_cmds": stats.lit_cmds,
            "literal_bytes": stats.lit_bytes,
            "copy_cmds": stats.copy_cmds,
            "copy_bytes": stats.copy_bytes,
            "sig_blocks": stats.sig_blocks,
            "block_len": stats.block_len,
            "false_matches": stats.false_matches,
        });
        eprintln!("{json:#}");
    }
}

/// Signature parameters from the flags, falling back to values derived from
/// the basis size.
fn signature_config(opts: &Options, basis_len: Option<u64>) -> SignatureConfig {
    let mut config = SignatureConfig::recommended(basis_len);
    if let Some(block_len) = opts.block_len {
        config.block_len = block_len;
    }
    if let Some(strong_len) = opts.strong_len {
        config.strong_len = strong_len;
    } else if opts.minimal_sum {
        config = config.with_minimal_strong_len(basis_len.unwrap_or(0));
    }
    config
}

// ---------------------------------------------------------------------------
// Signature command
// ---------------------------------------------------------------------------

fn cmd_signature(opts: &Options) -> i32 {
    let basis_len = opts
        .input_file
        .as_deref()
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len());
    let config = signature_config(opts, basis_len);
    log::debug!(
        "signature: block_len={}, strong_len={}",
        config.block_len,
        config.strong_len
    );
    let mut job = match job::begin_signature(config) {
        Ok(job) => job,
        Err(e) => return fail(format!("signature: {e}")),
    };
    if let Err(e) = run_job(&mut job, opts) {
        return fail(e);
    }
    report(opts, job.stats());
    0
}

// ---------------------------------------------------------------------------
// Delta command
// ---------------------------------------------------------------------------

fn load_signature_file(path: &Path) -> Result<Signature, String> {
    let file = File::open(path).map_err(|e| format!("signature file: {}: {e}", path.display()))?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    let mut job = job::begin_load_signature();
    engine::drive(&mut job, &mut reader, &mut io::sink(), &DriveOptions::default())
        .map_err(|e| format!("signature file: {}: {e}", path.display()))?;
    job.take_signature()
        .ok_or_else(|| format!("signature file: {}: incomplete", path.display()))
}

fn cmd_delta(opts: &Options) -> i32 {
    let Some(sig_path) = opts.reference_file.as_deref() else {
        return fail("delta requires a signature file");
    };
    let signature = match load_signature_file(sig_path) {
        Ok(sig) => sig,
        Err(e) => return fail(e),
    };
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "rsdelta: loaded {} blocks (block_len={}, strong_len={})",
            signature.len(),
            signature.block_len(),
            signature.strong_len()
        );
    }
    let mut job = match job::begin_delta(&signature) {
        Ok(job) => job,
        Err(e) => return fail(format!("delta: {e}")),
    };
    if let Err(e) = run_job(&mut job, opts) {
        return fail(e);
    }
    report(opts, job.stats());
    0
}

// ---------------------------------------------------------------------------
// Patch command
// ---------------------------------------------------------------------------

fn cmd_patch(opts: &Options) -> i32 {
    let Some(basis_path) = opts.reference_file.as_deref() else {
        return fail("patch requires a basis file");
    };
    let basis = match FileBasis::open(basis_path) {
        Ok(basis) => basis,
        Err(e) => return fail(format!("basis file: {}: {e}", basis_path.display())),
    };
    let mut job = job::begin_patch(basis);
    if let Err(e) = run_job(&mut job, opts) {
        return fail(e);
    }
    report(opts, job.stats());
    0
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(opts: &Options) -> i32 {
    let Some(path) = opts.input_file.as_deref() else {
        return fail("inspect requires an input file");
    };
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => return fail(format!("{}: {e}", path.display())),
    };
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = if data.starts_with(&SIG_MAGIC.to_be_bytes()) {
        inspect_signature(&data, opts, &mut out)
    } else {
        inspect_delta(&data, opts, &mut out)
    };
    let stats = match result.and_then(|stats| out.flush().map(|()| stats).map_err(|e| e.to_string()))
    {
        Ok(stats) => stats,
        Err(e) => return fail(format!("{}: {e}", path.display())),
    };
    report(opts, &stats);
    0
}

fn inspect_signature(data: &[u8], opts: &Options, out: &mut impl Write) -> Result<Stats, String> {
    let sig = Signature::from_bytes(data).map_err(|e| e.to_string())?;
    let write_err = |e: io::Error| e.to_string();
    if !opts.quiet {
        writeln!(
            out,
            "signature: block_len={} strong_len={} blocks={}",
            sig.block_len(),
            sig.strong_len(),
            sig.len()
        )
        .map_err(write_err)?;
        if opts.verbose > 0 {
            let strong_len = sig.strong_len() as usize;
            for block in sig.blocks() {
                writeln!(
                    out,
                    "{:>12} {:08x} {}",
                    block.offset,
                    block.weak,
                    to_hex(&block.strong[..strong_len])
                )
                .map_err(write_err)?;
            }
        }
    }
    let mut stats = Stats::new("inspect");
    stats.in_bytes = data.len() as u64;
    stats.sig_blocks = sig.len() as u64;
    stats.block_len = sig.block_len();
    Ok(stats)
}

fn inspect_delta(data: &[u8], opts: &Options, out: &mut impl Write) -> Result<Stats, String> {
    let mut stats = Stats::new("inspect");
    stats.in_bytes = data.len() as u64;
    let mut target_pos = 0u64;
    for cmd in commands(data) {
        let cmd = cmd.map_err(|e| e.to_string())?;
        let line = match cmd {
            DeltaCommand::Copy { offset, length } => {
                stats.copy_cmds += 1;
                stats.copy_bytes += length;
                format!("{target_pos:>12} COPY    {offset} {length}")
            }
            DeltaCommand::Literal(bytes) => {
                stats.lit_cmds += 1;
                stats.lit_bytes += bytes.len() as u64;
                format!("{target_pos:>12} LITERAL {}", bytes.len())
            }
            DeltaCommand::End => format!("{target_pos:>12} END"),
        };
        target_pos += cmd.output_len();
        if !opts.quiet {
            writeln!(out, "{line}").map_err(|e| e.to_string())?;
        }
    }
    stats.out_bytes = target_pos;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let opts = resolve_options(cli);
    let exit_code = match opts.command {
        Command::Signature => cmd_signature(&opts),
        Command::Delta => cmd_delta(&opts),
        Command::Patch => cmd_patch(&opts),
        Command::Inspect => cmd_inspect(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
