//! rsdelta: rsync-style binary deltas in Rust.
//!
//! Three steps move a file across a slow link when the receiver already
//! holds an older version (the *basis*):
//! 1. the receiver computes a **signature** of the basis: a weak rolling
//!    checksum and a truncated MD4 digest per fixed-size block;
//! 2. the sender scans the new file against that signature and emits a
//!    **delta**: COPY commands for blocks the receiver already has, LITERAL
//!    commands for everything else;
//! 3. the receiver **patches** the basis with the delta to rebuild the new
//!    file.
//!
//! The crate provides:
//! - Incremental, resumable jobs over caller-owned buffers (`job`)
//! - Whole-stream and in-memory drivers (`engine`)
//! - Wire formats for signatures and deltas (`format`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use rsdelta::engine;
//! use rsdelta::SignatureConfig;
//!
//! let basis = vec![7u8; 4096];
//! let mut new = basis.clone();
//! new[1000] = 8;
//!
//! let config = SignatureConfig::new(512, 8);
//! let sig_bytes = engine::signature(&basis, config).unwrap();
//! let signature = engine::load_signature(&sig_bytes).unwrap();
//! let delta = engine::delta(&signature, &new).unwrap();
//! let rebuilt = engine::patch(basis.as_slice(), &delta).unwrap();
//! assert_eq!(rebuilt, new);
//! ```

pub mod engine;
pub mod error;
pub mod format;
pub mod hash;
pub mod index;
pub mod io;
pub mod job;
pub mod signature;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::DeltaError;
pub use hash::config::SignatureConfig;
pub use job::{
    BasisSource, Buffers, Job, JobStatus, Stats, begin_delta, begin_load_signature, begin_patch,
    begin_signature,
};
pub use signature::{Block, Signature};
