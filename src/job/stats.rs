// Per-job counters.

use std::fmt;

/// What a job did.  Updated as the job runs; complete once it returns
/// `Done`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Operation name ("signature", "loadsig", "delta", "patch").
    pub op: &'static str,
    pub lit_cmds: u64,
    pub lit_bytes: u64,
    pub copy_cmds: u64,
    pub copy_bytes: u64,
    /// Blocks written (signature) or read (loadsig).
    pub sig_blocks: u64,
    /// Weak checksum hits rejected by the strong digest.
    pub false_matches: u64,
    pub block_len: u32,
    pub in_bytes: u64,
    pub out_bytes: u64,
}

impl Stats {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            ..Self::default()
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} statistics:", self.op)?;
        if self.lit_cmds > 0 {
            write!(f, " literal[{} cmds, {} bytes]", self.lit_cmds, self.lit_bytes)?;
        }
        if self.copy_cmds > 0 {
            write!(f, " copy[{} cmds, {} bytes]", self.copy_cmds, self.copy_bytes)?;
        }
        if self.sig_blocks > 0 {
            write!(f, " signature[{} blocks, {} bytes per block]", self.sig_blocks, self.block_len)?;
        }
        if self.false_matches > 0 {
            write!(f, " false_matches={}", self.false_matches)?;
        }
        write!(f, " in={} out={}", self.in_bytes, self.out_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_skips_empty_sections() {
        let mut s = Stats::new("delta");
        s.lit_cmds = 2;
        s.lit_bytes = 64;
        s.copy_cmds = 2;
        s.copy_bytes = 960;
        s.in_bytes = 1024;
        s.out_bytes = 80;
        assert_eq!(
            s.to_string(),
            "delta statistics: literal[2 cmds, 64 bytes] copy[2 cmds, 960 bytes] in=1024 out=80"
        );
        let s = Stats::new("loadsig");
        assert_eq!(s.to_string(), "loadsig statistics: in=0 out=0");
    }
}
