// Checksums and lookup structures for block matching.
//
// This module provides:
// - The weak rolling checksum used to find candidate blocks
// - The strong digest used to confirm them
// - A generic open-addressing hash table for candidate lookup
// - Signature parameter selection

pub mod config;
pub mod rolling;
pub mod strong;
pub mod table;

pub use config::SignatureConfig;
pub use rolling::{RollingChecksum, weak_sum};
pub use strong::{STRONG_SUM_LEN, StrongDigest, StrongSum};
pub use table::{HashTable, TableFull, TableStats};
