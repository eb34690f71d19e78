// Wire formats for signatures and deltas.

pub mod command;
pub mod header;
pub mod varint;

pub use command::{Command, CommandIter, commands};
pub use header::{SIG_HEADER_LEN, SIG_MAGIC};
