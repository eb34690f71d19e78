// Block index: weak checksum -> candidate basis blocks.
//
// A thin layer over `HashTable` that stores references into a `Signature`.
// The borrow ties the index's lifetime to the signature, so an index can
// never outlive the blocks it points at.

use log::debug;

use crate::error::DeltaError;
use crate::hash::table::{HashTable, TableStats};
use crate::signature::{Block, Signature};

pub struct BlockIndex<'s> {
    signature: &'s Signature,
    table: HashTable<&'s Block>,
}

impl<'s> BlockIndex<'s> {
    /// Index every block of `signature` under its weak checksum.
    pub fn build(signature: &'s Signature) -> Result<Self, DeltaError> {
        let mut table = HashTable::new(signature.len())?;
        for block in signature.blocks() {
            table.add(block.weak, block)?;
        }
        debug!(
            "block index: {} blocks in {} slots (block_len={}, strong_len={})",
            table.len(),
            table.size(),
            signature.block_len(),
            signature.strong_len()
        );
        Ok(Self { signature, table })
    }

    pub fn signature(&self) -> &'s Signature {
        self.signature
    }

    /// First block stored under `weak` that `verify` accepts, in probe order.
    ///
    /// `verify` runs only for blocks whose weak checksum equals `weak`.
    pub fn find<F>(&mut self, weak: u32, mut verify: F) -> Option<&'s Block>
    where
        F: FnMut(&'s Block) -> bool,
    {
        self.table.find(weak, |block| verify(*block)).copied()
    }

    /// Every indexed block, in table order.
    pub fn iter(&self) -> impl Iterator<Item = &'s Block> + '_ {
        self.table.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stats(&self) -> &TableStats {
        self.table.stats()
    }
}

impl std::fmt::Debug for BlockIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockIndex")
            .field("signature", self.signature)
            .field("table", &self.table)
            .finish()
    }
}
