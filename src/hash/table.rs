// Open-addressing hash table for block lookup.
//
// Entries are keyed by a 32-bit hash (the weak rolling checksum).  Keys are
// passed through the MurmurHash3 finalizer before probing so that the
// clustered low bits of the rolling checksum do not produce long probe runs.
// The finalizer is a bijection, so comparing mixed hashes is the same as
// comparing raw keys.
//
// Probing is quadratic (triangular steps), which visits every slot of a
// power-of-two table.  There is no removal: the table is built once per
// signature and then only queried.  Duplicate keys are kept as separate
// entries and are found in probe order.

use std::collections::TryReserveError;
use std::fmt;

/// Minimum number of slots in any table.
pub const MIN_TABLE_SIZE: usize = 8;

/// MurmurHash3 `fmix32` avalanche step.
#[inline(always)]
pub fn mix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Slot count for `expected` entries: the smallest power of two holding
/// 1.25 x the expected count, and never fewer than [`MIN_TABLE_SIZE`].
pub fn table_size(expected: usize) -> usize {
    let want = expected.saturating_add(expected.div_ceil(4));
    want.max(MIN_TABLE_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(1 << (usize::BITS - 1))
}

/// Returned by [`HashTable::add`] when no free slot may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFull {
    pub size: usize,
}

impl fmt::Display for TableFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hash table full ({} slots)", self.size)
    }
}

impl std::error::Error for TableFull {}

/// Lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Calls to `find`.
    pub finds: u64,
    /// Slots visited while probing.
    pub probes: u64,
    /// Slots whose stored hash equalled the query.
    pub hash_hits: u64,
    /// Calls into the caller's match function.
    pub entry_cmps: u64,
    /// Successful finds.
    pub matches: u64,
}

struct Slot<T> {
    hash: u32,
    entry: T,
}

/// Generic append-only open-addressing table.
pub struct HashTable<T> {
    slots: Vec<Option<Slot<T>>>,
    mask: usize,
    count: usize,
    stats: TableStats,
}

impl<T> HashTable<T> {
    /// Allocate a table sized for `expected` entries.
    ///
    /// Allocation failure is reported rather than aborting.
    pub fn new(expected: usize) -> Result<Self, TryReserveError> {
        let size = table_size(expected);
        let mut slots = Vec::new();
        slots.try_reserve_exact(size)?;
        slots.resize_with(size, || None);
        Ok(Self {
            slots,
            mask: size - 1,
            count: 0,
            stats: TableStats::default(),
        })
    }

    /// Slot count (always a power of two).
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn stats(&self) -> &TableStats {
        &self.stats
    }

    /// Insert `entry` under `key` at the first free slot of its probe
    /// sequence.  Never deduplicates.
    ///
    /// One slot is always left empty so that every probe sequence ends.
    pub fn add(&mut self, key: u32, entry: T) -> Result<(), TableFull> {
        if self.count + 1 >= self.size() {
            return Err(TableFull { size: self.size() });
        }
        let hash = mix32(key);
        let mut index = hash as usize & self.mask;
        let mut step = 0usize;
        while self.slots[index].is_some() {
            step += 1;
            index = (index + step) & self.mask;
        }
        self.slots[index] = Some(Slot { hash, entry });
        self.count += 1;
        Ok(())
    }

    /// Find the first entry stored under `key` that `matches` accepts.
    ///
    /// `matches` is only invoked for slots whose hash equals the key, so any
    /// expensive confirmation it performs is deferred until a real key
    /// collision occurs.  Probing stops at the first empty slot.
    pub fn find<F>(&mut self, key: u32, mut matches: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.stats.finds += 1;
        let hash = mix32(key);
        let mut index = hash as usize & self.mask;
        let mut step = 0usize;
        let mut found = None;
        loop {
            self.stats.probes += 1;
            match &self.slots[index] {
                None => break,
                Some(slot) if slot.hash == hash => {
                    self.stats.hash_hits += 1;
                    self.stats.entry_cmps += 1;
                    if matches(&slot.entry) {
                        found = Some(index);
                        break;
                    }
                }
                Some(_) => {}
            }
            step += 1;
            index = (index + step) & self.mask;
        }
        let index = found?;
        self.stats.matches += 1;
        self.slots[index].as_ref().map(|slot| &slot.entry)
    }

    /// Iterate over all stored entries in slot order (unrelated to insertion
    /// order).
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().flatten().map(|slot| &slot.entry)
    }
}

impl<T> fmt::Debug for HashTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("size", &self.size())
            .field("count", &self.count)
            .field("stats", &self.stats)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
