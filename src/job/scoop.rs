// Tail buffer for records that straddle `iter` calls.
//
// Jobs read through the scoop.  While it is empty, lookahead is served
// straight out of the caller's input slice with no copying.  When the input
// runs short of what a record needs, the leftover bytes are moved into the
// scoop (and counted as consumed) so the caller may hand over a fresh input
// slice next time.  Once the scoop holds data, further lookahead tops it up
// from the input until it drains again.

use super::Buffers;

/// Compact the buffer once this many bytes at the front are dead.
const COMPACT_THRESHOLD: usize = 16 * 1024;

#[derive(Debug, Default)]
pub struct Scoop {
    buf: Vec<u8>,
    start: usize,
}

impl Scoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held in the scoop.
    pub fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes readable right now: scoop contents plus unconsumed input.
    pub fn available(&self, bufs: &Buffers<'_>) -> usize {
        self.len() + bufs.avail_in()
    }

    /// Exactly `len` bytes of lookahead, or `None` if fewer are available.
    ///
    /// On `None` all remaining input has been moved into the scoop.
    pub fn readahead<'r, 'a: 'r>(
        &'r mut self,
        bufs: &mut Buffers<'a>,
        len: usize,
    ) -> Option<&'r [u8]> {
        if self.is_empty() && bufs.avail_in() >= len {
            return Some(&bufs.remaining_input()[..len]);
        }
        self.fill(bufs, len);
        if self.len() >= len {
            Some(&self.buf[self.start..self.start + len])
        } else {
            None
        }
    }

    /// Up to `max` bytes of lookahead; may be shorter than what is
    /// available when the scoop is in use.
    pub fn peek<'r, 'a: 'r>(&'r mut self, bufs: &mut Buffers<'a>, max: usize) -> &'r [u8] {
        if self.is_empty() {
            let rest = bufs.remaining_input();
            return &rest[..rest.len().min(max)];
        }
        self.fill(bufs, max);
        let held = &self.buf[self.start..];
        &held[..held.len().min(max)]
    }

    /// Move all remaining input into the scoop.
    pub fn stash(&mut self, bufs: &mut Buffers<'_>) {
        let n = bufs.avail_in();
        self.append(bufs.take_input(n));
    }

    /// Drop `len` bytes of lookahead: scoop first, then input.
    pub fn consume(&mut self, bufs: &mut Buffers<'_>, len: usize) {
        let from_scoop = len.min(self.len());
        self.start += from_scoop;
        if self.is_empty() {
            self.buf.clear();
            self.start = 0;
        }
        bufs.take_input(len - from_scoop);
    }

    /// Top the scoop up to `want` bytes from the input, as far as it goes.
    fn fill(&mut self, bufs: &mut Buffers<'_>, want: usize) {
        let need = want.saturating_sub(self.len()).min(bufs.avail_in());
        if need > 0 {
            self.append(bufs.take_input(need));
        }
    }

    fn append(&mut self, data: &[u8]) {
        if self.start >= COMPACT_THRESHOLD && self.start * 2 >= self.buf.len() {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        self.buf.extend_from_slice(data);
    }
}
