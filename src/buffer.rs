//! Growable byte buffer with split read/write cursors.
//!
//! The two-phase reserve/commit protocol lets a readiness-driven syscall
//! loop write straight into the buffer's tail: `reserve` hands out the
//! region `[write_pos, write_pos + n)`, and only `commit` makes those bytes
//! visible to readers. Invariant: `0 <= read_pos <= write_pos <= capacity`.

use crate::error::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct ByteBuffer {
    storage: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    pending_write: usize,
}

impl ByteBuffer {
    pub fn new() -> ByteBuffer {
        ByteBuffer::with_capacity(0)
    }

    pub fn with_capacity(cap: usize) -> ByteBuffer {
        ByteBuffer {
            storage: vec![0; cap],
            read_pos: 0,
            write_pos: 0,
            pending_write: 0,
        }
    }

    /// Number of readable bytes.
    pub fn len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn writable_len(&self) -> usize {
        self.storage.len() - self.write_pos
    }

    /// The committed, not yet consumed bytes `[read_pos, write_pos)`.
    pub fn readable(&self) -> &[u8] {
        &self.storage[self.read_pos..self.write_pos]
    }

    /// Appends `data`, growing the buffer as needed.
    pub fn append(&mut self, data: &[u8]) {
        self.ensure_writable(data.len());
        self.storage[self.write_pos..self.write_pos + data.len()].copy_from_slice(data);
        self.write_pos += data.len();
    }

    /// Reserves `n` writable bytes at the tail. Fails while a previous
    /// reservation is outstanding.
    pub fn reserve(&mut self, n: usize) -> Result<&mut [u8]> {
        if self.pending_write != 0 {
            return Err(Error::state()
                .invalid_state()
                .message("reserve called with a reservation outstanding")
                .build());
        }

        self.ensure_writable(n);
        self.pending_write = n;
        Ok(&mut self.storage[self.write_pos..self.write_pos + n])
    }

    /// Unchecked variant of [`reserve`](Self::reserve); the caller manages
    /// exclusivity.
    pub fn reserve_unchecked(&mut self, n: usize) -> &mut [u8] {
        self.ensure_writable(n);
        &mut self.storage[self.write_pos..self.write_pos + n]
    }

    /// Makes `n` reserved bytes visible to readers.
    pub fn commit(&mut self, n: usize) -> Result<()> {
        if n > self.pending_write {
            return Err(Error::state()
                .invalid_state()
                .message("commit exceeds the outstanding reservation")
                .build());
        }

        self.write_pos += n;
        self.pending_write -= n;
        Ok(())
    }

    /// Unchecked variant of [`commit`](Self::commit), bounded only by the
    /// writable tail.
    pub fn commit_unchecked(&mut self, n: usize) {
        debug_assert!(n <= self.writable_len());
        self.write_pos += n;
    }

    /// Discards `n` readable bytes from the front, then compacts.
    pub fn consume(&mut self, n: usize) -> Result<()> {
        if n > self.len() {
            return Err(Error::state()
                .invalid_argument()
                .message("consume exceeds readable bytes")
                .build());
        }

        self.read_pos += n;
        self.compact();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.pending_write = 0;
    }

    /// Moves `[read_pos, write_pos)` to offset 0, freeing contiguous tail
    /// space. The regions may overlap, so this is an overlap-safe move.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }

        let len = self.len();
        self.storage.copy_within(self.read_pos..self.write_pos, 0);
        self.read_pos = 0;
        self.write_pos = len;
    }

    fn ensure_writable(&mut self, n: usize) {
        if self.write_pos + n <= self.storage.len() {
            return;
        }

        self.compact();
        if self.write_pos + n <= self.storage.len() {
            return;
        }

        let new_cap = std::cmp::max(self.storage.len() * 2, self.write_pos + n);
        self.storage.resize(new_cap, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_round_trip() {
        let mut buf = ByteBuffer::new();
        buf.append(b"hello");

        assert_eq!(buf.readable(), b"hello");
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn two_phase_write() {
        let mut buf = ByteBuffer::with_capacity(0);

        let slice = buf.reserve(5).unwrap();
        slice.copy_from_slice(b"ABCDE");
        buf.commit(5).unwrap();
        assert_eq!(buf.readable(), b"ABCDE");

        buf.consume(3).unwrap();
        assert_eq!(buf.readable(), b"DE");
    }

    #[test]
    fn reserved_bytes_invisible_until_commit() {
        let mut buf = ByteBuffer::new();
        buf.append(b"xy");

        let slice = buf.reserve(4).unwrap();
        slice[..2].copy_from_slice(b"zw");
        assert_eq!(buf.readable(), b"xy");

        buf.commit(2).unwrap();
        assert_eq!(buf.readable(), b"xyzw");
    }

    #[test]
    fn double_reserve_rejected() {
        let mut buf = ByteBuffer::new();
        buf.reserve(4).unwrap();

        assert!(buf.reserve(1).is_err());
    }

    #[test]
    fn commit_beyond_reservation_rejected() {
        let mut buf = ByteBuffer::new();
        buf.reserve(4).unwrap();

        assert!(buf.commit(5).is_err());
        assert!(buf.commit(4).is_ok());
    }

    #[test]
    fn consume_beyond_readable_rejected() {
        let mut buf = ByteBuffer::new();
        buf.append(b"ab");

        assert!(buf.consume(3).is_err());
        assert_eq!(buf.readable(), b"ab");
    }

    #[test]
    fn growth_preserves_readable_bytes() {
        let mut buf = ByteBuffer::with_capacity(4);
        buf.append(b"abcd");
        buf.append(b"efghijkl");

        assert_eq!(buf.readable(), b"abcdefghijkl");
        assert!(buf.capacity() >= 12);
    }

    #[test]
    fn growth_doubles_capacity() {
        let mut buf = ByteBuffer::with_capacity(8);
        buf.append(b"abcdefgh");
        buf.append(b"i");

        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn consume_compacts() {
        let mut buf = ByteBuffer::with_capacity(8);
        buf.append(b"abcdef");
        buf.consume(4).unwrap();

        assert_eq!(buf.readable(), b"ef");
        // Compaction reset the cursors, so six bytes of tail are writable.
        assert_eq!(buf.writable_len(), 6);
    }

    #[test]
    fn compact_reclaims_consumed_space_before_growing() {
        let mut buf = ByteBuffer::with_capacity(8);
        buf.append(b"abcdefgh");
        buf.consume(6).unwrap();
        buf.append(b"123456");

        assert_eq!(buf.readable(), b"gh123456");
        assert_eq!(buf.capacity(), 8);
    }
}
