use crate::error::{Error, Result};

/// Default capacity for a freshly allocated block, mirroring the minimum
/// growth step `webrtc-util`'s ring buffer uses before it starts doubling.
pub const MIN_BLOCK_SIZE: usize = 2048;

/// Hard ceiling on a single block's capacity, absent an explicit limit.
/// Reassembly targets (one TOI, one MPU fragment) are bounded broadcast
/// payloads; nothing legitimate needs more than this.
pub const MAX_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// A bounded, growable byte block with an independent write cursor.
///
/// `Block` is the leaf primitive every reassembly structure in this crate
/// tree is built from: `TransportBlock` payloads, `MPUFragmentBucket`
/// fragments, and `OutputBuffer` track regions are all `Block`s underneath.
#[derive(Debug, Clone)]
pub struct Block {
    data: Vec<u8>,
    /// write cursor, independent of `data.len()` (the allocated capacity)
    i_pos: usize,
    released: bool,
}

impl Block {
    /// Allocates a block with at least `capacity` bytes of room, and an
    /// empty (zero-length) written region.
    pub fn alloc(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_BLOCK_SIZE).min(MAX_BLOCK_SIZE);
        Block {
            data: vec![0u8; capacity],
            i_pos: 0,
            released: false,
        }
    }

    /// Total allocated capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written so far (the write cursor position).
    pub fn len(&self) -> usize {
        self.i_pos
    }

    pub fn is_empty(&self) -> bool {
        self.i_pos == 0
    }

    /// Resets the write cursor to the start without touching capacity or
    /// the underlying bytes. A subsequent `write` overwrites from offset 0.
    pub fn rewind(&mut self) {
        self.i_pos = 0;
    }

    /// Moves the write cursor to an arbitrary position within the current
    /// capacity, without touching the underlying bytes. Lets a caller that
    /// has already written data at `pos` (and not yet overwritten it)
    /// "recover" that region as if it were still the live write position.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        self.ensure_live()?;
        if pos > self.data.len() {
            return Err(Error::CapacityExhausted {
                requested: pos,
                offset: 0,
                capacity: self.data.len(),
            });
        }
        self.i_pos = pos;
        Ok(())
    }

    /// Grows or shrinks capacity, preserving the first `min(old, new)`
    /// bytes. Fails with `CapacityExhausted` (without mutating the block)
    /// if `new_capacity` would exceed `MAX_BLOCK_SIZE`.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        self.ensure_live()?;
        if new_capacity > MAX_BLOCK_SIZE {
            return Err(Error::CapacityExhausted {
                requested: new_capacity,
                offset: 0,
                capacity: MAX_BLOCK_SIZE,
            });
        }
        self.data.resize(new_capacity, 0);
        self.i_pos = self.i_pos.min(self.data.len());
        Ok(())
    }

    /// Appends `bytes` at the write cursor and advances it. Bounds-checked:
    /// if `bytes` does not fit in the remaining capacity, no mutation
    /// happens and `CapacityExhausted` is returned.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.ensure_live()?;
        let end = self
            .i_pos
            .checked_add(bytes.len())
            .ok_or(Error::CapacityExhausted {
                requested: bytes.len(),
                offset: self.i_pos,
                capacity: self.data.len(),
            })?;
        if end > self.data.len() {
            return Err(Error::CapacityExhausted {
                requested: bytes.len(),
                offset: self.i_pos,
                capacity: self.data.len(),
            });
        }
        self.data[self.i_pos..end].copy_from_slice(bytes);
        self.i_pos = end;
        Ok(bytes.len())
    }

    /// Writes `bytes` at an explicit absolute offset (used when reassembly
    /// order is not append-only, e.g. ALC start-offset placement). Does not
    /// move the write cursor unless it grows the written region.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<usize> {
        self.ensure_live()?;
        let end = offset
            .checked_add(bytes.len())
            .ok_or(Error::CapacityExhausted {
                requested: bytes.len(),
                offset,
                capacity: self.data.len(),
            })?;
        if end > self.data.len() {
            return Err(Error::CapacityExhausted {
                requested: bytes.len(),
                offset,
                capacity: self.data.len(),
            });
        }
        self.data[offset..end].copy_from_slice(bytes);
        self.i_pos = self.i_pos.max(end);
        Ok(bytes.len())
    }

    /// The written region, `data[0..i_pos]`.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.i_pos]
    }

    /// Releases the block's storage. Further operations fail with
    /// `Error::Released`. Mirrors scoped acquisition: callers invoke this
    /// when the owning object/bucket is reaped or the channel closes.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.i_pos = 0;
        self.released = true;
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            Err(Error::Released)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_advances_cursor_and_preserves_bytes() {
        let mut b = Block::alloc(16);
        assert_eq!(b.write(b"hello").unwrap(), 5);
        assert_eq!(b.write(b"world").unwrap(), 5);
        assert_eq!(b.as_slice(), b"helloworld");
    }

    #[test]
    fn write_past_capacity_does_not_partially_mutate() {
        let mut b = Block::alloc(MIN_BLOCK_SIZE);
        b.resize(4).unwrap();
        b.write(b"ab").unwrap();
        let before = b.as_slice().to_vec();
        let err = b.write(b"cdef").unwrap_err();
        assert!(matches!(err, Error::CapacityExhausted { .. }));
        assert_eq!(b.as_slice(), before.as_slice());
    }

    #[test]
    fn resize_preserves_prefix() {
        let mut b = Block::alloc(4);
        b.write(b"abcd").unwrap();
        b.resize(8).unwrap();
        assert_eq!(b.as_slice(), b"abcd");
        b.resize(2).unwrap();
        assert_eq!(b.as_slice(), b"ab");
    }

    #[test]
    fn rewind_resets_cursor_not_capacity() {
        let mut b = Block::alloc(8);
        b.write(b"abcd").unwrap();
        let cap = b.capacity();
        b.rewind();
        assert_eq!(b.len(), 0);
        assert_eq!(b.capacity(), cap);
        b.write(b"xy").unwrap();
        assert_eq!(b.as_slice(), b"xy");
    }

    #[test]
    fn seek_exposes_previously_written_bytes() {
        let mut b = Block::alloc(16);
        b.write(b"init").unwrap();
        let after_init = b.len();
        b.write(b"moof1").unwrap();
        let after_moof = b.len();
        b.seek(after_init).unwrap();
        b.seek(after_moof).unwrap();
        assert_eq!(b.as_slice(), b"initmoof1");
    }

    #[test]
    fn release_then_write_fails() {
        let mut b = Block::alloc(8);
        b.release();
        assert_eq!(b.write(b"x").unwrap_err(), Error::Released);
    }
}
