//! # Frame ring buffer
//!
//! Fixed capacity store of the most recently captured frames, addressed by capture count.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::error::{Error, Result};
use crate::frame::Frame;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Circular buffer of `capacity` slots, logical index `i` lives in slot `i % capacity`.
///
/// The buffer does not track which logical index currently owns a slot. Reading index `i`
/// after `capacity` or more further writes returns whatever was written to that slot last.
#[derive(Debug, Clone)]
pub struct FrameRingBuffer<T = Frame> {
    slots: Vec<Option<T>>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<T> FrameRingBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ConfigurationError(String::from(
                "frame ring buffer capacity must be at least 1",
            )));
        }

        Ok(Self {
            slots: (0..capacity).map(|_| None).collect(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store `item` at `index`, replacing the slot's previous content.
    pub fn put(&mut self, item: T, index: u64) {
        let pos = self.slot(index);
        self.slots[pos] = Some(item);
    }

    /// The item in `index`'s slot, or `None` if that slot was never written.
    pub fn get(&self, index: u64) -> Option<&T> {
        self.slots[self.slot(index)].as_ref()
    }

    fn slot(&self, index: u64) -> usize {
        (index % self.slots.len() as u64) as usize
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(FrameRingBuffer::<u32>::new(0).is_err());
    }

    #[test]
    fn test_latest_write_wins_per_slot() {
        let mut ring = FrameRingBuffer::new(4).unwrap();

        for i in 0..11u64 {
            ring.put(i * 10, i);
            assert_eq!(ring.get(i), Some(&(i * 10)));
        }

        // Slot 1 last held index 9, older indices alias onto it
        assert_eq!(ring.get(1), Some(&90));
        assert_eq!(ring.get(5), Some(&90));
        // Index 8 was written after 4 and 0
        assert_eq!(ring.get(0), Some(&80));
        assert_eq!(ring.get(10), Some(&100));
    }

    #[test]
    fn test_unwritten_slot_is_empty() {
        let mut ring = FrameRingBuffer::new(3).unwrap();
        ring.put(Frame::new(2, 2), 0);

        assert!(ring.get(1).is_none());
        assert_eq!(ring.get(3).map(Frame::rows), Some(2));
    }
}
