//! Sequence Number Handling
//!
//! TLoE sequence numbers are 22-bit values carried in both the `seq_num` and
//! `seq_num_ack` header fields. This module provides a wrapped sequence number
//! type whose comparison and arithmetic account for wraparound.

use std::cmp::Ordering;
use std::fmt;

/// Width of the sequence number fields on the wire
pub const SEQ_BITS: u32 = 22;

/// Size of the sequence space (`M`)
pub const SEQ_MODULUS: u32 = 1 << SEQ_BITS;

/// Maximum sequence number value (0x3FFFFF)
pub const MAX_SEQ_NUM: u32 = SEQ_MODULUS - 1;

const HALF_SPACE: u32 = SEQ_MODULUS / 2;

/// Sequence number with 22-bit wraparound semantics
///
/// Ordering is circular, so the type deliberately does not implement `Ord`:
/// use [`SeqNum::circular_cmp`] or the `lt`/`le`/`gt`/`ge` helpers. Results
/// are meaningful as long as the outstanding window stays below half the
/// sequence space.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SeqNum(u32);

impl SeqNum {
    /// Sequence number zero, the first number used on a fresh endpoint
    pub const ZERO: SeqNum = SeqNum(0);

    /// Create a new sequence number
    ///
    /// # Panics
    /// Panics if value exceeds MAX_SEQ_NUM
    pub fn new(value: u32) -> Self {
        assert!(
            value <= MAX_SEQ_NUM,
            "Sequence number {} exceeds maximum {}",
            value,
            MAX_SEQ_NUM
        );
        SeqNum(value)
    }

    /// Create a sequence number, masking the value to 22 bits
    #[inline]
    pub fn new_unchecked(value: u32) -> Self {
        SeqNum(value & MAX_SEQ_NUM)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        SeqNum((self.0 + 1) & MAX_SEQ_NUM)
    }

    /// Get the previous sequence number
    #[inline]
    pub fn prev(self) -> Self {
        SeqNum(self.0.wrapping_sub(1) & MAX_SEQ_NUM)
    }

    /// Compare two sequence numbers on the circle.
    ///
    /// `self` is `Greater` when it lies within the half of the space ahead of
    /// `other`. At exactly half the space apart the raw values break the tie,
    /// which keeps the comparison antisymmetric for every pair.
    pub fn circular_cmp(self, other: SeqNum) -> Ordering {
        let diff = self.0.wrapping_sub(other.0) & MAX_SEQ_NUM;
        match diff {
            0 => Ordering::Equal,
            d if d < HALF_SPACE => Ordering::Greater,
            d if d > HALF_SPACE => Ordering::Less,
            _ => self.0.cmp(&other.0),
        }
    }

    /// Signed distance from this sequence number to another
    ///
    /// Positive values mean `other` is ahead of `self`.
    pub fn distance_to(self, other: SeqNum) -> i32 {
        let diff = other.0.wrapping_sub(self.0) & MAX_SEQ_NUM;
        match other.circular_cmp(self) {
            Ordering::Less => diff as i32 - SEQ_MODULUS as i32,
            _ => diff as i32,
        }
    }

    #[inline]
    pub fn lt(self, other: SeqNum) -> bool {
        self.circular_cmp(other) == Ordering::Less
    }

    #[inline]
    pub fn le(self, other: SeqNum) -> bool {
        self.circular_cmp(other) != Ordering::Greater
    }

    #[inline]
    pub fn gt(self, other: SeqNum) -> bool {
        self.circular_cmp(other) == Ordering::Greater
    }

    #[inline]
    pub fn ge(self, other: SeqNum) -> bool {
        self.circular_cmp(other) != Ordering::Less
    }
}

impl fmt::Debug for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNum({})", self.0)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNum {
    fn from(value: u32) -> Self {
        SeqNum::new_unchecked(value)
    }
}

impl From<SeqNum> for u32 {
    fn from(seq: SeqNum) -> u32 {
        seq.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let seq = SeqNum::new(100);
        assert_eq!(seq.as_raw(), 100);
    }

    #[test]
    #[should_panic]
    fn test_new_overflow() {
        SeqNum::new(MAX_SEQ_NUM + 1);
    }

    #[test]
    fn test_new_unchecked() {
        let seq = SeqNum::new_unchecked(MAX_SEQ_NUM + 100);
        assert_eq!(seq.as_raw(), 99);
    }

    #[test]
    fn test_next_prev_wraparound() {
        assert_eq!(SeqNum::new(MAX_SEQ_NUM).next(), SeqNum::ZERO);
        assert_eq!(SeqNum::ZERO.prev(), SeqNum::new(MAX_SEQ_NUM));
        assert_eq!(SeqNum::new(7).prev().next(), SeqNum::new(7));
    }

    #[test]
    fn test_comparison() {
        let a = SeqNum::new(100);
        let b = SeqNum::new(200);

        assert!(a.lt(b));
        assert!(a.le(b));
        assert!(b.gt(a));
        assert!(b.ge(a));
        assert!(a.le(a));
        assert!(a.ge(a));
        assert_eq!(a.circular_cmp(a), Ordering::Equal);
    }

    #[test]
    fn test_comparison_wraparound() {
        let a = SeqNum::new(MAX_SEQ_NUM - 10);
        let b = SeqNum::new(10);

        assert!(a.lt(b));
        assert!(b.gt(a));
    }

    #[test]
    fn test_half_space_tie_is_antisymmetric() {
        let a = SeqNum::new(0);
        let b = SeqNum::new(HALF_SPACE);

        assert_eq!(a.circular_cmp(b), Ordering::Less);
        assert_eq!(b.circular_cmp(a), Ordering::Greater);
    }

    #[test]
    fn test_distance() {
        let a = SeqNum::new(MAX_SEQ_NUM - 10);
        let b = SeqNum::new(10);
        assert_eq!(a.distance_to(b), 21);
        assert_eq!(b.distance_to(a), -21);
        assert_eq!(b.distance_to(b), 0);
    }
}
