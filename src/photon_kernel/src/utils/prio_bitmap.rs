//! Provides `PrioBitmap`, a bit array supporting constant-time lookup of the
//! lowest set bit.
use core::fmt;

use super::Init;

/// The maximum bit count supported by [`PrioBitmap`].
pub const PRIO_BITMAP_MAX_LEN: usize = u32::BITS as usize;

/// A bit array of `LEN` (≤ [`PRIO_BITMAP_MAX_LEN`]) entries. Bit `i` being
/// set means "priority level `i` has something in it".
///
/// All methods panic when the given bit position is out of range.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PrioBitmap<const LEN: usize> {
    bits: u32,
}

impl<const LEN: usize> Init for PrioBitmap<LEN> {
    const INIT: Self = {
        assert!(LEN <= PRIO_BITMAP_MAX_LEN, "too many levels");
        Self { bits: 0 }
    };
}

impl<const LEN: usize> fmt::Debug for PrioBitmap<LEN> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries((0..LEN).filter(|&i| self.get(i)))
            .finish()
    }
}

impl<const LEN: usize> PrioBitmap<LEN> {
    /// Get the bit at the specified position.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        assert!(i < LEN);
        self.bits & (1 << i) != 0
    }

    /// Clear the bit at the specified position.
    #[inline]
    pub fn clear(&mut self, i: usize) {
        assert!(i < LEN);
        self.bits &= !(1 << i);
    }

    /// Set the bit at the specified position.
    #[inline]
    pub fn set(&mut self, i: usize) {
        assert!(i < LEN);
        self.bits |= 1 << i;
    }

    /// Get the position of the first set bit.
    #[inline]
    pub fn find_set(&self) -> Option<usize> {
        if self.bits == 0 {
            None
        } else {
            Some(self.bits.trailing_zeros() as usize)
        }
    }

    /// Return `true` if no bits are set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeSet;

    struct BTreePrioBitmap(BTreeSet<usize>);

    impl BTreePrioBitmap {
        fn new() -> Self {
            Self(BTreeSet::new())
        }

        fn enum_set_bits(&self) -> Vec<usize> {
            self.0.iter().cloned().collect()
        }

        fn clear(&mut self, i: usize) {
            self.0.remove(&i);
        }

        fn set(&mut self, i: usize) {
            self.0.insert(i);
        }

        fn find_set(&self) -> Option<usize> {
            self.0.iter().next().cloned()
        }
    }

    /// A modifying operation on `PrioBitmap`.
    #[derive(Debug)]
    enum Cmd {
        Insert(usize),
        Remove(usize),
    }

    /// Map random bytes to operations on `PrioBitmap`.
    fn interpret(bytecode: &[u8], bitmap_len: usize) -> impl Iterator<Item = Cmd> + '_ {
        let mut i = 0;
        let mut known_set_bits = Vec::new();
        std::iter::from_fn(move || {
            let instr = bytecode.get(i..i + 2)?;
            i += 2;

            if instr[0] % 2 == 0 || known_set_bits.is_empty() {
                let bit = instr[1] as usize % bitmap_len;
                known_set_bits.push(bit);
                Some(Cmd::Insert(bit))
            } else {
                let i = instr[1] as usize % known_set_bits.len();
                let bit = known_set_bits.swap_remove(i);
                Some(Cmd::Remove(bit))
            }
        })
    }

    fn test_inner<const LEN: usize>(bytecode: Vec<u8>) {
        let mut subject = PrioBitmap::<LEN>::INIT;
        let mut reference = BTreePrioBitmap::new();

        log::info!("size = {LEN}");

        for cmd in interpret(&bytecode, LEN) {
            log::trace!("    {cmd:?}");
            match cmd {
                Cmd::Insert(bit) => {
                    subject.set(bit);
                    reference.set(bit);
                }
                Cmd::Remove(bit) => {
                    // A bit may have been inserted twice
                    if !reference.0.contains(&bit) {
                        continue;
                    }
                    subject.clear(bit);
                    reference.clear(bit);
                }
            }

            assert_eq!(subject.find_set(), reference.find_set());
        }

        let set_bits: Vec<usize> = (0..LEN).filter(|&i| subject.get(i)).collect();
        assert_eq!(set_bits, reference.enum_set_bits());
        assert_eq!(subject.is_empty(), reference.0.is_empty());
    }

    #[quickcheck]
    fn size_1(bytecode: Vec<u8>) {
        let _ = env_logger::builder().is_test(true).try_init();
        test_inner::<1>(bytecode);
    }

    #[quickcheck]
    fn size_16(bytecode: Vec<u8>) {
        let _ = env_logger::builder().is_test(true).try_init();
        test_inner::<16>(bytecode);
    }

    #[quickcheck]
    fn size_32(bytecode: Vec<u8>) {
        let _ = env_logger::builder().is_test(true).try_init();
        test_inner::<32>(bytecode);
    }

    #[test]
    fn empty_has_no_set_bit() {
        let bitmap = PrioBitmap::<16>::INIT;
        assert_eq!(bitmap.find_set(), None);
        assert!(bitmap.is_empty());
    }
}
