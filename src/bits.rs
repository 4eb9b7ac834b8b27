//! Bit and nibble primitives for 16-bit words.
//!
//! A machine word is a plain `u16`. Instructions pack a 4-bit opcode and
//! up to three 4-bit operand fields into one word, and the flags register
//! is addressed bit by bit, so everything in the emulator is built on the
//! two extractors here.

/// The atomic unit of storage and computation: an unsigned 16-bit word.
pub type Word = u16;

/// Extract a 4-bit field from a word.
///
/// Nibbles are numbered 1 (most significant) through 4 (least
/// significant):
///
/// ```text
/// 1111 2222 3333 4444
/// ```
///
/// # Panics
/// Debug builds panic if `position` is not in 1-4.
#[inline]
pub fn nibble(word: Word, position: u8) -> Word {
    debug_assert!((1..=4).contains(&position), "nibble position {} out of range (1-4)", position);
    (word >> (16 - 4 * position as u32)) & 0x000F
}

/// Read a single bit of a word. Bit 0 is the least significant.
///
/// Callers must pass a position in 0-15.
#[inline]
pub fn get_bit(word: Word, pos: u8) -> bool {
    debug_assert!(pos < 16, "bit position {} out of range (0-15)", pos);
    word & (1 << pos) != 0
}

/// Set or clear a single bit of a word in place. Bit 0 is the least
/// significant.
///
/// Callers must pass a position in 0-15.
#[inline]
pub fn set_bit(word: &mut Word, pos: u8, value: bool) {
    debug_assert!(pos < 16, "bit position {} out of range (0-15)", pos);
    let mask = 1 << pos;
    if value {
        *word |= mask;
    } else {
        *word &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_positions() {
        let word = 0x1234;
        assert_eq!(nibble(word, 1), 0x1);
        assert_eq!(nibble(word, 2), 0x2);
        assert_eq!(nibble(word, 3), 0x3);
        assert_eq!(nibble(word, 4), 0x4);
    }

    #[test]
    fn test_nibble_extremes() {
        assert_eq!(nibble(0xF000, 1), 0xF);
        assert_eq!(nibble(0x000F, 4), 0xF);
        assert_eq!(nibble(0x0000, 1), 0x0);
        assert_eq!(nibble(0xFFFF, 3), 0xF);
    }

    #[test]
    fn test_get_bit() {
        let word = 0b0000_0000_0000_0101;
        assert!(get_bit(word, 0));
        assert!(!get_bit(word, 1));
        assert!(get_bit(word, 2));
        assert!(!get_bit(word, 15));
        assert!(get_bit(0x8000, 15));
    }

    #[test]
    fn test_set_bit() {
        let mut word = 0;
        set_bit(&mut word, 3, true);
        assert_eq!(word, 0b1000);

        set_bit(&mut word, 3, true);
        assert_eq!(word, 0b1000);

        set_bit(&mut word, 3, false);
        assert_eq!(word, 0);
    }

    #[test]
    fn test_set_bit_leaves_other_bits() {
        let mut word = 0xFFFF;
        set_bit(&mut word, 7, false);
        assert_eq!(word, 0xFF7F);
        set_bit(&mut word, 7, true);
        assert_eq!(word, 0xFFFF);
    }
}
