//! Memory subsystem: program store (ROM) and data store (RAM).
//!
//! Both stores hold 65536 sixteen-bit words and are addressed by a full
//! 16-bit index, so every address a program can form is valid. The word,
//! not the byte, is the fundamental memory chunk.

use crate::bits::Word;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of words in each store: the full 16-bit address space.
pub const MEMORY_SIZE: usize = 1 << 16;

/// The canonical HLT encoding used to fill an unprogrammed ROM.
///
/// Opcode nibble 0xF, remaining fields irrelevant. An unloaded CPU
/// halts on its first cycle instead of executing garbage.
pub const HLT_WORD: Word = 0xF000;

/// The program store: 65536 words, written only by the loader before
/// execution begins, read-only during execution.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProgramStore {
    words: Vec<Word>,
}

impl ProgramStore {
    /// Create a program store with every word set to the HLT encoding.
    pub fn new() -> Self {
        Self {
            words: vec![HLT_WORD; MEMORY_SIZE],
        }
    }

    /// Read the word at an address. Total: any 16-bit address is valid.
    #[inline]
    pub fn read(&self, addr: Word) -> Word {
        self.words[addr as usize]
    }

    /// Write a single word. This is the loader's interface; the
    /// execution engine never writes the program store.
    #[inline]
    pub fn write(&mut self, addr: Word, value: Word) {
        self.words[addr as usize] = value;
    }

    /// Load a program image starting at the given address.
    pub fn load(&mut self, start_addr: Word, program: &[Word]) -> Result<(), MemoryError> {
        let start = start_addr as usize;
        if start + program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MEMORY_SIZE - start,
            });
        }

        self.words[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Reset every word back to the HLT fill.
    pub fn clear(&mut self) {
        self.words.fill(HLT_WORD);
    }
}

impl Default for ProgramStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let programmed = self.words.iter().filter(|&&w| w != HLT_WORD).count();
        f.debug_struct("ProgramStore")
            .field("programmed_words", &programmed)
            .field("total_words", &MEMORY_SIZE)
            .finish()
    }
}

/// The data store: 65536 read/write words.
///
/// The original design leaves RAM contents as garbage until written; this
/// implementation zero-initializes them so runs are deterministic.
#[derive(Clone, Serialize, Deserialize)]
pub struct DataStore {
    words: Vec<Word>,
}

impl DataStore {
    /// Create a data store with all words zeroed.
    pub fn new() -> Self {
        Self {
            words: vec![0; MEMORY_SIZE],
        }
    }

    /// Read the word at an address. Total: any 16-bit address is valid.
    #[inline]
    pub fn read(&self, addr: Word) -> Word {
        self.words[addr as usize]
    }

    /// Write the word at an address.
    #[inline]
    pub fn write(&mut self, addr: Word, value: Word) {
        self.words[addr as usize] = value;
    }

    /// Zero all words.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Dump a range of words (for debugging).
    pub fn dump(&self, start: Word, count: usize) -> Vec<(Word, Word)> {
        let end = (start as usize + count).min(MEMORY_SIZE);
        (start as usize..end)
            .map(|i| (i as Word, self.words[i]))
            .collect()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.words.iter().filter(|&&w| w != 0).count();
        f.debug_struct("DataStore")
            .field("non_zero_words", &non_zero)
            .field("total_words", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur while loading a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
