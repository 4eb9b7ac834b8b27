//! ROM image file format.
//!
//! A ROM image is a simple text format, one 16-bit word per line as
//! four hex digits:
//! - Lines starting with `;` are comments
//! - Anything after the word on a line is ignored
//! - Blank lines are ignored

use crate::bits::Word;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// A loaded ROM image.
#[derive(Debug, Clone)]
pub struct RomImage {
    /// The program words, in address order from 0.
    pub words: Vec<Word>,
    /// Original source lines (for debugging).
    pub source_lines: Vec<String>,
}

impl RomImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    /// Add a word.
    pub fn push(&mut self, word: Word, source: &str) {
        self.words.push(word);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for RomImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a ROM image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RomImage, ImageError> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
    let reader = BufReader::new(file);

    let mut image = RomImage::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| ImageError::Io(e.to_string()))?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }

        let token = trimmed.split_whitespace().next().unwrap_or("");
        let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);

        let word = u32::from_str_radix(digits, 16)
            .ok()
            .filter(|&v| v <= 0xFFFF)
            .ok_or_else(|| ImageError::Parse {
                line: line_num + 1,
                message: format!("expected a 16-bit hex word, found {:?}", token),
            })?;

        image.push(word as Word, trimmed);
    }

    Ok(image)
}

/// Save a ROM image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, words: &[Word]) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;

    writeln!(file, "; CPU16 ROM image").map_err(|e| ImageError::Io(e.to_string()))?;
    writeln!(file, "; {} words", words.len()).map_err(|e| ImageError::Io(e.to_string()))?;
    writeln!(file).map_err(|e| ImageError::Io(e.to_string()))?;

    for (addr, word) in words.iter().enumerate() {
        writeln!(file, "{:04X} ; 0x{:04X}", word, addr).map_err(|e| ImageError::Io(e.to_string()))?;
    }

    Ok(())
}

/// Errors that can occur during ROM image operations.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_roundtrip_through_disk() {
        let words = vec![0xA200, 0x0000, 0xE100, 0x0006, 0xF000];
        let path = std::env::temp_dir().join("cpu16_image_roundtrip.rom");

        save_image(&path, &words).unwrap();
        let loaded = load_image(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.words, words);
    }

    #[test]
    fn test_load_rejects_bad_words() {
        let path = std::env::temp_dir().join("cpu16_image_bad.rom");
        std::fs::write(&path, "; comment\nA200\nXYZZY\n").unwrap();

        let err = load_image(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, ImageError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_image("/nonexistent/cpu16.rom").unwrap_err();
        assert!(matches!(err, ImageError::Io(_)));
    }
}
