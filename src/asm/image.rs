//! `.ls8` program image format.
//!
//! A program image is plain text, one memory byte per line:
//! - Each line is an 8-bit value written in base 2
//! - Anything after a `#` is a comment
//! - Blank lines (and lines that are only a comment) are ignored
//!
//! Bytes land at consecutive memory addresses starting at 0.

use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// A loaded program image.
#[derive(Debug, Clone)]
pub struct ProgramImage {
    /// The program bytes, in load order.
    pub bytes: Vec<u8>,
    /// Original source lines (for debugging).
    pub source_lines: Vec<String>,
}

impl ProgramImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    /// Add a byte.
    pub fn push(&mut self, byte: u8, source: &str) {
        self.bytes.push(byte);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for ProgramImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse program image text.
pub fn parse_image(source: &str) -> Result<ProgramImage, ImageError> {
    let mut image = ProgramImage::new();

    for (line_num, line) in source.lines().enumerate() {
        // Strip the comment, then the whitespace
        let code = line.split('#').next().unwrap_or("").trim();

        if code.is_empty() {
            continue;
        }

        let byte = u8::from_str_radix(code, 2).map_err(|_| ImageError::Parse {
            line: line_num + 1,
            message: format!("expected an 8-bit binary literal, found {:?}", code),
        })?;

        image.push(byte, line.trim());
    }

    Ok(image)
}

/// Load a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let source =
        std::fs::read_to_string(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
    parse_image(&source)
}

/// Save a program image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let mut file =
        std::fs::File::create(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;

    writeln!(file, "# LS-8 program image").map_err(|e| ImageError::Io(e.to_string()))?;
    writeln!(file, "# {} bytes", image.len()).map_err(|e| ImageError::Io(e.to_string()))?;
    writeln!(file).map_err(|e| ImageError::Io(e.to_string()))?;

    for (addr, byte) in image.bytes.iter().enumerate() {
        writeln!(file, "{:08b} # {:03}", byte, addr).map_err(|e| ImageError::Io(e.to_string()))?;
    }

    Ok(())
}

/// Errors that can occur during image operations.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}
