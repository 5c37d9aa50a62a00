//! Reads `.ls8` program listings.
//!
//! One byte per line, written as a base-2 literal. Anything after the first
//! token is a comment, as is any line starting with `#`:
//!
//! ```text
//! # print8.ls8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```

use std::fs;
use std::path::Path;

use crate::error::LoadError;
use crate::memory::MEMORY_SIZE;

pub fn parse_program(listing: &str) -> Result<Vec<u8>, LoadError> {
    let mut program = Vec::new();

    for (index, line) in listing.lines().enumerate() {
        let token = match line.split_whitespace().next() {
            Some(token) if !token.starts_with('#') => token,
            _ => continue,
        };
        // `10000010#LDI` is still a byte followed by a comment
        let literal = token.split('#').next().unwrap_or(token);

        let byte = u8::from_str_radix(literal, 2).map_err(|_| LoadError::InvalidLiteral {
            line: index + 1,
            token: token.to_string(),
        })?;
        program.push(byte);
    }

    if program.len() > MEMORY_SIZE {
        return Err(LoadError::ProgramTooLarge { len: program.len() });
    }
    Ok(program)
}

pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<u8>, LoadError> {
    let listing = fs::read_to_string(path)?;
    parse_program(&listing)
}
