//! Numeric confirmation codes.
//!
//! Every byte drawn from the OS CSPRNG is reduced modulo 9 and mapped onto the
//! ASCII digits starting at `'0'`, so codes only ever contain `0`..`8` and the
//! low digits are marginally more likely (256 is not a multiple of 9). Existing
//! deployments rely on this exact alphabet; widening it to `0`..`9` has to be
//! an explicit product decision.

use rand::{RngCore, rngs::OsRng};

pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Number of distinct digits a code can contain.
const DIGIT_RANGE: u8 = 9;

#[derive(Debug, thiserror::Error)]
#[error("failed to read from the OS random source: {0}")]
pub struct CodeError(#[from] rand::Error);

#[derive(Clone, Copy, Debug)]
pub struct CodeGenerator {
    length: usize,
}

impl CodeGenerator {
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Produce a fresh code of the configured length.
    ///
    /// # Errors
    /// Returns an error if the OS random source cannot be read.
    pub fn generate(&self) -> Result<String, CodeError> {
        generate(self.length)
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

/// Generate a `length` character code made of the digits `0`..`8`.
///
/// # Errors
/// Returns an error if the OS random source cannot be read.
pub fn generate(length: usize) -> Result<String, CodeError> {
    let mut bytes = vec![0u8; length];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes.into_iter().map(digit).collect())
}

fn digit(byte: u8) -> char {
    char::from(b'0' + byte % DIGIT_RANGE)
}
