//! Random password generation

use rand::seq::SliceRandom;
use rand::Rng;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

pub const MIN_LENGTH: usize = 5;
pub const MAX_LENGTH: usize = 64;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const NUMERALS: &[u8] = b"0123456789";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SPECIAL_CHARS: &[u8] = b"!#$%&*+-?@^_~";

/// Password generator; lowercase letters are always included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordGenerator {
    pub length: usize,
    pub special_chars: bool,
    pub numerals: bool,
    pub uppercase: bool,
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self {
            length: 16,
            special_chars: false,
            numerals: false,
            uppercase: false,
        }
    }
}

impl PasswordGenerator {
    fn classes(&self) -> Vec<&'static [u8]> {
        let mut classes = vec![LOWERCASE];
        if self.numerals {
            classes.push(NUMERALS);
        }
        if self.uppercase {
            classes.push(UPPERCASE);
        }
        if self.special_chars {
            classes.push(SPECIAL_CHARS);
        }
        classes
    }

    /// Generate a password with at least one character of every enabled class
    pub fn generate(&self) -> Result<Zeroizing<String>> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&self.length) {
            return Err(VaultError::InvalidLength {
                min: MIN_LENGTH,
                max: MAX_LENGTH,
                got: self.length,
            });
        }

        let mut rng = rand::thread_rng();
        let classes = self.classes();
        let pool: Vec<u8> = classes.concat();

        let mut chars: Vec<u8> = Vec::with_capacity(self.length);
        for class in &classes {
            chars.push(class[rng.gen_range(0..class.len())]);
        }
        while chars.len() < self.length {
            chars.push(pool[rng.gen_range(0..pool.len())]);
        }
        chars.shuffle(&mut rng);

        // Every alphabet is ASCII
        Ok(Zeroizing::new(chars.into_iter().map(char::from).collect()))
    }
}
