//! One-time password generation

use rand::Rng;

use crate::config::MAX_OTP_LENGTH;

/// Generator for numeric one-time passwords
#[derive(Debug, Clone)]
pub struct OtpGenerator {
    /// Number of digits per code
    length: usize,
}

impl OtpGenerator {
    /// Lengths outside `1..=MAX_OTP_LENGTH` are clamped into range
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(1, MAX_OTP_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a new code; leading zeros are kept
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();

        (0..self.length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }
}

impl Default for OtpGenerator {
    fn default() -> Self {
        Self::new(6)
    }
}
