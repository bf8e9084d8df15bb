use rand::{rngs::OsRng, Rng};

/// 32-symbol alphabet without the visually confusable I, O, 0 and 1.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 6;

pub struct CodeGenerator;

impl CodeGenerator {
    /// Generate a random 6-character room code over the alphabet.
    pub fn generate() -> String {
        (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[OsRng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Canonical form used for lookups: trimmed, uppercase.
    pub fn normalize(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }
}
