use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Every issued token has exactly this many characters
pub const TOKEN_LENGTH: usize = 26;

/// 26 alphanumeric characters from the OS-seeded thread RNG (~154 bits)
pub fn generate_plaintext() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

/// Cheap shape check run before any storage lookup
pub fn is_well_formed(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LENGTH && plaintext.bytes().all(|b| b.is_ascii_alphanumeric())
}
