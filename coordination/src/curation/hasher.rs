//! Content hashing for curation artifacts.

/// Black-box `hash(string) -> string` used for content addressing.
pub trait ContentHasher: Send + Sync {
    fn hash(&self, input: &str) -> String;
}

/// Default hasher: BLAKE3, rendered as lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn hash(&self, input: &str) -> String {
        blake3::hash(input.as_bytes()).to_hex().to_string()
    }
}
