use anyhow::Context;
use sha2::{Digest, Sha256};

pub const TOKEN_BYTES: usize = 32;

/// 32 bytes from the OS RNG, hex encoded (64 chars).
pub fn generate_token() -> anyhow::Result<String> {
    let mut buf = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut buf).context("OS random number generator unavailable")?;
    Ok(hex::encode(buf))
}

/// SHA-256 hex digest. Only digests of refresh, reset and verification
/// tokens are persisted.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
