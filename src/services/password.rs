use bcrypt::{hash, verify, DEFAULT_COST};

/// One-way password hashing. bcrypt salts internally, so hashing the same
/// plaintext twice yields distinct digests that both verify.
pub fn hash_password(plaintext: &str) -> anyhow::Result<String> {
    Ok(hash(plaintext, DEFAULT_COST)?)
}

/// Constant-time verification. A malformed digest verifies as `false` —
/// callers never learn whether the password or the digest was at fault.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    verify(plaintext, digest).unwrap_or(false)
}
