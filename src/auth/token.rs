//! Random tokens for session IDs, CSRF tokens and password reset links.

/// The number of random bytes in a token, before hex encoding.
const TOKEN_BYTES: usize = 32;

/// Generate a random token of 32 bytes encoded as 64 lowercase hex characters.
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();

    hex::encode(bytes)
}
