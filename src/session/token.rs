use rand::{distr::Alphanumeric, Rng};

/// 40 alphanumeric characters carry ~238 bits, above the 24 bytes a token needs
pub const TOKEN_LENGTH: usize = 40;

/// Generates a fresh opaque session token from the thread-local CSPRNG
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
