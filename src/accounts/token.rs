use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

pub const TOKEN_LEN: usize = 40;

/// Fresh opaque token key.
pub fn generate_key() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
