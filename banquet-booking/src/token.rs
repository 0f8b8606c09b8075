use banquet_shared::LockToken;
use rand::distributions::Alphanumeric;
use rand::Rng;

const TOKEN_PREFIX: &str = "hold_";
const TOKEN_BODY_LEN: usize = 40;

/// A fresh unguessable hold credential drawn from the thread-local CSPRNG.
pub fn generate_lock_token() -> LockToken {
    let body: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_BODY_LEN)
        .map(char::from)
        .collect();
    LockToken::new(format!("{}{}", TOKEN_PREFIX, body))
}
