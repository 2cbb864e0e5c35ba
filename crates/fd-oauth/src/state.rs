//! Anti-forgery state generation

use rand::{thread_rng, Rng};

const STATE_LEN: usize = 32;
const STATE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate the anti-forgery state for a sign-in attempt.
///
/// 32 alphanumeric characters from a thread-local CSPRNG. The value rides
/// along the authorization URL and must be echoed back by the callback
/// before a code is exchanged.
pub fn generate_login_state() -> String {
    let mut rng = thread_rng();
    (0..STATE_LEN)
        .map(|_| STATE_CHARS[rng.gen_range(0..STATE_CHARS.len())] as char)
        .collect()
}
