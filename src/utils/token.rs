use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub const USER_ID_PREFIX: &str = "user_";
pub const ACCOUNT_ID_PREFIX: &str = "acct_";
const USER_ID_RANDOM_LEN: usize = 21;
const SESSION_ID_LEN: usize = 32;

pub fn generate_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn generate_user_id() -> String {
    format!("{}{}", USER_ID_PREFIX, generate_token(USER_ID_RANDOM_LEN))
}

pub fn generate_account_id() -> String {
    format!("{}{}", ACCOUNT_ID_PREFIX, generate_token(USER_ID_RANDOM_LEN))
}

pub fn generate_session_id() -> String {
    generate_token(SESSION_ID_LEN)
}
