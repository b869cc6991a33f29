pub mod crypto;
pub mod signature;
pub mod time;
pub mod token;
