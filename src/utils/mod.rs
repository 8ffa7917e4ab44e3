pub mod password;
pub mod secure_string;

pub use password::{prompt_secret, resolve_secret};
pub use secure_string::SecureString;
