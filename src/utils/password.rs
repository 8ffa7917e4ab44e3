use anyhow::Result;
use rpassword::prompt_password;
use tracing::warn;

use super::SecureString;

/// Read a secret from the terminal without echo
pub fn prompt_secret(prompt_message: &str) -> Result<SecureString> {
    let secret = SecureString::new(prompt_password(prompt_message)?);
    if secret.is_empty() {
        return Err(anyhow::anyhow!("Input cannot be empty"));
    }
    Ok(secret)
}

/// Use a secret passed on the command line or through the environment, prompting otherwise
pub fn resolve_secret(provided: Option<String>, prompt_message: &str) -> Result<SecureString> {
    match provided {
        Some(value) => {
            warn!("Secret supplied via argument or environment; it may be visible to other processes");
            let secret = SecureString::new(value);
            if secret.is_empty() {
                return Err(anyhow::anyhow!("Provided secret cannot be empty"));
            }
            Ok(secret)
        }
        None => prompt_secret(prompt_message),
    }
}
