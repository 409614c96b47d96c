//! LMS credentials and their storage in the OS keyring.

use std::fmt;

use crate::error::CredentialError;

/// Base URL plus bearer token for one LMS account.
///
/// The token never appears in `Debug` output so a credential can be passed
/// through `tracing` fields safely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub base_url: String,
    pub token: String,
}

impl Credential {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Thin wrapper around the OS keyring for the LMS token.
pub mod keyring_store {
    use super::CredentialError;

    const SERVICE: &str = "coursesync";
    pub const TOKEN_KEY: &str = "lms_token";

    pub fn get(key: &str) -> Result<Option<String>, CredentialError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    pub fn delete(key: &str) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Persist the LMS token.
pub fn store_token(token: &str) -> Result<(), CredentialError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CredentialError::EmptyToken);
    }
    keyring_store::set(keyring_store::TOKEN_KEY, token)
}

/// Load the stored LMS token.
pub fn load_token() -> Result<String, CredentialError> {
    keyring_store::get(keyring_store::TOKEN_KEY)?
        .filter(|t| !t.is_empty())
        .ok_or(CredentialError::NotConfigured)
}

/// Remove the stored LMS token (no-op when absent).
pub fn clear_token() -> Result<(), CredentialError> {
    keyring_store::delete(keyring_store::TOKEN_KEY)
}
