//! API token storage with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use thiserror::Error;

use crate::config_profiles::normalize_text_option;

pub const API_TOKEN_ENV: &str = "ATTEND_API_TOKEN";

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "attend-cli";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
    #[error("Token cannot be empty")]
    EmptyToken,
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Where the effective token for a profile came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    Keychain,
}

impl TokenSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Environment => API_TOKEN_ENV,
            Self::Keychain => "keychain",
        }
    }
}

#[derive(Clone)]
struct TokenStore {
    username: String,
}

impl TokenStore {
    fn new(profile_name: &str) -> Self {
        Self {
            username: format!("api_token:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(not(test))]
    fn load(&self) -> AuthResult<Option<String>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load(&self) -> AuthResult<Option<String>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(guard.get(&self.username).cloned())
    }

    #[cfg(not(test))]
    fn save(&self, token: &str) -> AuthResult<()> {
        self.entry()?
            .set_password(token)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save(&self, token: &str) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), token.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn clear(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub fn store_token(profile_name: &str, token: &str) -> AuthResult<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    TokenStore::new(profile_name).save(token)
}

pub fn load_stored_token(profile_name: &str) -> AuthResult<Option<String>> {
    Ok(normalize_text_option(TokenStore::new(profile_name).load()?))
}

pub fn clear_stored_token(profile_name: &str) -> AuthResult<()> {
    TokenStore::new(profile_name).clear()
}

/// Effective token: `ATTEND_API_TOKEN` first, then the keychain
pub fn resolve_token(profile_name: &str) -> AuthResult<Option<(String, TokenSource)>> {
    if let Some(token) = normalize_text_option(std::env::var(API_TOKEN_ENV).ok()) {
        return Ok(Some((token, TokenSource::Environment)));
    }
    Ok(load_stored_token(profile_name)?.map(|token| (token, TokenSource::Keychain)))
}
