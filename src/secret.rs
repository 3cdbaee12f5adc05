//! Client secret resolution
//!
//! The app secret can be passed directly, read from an environment variable,
//! or looked up by id in a password store file (`<id>:<secret>` per line).

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    #[error("failed to read password store {path}: {source}")]
    ReadStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("password '{id}' not found in {path}")]
    UnknownId { id: String, path: PathBuf },
}

/// Where the client secret comes from
#[derive(Debug, Clone)]
pub enum SecretSource {
    Literal(SecretString),
    Env(String),
    Stored { id: String, store: PathBuf },
}

impl SecretSource {
    /// Resolve to the plaintext secret
    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        match self {
            SecretSource::Literal(secret) => Ok(secret.clone()),
            SecretSource::Env(var) => std::env::var(var)
                .map(|value| SecretString::new(value.into()))
                .map_err(|_| SecretError::MissingEnv(var.clone())),
            SecretSource::Stored { id, store } => lookup_stored(store, id),
        }
    }
}

/// Password store of the monitoring site, if running inside one
pub fn default_password_store() -> Option<PathBuf> {
    std::env::var_os("OMD_ROOT")
        .map(|root| PathBuf::from(root).join("var/check_mk/stored_passwords"))
}

fn lookup_stored(store: &Path, id: &str) -> Result<SecretString, SecretError> {
    let content = std::fs::read_to_string(store).map_err(|source| SecretError::ReadStore {
        path: store.to_path_buf(),
        source,
    })?;

    tracing::debug!("Looking up '{}' in password store {:?}", id, store);

    find_entry(&content, id)
        .map(|secret| SecretString::new(secret.into()))
        .ok_or_else(|| SecretError::UnknownId {
            id: id.to_string(),
            path: store.to_path_buf(),
        })
}

/// First `<id>:<secret>` line for `id`. The secret may itself contain colons.
fn find_entry<'a>(content: &'a str, id: &str) -> Option<&'a str> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(entry_id, _)| *entry_id == id)
        .map(|(_, secret)| secret)
}
