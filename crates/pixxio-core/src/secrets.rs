//! Encrypted store of per-account pixx.io client secrets.

use magic_crypt::{new_magic_crypt, MagicCrypt256, MagicCryptTrait};
use rpassword::prompt_password;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SecretsError;

/// Used when no key is configured. Deployments should set their own.
pub const DEFAULT_ENCRYPTION_KEY: &str = "pixxio-client-secrets-default-key";

pub const SECRETS_FILE: &str = "secrets.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSecret {
    pub account_identifier: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl ClientSecret {
    pub fn new(account_identifier: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            account_identifier: account_identifier.into(),
            refresh_token: refresh_token.into(),
            access_token: None,
        }
    }
}

/// Looks up the refresh token of an account.
pub trait RefreshTokenProvider {
    fn refresh_token(&self, account_identifier: &str) -> Result<Option<String>, SecretsError>;
}

#[derive(Serialize, Deserialize, Debug)]
struct SecretsContainer {
    encrypted_data: String,
}

pub struct ClientSecretRepository {
    path: PathBuf,
    crypt: MagicCrypt256,
}

impl ClientSecretRepository {
    pub fn new(path: impl Into<PathBuf>, encryption_key: &str) -> Self {
        Self {
            path: path.into(),
            crypt: new_magic_crypt!(encryption_key, 256),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn find_one_by_account(&self, account_identifier: &str) -> Result<Option<ClientSecret>, SecretsError> {
        let mut secrets = self.read_all()?;
        Ok(secrets.remove(account_identifier))
    }

    /// Inserts or replaces the secret of its account.
    pub fn save(&self, secret: ClientSecret) -> Result<(), SecretsError> {
        let mut secrets = self.read_all()?;
        secrets.insert(secret.account_identifier.clone(), secret);
        self.write_all(&secrets)
    }

    pub fn remove(&self, account_identifier: &str) -> Result<(), SecretsError> {
        let mut secrets = self.read_all()?;
        if secrets.remove(account_identifier).is_none() {
            return Err(SecretsError::NotFound(account_identifier.to_string()));
        }
        self.write_all(&secrets)
    }

    /// Account identifiers in lexical order.
    pub fn list_accounts(&self) -> Result<Vec<String>, SecretsError> {
        Ok(self.read_all()?.into_keys().collect())
    }

    /// Stores a refresh token for an account, prompting for it when no value
    /// is given. Any cached access token is discarded.
    pub fn set_refresh_token(&self, account_identifier: &str, value: Option<String>) -> Result<(), SecretsError> {
        let refresh_token = match value {
            Some(v) => v,
            None => prompt_password(format!("Enter pixx.io refresh token for '{}': ", account_identifier))?,
        };
        self.save(ClientSecret::new(account_identifier, refresh_token.trim()))
    }

    fn read_all(&self) -> Result<BTreeMap<String, ClientSecret>, SecretsError> {
        let file_content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        if file_content.trim().is_empty() || file_content.trim() == "{}" {
            return Ok(BTreeMap::new());
        }

        let container: SecretsContainer = serde_json::from_str(&file_content)?;
        let decrypted = self
            .crypt
            .decrypt_base64_to_string(&container.encrypted_data)
            .map_err(|e| SecretsError::Decrypt(e.to_string()))?;
        Ok(serde_json::from_str(&decrypted)?)
    }

    fn write_all(&self, secrets: &BTreeMap<String, ClientSecret>) -> Result<(), SecretsError> {
        let plain = serde_json::to_string(secrets)?;
        let container = SecretsContainer {
            encrypted_data: self.crypt.encrypt_str_to_base64(&plain),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&container)?)?;
        Ok(())
    }
}

impl RefreshTokenProvider for ClientSecretRepository {
    fn refresh_token(&self, account_identifier: &str) -> Result<Option<String>, SecretsError> {
        Ok(self
            .find_one_by_account(account_identifier)?
            .map(|secret| secret.refresh_token))
    }
}
