//! The pixx.io asset source as seen by a host application.

use regex::Regex;
use tracing::debug;

use crate::auto_tagger::AutoTagger;
use crate::cache::{ProxyCache, StringCache};
use crate::client::{PixxioApi, PixxioClient};
use crate::config::AssetSourceOptions;
use crate::error::{ConfigError, PixxioError, Result};
use crate::repository::AssetProxyRepository;
use crate::secrets::RefreshTokenProvider;

const IDENTIFIER_PATTERN: &str = r"^[a-z][a-z0-9-]{0,62}[a-z]$";

pub struct PixxioAssetSource {
    identifier: String,
    options: AssetSourceOptions,
}

impl PixxioAssetSource {
    pub fn new(identifier: &str, options: AssetSourceOptions) -> std::result::Result<Self, ConfigError> {
        let valid = Regex::new(IDENTIFIER_PATTERN)
            .map(|pattern| pattern.is_match(identifier))
            .unwrap_or(false);
        if !valid {
            return Err(ConfigError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(Self {
            identifier: identifier.to_string(),
            options,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> &'static str {
        "pixx.io"
    }

    pub fn description(&self) -> &str {
        self.options.description().unwrap_or("")
    }

    pub fn icon_uri(&self) -> &str {
        self.options.icon().unwrap_or("")
    }

    /// Assets are managed in pixx.io; the host never writes them back.
    pub fn is_read_only(&self) -> bool {
        true
    }

    pub fn options(&self) -> &AssetSourceOptions {
        &self.options
    }

    /// Builds an authenticated client for `account`.
    ///
    /// The account's own refresh token wins; without one the configured shared
    /// refresh token is used.
    pub fn connect<P: RefreshTokenProvider>(&self, account: &str, provider: &P) -> Result<PixxioClient> {
        let refresh_token = provider
            .refresh_token(account)?
            .filter(|token| !token.trim().is_empty())
            .or_else(|| {
                self.options.shared_refresh_token().map(|token| {
                    debug!("Using shared refresh token for account {}", account);
                    token.to_string()
                })
            })
            .ok_or_else(|| PixxioError::MissingClientSecret {
                account: account.to_string(),
            })?;

        let mut client = PixxioClient::new(&self.options)?;
        client.authenticate(&refresh_token)?;
        Ok(client)
    }

    pub fn repository<'a, A: PixxioApi, S: StringCache>(
        &'a self,
        api: &'a A,
        cache: &'a ProxyCache<S>,
    ) -> AssetProxyRepository<'a, A, S> {
        AssetProxyRepository::new(api, cache, &self.options)
    }

    pub fn auto_tagger<'a, A: PixxioApi>(&'a self, api: &'a A) -> AutoTagger<'a, A> {
        AutoTagger::new(api, self.options.auto_tagging())
    }
}
