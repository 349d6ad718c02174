//! Asset source options, parsed once and validated up front.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

pub const DEFAULT_IN_USE_TAG: &str = "used-by-neos";

/// Which generation of the pixx.io REST API the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `/api/v1/*`, bearer auth, `page`/`pageSize` and JSON filter trees.
    #[default]
    V1,
    /// `/json/*`, access token in the query string and a single `options` param.
    Legacy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiClientOptions {
    /// Total request timeout in seconds.
    pub timeout: Option<u64>,
    /// Connect timeout in seconds.
    pub connect_timeout: Option<u64>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MediaTypeOptions {
    #[serde(default = "default_true")]
    pub use_pixxio_thumbnail_as_original: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoTaggingOptions {
    pub enable: bool,
    pub in_use_tag: String,
}

impl Default for AutoTaggingOptions {
    fn default() -> Self {
        Self {
            enable: false,
            in_use_tag: DEFAULT_IN_USE_TAG.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawAutoTaggingOptions {
    #[serde(default)]
    enable: bool,
    in_use_tag: Option<String>,
}

/// Rendering options for one generated derivative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ImageOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ImageOptions {
    pub thumbnail_uri: Option<ImageOption>,
    pub preview_uri: Option<ImageOption>,
    pub original_uri: Option<ImageOption>,
}

impl ImageOptions {
    /// The three derivative presets in positional order: thumbnail, preview,
    /// scaled original. Unset presets fall back to the built-in defaults.
    pub fn presets(&self) -> [ImageOption; 3] {
        let defaults = [
            ImageOption {
                width: Some(400),
                height: Some(400),
                quality: Some(90),
                ..Default::default()
            },
            ImageOption {
                width: Some(1500),
                height: Some(1500),
                quality: Some(90),
                ..Default::default()
            },
            ImageOption {
                size_max: Some(1920),
                quality: Some(90),
                ..Default::default()
            },
        ];
        let configured = [&self.thumbnail_uri, &self.preview_uri, &self.original_uri];

        let mut presets = defaults;
        for (preset, configured) in presets.iter_mut().zip(configured) {
            if let Some(option) = configured {
                let mut option = option.clone();
                // Uncropped derivatives keep their aspect ratio, so height is meaningless.
                if option.crop == Some(false) && option.height.is_some() {
                    option.height = None;
                    option.crop = None;
                }
                *preset = option;
            }
        }
        presets
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawAssetSourceOptions {
    api_endpoint_uri: Option<String>,
    api_key: Option<String>,
    #[serde(default)]
    api_client_options: ApiClientOptions,
    shared_refresh_token: Option<String>,
    #[serde(default)]
    media_types: BTreeMap<String, MediaTypeOptions>,
    auto_tagging: Option<RawAutoTaggingOptions>,
    #[serde(default)]
    image_options: ImageOptions,
    #[serde(default)]
    api_dialect: Dialect,
    icon: Option<String>,
    description: Option<String>,
}

/// Validated configuration of one pixx.io asset source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSourceOptions {
    api_endpoint_uri: String,
    api_key: String,
    api_client_options: ApiClientOptions,
    shared_refresh_token: Option<String>,
    media_types: BTreeMap<String, MediaTypeOptions>,
    auto_tagging: AutoTaggingOptions,
    image_options: ImageOptions,
    api_dialect: Dialect,
    icon: Option<String>,
    description: Option<String>,
}

impl AssetSourceOptions {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawAssetSourceOptions = serde_yaml::from_str(content)?;
        Self::validate(raw)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let raw: RawAssetSourceOptions = serde_json::from_value(value)?;
        Self::validate(raw)
    }

    /// Loads options from a YAML (or JSON, which is valid YAML) file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    fn validate(raw: RawAssetSourceOptions) -> Result<Self, ConfigError> {
        let endpoint = raw
            .api_endpoint_uri
            .ok_or(ConfigError::MissingOption("apiEndpointUri"))?;
        let parsed = reqwest::Url::parse(&endpoint).map_err(|e| ConfigError::InvalidOption {
            option: "apiEndpointUri",
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidOption {
                option: "apiEndpointUri",
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let api_endpoint_uri = endpoint.trim_end_matches('/').to_string();

        let api_key = raw.api_key.ok_or(ConfigError::MissingOption("apiKey"))?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::InvalidOption {
                option: "apiKey",
                reason: "must not be empty".to_string(),
            });
        }

        if let Some(token) = &raw.shared_refresh_token {
            if token.trim().is_empty() {
                return Err(ConfigError::InvalidOption {
                    option: "sharedRefreshToken",
                    reason: "must not be empty".to_string(),
                });
            }
        }

        for media_type in raw.media_types.keys() {
            if mime_guess::get_mime_extensions_str(media_type).is_none() {
                return Err(ConfigError::UnknownMediaType(media_type.clone()));
            }
        }

        let auto_tagging = match raw.auto_tagging {
            None => AutoTaggingOptions::default(),
            Some(raw_tagging) => {
                let in_use_tag = match raw_tagging.in_use_tag {
                    None => DEFAULT_IN_USE_TAG.to_string(),
                    Some(tag) => {
                        let sanitized = sanitize_tag(&tag);
                        if sanitized.trim().is_empty() {
                            return Err(ConfigError::InvalidOption {
                                option: "autoTagging.inUseTag",
                                reason: format!("'{}' contains no usable characters", tag),
                            });
                        }
                        sanitized
                    }
                };
                AutoTaggingOptions {
                    enable: raw_tagging.enable,
                    in_use_tag,
                }
            }
        };

        Ok(Self {
            api_endpoint_uri,
            api_key,
            api_client_options: raw.api_client_options,
            shared_refresh_token: raw.shared_refresh_token,
            media_types: raw.media_types,
            auto_tagging,
            image_options: raw.image_options,
            api_dialect: raw.api_dialect,
            icon: raw.icon,
            description: raw.description,
        })
    }

    pub fn api_endpoint_uri(&self) -> &str {
        &self.api_endpoint_uri
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_client_options(&self) -> &ApiClientOptions {
        &self.api_client_options
    }

    pub fn shared_refresh_token(&self) -> Option<&str> {
        self.shared_refresh_token.as_deref()
    }

    pub fn auto_tagging(&self) -> &AutoTaggingOptions {
        &self.auto_tagging
    }

    pub fn image_options(&self) -> &ImageOptions {
        &self.image_options
    }

    pub fn api_dialect(&self) -> Dialect {
        self.api_dialect
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether the generated JPEG derivative stands in for the original file
    /// of the given media type. Unconfigured media types always substitute.
    pub fn use_thumbnail_as_original(&self, media_type: &str) -> bool {
        self.media_types
            .get(media_type)
            .map(|options| options.use_pixxio_thumbnail_as_original)
            .unwrap_or(true)
    }
}

fn default_true() -> bool {
    true
}

/// Strips everything pixx.io does not accept in a keyword.
fn sanitize_tag(tag: &str) -> String {
    match Regex::new(r"[^A-Za-z0-9&_+ßäöüÄÖÜ.@ -]+") {
        Ok(pattern) => pattern.replace_all(tag, "").into_owned(),
        Err(_) => tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "apiEndpointUri": "https://demo.pixxio.media/cgi-bin/api/pixxio-api.pl/",
            "apiKey": "abc123"
        })
    }

    #[test]
    fn test_minimal_options_use_defaults() {
        let options = AssetSourceOptions::from_json_value(minimal()).unwrap();
        assert_eq!(
            options.api_endpoint_uri(),
            "https://demo.pixxio.media/cgi-bin/api/pixxio-api.pl"
        );
        assert_eq!(options.api_dialect(), Dialect::V1);
        assert!(!options.auto_tagging().enable);
        assert_eq!(options.auto_tagging().in_use_tag, DEFAULT_IN_USE_TAG);
        assert!(options.use_thumbnail_as_original("image/png"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut value = minimal();
        value["apiSecret"] = json!("nope");
        let result = AssetSourceOptions::from_json_value(value);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let result = AssetSourceOptions::from_json_value(json!({
            "apiEndpointUri": "https://example.com"
        }));
        assert!(matches!(result, Err(ConfigError::MissingOption("apiKey"))));
    }

    #[test]
    fn test_empty_shared_refresh_token_is_rejected() {
        let mut value = minimal();
        value["sharedRefreshToken"] = json!("  ");
        let result = AssetSourceOptions::from_json_value(value);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOption { option: "sharedRefreshToken", .. })
        ));
    }

    #[test]
    fn test_unknown_media_type_is_rejected() {
        let mut value = minimal();
        value["mediaTypes"] = json!({ "image/not-a-thing": { "usePixxioThumbnailAsOriginal": false } });
        let result = AssetSourceOptions::from_json_value(value);
        assert!(matches!(result, Err(ConfigError::UnknownMediaType(_))));
    }

    #[test]
    fn test_media_type_flag_controls_substitution() {
        let mut value = minimal();
        value["mediaTypes"] = json!({ "image/jpeg": { "usePixxioThumbnailAsOriginal": false } });
        let options = AssetSourceOptions::from_json_value(value).unwrap();
        assert!(!options.use_thumbnail_as_original("image/jpeg"));
        assert!(options.use_thumbnail_as_original("image/png"));
    }

    #[test]
    fn test_in_use_tag_is_sanitized() {
        let mut value = minimal();
        value["autoTagging"] = json!({ "enable": true, "inUseTag": "in use <by> cms!" });
        let options = AssetSourceOptions::from_json_value(value).unwrap();
        assert!(options.auto_tagging().enable);
        assert_eq!(options.auto_tagging().in_use_tag, "in use by cms");
    }

    #[test]
    fn test_unknown_auto_tagging_key_is_rejected() {
        let mut value = minimal();
        value["autoTagging"] = json!({ "enabled": true });
        assert!(AssetSourceOptions::from_json_value(value).is_err());
    }

    #[test]
    fn test_yaml_options() {
        let yaml = r#"
apiEndpointUri: "https://example.pixxio.media"
apiKey: "key"
apiDialect: legacy
apiClientOptions:
  timeout: 10
imageOptions:
  previewUri:
    width: 800
    height: 600
    crop: false
"#;
        let options = AssetSourceOptions::from_yaml_str(yaml).unwrap();
        assert_eq!(options.api_dialect(), Dialect::Legacy);
        assert_eq!(options.api_client_options().timeout, Some(10));

        let presets = options.image_options().presets();
        assert_eq!(presets[0].width, Some(400));
        assert_eq!(presets[1].width, Some(800));
        assert_eq!(presets[1].height, None);
        assert_eq!(presets[2].size_max, Some(1920));
    }
}
