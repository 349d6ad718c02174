//! Blocking pixx.io REST client.
//!
//! One client serves one logical operation: it exchanges the refresh token
//! once and keeps the access token in memory until it is dropped. Expired
//! tokens surface as [`PixxioError::AuthenticationFailed`]; callers
//! re-authenticate and retry.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{AssetSourceOptions, Dialect, ImageOptions};
use crate::error::{PixxioError, Result};
use crate::model::Tags;
use crate::query::{Query, QueryBuilder};

/// Raw result page of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub records: Vec<Value>,
    /// Total number of matches across all pages.
    pub total_count: u64,
}

/// Operations the asset source needs from pixx.io.
pub trait PixxioApi {
    fn fetch_by_id(&self, identifier: &str) -> Result<Value>;
    fn search(&self, query: &Query) -> Result<SearchResponse>;
    fn count(&self, query: &Query) -> Result<u64>;
    fn update_tags(&self, identifier: &str, tags: &Tags) -> Result<()>;
    fn list_categories(&self) -> Result<Vec<Value>>;
    fn list_directories(&self) -> Result<Vec<Value>>;
}

pub struct PixxioClient {
    http: Client,
    api_endpoint_uri: String,
    api_key: String,
    dialect: Dialect,
    image_options: ImageOptions,
    access_token: Option<String>,
}

/// A decoded response before its payload has been interpreted.
struct ApiResponse {
    status: StatusCode,
    body: Option<Value>,
    text: String,
}

enum Outcome {
    Success(Map<String, Value>),
    Failure { status: Option<u16>, message: String },
    NotAnObject,
}

impl PixxioClient {
    pub fn new(options: &AssetSourceOptions) -> Result<Self> {
        let client_options = options.api_client_options();
        let mut builder = Client::builder().user_agent(
            client_options
                .user_agent
                .clone()
                .unwrap_or_else(|| format!("pixxio-asset-source/{}", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(timeout) = client_options.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        if let Some(connect_timeout) = client_options.connect_timeout {
            builder = builder.connect_timeout(Duration::from_secs(connect_timeout));
        }
        if client_options.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| PixxioError::from_transport("Could not build HTTP client", e))?;

        Ok(Self {
            http,
            api_endpoint_uri: options.api_endpoint_uri().to_string(),
            api_key: options.api_key().to_string(),
            dialect: options.api_dialect(),
            image_options: options.image_options().clone(),
            access_token: None,
        })
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Exchanges a refresh token for an access token.
    pub fn authenticate(&mut self, refresh_token: &str) -> Result<()> {
        let url = self.endpoint("accessToken");
        debug!("POST {}", url);
        let request = self.http.post(&url).form(&[
            ("apiKey", self.api_key.as_str()),
            ("refreshToken", refresh_token),
        ]);

        let response = request
            .send()
            .map_err(|e| PixxioError::AuthenticationFailed(format!("Authentication failed: {}", e)))?;
        let response = Self::decode(response)
            .map_err(|e| PixxioError::AuthenticationFailed(format!("Authentication failed: {}", e)))?;

        match Self::outcome(response) {
            Outcome::Success(body) => match body.get("accessToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => {
                    self.access_token = Some(token.to_string());
                    Ok(())
                }
                _ => Err(PixxioError::AuthenticationFailed(
                    "Authentication failed: response carries no access token".to_string(),
                )),
            },
            Outcome::Failure { message, .. } => Err(PixxioError::AuthenticationFailed(format!(
                "Authentication failed: {}",
                message
            ))),
            Outcome::NotAnObject => Err(PixxioError::AuthenticationFailed(
                "Authentication failed: unexpected response".to_string(),
            )),
        }
    }

    /// Updates writable file metadata. pixx.io only accepts keyword updates.
    pub fn update_file(&self, identifier: &str, metadata: &Map<String, Value>) -> Result<()> {
        if metadata.keys().any(|key| key != "keywords") {
            return Err(PixxioError::UnsupportedOperation(
                "updating file metadata other than keywords is not supported".to_string(),
            ));
        }
        let tags = match metadata.get("keywords") {
            Some(Value::String(keywords)) => Tags::from_comma_separated(keywords),
            Some(Value::Array(keywords)) => Tags::new(keywords.iter().filter_map(Value::as_str)),
            _ => {
                return Err(PixxioError::UnsupportedOperation(
                    "keywords must be given as a string or a list of strings".to_string(),
                ))
            }
        };
        self.update_tags(identifier, &tags)
    }

    fn endpoint(&self, resource: &str) -> String {
        let prefix = match self.dialect {
            Dialect::V1 => "api/v1",
            Dialect::Legacy => "json",
        };
        format!("{}/{}/{}", self.api_endpoint_uri, prefix, resource)
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self.dialect, &self.image_options)
    }

    fn token(&self) -> Result<&str> {
        self.access_token.as_deref().ok_or_else(|| {
            PixxioError::AuthenticationFailed("client has not been authenticated".to_string())
        })
    }

    /// Attaches the access token the way the dialect expects it.
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token()?;
        Ok(match self.dialect {
            Dialect::V1 => request.bearer_auth(token),
            Dialect::Legacy => request.query(&[("accessToken", token)]),
        })
    }

    fn get(&self, resource: &str, params: &[(String, String)], context: &str) -> Result<ApiResponse> {
        let url = self.endpoint(resource);
        debug!("GET {}", url);
        let request = self.authorized(self.http.get(&url).query(params))?;
        let response = request
            .send()
            .map_err(|e| PixxioError::from_transport(context, e))?;
        Self::decode(response).map_err(|e| PixxioError::from_transport(context, e))
    }

    fn decode(response: reqwest::blocking::Response) -> std::result::Result<ApiResponse, reqwest::Error> {
        let status = response.status();
        let text = response.text()?;
        let body = serde_json::from_str(&text).ok();
        Ok(ApiResponse { status, body, text })
    }

    fn outcome(response: ApiResponse) -> Outcome {
        let http_failure = (!response.status.is_success()).then(|| response.status.as_u16());
        match response.body {
            Some(Value::Object(body)) => {
                let succeeded = match body.get("success") {
                    Some(Value::Bool(flag)) => *flag,
                    Some(Value::String(flag)) => flag == "true",
                    _ => http_failure.is_none(),
                };
                if succeeded && http_failure.is_none() {
                    return Outcome::Success(body);
                }
                let status = http_failure.or_else(|| match body.get("status") {
                    Some(Value::Number(n)) => n.as_u64().and_then(|s| u16::try_from(s).ok()),
                    Some(Value::String(s)) => s.parse().ok(),
                    _ => None,
                });
                let message = ["errorMessage", "help", "message"]
                    .iter()
                    .find_map(|key| body.get(*key).and_then(Value::as_str))
                    .unwrap_or("Unknown cause")
                    .to_string();
                Outcome::Failure { status, message }
            }
            _ => match http_failure {
                Some(status) => Outcome::Failure {
                    status: Some(status),
                    message: response.text.chars().take(200).collect(),
                },
                None => Outcome::NotAnObject,
            },
        }
    }

    /// Entries of a listing endpoint, e.g. `categories`.
    fn list(&self, resource: &str, key: &str) -> Result<Vec<Value>> {
        let context = format!("Retrieving {} failed", resource);
        let response = self.get(resource, &[], &context)?;
        match Self::outcome(response) {
            Outcome::Success(mut body) => match body.remove(key) {
                Some(Value::Array(entries)) => Ok(entries),
                Some(Value::Object(entries)) => Ok(entries.into_iter().map(|(_, v)| v).collect()),
                _ => Ok(Vec::new()),
            },
            Outcome::Failure { status: Some(401), message } => {
                Err(PixxioError::AuthenticationFailed(message))
            }
            Outcome::Failure { message, .. } => {
                Err(PixxioError::ConnectionFailed(format!("{}: {}", context, message)))
            }
            Outcome::NotAnObject => Err(PixxioError::MalformedResponse(format!(
                "{}: response is not a JSON object",
                context
            ))),
        }
    }

    fn search_page(&self, query: &Query, page_size: Option<u32>) -> Result<SearchResponse> {
        let params = self.builder().search_params(query, page_size)?;
        let response = self.get("files", &params, "Search failed")?;
        match Self::outcome(response) {
            Outcome::Success(mut body) => {
                let records = match body.remove("files") {
                    Some(Value::Array(files)) => files,
                    Some(Value::Object(files)) => files.into_iter().map(|(_, v)| v).collect(),
                    _ => Vec::new(),
                };
                let total_count = match body.get("quantity") {
                    Some(Value::Number(n)) => n.as_u64(),
                    Some(Value::String(s)) => s.parse().ok(),
                    _ => None,
                }
                .unwrap_or(records.len() as u64);
                Ok(SearchResponse {
                    records,
                    total_count,
                })
            }
            Outcome::Failure { status: Some(401), message } => {
                Err(PixxioError::AuthenticationFailed(message))
            }
            Outcome::Failure { message, .. } => Err(PixxioError::ConnectionFailed(format!(
                "Query to pixx.io failed: {}",
                message
            ))),
            Outcome::NotAnObject => Err(PixxioError::MalformedResponse(
                "search response is not a JSON object".to_string(),
            )),
        }
    }
}

impl PixxioApi for PixxioClient {
    fn fetch_by_id(&self, identifier: &str) -> Result<Value> {
        let params = self.builder().fetch_params()?;
        let resource = format!("files/{}", urlencoding::encode(identifier));
        let response = self.get(&resource, &params, "Retrieving file failed")?;

        match Self::outcome(response) {
            Outcome::Success(mut body) => match body.remove("file") {
                Some(file @ Value::Object(_)) => Ok(file),
                _ => {
                    body.remove("success");
                    Ok(Value::Object(body))
                }
            },
            Outcome::Failure { status: Some(401), message } => {
                Err(PixxioError::AuthenticationFailed(message))
            }
            Outcome::Failure { status: Some(403), message } => Err(PixxioError::AccessDenied {
                identifier: identifier.to_string(),
                message,
            }),
            Outcome::Failure { message, .. } => Err(PixxioError::AssetNotFound {
                identifier: identifier.to_string(),
                message,
            }),
            Outcome::NotAnObject => Err(PixxioError::AssetNotFound {
                identifier: identifier.to_string(),
                message: "unexpected API response".to_string(),
            }),
        }
    }

    fn search(&self, query: &Query) -> Result<SearchResponse> {
        self.search_page(query, None)
    }

    fn count(&self, query: &Query) -> Result<u64> {
        self.search_page(query, Some(1)).map(|page| page.total_count)
    }

    fn update_tags(&self, identifier: &str, tags: &Tags) -> Result<()> {
        let resource = format!("files/{}", urlencoding::encode(identifier));
        let url = self.endpoint(&resource);
        debug!("PUT {}", url);
        let request = match self.dialect {
            Dialect::V1 => self.http.put(&url).json(&json!({ "keywords": tags.sorted() })),
            Dialect::Legacy => {
                let options = json!({ "keywords": tags.to_keyword_string() }).to_string();
                self.http.put(&url).form(&[("options", options)])
            }
        };
        let context = "Updating file failed";
        let response = self
            .authorized(request)?
            .send()
            .map_err(|e| PixxioError::from_transport(context, e))?;
        let response = Self::decode(response).map_err(|e| PixxioError::from_transport(context, e))?;

        match Self::outcome(response) {
            Outcome::Success(_) => {
                info!("Updated keywords of pixx.io asset {}: {}", identifier, tags.to_keyword_string());
                Ok(())
            }
            Outcome::Failure { status: Some(401), message } => {
                Err(PixxioError::AuthenticationFailed(message))
            }
            Outcome::Failure { status: Some(403), message } => Err(PixxioError::AccessDenied {
                identifier: identifier.to_string(),
                message,
            }),
            Outcome::Failure { status: Some(404), message } => Err(PixxioError::AssetNotFound {
                identifier: identifier.to_string(),
                message,
            }),
            Outcome::Failure { message, .. } => {
                Err(PixxioError::ConnectionFailed(format!("{}: {}", context, message)))
            }
            Outcome::NotAnObject => Err(PixxioError::MalformedResponse(
                "update response is not a JSON object".to_string(),
            )),
        }
    }

    fn list_categories(&self) -> Result<Vec<Value>> {
        self.list("categories", "categories")
    }

    fn list_directories(&self) -> Result<Vec<Value>> {
        if self.dialect == Dialect::Legacy {
            return Err(PixxioError::UnsupportedOperation(
                "directories are only available through the v1 API".to_string(),
            ));
        }
        self.list("directories", "directories")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: serde_json::from_str(body).ok(),
            text: body.to_string(),
        }
    }

    #[test]
    fn test_outcome_accepts_string_and_bool_success() {
        assert!(matches!(
            PixxioClient::outcome(response(200, r#"{"success":"true"}"#)),
            Outcome::Success(_)
        ));
        assert!(matches!(
            PixxioClient::outcome(response(200, r#"{"success":true}"#)),
            Outcome::Success(_)
        ));
    }

    #[test]
    fn test_outcome_reads_payload_status_and_help() {
        match PixxioClient::outcome(response(200, r#"{"success":"false","status":403,"help":"no access"}"#)) {
            Outcome::Failure { status, message } => {
                assert_eq!(status, Some(403));
                assert_eq!(message, "no access");
            }
            _ => panic!("expected a failure"),
        }
    }

    #[test]
    fn test_outcome_prefers_http_status() {
        match PixxioClient::outcome(response(404, "not found")) {
            Outcome::Failure { status, message } => {
                assert_eq!(status, Some(404));
                assert_eq!(message, "not found");
            }
            _ => panic!("expected a failure"),
        }
        assert!(matches!(
            PixxioClient::outcome(response(200, "[]")),
            Outcome::NotAnObject
        ));
    }

    #[test]
    fn test_update_file_rejects_other_metadata() {
        let options = AssetSourceOptions::from_json_value(json!({
            "apiEndpointUri": "https://example.pixxio.media",
            "apiKey": "key"
        }))
        .unwrap();
        let client = PixxioClient::new(&options).unwrap();
        let mut metadata = Map::new();
        metadata.insert("subject".to_string(), json!("New title"));
        assert!(matches!(
            client.update_file("1", &metadata),
            Err(PixxioError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_requests_need_authentication() {
        let options = AssetSourceOptions::from_json_value(json!({
            "apiEndpointUri": "https://example.pixxio.media",
            "apiKey": "key"
        }))
        .unwrap();
        let client = PixxioClient::new(&options).unwrap();
        assert!(matches!(
            client.fetch_by_id("1"),
            Err(PixxioError::AuthenticationFailed(_))
        ));
    }
}
