//! pixx.io digital asset management integration.
//!
//! [`PixxioAssetSource`] resolves credentials and hands out an authenticated
//! [`PixxioClient`]; an [`AssetProxyRepository`] on top of it serves
//! normalized [`AssetRecord`]s through a [`ProxyCache`].

pub mod auto_tagger;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod mapper;
pub mod model;
pub mod project;
pub mod query;
pub mod repository;
pub mod secrets;
pub mod source;

pub use auto_tagger::{AutoTagger, TaggingOutcome};
pub use cache::{MemoryStringCache, ProxyCache, StringCache};
pub use client::{PixxioApi, PixxioClient, SearchResponse};
pub use config::{AssetSourceOptions, Dialect};
pub use error::{ConfigError, PixxioError, Result, SecretsError};
pub use mapper::ResponseMapper;
pub use model::{AssetRecord, Derivatives, IptcMetadata, Tags};
pub use project::{initialize_project, verify_project_initialized};
pub use query::{AssetTypeFilter, CollectionFilter, Query, QueryBuilder, SortDirection};
pub use repository::{AssetProxyRepository, QueryResult};
pub use secrets::{ClientSecret, ClientSecretRepository, RefreshTokenProvider};
pub use source::PixxioAssetSource;
