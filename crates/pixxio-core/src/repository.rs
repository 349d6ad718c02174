//! Cached, normalized access to pixx.io assets.

use tracing::debug;

use crate::cache::{ProxyCache, StringCache};
use crate::client::PixxioApi;
use crate::config::AssetSourceOptions;
use crate::error::{PixxioError, Result};
use crate::mapper::{record_identifier, ResponseMapper};
use crate::model::AssetRecord;
use crate::query::Query;

/// One page of normalized search results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub records: Vec<AssetRecord>,
    /// Total matches reported by pixx.io, before client-side filtering.
    pub total_count: u64,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct AssetProxyRepository<'a, A: PixxioApi, S: StringCache> {
    api: &'a A,
    cache: &'a ProxyCache<S>,
    mapper: ResponseMapper<'a>,
}

impl<'a, A: PixxioApi, S: StringCache> AssetProxyRepository<'a, A, S> {
    pub fn new(api: &'a A, cache: &'a ProxyCache<S>, options: &'a AssetSourceOptions) -> Self {
        Self {
            api,
            cache,
            mapper: ResponseMapper::new(options),
        }
    }

    /// Returns one asset, served from the cache when possible.
    pub fn get_asset_proxy(&self, identifier: &str) -> Result<AssetRecord> {
        if let Some(raw) = self.cache.get(identifier) {
            match self.mapper.map(&raw) {
                Ok(record) => return Ok(record),
                Err(e) => debug!("Ignoring cached asset {}: {}", identifier, e),
            }
        }
        let raw = self.api.fetch_by_id(identifier)?;
        let record = self.mapper.map(&raw)?;
        self.cache.set(identifier, &raw);
        Ok(record)
    }

    /// Runs a search. Cached records win over the search result's copy.
    /// Records that do not match the type filter are dropped; a record that
    /// cannot be mapped fails the whole search.
    pub fn find(&self, query: &Query) -> Result<QueryResult> {
        let response = self.api.search(query)?;
        let type_filter = query.type_filter();

        let mut records = Vec::with_capacity(response.records.len());
        for raw in &response.records {
            let identifier = record_identifier(raw).ok_or_else(|| {
                PixxioError::MalformedResponse("search result has no id".to_string())
            })?;
            let from_cache = self.cache.get(&identifier).and_then(|cached| {
                self.mapper
                    .map(&cached)
                    .map_err(|e| debug!("Ignoring cached asset {}: {}", identifier, e))
                    .ok()
            });
            let record = match from_cache {
                Some(record) => record,
                None => {
                    let record = self.mapper.map(raw).map_err(|e| {
                        PixxioError::MalformedResponse(format!(
                            "search result {} could not be mapped: {}",
                            identifier, e
                        ))
                    })?;
                    self.cache.set(&identifier, raw);
                    record
                }
            };
            if !type_filter.matches(&record.remote_media_type) {
                debug!(
                    "Dropping {} ({}), it does not match filter {}",
                    record.identifier, record.remote_media_type, type_filter
                );
                continue;
            }
            records.push(record);
        }

        Ok(QueryResult {
            records,
            total_count: response.total_count,
        })
    }

    pub fn find_all(&self) -> Result<QueryResult> {
        self.find(&Query::new())
    }

    /// pixx.io has no filter for untagged files, so this lists everything.
    pub fn find_untagged(&self) -> Result<QueryResult> {
        self.find_all()
    }

    pub fn find_by_search_term(&self, search_term: &str) -> Result<QueryResult> {
        self.find(&Query::new().with_search_term(search_term))
    }

    /// Keywords are part of the pixx.io full text index.
    pub fn find_by_tag(&self, tag: &str) -> Result<QueryResult> {
        self.find_by_search_term(tag)
    }

    pub fn count(&self, query: &Query) -> Result<u64> {
        self.api.count(query)
    }

    pub fn flush_cache(&self) -> Result<()> {
        self.cache.flush()
    }
}
