//! Listing/search queries and their translation into pixx.io request parameters.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use crate::config::{Dialect, ImageOptions};
use crate::error::{PixxioError, Result};

pub const DEFAULT_LIMIT: u32 = 30;

/// Extensions that count as documents.
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

const V1_RESPONSE_FIELDS: &[&str] = &[
    "id",
    "fileName",
    "fileType",
    "keywords",
    "createDate",
    "modifyDate",
    "uploadDate",
    "width",
    "height",
    "originalFileURL",
    "subject",
    "description",
    "fileSize",
    "previewFileURLs",
    "dynamicMetadata",
];

const LEGACY_FIELDS: &[&str] = &[
    "id",
    "originalFilename",
    "fileType",
    "keywords",
    "createDate",
    "imageHeight",
    "imageWidth",
    "originalPath",
    "subject",
    "description",
    "modifyDate",
    "fileSize",
    "modifiedImagePaths",
    "imagePath",
    "dynamicMetadata",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetTypeFilter {
    #[default]
    All,
    Image,
    Video,
    Audio,
    Document,
}

impl AssetTypeFilter {
    /// Whether a file of the given media type belongs in results for this filter.
    pub fn matches(&self, media_type: &str) -> bool {
        match self {
            AssetTypeFilter::All => true,
            AssetTypeFilter::Image => media_type.starts_with("image/"),
            AssetTypeFilter::Video => media_type.starts_with("video/"),
            AssetTypeFilter::Audio => media_type.starts_with("audio/"),
            AssetTypeFilter::Document => DOCUMENT_EXTENSIONS.iter().any(|extension| {
                mime_guess::from_ext(extension)
                    .iter_raw()
                    .any(|candidate| candidate == media_type)
            }),
        }
    }

    fn format_type(&self) -> Option<&'static str> {
        match self {
            AssetTypeFilter::All => Some("converted"),
            AssetTypeFilter::Image => Some("image"),
            AssetTypeFilter::Video => Some("video"),
            AssetTypeFilter::Audio => Some("audio"),
            AssetTypeFilter::Document => None,
        }
    }
}

impl FromStr for AssetTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(AssetTypeFilter::All),
            "image" => Ok(AssetTypeFilter::Image),
            "video" => Ok(AssetTypeFilter::Video),
            "audio" => Ok(AssetTypeFilter::Audio),
            "document" => Ok(AssetTypeFilter::Document),
            other => Err(format!("unknown asset type filter '{}'", other)),
        }
    }
}

impl fmt::Display for AssetTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetTypeFilter::All => "All",
            AssetTypeFilter::Image => "Image",
            AssetTypeFilter::Video => "Video",
            AssetTypeFilter::Audio => "Audio",
            AssetTypeFilter::Document => "Document",
        };
        f.write_str(name)
    }
}

/// Restricts results to one pixx.io category or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionFilter {
    Category(String),
    Directory(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn remote_token(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

/// The only fields pixx.io can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    FileName,
    UploadDate,
}

impl SortField {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "filename" | "fileName" | "resource.filename" => Some(SortField::FileName),
            "lastModified" | "uploadDate" => Some(SortField::UploadDate),
            _ => None,
        }
    }

    fn remote_token(&self) -> &'static str {
        match self {
            SortField::FileName => "fileName",
            SortField::UploadDate => "uploadDate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    search_term: String,
    type_filter: AssetTypeFilter,
    collection_filter: Option<CollectionFilter>,
    offset: u32,
    limit: u32,
    orderings: IndexMap<String, SortDirection>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            type_filter: AssetTypeFilter::All,
            collection_filter: None,
            offset: 0,
            limit: DEFAULT_LIMIT,
            orderings: IndexMap::new(),
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_term(mut self, search_term: impl Into<String>) -> Self {
        self.search_term = search_term.into();
        self
    }

    pub fn with_type_filter(mut self, type_filter: AssetTypeFilter) -> Self {
        self.type_filter = type_filter;
        self
    }

    pub fn with_collection_filter(mut self, collection_filter: Option<CollectionFilter>) -> Self {
        self.collection_filter = collection_filter;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Adds an ordering. Keys pixx.io cannot sort by are kept but ignored
    /// when the request is built.
    pub fn order_by(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
        self.orderings.insert(key.into(), direction);
        self
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn type_filter(&self) -> AssetTypeFilter {
        self.type_filter
    }

    pub fn collection_filter(&self) -> Option<&CollectionFilter> {
        self.collection_filter.as_ref()
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn orderings(&self) -> &IndexMap<String, SortDirection> {
        &self.orderings
    }

    /// 1-based page for page-based paging. Offsets inside a page are not
    /// addressable remotely, so results are page aligned.
    pub fn page(&self) -> u32 {
        if self.limit == 0 {
            return 1;
        }
        (self.offset / self.limit).saturating_add(1)
    }

    /// The first ordering pixx.io supports, if any.
    pub fn sort(&self) -> Option<(SortField, SortDirection)> {
        self.orderings
            .iter()
            .find_map(|(key, direction)| SortField::from_key(key).map(|field| (field, *direction)))
    }
}

/// JSON filter tree understood by the v1 `filter` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "filterType", rename_all = "camelCase")]
pub enum Filter {
    ConnectorAnd {
        filters: Vec<Filter>,
    },
    ConnectorOr {
        filters: Vec<Filter>,
    },
    FormatType {
        #[serde(rename = "formatType")]
        format_type: String,
    },
    FileExtension {
        #[serde(rename = "fileExtension")]
        file_extension: String,
    },
    SearchTerm {
        term: String,
    },
    Category {
        category: String,
    },
    Directory {
        #[serde(rename = "directoryID")]
        directory_id: u64,
        #[serde(rename = "includeSubdirectories")]
        include_subdirectories: bool,
    },
}

impl Filter {
    fn any_of(mut filters: Vec<Filter>) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::ConnectorOr { filters }),
        }
    }

    fn all_of(mut filters: Vec<Filter>) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::ConnectorAnd { filters }),
        }
    }
}

/// Serializes queries for one API dialect.
pub struct QueryBuilder<'a> {
    dialect: Dialect,
    image_options: &'a ImageOptions,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(dialect: Dialect, image_options: &'a ImageOptions) -> Self {
        Self {
            dialect,
            image_options,
        }
    }

    /// The filter tree for a v1 search, `None` when nothing restricts it.
    pub fn filter_tree(&self, query: &Query) -> Option<Filter> {
        let mut filters = Vec::new();

        if !query.search_term().is_empty() {
            filters.push(Filter::SearchTerm {
                term: query.search_term().to_string(),
            });
        }

        match query.type_filter().format_type() {
            Some(format_type) => filters.push(Filter::FormatType {
                format_type: format_type.to_string(),
            }),
            None => {
                let extensions = DOCUMENT_EXTENSIONS
                    .iter()
                    .map(|extension| Filter::FileExtension {
                        file_extension: extension.to_string(),
                    })
                    .collect();
                filters.extend(Filter::any_of(extensions));
            }
        }

        match query.collection_filter() {
            Some(CollectionFilter::Category(category)) => filters.push(Filter::Category {
                category: category.clone(),
            }),
            Some(CollectionFilter::Directory(directory_id)) => filters.push(Filter::Directory {
                directory_id: *directory_id,
                include_subdirectories: true,
            }),
            None => {}
        }

        Filter::all_of(filters)
    }

    /// Query string parameters of a search request. `page_size` overrides the
    /// query's limit (used for counting).
    pub fn search_params(&self, query: &Query, page_size: Option<u32>) -> Result<Vec<(String, String)>> {
        let limit = page_size.unwrap_or(query.limit());
        let page = query.page();
        match self.dialect {
            Dialect::V1 => {
                let mut params = vec![
                    ("page".to_string(), page.to_string()),
                    ("pageSize".to_string(), limit.to_string()),
                ];
                params.extend(self.field_selection_params()?);
                if let Some(tree) = self.filter_tree(query) {
                    params.push(("filter".to_string(), encode(&tree)?));
                }
                if let Some((field, direction)) = query.sort() {
                    params.push(("sortBy".to_string(), field.remote_token().to_string()));
                    params.push(("sortDirection".to_string(), direction.remote_token().to_string()));
                }
                Ok(params)
            }
            Dialect::Legacy => {
                let mut options = json!({
                    "pagination": format!("{}-{}", limit, page),
                    "imageOptions": self.image_options.presets(),
                    "fields": LEGACY_FIELDS,
                });
                match query.type_filter() {
                    AssetTypeFilter::Document => {
                        let file_types: Vec<String> =
                            DOCUMENT_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect();
                        options["fileType"] = json!(file_types.join(","));
                    }
                    AssetTypeFilter::All => {}
                    other => {
                        options["formatType"] = json!(other.format_type());
                    }
                }
                match query.collection_filter() {
                    Some(CollectionFilter::Category(category)) => {
                        options["category"] = json!(format!("sub/{}", category));
                    }
                    Some(CollectionFilter::Directory(_)) => {
                        return Err(PixxioError::UnsupportedOperation(
                            "directory filters require the v1 API".to_string(),
                        ));
                    }
                    None => {}
                }
                if !query.search_term().is_empty() {
                    options["searchTerm"] = json!(urlencoding::encode(query.search_term()));
                }
                if let Some((field, direction)) = query.sort() {
                    options["sortBy"] = json!(field.remote_token());
                    options["sortDirection"] = json!(direction.remote_token());
                }
                Ok(vec![("options".to_string(), encode(&options)?)])
            }
        }
    }

    /// Query string parameters of a single file request.
    pub fn fetch_params(&self) -> Result<Vec<(String, String)>> {
        match self.dialect {
            Dialect::V1 => self.field_selection_params(),
            Dialect::Legacy => {
                let options = json!({
                    "imageOptions": self.image_options.presets(),
                    "fields": LEGACY_FIELDS,
                });
                Ok(vec![("options".to_string(), encode(&options)?)])
            }
        }
    }

    fn field_selection_params(&self) -> Result<Vec<(String, String)>> {
        Ok(vec![
            ("responseFields".to_string(), encode(&V1_RESPONSE_FIELDS)?),
            ("previewFileOptions".to_string(), encode(&self.image_options.presets())?),
        ])
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| PixxioError::MalformedResponse(format!("could not encode request: {}", e)))
}
