//! Maps raw pixx.io file records onto [`AssetRecord`].
//!
//! pixx.io has changed its response layout several times. Every field that
//! moved is resolved through a small variant type: the current shape is tried
//! first, the older one only when the current one is absent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::AssetSourceOptions;
use crate::error::{PixxioError, Result};
use crate::model::{last_modified_fallback, AssetRecord, Derivatives, IptcMetadata, Tags};

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";
/// Extension of the generated derivative pixx.io renders for every asset.
const DERIVATIVE_EXTENSION: &str = "jpg";

pub struct ResponseMapper<'a> {
    options: &'a AssetSourceOptions,
}

/// Where the derivative URIs live in a record.
enum DerivativePaths<'a> {
    /// `["thumb", "preview", "scaled"]`
    Positional(&'a [Value]),
    /// `{"0": "thumb", "1": "preview", "2": "scaled"}`
    Keyed(&'a Map<String, Value>),
}

impl<'a> DerivativePaths<'a> {
    fn from_record(record: &'a Map<String, Value>) -> Option<Self> {
        ["previewFileURLs", "modifiedImagePaths"]
            .iter()
            .find_map(|key| match record.get(*key) {
                Some(Value::Array(paths)) => Some(DerivativePaths::Positional(paths.as_slice())),
                Some(Value::Object(paths)) => Some(DerivativePaths::Keyed(paths)),
                _ => None,
            })
    }

    fn get(&self, position: usize) -> Option<String> {
        let entry = match self {
            DerivativePaths::Positional(paths) => paths.get(position),
            DerivativePaths::Keyed(paths) => paths.get(&position.to_string()),
        }?;
        match entry {
            Value::String(uri) if !uri.is_empty() => Some(uri.clone()),
            Value::Object(object) => object
                .get("url")
                .and_then(Value::as_str)
                .filter(|uri| !uri.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Layout of the descriptive metadata block.
enum MetadataShape<'a> {
    /// `{"CopyrightNotice": "..."}`
    Flat(&'a Map<String, Value>),
    /// `[{"type": "iptc", "name": "CopyrightNotice", "value": "..."}]`
    Triples(&'a [Value]),
}

impl<'a> MetadataShape<'a> {
    /// All shapes present in the record, most recent first.
    fn all_from_record(record: &'a Map<String, Value>) -> Vec<Self> {
        let mut shapes = Vec::new();
        if let Some(Value::Object(flat)) = record.get("dynamicMetadata") {
            shapes.push(MetadataShape::Flat(flat));
        }
        for key in ["dynamicMetadata", "metadataFields"] {
            if let Some(Value::Array(triples)) = record.get(key) {
                shapes.push(MetadataShape::Triples(triples.as_slice()));
            }
        }
        shapes
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match self {
            MetadataShape::Flat(fields) => fields.get(name).and_then(scalar_to_string),
            MetadataShape::Triples(triples) => triples.iter().find_map(|triple| {
                let is_iptc = triple
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.eq_ignore_ascii_case("iptc"));
                let matches_name = triple.get("name").and_then(Value::as_str) == Some(name);
                if is_iptc && matches_name {
                    triple.get("value").and_then(scalar_to_string)
                } else {
                    None
                }
            }),
        }
    }
}

impl<'a> ResponseMapper<'a> {
    pub fn new(options: &'a AssetSourceOptions) -> Self {
        Self { options }
    }

    pub fn map(&self, raw: &Value) -> Result<AssetRecord> {
        let record = raw.as_object().ok_or_else(|| {
            PixxioError::MalformedResponse("asset record is not a JSON object".to_string())
        })?;

        let identifier = string_field(record, &["id"])
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PixxioError::MalformedResponse("asset record has no id".to_string()))?;

        let file_name = string_field(record, &["fileName", "originalFilename"]);
        let file_type = string_field(record, &["fileType"])
            .or_else(|| file_name.as_deref().and_then(extension_of))
            .map(|t| t.trim_start_matches('.').to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PixxioError::MalformedResponse(format!(
                    "asset record {} has neither fileType nor fileName",
                    identifier
                ))
            })?;

        let remote_media_type = media_type_for_extension(&file_type);
        let use_thumbnail = self.options.use_thumbnail_as_original(&remote_media_type);

        let paths = DerivativePaths::from_record(record);
        let derivative = |position: usize| paths.as_ref().and_then(|p| p.get(position));
        let thumbnail = derivative(0);
        let preview = derivative(1);
        let scaled = derivative(2);

        let true_original = if use_thumbnail {
            None
        } else {
            string_field(record, &["originalFileURL", "originalPath"]).filter(|uri| !uri.is_empty())
        };
        let delivers_true_original = true_original.is_some()
            || (!use_thumbnail && scaled.is_none() && preview.is_none() && thumbnail.is_none());
        let original = true_original
            .or_else(|| scaled.clone())
            .or_else(|| preview.clone())
            .or_else(|| thumbnail.clone());

        let delivered_extension = if delivers_true_original {
            file_type.as_str()
        } else {
            DERIVATIVE_EXTENSION
        };

        let subject = string_field(record, &["subject"]).filter(|s| !s.is_empty());
        let label = subject
            .clone()
            .or_else(|| file_name.clone())
            .unwrap_or_else(|| identifier.clone());
        let slug = urlize(&label);
        let filename = format!(
            "{}.{}",
            if slug.is_empty() { identifier.as_str() } else { slug.as_str() },
            delivered_extension
        );

        let shapes = MetadataShape::all_from_record(record);
        let from_shapes = |name: &str| shapes.iter().find_map(|shape| shape.lookup(name));
        let metadata = IptcMetadata {
            title: subject.or_else(|| from_shapes("Title")).unwrap_or_default(),
            caption_abstract: string_field(record, &["description"])
                .or_else(|| from_shapes("CaptionAbstract"))
                .unwrap_or_default(),
            copyright_notice: from_shapes("CopyrightNotice").unwrap_or_default(),
        };

        let tags = match record.get("keywords") {
            Some(Value::String(keywords)) => Tags::from_comma_separated(keywords),
            Some(Value::Array(keywords)) => Tags::new(keywords.iter().filter_map(Value::as_str)),
            _ => Tags::default(),
        };

        Ok(AssetRecord {
            last_modified: self.last_modified(record, &identifier),
            file_size_bytes: u64_field(record, &["fileSize"]).unwrap_or(0),
            media_type: media_type_for_extension(delivered_extension),
            remote_media_type,
            width_px: u64_field(record, &["width", "imageWidth"]).and_then(|w| u32::try_from(w).ok()),
            height_px: u64_field(record, &["height", "imageHeight"]).and_then(|h| u32::try_from(h).ok()),
            tags,
            metadata,
            derivatives: Derivatives {
                thumbnail,
                preview,
                original,
            },
            identifier,
            label,
            filename,
        })
    }

    fn last_modified(&self, record: &Map<String, Value>, identifier: &str) -> DateTime<Utc> {
        let Some(raw_date) = string_field(record, &["modifyDate", "uploadDate"]) else {
            return last_modified_fallback();
        };
        parse_timestamp(&raw_date).unwrap_or_else(|| {
            warn!("unparseable modification date '{}' on asset {}", raw_date, identifier);
            last_modified_fallback()
        })
    }
}

/// The `id` of a raw record, without mapping the rest of it.
pub fn record_identifier(raw: &Value) -> Option<String> {
    raw.as_object()
        .and_then(|record| string_field(record, &["id"]))
        .filter(|id| !id.is_empty())
}

/// Media type for a file extension, case-insensitive.
pub fn media_type_for_extension(extension: &str) -> String {
    mime_guess::from_ext(&extension.to_ascii_lowercase())
        .first_raw()
        .unwrap_or(FALLBACK_MEDIA_TYPE)
        .to_string()
}

fn extension_of(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    Some(extension.to_string())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First key present with a scalar value.
fn string_field(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(scalar_to_string))
}

fn u64_field(record: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// Lowercase ASCII slug of a label, words joined by dashes.
fn urlize(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.chars() {
        let replacement = match c {
            'ä' | 'Ä' => "ae",
            'ö' | 'Ö' => "oe",
            'ü' | 'Ü' => "ue",
            'ß' => "ss",
            c if c.is_ascii_alphanumeric() => {
                slug.push(c.to_ascii_lowercase());
                continue;
            }
            _ => "-",
        };
        if replacement == "-" {
            if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        } else {
            slug.push_str(replacement);
        }
    }
    slug.trim_end_matches('-').to_string()
}
