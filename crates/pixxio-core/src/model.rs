//! Normalized, read-only view of a remote pixx.io asset.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp used when pixx.io does not report a modification date.
pub fn last_modified_fallback() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Keywords of an asset.
///
/// Keeps the order pixx.io delivered them in, drops duplicates, and compares
/// as a set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>")]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
                normalized.push(tag.to_string());
            }
        }
        Tags(normalized)
    }

    /// Splits a comma separated keyword string.
    pub fn from_comma_separated(keywords: &str) -> Self {
        Self::new(keywords.split(','))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tags in lexical order, the stable form used for diffing.
    pub fn sorted(&self) -> Vec<String> {
        let mut sorted = self.0.clone();
        sorted.sort();
        sorted
    }

    /// Stable comma separated form, as sent to the legacy keyword endpoint.
    pub fn to_keyword_string(&self) -> String {
        self.sorted().join(",")
    }

    pub fn with(&self, tag: &str) -> Self {
        Self::new(self.0.iter().map(String::as_str).chain(std::iter::once(tag)))
    }

    pub fn without(&self, tag: &str) -> Self {
        Self::new(self.0.iter().filter(|t| t.as_str() != tag))
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        Tags::new(tags)
    }
}

impl PartialEq for Tags {
    fn eq(&self, other: &Self) -> bool {
        self.sorted() == other.sorted()
    }
}

impl Eq for Tags {}

/// IPTC-like descriptive fields. Absent values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IptcMetadata {
    pub title: String,
    pub caption_abstract: String,
    pub copyright_notice: String,
}

impl IptcMetadata {
    /// Looks a field up by its IPTC property name.
    pub fn get(&self, property: &str) -> Option<&str> {
        match property {
            "Title" => Some(&self.title),
            "CaptionAbstract" => Some(&self.caption_abstract),
            "CopyrightNotice" => Some(&self.copyright_notice),
            _ => None,
        }
    }
}

/// Rendered variants served by pixx.io. Each one is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivatives {
    pub thumbnail: Option<String>,
    pub preview: Option<String>,
    pub original: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub identifier: String,
    pub label: String,
    pub filename: String,
    pub last_modified: DateTime<Utc>,
    pub file_size_bytes: u64,
    /// Media type of the file delivered as original.
    pub media_type: String,
    /// Media type of the file as stored in pixx.io.
    pub remote_media_type: String,
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
    pub tags: Tags,
    pub metadata: IptcMetadata,
    pub derivatives: Derivatives,
}

impl AssetRecord {
    pub fn iptc_property(&self, property: &str) -> &str {
        self.metadata.get(property).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_from_comma_string_and_array_match() {
        let from_string = Tags::from_comma_separated("a, b,,c");
        let from_array = Tags::new(["a", "b", "c"]);
        assert_eq!(from_string.as_slice(), &["a", "b", "c"]);
        assert_eq!(from_string.as_slice(), from_array.as_slice());
    }

    #[test]
    fn test_tags_compare_as_set() {
        assert_eq!(Tags::new(["b", "a"]), Tags::new(["a", "b", "a"]));
        assert_ne!(Tags::new(["a"]), Tags::new(["a", "b"]));
    }

    #[test]
    fn test_tags_with_and_without() {
        let tags = Tags::new(["beach", "summer"]);
        let tagged = tags.with("used-by-neos");
        assert!(tagged.contains("used-by-neos"));
        assert_eq!(tagged.with("used-by-neos").len(), 3);
        assert_eq!(tagged.without("used-by-neos"), tags);
        assert_eq!(tagged.to_keyword_string(), "beach,summer,used-by-neos");
    }

    #[test]
    fn test_deserialized_tags_are_normalized() {
        let tags: Tags = serde_json::from_str(r#"[" beach ", "beach", "", "sun"]"#).unwrap();
        assert_eq!(tags.as_slice(), &["beach", "sun"]);
    }

    #[test]
    fn test_fallback_timestamp() {
        assert_eq!(last_modified_fallback().to_rfc3339(), "2000-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_iptc_property_lookup() {
        let metadata = IptcMetadata {
            title: "Title".into(),
            caption_abstract: "Caption".into(),
            copyright_notice: "(c) someone".into(),
        };
        assert_eq!(metadata.get("CopyrightNotice"), Some("(c) someone"));
        assert_eq!(metadata.get("Keywords"), None);
    }
}
