//! Marks pixx.io assets that are in use by the host with a configurable tag.

use tracing::debug;

use crate::client::PixxioApi;
use crate::config::AutoTaggingOptions;
use crate::error::Result;
use crate::model::{AssetRecord, Tags};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggingOutcome {
    Disabled,
    Unchanged,
    Updated(Tags),
}

pub struct AutoTagger<'a, A: PixxioApi> {
    api: &'a A,
    options: &'a AutoTaggingOptions,
}

impl<'a, A: PixxioApi> AutoTagger<'a, A> {
    pub fn new(api: &'a A, options: &'a AutoTaggingOptions) -> Self {
        Self { api, options }
    }

    /// Tags the asset when `usage_count` is positive and untags it otherwise.
    /// pixx.io is only written to when the keywords actually change.
    pub fn register_usage(&self, record: &AssetRecord, usage_count: usize) -> Result<TaggingOutcome> {
        if !self.options.enable {
            return Ok(TaggingOutcome::Disabled);
        }

        let tag = self.options.in_use_tag.as_str();
        let desired = if usage_count > 0 {
            record.tags.with(tag)
        } else {
            record.tags.without(tag)
        };

        if desired.sorted() == record.tags.sorted() {
            debug!("Keywords of {} are up to date", record.identifier);
            return Ok(TaggingOutcome::Unchanged);
        }

        self.api.update_tags(&record.identifier, &desired)?;
        Ok(TaggingOutcome::Updated(desired))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SearchResponse;
    use crate::error::PixxioError;
    use crate::model::{last_modified_fallback, Derivatives, IptcMetadata};
    use crate::query::Query;
    use serde_json::Value;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingApi {
        updates: RefCell<Vec<(String, Vec<String>)>>,
        fail: bool,
    }

    impl PixxioApi for RecordingApi {
        fn fetch_by_id(&self, identifier: &str) -> Result<Value> {
            Err(PixxioError::AssetNotFound {
                identifier: identifier.to_string(),
                message: String::new(),
            })
        }
        fn search(&self, _query: &Query) -> Result<SearchResponse> {
            unimplemented!()
        }
        fn count(&self, _query: &Query) -> Result<u64> {
            Ok(0)
        }
        fn update_tags(&self, identifier: &str, tags: &Tags) -> Result<()> {
            if self.fail {
                return Err(PixxioError::ConnectionFailed("timeout".into()));
            }
            self.updates
                .borrow_mut()
                .push((identifier.to_string(), tags.sorted()));
            Ok(())
        }
        fn list_categories(&self) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
        fn list_directories(&self) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    fn record(tags: &[&str]) -> AssetRecord {
        AssetRecord {
            identifier: "7".into(),
            label: "Seven".into(),
            filename: "seven.jpg".into(),
            last_modified: last_modified_fallback(),
            file_size_bytes: 0,
            media_type: "image/jpeg".into(),
            remote_media_type: "image/jpeg".into(),
            width_px: None,
            height_px: None,
            tags: Tags::new(tags),
            metadata: IptcMetadata::default(),
            derivatives: Derivatives::default(),
        }
    }

    fn enabled() -> AutoTaggingOptions {
        AutoTaggingOptions {
            enable: true,
            ..AutoTaggingOptions::default()
        }
    }

    #[test]
    fn test_adds_tag_when_used() {
        let api = RecordingApi::default();
        let options = enabled();
        let outcome = AutoTagger::new(&api, &options)
            .register_usage(&record(&["beach"]), 2)
            .unwrap();

        assert_eq!(outcome, TaggingOutcome::Updated(Tags::new(["beach", "used-by-neos"])));
        assert_eq!(
            api.updates.borrow().as_slice(),
            &[("7".to_string(), vec!["beach".to_string(), "used-by-neos".to_string()])]
        );
    }

    #[test]
    fn test_removes_tag_when_unused() {
        let api = RecordingApi::default();
        let options = enabled();
        let outcome = AutoTagger::new(&api, &options)
            .register_usage(&record(&["used-by-neos", "beach"]), 0)
            .unwrap();

        assert_eq!(outcome, TaggingOutcome::Updated(Tags::new(["beach"])));
    }

    #[test]
    fn test_unchanged_tags_are_not_written() {
        let api = RecordingApi::default();
        let options = enabled();
        let tagger = AutoTagger::new(&api, &options);

        assert_eq!(
            tagger.register_usage(&record(&["used-by-neos"]), 1).unwrap(),
            TaggingOutcome::Unchanged
        );
        assert_eq!(
            tagger.register_usage(&record(&["beach"]), 0).unwrap(),
            TaggingOutcome::Unchanged
        );
        assert!(api.updates.borrow().is_empty());
    }

    #[test]
    fn test_disabled_does_nothing() {
        let api = RecordingApi::default();
        let options = AutoTaggingOptions::default();
        assert_eq!(
            AutoTagger::new(&api, &options)
                .register_usage(&record(&[]), 3)
                .unwrap(),
            TaggingOutcome::Disabled
        );
        assert!(api.updates.borrow().is_empty());
    }

    #[test]
    fn test_update_failure_surfaces() {
        let api = RecordingApi {
            fail: true,
            ..RecordingApi::default()
        };
        let options = enabled();
        assert!(matches!(
            AutoTagger::new(&api, &options).register_usage(&record(&[]), 1),
            Err(PixxioError::ConnectionFailed(_))
        ));
    }
}
