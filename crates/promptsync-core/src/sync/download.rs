//! Full and incremental download

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use crate::config::{DEFAULT_DOWNLOAD_LIMIT, MAX_DOWNLOAD_LIMIT};
use crate::error::Result;
use crate::models::PromptRecord;
use crate::store::{Page, PromptStore};
use crate::util::user_fingerprint;
use crate::validation::{parse_bounded, parse_offset, parse_timestamp, ValidationErrors};

/// Raw query string values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadParams {
    #[serde(rename = "lastSync", default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

/// Validated download window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadRequest {
    pub last_sync: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for DownloadRequest {
    fn default() -> Self {
        Self {
            last_sync: None,
            offset: 0,
            limit: DEFAULT_DOWNLOAD_LIMIT,
        }
    }
}

impl DownloadParams {
    pub fn validate(&self) -> std::result::Result<DownloadRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let last_sync = match self
            .last_sync
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
        {
            Some(raw) => errors.capture(parse_timestamp("lastSync", raw)),
            None => None,
        };
        let offset = errors.capture(parse_offset("offset", self.offset.as_deref()));
        let limit = errors.capture(parse_bounded(
            "limit",
            self.limit.as_deref(),
            DEFAULT_DOWNLOAD_LIMIT,
            1,
            MAX_DOWNLOAD_LIMIT,
        ));

        errors.finish(DownloadRequest {
            last_sync,
            offset: offset.unwrap_or_default(),
            limit: limit.unwrap_or(DEFAULT_DOWNLOAD_LIMIT),
        })
    }
}

/// One page of the user's prompts plus the watermark for the next pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadPage {
    pub prompts: Vec<PromptRecord>,
    /// Size of the whole filtered set
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    #[serde(rename = "lastSync", default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Taken before the read; send it back as `lastSync` next time
    #[serde(rename = "syncTimestamp")]
    pub sync_timestamp: DateTime<Utc>,
}

impl DownloadPage {
    /// Whether pages past this one remain
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.offset + self.prompts.len() < self.total
    }
}

pub struct DownloadCoordinator<'a> {
    prompts: &'a dyn PromptStore,
    clock: &'a dyn Clock,
}

impl<'a> DownloadCoordinator<'a> {
    pub fn new(prompts: &'a dyn PromptStore, clock: &'a dyn Clock) -> Self {
        Self { prompts, clock }
    }

    pub fn download(&self, user_id: &str, request: DownloadRequest) -> Result<DownloadPage> {
        let sync_timestamp = self.clock.now();
        let page = Page::new(request.offset, request.limit);

        let result = match request.last_sync {
            Some(since) => self.prompts.get_updated_since(user_id, since, page)?,
            None => self.prompts.get_all_for_sync(user_id, page)?,
        };

        tracing::debug!(
            user = user_fingerprint(user_id),
            incremental = request.last_sync.is_some(),
            returned = result.prompts.len(),
            total = result.total,
            "Download served"
        );

        Ok(DownloadPage {
            prompts: result.prompts,
            total: result.total,
            offset: request.offset,
            limit: request.limit,
            last_sync: request.last_sync,
            sync_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn params(last_sync: Option<&str>, offset: Option<&str>, limit: Option<&str>) -> DownloadParams {
        DownloadParams {
            last_sync: last_sync.map(String::from),
            offset: offset.map(String::from),
            limit: limit.map(String::from),
        }
    }

    #[test]
    fn defaults_apply() {
        assert_eq!(
            DownloadParams::default().validate().unwrap(),
            DownloadRequest::default()
        );
    }

    #[test]
    fn accepts_bare_date_watermark() {
        let request = params(Some("2024-01-01"), Some("5"), Some("10"))
            .validate()
            .unwrap();
        assert_eq!(
            request,
            DownloadRequest {
                last_sync: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                offset: 5,
                limit: 10,
            }
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        for (offset, limit) in [("0", "0"), ("0", "1001"), ("-1", "10"), ("abc", "10")] {
            assert!(
                params(None, Some(offset), Some(limit)).validate().is_err(),
                "offset={offset} limit={limit}"
            );
        }
        assert!(params(None, None, Some("1000")).validate().is_ok());
    }

    #[test]
    fn collects_all_query_errors() {
        let errors = params(Some("not-a-date"), Some("-1"), Some("0"))
            .validate()
            .unwrap_err();
        let fields: Vec<_> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["lastSync", "offset", "limit"]);
    }

    #[test]
    fn page_serializes_camel_case_watermarks() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let page = DownloadPage {
            prompts: Vec::new(),
            total: 0,
            offset: 0,
            limit: 1000,
            last_sync: None,
            sync_timestamp: at,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("lastSync").is_none());
        assert_eq!(json["syncTimestamp"], "2024-01-01T00:00:00Z");
        assert!(!page.has_more());
    }
}
