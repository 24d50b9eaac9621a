//! Garmin Connect session client: login handshake, activity search and downloads.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub mod bulk;
pub mod config;
pub mod endpoints;
pub mod http_client;
pub mod utils;

/// Hard server-side cap on the page size accepted by the search endpoint.
pub const SEARCH_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum GarminError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} failed with non-200 status: {status}")]
    Status { context: &'static str, status: u16 },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("filetype {filetype} not available for activity {activity_id}")]
    FiletypeUnavailable {
        activity_id: String,
        filetype: FileType,
    },
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("pagination stalled at offset {offset} of {total} activities")]
    StalledPagination { offset: u64, total: u64 },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Export formats offered by the download service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Gpx,
    Tcx,
    Fit,
}

impl FileType {
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Gpx => "gpx",
            FileType::Tcx => "tcx",
            FileType::Fit => "fit",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FileType {
    type Err = GarminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpx" => Ok(FileType::Gpx),
            "tcx" => Ok(FileType::Tcx),
            "fit" => Ok(FileType::Fit),
            other => Err(GarminError::Precondition(format!(
                "filetype must be one of gpx, tcx or fit, got {other:?}"
            ))),
        }
    }
}

/// Result of a single activity download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The body was written to the destination.
    Saved { bytes: u64 },
    /// The server answered 204: this filetype is not produced for the activity.
    Unavailable,
}

/// Counters returned by [`GarminConnectClient::download_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl fmt::Display for BulkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "downloaded {}, skipped {}, {} errors",
            self.downloaded, self.skipped, self.errored
        )
    }
}

/// One entry of the activity search results.
///
/// `raw` is the record exactly as returned by the server; it is what ends up
/// in the per-activity sidecar file.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityRecord {
    pub id: String,
    pub name: Option<String>,
    pub raw: serde_json::Value,
}

impl TryFrom<serde_json::Value> for ActivityRecord {
    type Error = GarminError;

    fn try_from(raw: serde_json::Value) -> Result<Self, Self::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            activity: Inner,
        }
        #[derive(Deserialize)]
        struct Inner {
            #[serde(rename = "activityId", deserialize_with = "deserialize_id")]
            id: String,
            #[serde(rename = "activityName", default, deserialize_with = "deserialize_name")]
            name: Option<String>,
        }

        let envelope = Envelope::deserialize(&raw)
            .map_err(|e| GarminError::Decode(format!("activity record: {e}")))?;
        Ok(Self {
            id: envelope.activity.id,
            name: envelope.activity.name,
            raw,
        })
    }
}

/// Split a raw search response into its activity records and the
/// server-side total.
pub fn parse_search_page(
    value: serde_json::Value,
) -> Result<(Vec<ActivityRecord>, u64), GarminError> {
    #[derive(Deserialize)]
    struct Page {
        results: Results,
    }
    #[derive(Deserialize)]
    struct Results {
        search: SearchMeta,
        #[serde(default)]
        activities: Vec<serde_json::Value>,
    }
    #[derive(Deserialize)]
    struct SearchMeta {
        #[serde(rename = "totalFound", deserialize_with = "deserialize_count")]
        total_found: u64,
    }

    let page: Page = serde_json::from_value(value)
        .map_err(|e| GarminError::Decode(format!("search response: {e}")))?;
    let records = page
        .results
        .activities
        .into_iter()
        .map(ActivityRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((records, page.results.search.total_found))
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

// Older payloads wrap the name as `{"value": "..."}`, newer ones send a bare string.
fn deserialize_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Object(map)) => map
            .get("value")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    })
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| D::Error::custom(format!("expected non-negative count, got {n}"))),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected numeric count, got {s:?}"))),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[async_trait]
pub trait GarminConnectClient: Send + Sync + 'static {
    /// Run the three-step SSO handshake and mark the session authenticated.
    async fn login(&mut self, username: &str, password: &SecretString) -> Result<(), GarminError>;

    fn is_authenticated(&self) -> bool;

    /// Raw search response for one page of activities.
    async fn search(&self, start: u64, limit: u32) -> Result<serde_json::Value, GarminError>;

    /// Download one activity export to `destination`.
    async fn download(
        &self,
        activity_id: &str,
        destination: &Path,
        filetype: FileType,
    ) -> Result<DownloadOutcome, GarminError>;

    /// One page of activities plus the total number available server-side.
    async fn get_activities(
        &self,
        start: u64,
        limit: u32,
    ) -> Result<(Vec<ActivityRecord>, u64), GarminError> {
        let value = self.search(start, limit).await?;
        parse_search_page(value)
    }

    /// Walk every search page until the reported total is reached.
    async fn get_all_activities(&self) -> Result<Vec<ActivityRecord>, GarminError> {
        let mut start = 0u64;
        let mut all = Vec::new();
        loop {
            let (page, total) = self.get_activities(start, SEARCH_LIMIT).await?;
            tracing::info!(start, total, received = page.len(), "fetched activity page");
            if page.is_empty() && start < total {
                return Err(GarminError::StalledPagination {
                    offset: start,
                    total,
                });
            }
            start += page.len() as u64;
            all.extend(page);
            if start >= total {
                break;
            }
        }
        Ok(all)
    }

    /// Fetch every activity and download the ones not already present in
    /// `output_dir`, writing a JSON sidecar next to each.
    async fn download_all(
        &self,
        output_dir: &Path,
        filetype: FileType,
        continue_on_failure: bool,
    ) -> Result<BulkSummary, GarminError> {
        bulk::download_all(self, output_dir, filetype, continue_on_failure).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filetype_parses_case_insensitively() {
        assert_eq!("TCX".parse::<FileType>().unwrap(), FileType::Tcx);
        assert_eq!(" gpx ".parse::<FileType>().unwrap(), FileType::Gpx);
        assert_eq!("fit".parse::<FileType>().unwrap(), FileType::Fit);
    }

    #[test]
    fn filetype_rejects_unknown() {
        let err = "kml".parse::<FileType>().unwrap_err();
        assert!(matches!(err, GarminError::Precondition(_)));
    }

    #[test]
    fn activity_record_from_numeric_id_and_wrapped_name() {
        let raw = json!({"activity": {"activityId": 12345, "activityName": {"value": "Lunch Run"}}});
        let rec = ActivityRecord::try_from(raw.clone()).expect("record");
        assert_eq!(rec.id, "12345");
        assert_eq!(rec.name.as_deref(), Some("Lunch Run"));
        assert_eq!(rec.raw, raw);
    }

    #[test]
    fn activity_record_accepts_plain_name_and_missing_name() {
        let rec = ActivityRecord::try_from(json!({"activity": {"activityId": "9", "activityName": "Ride"}}))
            .expect("record");
        assert_eq!(rec.name.as_deref(), Some("Ride"));

        let rec = ActivityRecord::try_from(json!({"activity": {"activityId": "10"}})).expect("record");
        assert_eq!(rec.name, None);
    }

    #[test]
    fn activity_record_without_id_is_decode_error() {
        let res = ActivityRecord::try_from(json!({"activity": {"activityName": {"value": "x"}}}));
        assert!(matches!(res, Err(GarminError::Decode(_))));
    }

    #[test]
    fn search_page_total_as_string() {
        let value = json!({"results": {"search": {"totalFound": "2"}, "activities": [
            {"activity": {"activityId": 1}},
            {"activity": {"activityId": 2}}
        ]}});
        let (records, total) = parse_search_page(value).expect("page");
        assert_eq!(total, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "2");
    }

    #[test]
    fn search_page_without_activities_is_empty() {
        let (records, total) =
            parse_search_page(json!({"results": {"search": {"totalFound": 0}}})).expect("page");
        assert!(records.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn bulk_summary_display() {
        let s = BulkSummary {
            downloaded: 3,
            skipped: 1,
            errored: 0,
        };
        assert_eq!(s.to_string(), "downloaded 3, skipped 1, 0 errors");
    }
}
