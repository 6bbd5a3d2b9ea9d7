use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp layout used for every record (local time, microsecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Browser-assigned classification of a network request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Fetch,
    Xhr,
    Script,
    Document,
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Fetch => "fetch",
            ResourceType::Xhr => "xhr",
            ResourceType::Script => "script",
            ResourceType::Document => "document",
            ResourceType::Other => "other",
        }
    }

    /// Parse a resource type name, case-insensitively. Unknown names map to `Other`.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "fetch" => ResourceType::Fetch,
            "xhr" => ResourceType::Xhr,
            "script" => ResourceType::Script,
            "document" => ResourceType::Document,
            _ => ResourceType::Other,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request identity as reported by the browser driver
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub resource_type: ResourceType,
    pub headers: BTreeMap<String, String>,
    pub post_data: Option<String>,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            resource_type,
            headers: BTreeMap::new(),
            post_data: None,
        }
    }

    pub fn with_post_data(mut self, post_data: impl Into<String>) -> Self {
        self.post_data = Some(post_data.into());
        self
    }
}

/// Response metadata matched to a request
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseInfo {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
}

impl ResponseInfo {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: BTreeMap::new(),
        }
    }
}

/// One completed request, normalized for export
///
/// `duration` is in seconds and `size` in bytes; unit conversion happens only
/// at export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub timestamp: String,
    pub method: String,
    pub url: String,
    pub resource_type: ResourceType,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub duration: f64,
    pub size: u64,
    pub graphql_query_id: String,
    pub graphql_operation: String,
    pub request_headers: String,
    pub response_headers: String,
    pub post_data: String,
}

/// Web Vitals rating as reported by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
    Unknown,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
            Rating::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "good" => Rating::Good,
            "needs-improvement" => Rating::NeedsImprovement,
            "poor" => Rating::Poor,
            _ => Rating::Unknown,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One performance metric sample reported by the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebVitalRecord {
    pub timestamp: String,
    pub url: String,
    pub metric_name: String,
    pub value: f64,
    pub rating: Rating,
}

impl WebVitalRecord {
    pub fn new(url: impl Into<String>, metric_name: impl Into<String>, value: f64, rating: Rating) -> Self {
        Self {
            timestamp: now_timestamp(),
            url: url.into(),
            metric_name: metric_name.into(),
            value: round2(value),
            rating,
        }
    }

    /// Display unit paired with the metric on export
    pub fn unit(&self) -> &'static str {
        match self.metric_name.as_str() {
            "LCP" | "INP" | "FID" => "ms",
            "CLS" => "score (unitless)",
            _ => "",
        }
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
