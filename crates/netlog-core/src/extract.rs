use crate::graphql;
use crate::record::{NetworkRecord, RequestInfo, ResourceType, ResponseInfo, TIMESTAMP_FORMAT};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Resource-type allow-list applied before extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterProfile {
    /// fetch, xhr, script
    Minimal,
    /// fetch, xhr, script, document
    #[default]
    Extended,
}

impl FilterProfile {
    pub fn allows(&self, resource_type: ResourceType) -> bool {
        match resource_type {
            ResourceType::Fetch | ResourceType::Xhr | ResourceType::Script => true,
            ResourceType::Document => matches!(self, FilterProfile::Extended),
            ResourceType::Other => false,
        }
    }
}

/// Build a record stamped with the current local time
pub fn extract(
    request: &RequestInfo,
    response: Option<&ResponseInfo>,
    duration: Duration,
    size: u64,
) -> NetworkRecord {
    extract_at(request, response, duration, size, Local::now())
}

/// Build a record with an explicit capture timestamp
pub fn extract_at(
    request: &RequestInfo,
    response: Option<&ResponseInfo>,
    duration: Duration,
    size: u64,
    timestamp: DateTime<Local>,
) -> NetworkRecord {
    let graphql = graphql::classify(&request.url, request.resource_type, request.post_data.as_deref());

    NetworkRecord {
        timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
        method: request.method.clone(),
        url: request.url.clone(),
        resource_type: request.resource_type,
        status: response.map(|r| r.status),
        status_text: response.map(|r| r.status_text.clone()),
        duration: duration.as_secs_f64(),
        size,
        graphql_query_id: graphql.query_id,
        graphql_operation: graphql.operation,
        request_headers: headers_json(&request.headers),
        response_headers: response
            .map(|r| headers_json(&r.headers))
            .unwrap_or_else(|| "{}".to_string()),
        post_data: request.post_data.clone().unwrap_or_default(),
    }
}

fn headers_json(headers: &BTreeMap<String, String>) -> String {
    // A string map always serializes
    serde_json::to_string(headers).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> RequestInfo {
        let mut req = RequestInfo::new("POST", "https://api.example.com/graphql", ResourceType::Fetch)
            .with_post_data(r#"{"query":"query GetUser { user { id } }"}"#);
        req.headers.insert("content-type".to_string(), "application/json".to_string());
        req.headers.insert("accept".to_string(), "*/*".to_string());
        req
    }

    #[test]
    fn test_profiles() {
        assert!(FilterProfile::Minimal.allows(ResourceType::Script));
        assert!(!FilterProfile::Minimal.allows(ResourceType::Document));
        assert!(FilterProfile::Extended.allows(ResourceType::Document));
        assert!(!FilterProfile::Extended.allows(ResourceType::Other));
    }

    #[test]
    fn test_extract_with_response() {
        let mut response = ResponseInfo::new(200, "OK");
        response.headers.insert("content-length".to_string(), "12".to_string());

        let record = extract(&request(), Some(&response), Duration::from_millis(1500), 2048);

        assert_eq!(record.method, "POST");
        assert_eq!(record.status, Some(200));
        assert_eq!(record.status_text.as_deref(), Some("OK"));
        assert_eq!(record.duration, 1.5);
        assert_eq!(record.size, 2048);
        assert_eq!(record.graphql_operation, "GetUser");
        assert_eq!(record.graphql_query_id, "");
        assert_eq!(record.request_headers, r#"{"accept":"*/*","content-type":"application/json"}"#);
        assert_eq!(record.response_headers, r#"{"content-length":"12"}"#);
    }

    #[test]
    fn test_extract_without_response() {
        let record = extract(&request(), None, Duration::ZERO, 0);

        assert_eq!(record.status, None);
        assert_eq!(record.status_text, None);
        assert_eq!(record.duration, 0.0);
        assert_eq!(record.response_headers, "{}");
    }

    #[test]
    fn test_extract_at_is_deterministic() {
        let at = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let a = extract_at(&request(), None, Duration::from_secs(1), 10, at);
        let b = extract_at(&request(), None, Duration::from_secs(1), 10, at);

        assert_eq!(a, b);
        assert_eq!(a.timestamp, "2024-03-01T09:30:00.000000");
    }

    #[test]
    fn test_missing_post_data_is_empty_string() {
        let req = RequestInfo::new("GET", "https://example.com/app.js", ResourceType::Script);
        let record = extract(&req, None, Duration::ZERO, 0);
        assert_eq!(record.post_data, "");
        assert_eq!(record.graphql_operation, "");
    }
}
