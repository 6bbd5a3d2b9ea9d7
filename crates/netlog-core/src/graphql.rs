use crate::record::ResourceType;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref OPERATION_PATTERN: Regex =
        Regex::new(r"(?:query|mutation|subscription)\s+(\w+)").unwrap();
}

/// Persisted-query identifier fields, in priority order
const QUERY_ID_FIELDS: [&str; 3] = ["id", "queryId", "query_id"];

/// GraphQL identity derived from a request payload
///
/// Both fields are empty when the request is not recognized as GraphQL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphqlInfo {
    pub query_id: String,
    pub operation: String,
}

/// Heuristic: the URL mentions graphql, or the request was issued from script
pub fn is_candidate(url: &str, resource_type: ResourceType) -> bool {
    url.to_lowercase().contains("graphql")
        || matches!(resource_type, ResourceType::Fetch | ResourceType::Xhr)
}

/// Detect the GraphQL operation of a request. Never fails; unknown shapes yield empty fields.
pub fn classify(url: &str, resource_type: ResourceType, post_data: Option<&str>) -> GraphqlInfo {
    if !is_candidate(url, resource_type) {
        return GraphqlInfo::default();
    }

    let Some(body) = post_data.filter(|b| !b.is_empty()) else {
        return GraphqlInfo::default();
    };

    let payload: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::trace!("POST body for {} is not JSON: {}", url, e);
            return GraphqlInfo::default();
        }
    };

    let Some(object) = payload.as_object() else {
        return GraphqlInfo::default();
    };

    if let Some(query_id) = QUERY_ID_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(identifier))
    {
        return GraphqlInfo {
            operation: query_id.clone(),
            query_id,
        };
    }

    let operation = object
        .get("query")
        .and_then(Value::as_str)
        .and_then(|query| OPERATION_PATTERN.captures(query))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    GraphqlInfo {
        query_id: String::new(),
        operation,
    }
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
