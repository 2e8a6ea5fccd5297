use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DiscoveryQueryConfig;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    pub return_fields: Option<String>,
}

impl DiscoveryQuery {
    /// Builds a query for `text`, copying every configured shaping option verbatim.
    pub fn shaped(text: impl Into<String>, options: &DiscoveryQueryConfig) -> Self {
        Self {
            query: text.into(),
            count: options.count.clone(),
            offset: options.offset.clone(),
            aggregation: options.aggregation.clone(),
            filter: options.filter.clone(),
            return_fields: options.return_fields.clone(),
        }
    }

    /// Query-string pairs in wire order; unset options are omitted.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("query", self.query.as_str())];
        let optional = [
            ("count", &self.count),
            ("offset", &self.offset),
            ("aggregation", &self.aggregation),
            ("filter", &self.filter),
            ("return", &self.return_fields),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                pairs.push((name, value.as_str()));
            }
        }
        pairs
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    #[serde(rename = "contentHtml", default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiscoveryDocument {
    pub fn to_json_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(content_html) = &self.content_html {
            map.insert("contentHtml".to_string(), Value::String(content_html.clone()));
        }
        if let Some(title) = &self.title {
            map.insert("title".to_string(), Value::String(title.clone()));
        }
        Value::Object(map)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResultSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<DiscoveryDocument>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiscoveryResultSet {
    /// Serialises to `{}`; used when no query was sent.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn first_document(&self) -> Option<&DiscoveryDocument> {
        self.results.as_ref().and_then(|results| results.first())
    }

    pub fn result_count(&self) -> usize {
        self.results.as_ref().map_or(0, Vec::len)
    }

    /// JSON form stored in the session context. Built field by field so it cannot fail.
    pub fn to_json_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(results) = &self.results {
            let documents = results.iter().map(DiscoveryDocument::to_json_value).collect();
            map.insert("results".to_string(), Value::Array(documents));
        }
        Value::Object(map)
    }
}
