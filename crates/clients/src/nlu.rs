use async_trait::async_trait;
use chatrelay_core::{AnalysisFeatures, ServiceError, TextAnalyticsService};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::transport::WatsonTransport;

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
    features: Map<String, Value>,
}

/// Natural Language Understanding v1 `analyze` endpoint.
#[derive(Clone)]
pub struct NluClient {
    transport: WatsonTransport,
}

impl NluClient {
    pub fn new(transport: WatsonTransport) -> Self {
        Self { transport }
    }
}

fn feature_map(features: &AnalysisFeatures) -> Map<String, Value> {
    features
        .enabled_names()
        .into_iter()
        .map(|name| (name.to_string(), Value::Object(Map::new())))
        .collect()
}

#[async_trait]
impl TextAnalyticsService for NluClient {
    async fn analyze(
        &self,
        text: &str,
        features: &AnalysisFeatures,
    ) -> Result<Value, ServiceError> {
        let body = AnalyzeRequest { text, features: feature_map(features) };
        self.transport.post_json("v1/analyze", &body).await
    }
}
