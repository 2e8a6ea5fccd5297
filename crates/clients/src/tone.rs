use async_trait::async_trait;
use chatrelay_core::{ServiceError, ToneService};
use serde_json::{json, Value};

use crate::transport::WatsonTransport;

/// Tone Analyzer v3 `tone` endpoint.
#[derive(Clone)]
pub struct ToneAnalyzerClient {
    transport: WatsonTransport,
}

impl ToneAnalyzerClient {
    pub fn new(transport: WatsonTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ToneService for ToneAnalyzerClient {
    async fn tone(&self, text: &str) -> Result<Value, ServiceError> {
        self.transport.post_json("v3/tone", &json!({ "text": text })).await
    }
}
