//! Upstream collaborators the augmentation pipeline depends on.
//!
//! Each hosted service sits behind its own trait so the pipeline can be
//! assembled from HTTP clients in production and from test doubles in tests.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    AnalysisFeatures, ConversationRequest, ConversationResponse, DiscoveryQuery,
    DiscoveryResultSet,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode upstream response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn message(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, ServiceError>;
}

#[async_trait]
pub trait TextAnalyticsService: Send + Sync {
    async fn analyze(&self, text: &str, features: &AnalysisFeatures)
        -> Result<Value, ServiceError>;
}

#[async_trait]
pub trait DocumentSearchService: Send + Sync {
    async fn query(
        &self,
        environment_id: &str,
        collection_id: &str,
        query: &DiscoveryQuery,
    ) -> Result<DiscoveryResultSet, ServiceError>;
}

#[async_trait]
pub trait ToneService: Send + Sync {
    async fn tone(&self, text: &str) -> Result<Value, ServiceError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SummarizeError {
    #[error("input is too short to summarize: {0}")]
    TooShort(String),
    #[error("summarizer failed: {0}")]
    Service(String),
}

pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str, word_count: usize) -> Result<String, SummarizeError>;
}
