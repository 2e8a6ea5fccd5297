use async_trait::async_trait;
use chatrelay_core::{DiscoveryQuery, DiscoveryResultSet, DocumentSearchService, ServiceError};

use crate::transport::WatsonTransport;

/// Discovery v1 collection `query` endpoint.
#[derive(Clone)]
pub struct DiscoveryClient {
    transport: WatsonTransport,
}

impl DiscoveryClient {
    pub fn new(transport: WatsonTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DocumentSearchService for DiscoveryClient {
    async fn query(
        &self,
        environment_id: &str,
        collection_id: &str,
        query: &DiscoveryQuery,
    ) -> Result<DiscoveryResultSet, ServiceError> {
        let path = format!("v1/environments/{environment_id}/collections/{collection_id}/query");
        self.transport.get_json(&path, &query.to_query_pairs()).await
    }
}
