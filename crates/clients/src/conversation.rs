use async_trait::async_trait;
use chatrelay_core::{ConversationRequest, ConversationResponse, ConversationService, ServiceError};

use crate::transport::WatsonTransport;

/// Conversation v1 `message` endpoint.
#[derive(Clone)]
pub struct WatsonConversationClient {
    transport: WatsonTransport,
}

impl WatsonConversationClient {
    pub fn new(transport: WatsonTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ConversationService for WatsonConversationClient {
    async fn message(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, ServiceError> {
        let path = format!("v1/workspaces/{}/message", request.workspace_id);
        self.transport.post_json(&path, request).await
    }
}
