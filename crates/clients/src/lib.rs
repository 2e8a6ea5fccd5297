//! HTTP clients for the hosted conversation, text-analytics, document-search
//! and tone services, plus the wiring that turns configuration into the
//! collaborator set the decision procedure runs against.

pub mod conversation;
pub mod discovery;
pub mod nlu;
pub mod tone;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use chatrelay_core::config::{AppConfig, HttpConfig, ServiceCredentials};
use chatrelay_core::{Collaborators, TextRankSummarizer};
use reqwest::Client;
use thiserror::Error;

pub use conversation::WatsonConversationClient;
pub use discovery::DiscoveryClient;
pub use nlu::NluClient;
pub use tone::ToneAnalyzerClient;
pub use transport::WatsonTransport;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

pub fn http_client(config: &HttpConfig) -> Result<Client, ClientError> {
    Ok(Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?)
}

pub fn watson_collaborators(config: &AppConfig) -> Result<Collaborators, ClientError> {
    let client = http_client(&config.http)?;
    let transport = |service: &'static str, credentials: ServiceCredentials| {
        WatsonTransport::new(service, client.clone(), credentials)
    };

    Ok(Collaborators {
        conversation: Arc::new(WatsonConversationClient::new(transport(
            "conversation",
            config.conversation.credentials.clone(),
        ))),
        text_analytics: Arc::new(NluClient::new(transport(
            "natural_language_understanding",
            config.nlu.credentials.clone(),
        ))),
        search: Arc::new(DiscoveryClient::new(transport(
            "discovery",
            config.discovery.credentials.clone(),
        ))),
        tone: Arc::new(ToneAnalyzerClient::new(transport(
            "tone_analyzer",
            config.tone_analyzer.credentials.clone(),
        ))),
        summarizer: Arc::new(TextRankSummarizer::new()),
    })
}
