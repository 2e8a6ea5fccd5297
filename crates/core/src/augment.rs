//! The per-message decision procedure.
//!
//! A turn always goes to the conversational service first. The reply is then
//! enriched in a fixed order: text analytics, at most one document search
//! (which may rewrite the reply text), then tone analysis. Each enrichment is
//! written into the reply's context, which the caller persists for the next turn.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{AppConfig, DiscoveryQueryConfig, SummarizerConfig};
use crate::domain::{
    AnalysisFeatures, ConversationInput, ConversationRequest, ConversationResponse,
    DiscoveryQuery, DiscoveryResultSet, IncomingMessage, SessionContext,
};
use crate::errors::AugmentError;
use crate::merge::{merge_discovery_text, SummaryStatus};
use crate::services::{
    ConversationService, DocumentSearchService, Summarizer, TextAnalyticsService, ToneService,
};

pub const NLU_ENABLED_KEY: &str = "nlu_enabled";
pub const NLU_RESULTS_KEY: &str = "nlu_results";
pub const DISCOVERY_KEY: &str = "discovery";
pub const TONE_ANALYZER_KEY: &str = "tone_analyzer";
pub const DISCOVERY_ACTION_MARKER: &str = "call_discovery";

/// The slice of configuration the decision procedure reads.
#[derive(Clone, Debug)]
pub struct AugmentSettings {
    pub workspace_id: String,
    pub alternate_intents: bool,
    pub call_discovery_if_irrelevant: bool,
    pub call_discovery_if_low_confidence: bool,
    pub low_confidence_threshold: f64,
    pub call_discovery_context_variable: String,
    pub nlu_enabled: bool,
    pub nlu_features: AnalysisFeatures,
    pub tone_enabled: bool,
    pub discovery_environment_id: String,
    pub discovery_collection_id: String,
    pub discovery_query: DiscoveryQueryConfig,
    pub summarizer: SummarizerConfig,
}

impl AugmentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            workspace_id: config.conversation.workspace_id.clone(),
            alternate_intents: config.conversation.alternate_intents,
            call_discovery_if_irrelevant: config.conversation.call_discovery_if_irrelevant,
            call_discovery_if_low_confidence: config.conversation.call_discovery_if_low_confidence,
            low_confidence_threshold: config.conversation.low_confidence_threshold,
            call_discovery_context_variable: config
                .conversation
                .call_discovery_context_variable
                .clone(),
            nlu_enabled: config.nlu.enabled,
            nlu_features: config.nlu.features,
            tone_enabled: config.tone_analyzer.enabled,
            discovery_environment_id: config.discovery.environment_id.clone(),
            discovery_collection_id: config.discovery.collection_id.clone(),
            discovery_query: config.discovery.query.clone(),
            summarizer: config.summarizer.clone(),
        }
    }
}

/// Which search rule fired for a reply, if any. Rules are tried in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryTrigger {
    Irrelevant,
    ActionMarker,
    LowConfidence,
    ContextVariable,
    None,
}

impl DiscoveryTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Irrelevant => "irrelevant",
            Self::ActionMarker => "action_marker",
            Self::LowConfidence => "low_confidence",
            Self::ContextVariable => "context_variable",
            Self::None => "none",
        }
    }

    pub fn fires(&self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Clone)]
pub struct Collaborators {
    pub conversation: Arc<dyn ConversationService>,
    pub text_analytics: Arc<dyn TextAnalyticsService>,
    pub search: Arc<dyn DocumentSearchService>,
    pub tone: Arc<dyn ToneService>,
    pub summarizer: Arc<dyn Summarizer>,
}

#[derive(Clone)]
pub struct Augmenter {
    settings: AugmentSettings,
    collaborators: Collaborators,
}

impl Augmenter {
    pub fn new(settings: AugmentSettings, collaborators: Collaborators) -> Self {
        Self { settings, collaborators }
    }

    pub fn settings(&self) -> &AugmentSettings {
        &self.settings
    }

    /// Runs one chat turn. The returned response carries the updated context.
    pub async fn handle(
        &self,
        message: &IncomingMessage,
        context: SessionContext,
    ) -> Result<ConversationResponse, AugmentError> {
        let utterance = message.utterance();
        let request = ConversationRequest {
            workspace_id: self.settings.workspace_id.clone(),
            input: ConversationInput::text(utterance),
            context,
            alternate_intents: self.settings.alternate_intents,
        };

        let mut response = self
            .collaborators
            .conversation
            .message(&request)
            .await
            .map_err(AugmentError::Conversation)?;
        let text = response.input.text.clone();

        debug!(
            event_name = "augment.conversation.replied",
            utterance_chars = utterance.chars().count(),
            intents = response.intents.len(),
            top_confidence = response.top_confidence().unwrap_or_default(),
            "conversation service replied"
        );

        if self.settings.nlu_enabled {
            let results = self.analyze_text(&text).await?;
            response.context.insert(NLU_ENABLED_KEY, Value::Bool(true));
            response.context.insert(NLU_RESULTS_KEY, results);
        } else {
            response.context.insert(NLU_ENABLED_KEY, Value::Bool(false));
            response.context.insert(NLU_RESULTS_KEY, empty_object());
        }

        let trigger = self.discovery_trigger(&response);
        let mut summary = None;
        if trigger.fires() {
            let results = self.search_documents(&text).await?;
            let fallback = std::mem::take(&mut response.output.text);
            let merged = merge_discovery_text(
                &results,
                fallback,
                &self.settings.summarizer,
                self.collaborators.summarizer.as_ref(),
            );
            response.output.text = merged.text;
            response.context.insert(DISCOVERY_KEY, results.to_json_value());
            summary = Some(merged.summary);
        } else {
            response.context.insert(DISCOVERY_KEY, empty_object());
        }

        if self.settings.tone_enabled {
            let tone = self.analyze_tone(&text).await?;
            response.context.insert(TONE_ANALYZER_KEY, tone);
        }

        info!(
            event_name = "augment.completed",
            trigger = trigger.as_str(),
            summary = summary.as_ref().map_or("skipped", SummaryStatus::as_str),
            nlu_enabled = self.settings.nlu_enabled,
            tone_enabled = self.settings.tone_enabled,
            "chat turn augmented"
        );

        Ok(response)
    }

    /// Picks the first search rule that matches `response`.
    pub fn discovery_trigger(&self, response: &ConversationResponse) -> DiscoveryTrigger {
        let settings = &self.settings;

        if settings.call_discovery_if_irrelevant && response.intents.is_empty() {
            return DiscoveryTrigger::Irrelevant;
        }
        if response.output.action_contains(DISCOVERY_ACTION_MARKER) {
            return DiscoveryTrigger::ActionMarker;
        }
        if settings.call_discovery_if_low_confidence {
            // No intents means no confidence to compare.
            if let Some(confidence) = response.top_confidence() {
                if confidence < settings.low_confidence_threshold {
                    return DiscoveryTrigger::LowConfidence;
                }
            }
        }
        if response.context.flag_is_true(&settings.call_discovery_context_variable) {
            return DiscoveryTrigger::ContextVariable;
        }

        DiscoveryTrigger::None
    }

    pub async fn analyze_text(&self, text: &str) -> Result<Value, AugmentError> {
        if text.trim().is_empty() {
            return Ok(empty_object());
        }

        self.collaborators
            .text_analytics
            .analyze(text, &self.settings.nlu_features)
            .await
            .map_err(AugmentError::TextAnalytics)
    }

    pub async fn search_documents(&self, text: &str) -> Result<DiscoveryResultSet, AugmentError> {
        if text.trim().is_empty() {
            return Ok(DiscoveryResultSet::empty());
        }

        let query = DiscoveryQuery::shaped(text, &self.settings.discovery_query);
        let results = self
            .collaborators
            .search
            .query(
                &self.settings.discovery_environment_id,
                &self.settings.discovery_collection_id,
                &query,
            )
            .await
            .map_err(AugmentError::Search)?;

        debug!(
            event_name = "augment.search.completed",
            result_count = results.result_count(),
            "document search returned"
        );
        Ok(results)
    }

    pub async fn analyze_tone(&self, text: &str) -> Result<Value, AugmentError> {
        if text.trim().is_empty() {
            return Ok(empty_object());
        }

        self.collaborators.tone.tone(text).await.map_err(AugmentError::Tone)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
