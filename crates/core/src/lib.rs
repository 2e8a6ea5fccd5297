pub mod augment;
pub mod config;
pub mod domain;
pub mod errors;
pub mod merge;
pub mod services;
pub mod summarize;

pub use augment::{AugmentSettings, Augmenter, Collaborators, DiscoveryTrigger};
pub use domain::{
    AnalysisFeatures, ConversationRequest, ConversationResponse, DiscoveryQuery,
    DiscoveryResultSet, IncomingMessage, OutputText, SessionContext,
};
pub use errors::{ApplicationError, AugmentError, InterfaceError};
pub use merge::{merge_discovery_text, MergeOutcome, SummaryStatus};
pub use services::{
    ConversationService, DocumentSearchService, ServiceError, SummarizeError, Summarizer,
    TextAnalyticsService, ToneService,
};
pub use summarize::TextRankSummarizer;
