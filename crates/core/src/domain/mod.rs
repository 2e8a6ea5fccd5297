pub mod analysis;
pub mod context;
pub mod discovery;
pub mod message;

pub use analysis::AnalysisFeatures;
pub use context::SessionContext;
pub use discovery::{DiscoveryDocument, DiscoveryQuery, DiscoveryResultSet};
pub use message::{
    ConversationInput, ConversationOutput, ConversationRequest, ConversationResponse,
    IncomingMessage, Intent, MessageInput, OutputText,
};
