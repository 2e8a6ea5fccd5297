use thiserror::Error;

use crate::services::ServiceError;

/// Upstream step of the decision procedure that failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AugmentError {
    #[error("conversation request failed: {0}")]
    Conversation(#[source] ServiceError),
    #[error("text analytics request failed: {0}")]
    TextAnalytics(#[source] ServiceError),
    #[error("document search request failed: {0}")]
    Search(#[source] ServiceError),
    #[error("tone analysis request failed: {0}")]
    Tone(#[source] ServiceError),
}

impl AugmentError {
    pub fn step(&self) -> &'static str {
        match self {
            Self::Conversation(_) => "conversation",
            Self::TextAnalytics(_) => "text_analytics",
            Self::Search(_) => "search",
            Self::Tone(_) => "tone",
        }
    }

    pub fn service_error(&self) -> &ServiceError {
        match self {
            Self::Conversation(error)
            | Self::TextAnalytics(error)
            | Self::Search(error)
            | Self::Tone(error) => error,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("session storage failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<AugmentError> for ApplicationError {
    fn from(value: AugmentError) -> Self {
        Self::Integration(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Integration(message) | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
