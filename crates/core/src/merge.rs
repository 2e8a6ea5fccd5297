use serde::Serialize;

use crate::config::SummarizerConfig;
use crate::domain::{DiscoveryResultSet, OutputText};
use crate::services::{SummarizeError, Summarizer};

pub const SUMMARY_HEADER: &str = "Here is a summary of what I found";
pub const FOUND_HEADER: &str = "Here is what I found";

/// How the reply body was produced from the top search result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    NoResults,
    Disabled,
    Summarized,
    FallbackTooShort,
    FallbackServiceError,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoResults => "no_results",
            Self::Disabled => "disabled",
            Self::Summarized => "summarized",
            Self::FallbackTooShort => "fallback_too_short",
            Self::FallbackServiceError => "fallback_service_error",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    pub text: OutputText,
    pub summary: SummaryStatus,
}

/// Turns the top search result into display text, or returns `fallback`
/// untouched when there is nothing to show.
pub fn merge_discovery_text(
    results: &DiscoveryResultSet,
    fallback: OutputText,
    settings: &SummarizerConfig,
    summarizer: &dyn Summarizer,
) -> MergeOutcome {
    let Some(document) = results.first_document() else {
        return MergeOutcome { text: fallback, summary: SummaryStatus::NoResults };
    };

    let content = document.content_html.as_deref().unwrap_or_default();
    let title = document.title.as_deref().unwrap_or_default();

    let (header, body, summary) = if settings.enabled {
        match summarizer.summarize(content, settings.word_count) {
            Ok(summary) => (SUMMARY_HEADER, summary, SummaryStatus::Summarized),
            Err(SummarizeError::TooShort(_)) => {
                (FOUND_HEADER, content.to_string(), SummaryStatus::FallbackTooShort)
            }
            Err(SummarizeError::Service(_)) => {
                (FOUND_HEADER, content.to_string(), SummaryStatus::FallbackServiceError)
            }
        }
    } else {
        (FOUND_HEADER, content.to_string(), SummaryStatus::Disabled)
    };

    MergeOutcome { text: OutputText::Single(compose_reply(header, title, &body)), summary }
}

fn compose_reply(header: &str, title: &str, body: &str) -> String {
    format!("{header}:<br><b>{title}</b><p>{body}")
}
