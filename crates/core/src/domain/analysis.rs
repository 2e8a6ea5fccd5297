use serde::{Deserialize, Serialize};

/// Text-analytics features requested per utterance; each flag is independent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisFeatures {
    pub concepts: bool,
    pub entities: bool,
    pub keywords: bool,
    pub categories: bool,
    pub emotion: bool,
    #[serde(alias = "semanticroles")]
    pub semantic_roles: bool,
    pub relations: bool,
    pub sentiment: bool,
}

impl AnalysisFeatures {
    pub fn all() -> Self {
        Self {
            concepts: true,
            entities: true,
            keywords: true,
            categories: true,
            emotion: true,
            semantic_roles: true,
            relations: true,
            sentiment: true,
        }
    }

    /// Wire names of the enabled features, in a stable order.
    pub fn enabled_names(&self) -> Vec<&'static str> {
        [
            (self.concepts, "concepts"),
            (self.entities, "entities"),
            (self.keywords, "keywords"),
            (self.categories, "categories"),
            (self.emotion, "emotion"),
            (self.semantic_roles, "semantic_roles"),
            (self.relations, "relations"),
            (self.sentiment, "sentiment"),
        ]
        .into_iter()
        .filter_map(|(enabled, name)| enabled.then_some(name))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled_names().is_empty()
    }
}
