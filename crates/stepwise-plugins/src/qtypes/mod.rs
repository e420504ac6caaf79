//! Built-in question types.

pub mod description;
pub mod essay;
pub mod shortanswer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stepwise_core::{QuestionDefinition, QuestionId};

pub use description::Description;
pub use essay::Essay;
pub use shortanswer::{ShortAnswer, ShortAnswerOption};

/// A question definition as written in an attempt script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionConfig {
    ShortAnswer(ShortAnswer),
    Essay(Essay),
    Description(Description),
}

impl QuestionConfig {
    pub fn id(&self) -> QuestionId {
        match self {
            QuestionConfig::ShortAnswer(q) => q.id,
            QuestionConfig::Essay(q) => q.id,
            QuestionConfig::Description(q) => q.id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionConfig::ShortAnswer(_) => "shortanswer",
            QuestionConfig::Essay(_) => "essay",
            QuestionConfig::Description(_) => "description",
        }
    }

    /// Build the question definition.
    pub fn build(&self) -> Arc<dyn QuestionDefinition> {
        match self {
            QuestionConfig::ShortAnswer(q) => Arc::new(q.clone()),
            QuestionConfig::Essay(q) => Arc::new(q.clone()),
            QuestionConfig::Description(q) => Arc::new(q.clone()),
        }
    }
}

pub(crate) fn default_mark() -> f64 {
    1.0
}

/// Question text as a one-line summary, or `None` if there is none.
pub(crate) fn summary_of(text: &str) -> Option<String> {
    let summary = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!summary.is_empty()).then_some(summary)
}
