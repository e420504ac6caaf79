//! Description: text shown to the student, with nothing to answer.

use serde::{Deserialize, Serialize};
use stepwise_core::{
    Behaviour, BehaviourRegistry, QuestionDefinition, QuestionId, QuestionState, Result, VarMap,
};

use super::summary_of;
use crate::behaviours::InformationItem;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Description {
    pub id: QuestionId,
    pub name: String,
    #[serde(default)]
    pub text: String,
}

impl Description {
    pub fn new(id: QuestionId, name: &str, text: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            text: text.to_string(),
        }
    }
}

impl QuestionDefinition for Description {
    fn id(&self) -> QuestionId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "description"
    }

    fn default_mark(&self) -> f64 {
        0.0
    }

    fn max_fraction(&self) -> f64 {
        0.0
    }

    fn make_behaviour(
        &self,
        _preferred: &str,
        registry: &BehaviourRegistry,
    ) -> Result<Box<dyn Behaviour>> {
        registry.make(InformationItem::NAME)
    }

    fn is_complete_response(&self, _response: &VarMap) -> bool {
        true
    }

    fn grade_response(&self, _response: &VarMap) -> (f64, QuestionState) {
        (0.0, QuestionState::Finished)
    }

    fn summarise_response(&self, _response: &VarMap) -> Option<String> {
        None
    }

    fn question_summary(&self) -> Option<String> {
        summary_of(&self.text)
    }
}
