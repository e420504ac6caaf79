//! Short answer: the response is matched against a list of patterns, each
//! worth a fraction of the mark. `*` in a pattern matches any text and `\*`
//! matches a literal asterisk.

use serde::{Deserialize, Serialize};
use stepwise_core::traits::{ClassifiedParts, ClassifiedResponse};
use stepwise_core::{QuestionDefinition, QuestionId, QuestionState, VarMap};

use super::{default_mark, summary_of};

/// The response variable.
pub const ANSWER_VAR: &str = "answer";

/// One accepted pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortAnswerOption {
    pub answer: String,
    pub fraction: f64,
    #[serde(default)]
    pub feedback: String,
}

impl ShortAnswerOption {
    pub fn new(answer: &str, fraction: f64) -> Self {
        Self {
            answer: answer.to_string(),
            fraction,
            feedback: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortAnswer {
    pub id: QuestionId,
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_mark")]
    pub default_mark: f64,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub answers: Vec<ShortAnswerOption>,
}

impl ShortAnswer {
    pub fn new(id: QuestionId, name: &str, text: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            text: text.to_string(),
            default_mark: default_mark(),
            case_sensitive: false,
            answers: Vec::new(),
        }
    }

    pub fn with_answer(mut self, answer: ShortAnswerOption) -> Self {
        self.answers.push(answer);
        self
    }

    pub fn with_default_mark(mut self, mark: f64) -> Self {
        self.default_mark = mark;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    fn response<'a>(&self, response: &'a VarMap) -> Option<&'a str> {
        response
            .get(ANSWER_VAR)
            .map(String::as_str)
            .filter(|a| !a.is_empty())
    }

    /// The first option whose pattern matches, with its index.
    pub fn matching_answer(&self, response: &str) -> Option<(usize, &ShortAnswerOption)> {
        self.answers
            .iter()
            .enumerate()
            .find(|(_, option)| wildcard_match(&option.answer, response, !self.case_sensitive))
    }

    /// The best-scoring option.
    pub fn best_answer(&self) -> Option<&ShortAnswerOption> {
        self.answers
            .iter()
            .fold(None, |best: Option<&ShortAnswerOption>, option| match best {
                Some(b) if b.fraction >= option.fraction => Some(b),
                _ => Some(option),
            })
    }
}

impl QuestionDefinition for ShortAnswer {
    fn id(&self) -> QuestionId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "shortanswer"
    }

    fn default_mark(&self) -> f64 {
        self.default_mark
    }

    fn is_complete_response(&self, response: &VarMap) -> bool {
        self.response(response).is_some()
    }

    fn is_same_response(&self, previous: &VarMap, new: &VarMap) -> bool {
        previous.get(ANSWER_VAR).map_or("", String::as_str)
            == new.get(ANSWER_VAR).map_or("", String::as_str)
    }

    fn grade_response(&self, response: &VarMap) -> (f64, QuestionState) {
        let fraction = self
            .response(response)
            .and_then(|r| self.matching_answer(r))
            .map_or(0.0, |(_, option)| option.fraction);
        (fraction, QuestionState::graded_state_for_fraction(fraction))
    }

    fn summarise_response(&self, response: &VarMap) -> Option<String> {
        self.response(response).map(str::to_string)
    }

    fn question_summary(&self) -> Option<String> {
        summary_of(&self.text)
    }

    fn right_answer_summary(&self) -> Option<String> {
        self.best_answer().map(|a| clean_pattern(&a.answer))
    }

    fn correct_response(&self) -> Option<VarMap> {
        let best = self.best_answer()?;
        Some(VarMap::from([(
            ANSWER_VAR.to_string(),
            clean_pattern(&best.answer),
        )]))
    }

    fn classify_response(&self, response: &VarMap) -> ClassifiedParts {
        let classified = match self.response(response) {
            None => ClassifiedResponse::no_response(),
            Some(answer) => match self.matching_answer(answer) {
                Some((index, option)) => ClassifiedResponse::new(
                    Some((index + 1).to_string()),
                    answer,
                    Some(option.fraction),
                ),
                None => ClassifiedResponse::new(Some("0".to_string()), answer, Some(0.0)),
            },
        };
        ClassifiedParts::from([(self.id.to_string(), classified)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Literal(char),
    Any,
}

fn tokenize(pattern: &str, fold_case: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'*') => {
                chars.next();
                tokens.push(Token::Literal('*'));
            }
            '*' => tokens.push(Token::Any),
            c if fold_case => tokens.extend(c.to_lowercase().map(Token::Literal)),
            c => tokens.push(Token::Literal(c)),
        }
    }
    tokens
}

/// Does `text` match `pattern` as a whole? Surrounding whitespace is ignored.
pub fn wildcard_match(pattern: &str, text: &str, fold_case: bool) -> bool {
    let tokens = tokenize(pattern.trim(), fold_case);
    let text: Vec<char> = if fold_case {
        text.trim().chars().flat_map(char::to_lowercase).collect()
    } else {
        text.trim().chars().collect()
    };

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == Token::Any)
}

/// A pattern as a student would type it: wildcards become spaces and
/// escaped asterisks are unescaped.
pub fn clean_pattern(pattern: &str) -> String {
    let mut bits = vec![String::new()];
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'*') => {
                chars.next();
                if let Some(bit) = bits.last_mut() {
                    bit.push('*');
                }
            }
            '*' => bits.push(String::new()),
            c => {
                if let Some(bit) = bits.last_mut() {
                    bit.push(c);
                }
            }
        }
    }
    bits.join(" ").trim().to_string()
}
