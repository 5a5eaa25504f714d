//! Remote judgment collaborator used when the local comparison is not enough.

use std::future::Future;

use serde::Deserialize;

use crate::anthropic::{AnthropicError, MessageSender, MessagesRequest};
use crate::error::ReviewError;
use crate::item::Skill;

/// What the judge is asked to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquivalenceQuery<'a> {
    pub skill: Skill,
    /// Reference answer: the term for speaking, the definition for listening.
    pub expected: &'a str,
    pub attempt: &'a str,
    /// Language of the term being studied.
    pub lang_code: &'a str,
}

pub trait Judge {
    /// Whether the attempt means the same as the expected answer.
    fn equivalent(
        &self,
        query: &EquivalenceQuery<'_>,
    ) -> impl Future<Output = Result<bool, ReviewError>> + Send;

    /// A corrected form of the attempt, or `None` when it needs no correction.
    fn correction(
        &self,
        attempt: &str,
        lang_code: &str,
    ) -> impl Future<Output = Result<Option<String>, ReviewError>> + Send;
}

const EQUIVALENCE_SYSTEM: &str = "You grade answers in a language-learning app. \
Reply with ONLY valid JSON of the form {\"equivalent\": true|false}. \
Answers are equivalent when a fluent speaker would accept them as meaning the same thing; \
ignore punctuation, capitalization and minor transcription noise.";

const CORRECTION_SYSTEM: &str = "You proofread sentences spoken by language learners. \
Reply with ONLY valid JSON of the form {\"correction\": \"<corrected sentence>\"} \
or {\"correction\": null} when the sentence is already grammatical and natural.";

#[derive(Debug, Deserialize)]
struct EquivalenceReply {
    equivalent: bool,
}

#[derive(Debug, Deserialize)]
struct CorrectionReply {
    correction: Option<String>,
}

/// [`Judge`] backed by the Messages API.
pub struct LlmJudge<C> {
    client: C,
    model: String,
}

impl<C: MessageSender + Sync> LlmJudge<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    async fn ask<T: serde::de::DeserializeOwned>(
        &self,
        system: &str,
        prompt: String,
    ) -> Result<T, ReviewError> {
        let req = MessagesRequest::single(&self.model, 256, system, prompt);
        let reply = self.client.send_message(&req).await?.text();
        parse_reply(&reply).map_err(ReviewError::from)
    }
}

impl<C: MessageSender + Sync> Judge for LlmJudge<C> {
    async fn equivalent(&self, query: &EquivalenceQuery<'_>) -> Result<bool, ReviewError> {
        let prompt = match query.skill {
            Skill::Speaking => format!(
                "Language: {}\nExpected: {}\nLearner said: {}\n\
                 Does the learner's sentence say the same thing as the expected one?",
                query.lang_code, query.expected, query.attempt
            ),
            Skill::Listening => format!(
                "The learner heard a sentence in {} and translated it.\n\
                 Reference translation: {}\nLearner's translation: {}\n\
                 Does the learner's translation carry the same meaning?",
                query.lang_code, query.expected, query.attempt
            ),
        };
        let reply: EquivalenceReply = self.ask(EQUIVALENCE_SYSTEM, prompt).await?;
        Ok(reply.equivalent)
    }

    async fn correction(&self, attempt: &str, lang_code: &str) -> Result<Option<String>, ReviewError> {
        let prompt = format!("Language: {lang_code}\nSentence: {attempt}");
        let reply: CorrectionReply = self.ask(CORRECTION_SYSTEM, prompt).await?;
        Ok(reply
            .correction
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()))
    }
}

// Models sometimes wrap JSON in prose or code fences; take the outermost object.
fn parse_reply<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, AnthropicError> {
    let body = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(AnthropicError::InvalidReply(text.to_string())),
    };
    serde_json::from_str(body).map_err(|e| AnthropicError::InvalidReply(format!("{e}: {text}")))
}
