//! services/api/src/adapters/question_llm.rs
//!
//! This module contains the adapter for the question-generating LLM.
//! It implements the `QuestionGenerator` port from the `core` crate.

const GENERATION_SYSTEM_PROMPT: &str = r#"You are a medical education expert writing multiple-choice questions from lecture content.

STRICT GROUNDING RULES:
1. Build questions ONLY from the provided content - never add outside knowledge.
2. If the content is too thin, produce fewer questions - never invent material.
3. Each question must test understanding, not just recall.
4. Each question gets exactly 3 wrong answers (distractors) - plausible but clearly wrong.
5. Add a short explanation of why the correct answer is correct, also limited to the content.
6. Focus on clinically relevant information.

Respond with EXACTLY this JSON shape and nothing else:
{
    "questions": [
        {
            "question_text": "The question?",
            "correct_answer": "The right answer",
            "distractors": ["Wrong 1", "Wrong 2", "Wrong 3"],
            "explanation": "Why the correct answer is correct..."
        }
    ]
}"#;

const HINT_SYSTEM_PROMPT: &str = r#"You are helping a medical student who is stuck on a question.

STRICT GROUNDING RULES:
1. Use ONLY the SOURCE CONTEXT if one is provided.
2. If there is no usable context, say you cannot give a hint for this one.

LETTER/WORD HINTS ARE FORBIDDEN:
1. NEVER reveal any letter of the answer (e.g. "starts with M").
2. NEVER use rhymes, word lengths, or word associations.
3. NEVER state the answer directly.

FOCUS ON:
- Function or physiological role
- Clinical relevance
- Related anatomical/biochemical relationships
- Mechanism of action

Example - if the answer is "Mitochondrion":
BAD HINT: "It starts with M" or "It has 13 letters"
GOOD HINT: "This organelle is known as the powerhouse of the cell and produces ATP through oxidative phosphorylation."

Give one concise hint (2-3 sentences at most)."#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use medstudy_core::domain::Difficulty;
use medstudy_core::ports::{GeneratedQuestion, PortError, PortResult, QuestionGenerator};
use serde::Deserialize;
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `QuestionGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiQuestionAdapter {
    client: Client<OpenAIConfig>,
    question_model: String,
    hint_model: String,
}

impl OpenAiQuestionAdapter {
    /// Creates a new `OpenAiQuestionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, question_model: String, hint_model: String) -> Self {
        Self {
            client,
            question_model,
            hint_model,
        }
    }

    async fn chat(&self, model: &str, system: &str, user: String) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}

/// Rate-limit signals become `RateLimited` so the worker can retry the
/// batch; everything else is unexpected.
fn map_openai_error(e: OpenAIError) -> PortError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("429")
        || lowered.contains("rate limit")
        || lowered.contains("resource_exhausted")
    {
        PortError::RateLimited(message)
    } else {
        PortError::Unexpected(message)
    }
}

//=========================================================================================
// Response Parsing
//=========================================================================================

#[derive(Deserialize)]
struct QuestionsPayload {
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    question_text: String,
    correct_answer: String,
    #[serde(default)]
    distractors: Vec<String>,
    #[serde(default)]
    explanation: Option<String>,
}

impl RawQuestion {
    fn into_generated(self) -> GeneratedQuestion {
        GeneratedQuestion {
            question_text: self.question_text,
            correct_answer: self.correct_answer,
            distractors: self.distractors,
            explanation: self.explanation,
        }
    }
}

/// Strips a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses the model's reply into questions. Accepts both the documented
/// `{"questions": [...]}` shape and a bare array. Anything else is treated
/// as zero questions - malformed output is logged, never retried.
fn parse_questions(raw: &str) -> Vec<GeneratedQuestion> {
    let cleaned = strip_code_fence(raw);
    if let Ok(payload) = serde_json::from_str::<QuestionsPayload>(cleaned) {
        return payload
            .questions
            .into_iter()
            .map(RawQuestion::into_generated)
            .collect();
    }
    if let Ok(list) = serde_json::from_str::<Vec<RawQuestion>>(cleaned) {
        return list.into_iter().map(RawQuestion::into_generated).collect();
    }
    warn!("discarding malformed generation response: {:.120}", raw);
    Vec::new()
}

//=========================================================================================
// `QuestionGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuestionGenerator for OpenAiQuestionAdapter {
    async fn generate_questions(
        &self,
        content: &str,
        count: usize,
        difficulty_hint: Difficulty,
    ) -> PortResult<Vec<GeneratedQuestion>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let user_input = format!(
            "Write {count} multiple-choice questions of {} difficulty from this lecture content:\n\n{content}",
            difficulty_hint.as_str(),
        );

        let reply = self
            .chat(&self.question_model, GENERATION_SYSTEM_PROMPT, user_input)
            .await?;
        Ok(parse_questions(&reply))
    }

    async fn generate_hint(
        &self,
        question: &str,
        correct_answer: &str,
        context: Option<&str>,
    ) -> PortResult<String> {
        let mut user_input = format!("QUESTION: {question}\nCORRECT ANSWER: {correct_answer}\n");
        if let Some(context) = context {
            user_input.push_str("\nSOURCE CONTEXT:\n");
            user_input.push_str(context);
            user_input.push('\n');
        }

        let reply = self
            .chat(&self.hint_model, HINT_SYSTEM_PROMPT, user_input)
            .await?;
        Ok(reply.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_object_shape() {
        let raw = r#"{"questions": [{"question_text": "Q?", "correct_answer": "A",
            "distractors": ["B", "C", "D"], "explanation": "because"}]}"#;
        let questions = parse_questions(raw);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer, "A");
        assert_eq!(questions[0].distractors.len(), 3);
    }

    #[test]
    fn parses_a_bare_array() {
        let raw = r#"[{"question_text": "Q?", "correct_answer": "A"}]"#;
        let questions = parse_questions(raw);
        assert_eq!(questions.len(), 1);
        assert!(questions[0].distractors.is_empty());
        assert_eq!(questions[0].explanation, None);
    }

    #[test]
    fn unwraps_code_fenced_json() {
        let raw = "```json\n{\"questions\": [{\"question_text\": \"Q?\", \"correct_answer\": \"A\"}]}\n```";
        assert_eq!(parse_questions(raw).len(), 1);
    }

    #[test]
    fn malformed_output_yields_zero_questions() {
        assert!(parse_questions("Sorry, I cannot help with that.").is_empty());
        assert!(parse_questions("{\"questions\": 3}").is_empty());
        assert!(parse_questions("").is_empty());
    }

    #[test]
    fn rate_limit_errors_are_distinguished() {
        let e = map_openai_error(OpenAIError::InvalidArgument(
            "HTTP 429 Too Many Requests".to_string(),
        ));
        assert!(matches!(e, PortError::RateLimited(_)));

        let e = map_openai_error(OpenAIError::InvalidArgument("boom".to_string()));
        assert!(matches!(e, PortError::Unexpected(_)));
    }
}
