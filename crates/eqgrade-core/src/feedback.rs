//! Natural-language feedback through a text-generation capability.

use std::sync::Arc;

use anyhow::Result;
use tracing::instrument;

use crate::error::FeedbackParseError;
use crate::model::{FeedbackEntry, FeedbackPayload, ScoreBundle};
use crate::traits::{strip_code_fences, GenerateRequest, LlmProvider};

const FEEDBACK_PROMPT: &str = r#"
You are a helpful and constructive teacher. Based on the comparison below, generate feedback for a student in simple, encouraging language.

Give your output as a JSON object with:
- "score_out_of_10": just use the provided final score

- "verdict": a one-word summary (e.g., Outstanding, Excellent, Good, Fair, Not Good, Bad)

- "comment": a 1-2 sentence summary of the overall quality and completeness of the student's answer.

- If there are unmatched equations, naturally mention that those specific equations should have been included as part of the mathematical explanation, and list them in plain text (comma-separated).

- "advice": a 1-2 sentence actionable suggestion tailored to the concept of the question.
  If there are unmatched equations, suggest focusing on those specific equations to improve.

Evaluation Context:

Master Answer:
{master}

Student Answer:
{student}

Unmatched Equations (if any):
{unmatched_equations}

Similarity Metrics:
- SBERT: {sbert}
- E5: {e5}
- Equation Match Score: {eq_score}

Final Score (use this directly): {final_score}

Return ONLY the JSON object. No preamble, no markdown formatting, no backticks, and no extra explanation.
"#;

/// Everything the feedback prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackInput<'a> {
    /// Descriptive master text.
    pub master_text: &'a str,
    /// Descriptive student text.
    pub student_text: &'a str,
    pub unmatched: &'a [FeedbackEntry],
    pub scores: &'a ScoreBundle,
}

/// Render the feedback prompt.
pub fn feedback_prompt(input: &FeedbackInput<'_>) -> Result<String> {
    let unmatched: Vec<&str> = input
        .unmatched
        .iter()
        .map(|e| e.equation.as_str())
        .collect();
    let unmatched = serde_json::to_string(&unmatched)?;

    let sbert = decimal(round4(input.scores.sbert_score));
    let e5 = decimal(round4(input.scores.e5_score));
    let eq_score = decimal(round4(input.scores.equation_score));
    let final_score = decimal(input.scores.final_score);

    Ok(render(
        FEEDBACK_PROMPT,
        &[
            ("master", input.master_text),
            ("student", input.student_text),
            ("unmatched_equations", unmatched.as_str()),
            ("sbert", sbert.as_str()),
            ("e5", e5.as_str()),
            ("eq_score", eq_score.as_str()),
            ("final_score", final_score.as_str()),
        ],
    ))
}

/// Whole numbers keep their fractional part (`10.0`, not `10`).
fn decimal(value: f64) -> String {
    format!("{value:?}")
}

/// Fill `{name}` slots in one pass, so slot-like text inside the inserted
/// values is left alone.
fn render(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let slot = slots
            .iter()
            .find(|(name, _)| tail.starts_with(name) && tail[name.len()..].starts_with('}'));
        match slot {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Decode a feedback response.
pub fn parse_feedback(output: &str) -> Result<FeedbackPayload, FeedbackParseError> {
    Ok(serde_json::from_str(strip_code_fences(output))?)
}

/// Produces qualitative feedback for a graded answer.
pub struct FeedbackGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl FeedbackGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Generate feedback.
    ///
    /// Returns `Ok(None)` when the response is not valid feedback JSON; the
    /// numeric score stays usable without it. Failures of the generation
    /// call itself are returned as errors.
    #[instrument(skip_all, fields(provider = self.provider.name(), model = %self.model))]
    pub async fn generate(&self, input: &FeedbackInput<'_>) -> Result<Option<FeedbackPayload>> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: feedback_prompt(input)?,
            system_prompt: None,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let response = self.provider.generate(&request).await?;

        match parse_feedback(&response.content) {
            Ok(payload) => {
                tracing::info!(verdict = %payload.verdict, "feedback generated");
                Ok(Some(payload))
            }
            Err(e) => {
                tracing::warn!(raw = ?response.content, "{e}");
                Ok(None)
            }
        }
    }
}
