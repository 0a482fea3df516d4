//! Equation extraction through a text-generation capability.
//!
//! The model is asked for a bare JSON array of `{equation, description}`
//! objects. Responses are cleaned of code fences and decoded record by
//! record, so one bad element does not throw away the rest.

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::error::{AnalysisError, AnswerRole, ExtractionError, MalformedRecordError};
use crate::model::ExtractedEquation;
use crate::traits::{strip_code_fences, GenerateRequest, LlmProvider};

const EXTRACTION_PROMPT: &str = r#"
Extract all mathematical equations from the following answer.
For each equation, return a JSON object with:
  - "equation": the exact equation text
  - "description": a natural-language verbalization of that equation
Return ONLY a JSON array of these objects.
If no equations are found, return an empty JSON array: []

Do NOT include any markdown formatting, backticks, or extra text before or after the JSON array.

Answer text:
{input}
"#;

/// Build the extraction prompt for one answer text.
pub fn extraction_prompt(text: &str) -> String {
    EXTRACTION_PROMPT.replace("{input}", text)
}

/// Extracts equation/description pairs from free text.
pub struct EquationExtractor {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl EquationExtractor {
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

    /// Extract the equations in `text`.
    ///
    /// Empty output is fatal for the master answer and means "no equations"
    /// for a student answer. Malformed JSON is fatal for both.
    #[instrument(skip(self, text), fields(provider = self.provider.name(), model = %self.model))]
    pub async fn extract(
        &self,
        text: &str,
        role: AnswerRole,
    ) -> Result<Vec<ExtractedEquation>, AnalysisError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: extraction_prompt(text),
            system_prompt: None,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let response = self.provider.generate(&request).await?;
        tracing::debug!(%role, raw = ?response.content, "extraction output");

        let equations = parse_extraction_output(&response.content, role)?;
        tracing::info!(%role, count = equations.len(), "extracted equations");
        Ok(equations)
    }
}

/// Decode an extraction response into equation pairs.
pub fn parse_extraction_output(
    output: &str,
    role: AnswerRole,
) -> Result<Vec<ExtractedEquation>, ExtractionError> {
    let cleaned = strip_code_fences(output);

    if cleaned.is_empty() {
        return match role {
            AnswerRole::Master => Err(ExtractionError::EmptyMasterOutput),
            AnswerRole::Student => {
                tracing::warn!("student answer has no extractable equations, using empty list");
                Ok(Vec::new())
            }
        };
    }

    let value: Value = serde_json::from_str(&escape_control_chars(cleaned)).map_err(|source| {
        ExtractionError::MalformedJson {
            role,
            raw: cleaned.to_string(),
            source,
        }
    })?;

    match value {
        Value::Array(items) => Ok(decode_records(items, role)),
        _ => Err(ExtractionError::NotAnArray { role }),
    }
}

/// Turn JSON array elements into typed pairs, skipping malformed ones.
fn decode_records(items: Vec<Value>, role: AnswerRole) -> Vec<ExtractedEquation> {
    let mut equations = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        match decode_record(&item) {
            Ok(equation) => equations.push(equation),
            Err(reason) => {
                let err = MalformedRecordError {
                    role,
                    index,
                    reason,
                };
                tracing::warn!(record = %item, "skipping record: {err}");
            }
        }
    }

    equations
}

fn decode_record(item: &Value) -> Result<ExtractedEquation, String> {
    let Value::Object(map) = item else {
        return Err("record is not a JSON object".into());
    };
    let field = |name: &str| {
        map.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| format!("missing string field '{name}'"))
    };

    Ok(ExtractedEquation {
        equation: field("equation")?,
        description: field("description")?,
    })
}

/// Escape raw control characters that appear inside JSON string literals.
///
/// Models regularly emit literal newlines inside strings, which a strict
/// JSON decoder rejects.
fn escape_control_chars(input: &str) -> Cow<'_, str> {
    if !input.chars().any(|c| c.is_control()) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 16);
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    Cow::Owned(out)
}
