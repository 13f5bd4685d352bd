use serde_json::Value;
use tracing::{debug, warn};

use super::schemas::ResponseVariant;
use crate::core::{error::ServiceResponseError, request::AnalysisRequest};

/// Turns raw model output into a typed reply, or refuses to.
///
/// Nothing is defaulted: a reply either carries every required field with the
/// declared type or the whole call fails.
pub struct ResponseValidator;

impl ResponseValidator {
    pub fn validate<T: ResponseVariant>(
        content: &str,
        request: &AnalysisRequest,
    ) -> Result<T, ServiceResponseError> {
        let value = Self::parse_reply(content)?;

        T::schema().validate(&value)?;

        let reply: T = serde_json::from_value(value).map_err(|e| {
            ServiceResponseError::Unparseable(format!("reply does not decode: {}", e))
        })?;

        reply.check_against(request)?;

        debug!("Reply validated against schema '{}'", T::schema().name);
        Ok(reply)
    }

    pub fn parse_reply(content: &str) -> Result<Value, ServiceResponseError> {
        let json_text = Self::extract_json_from_text(content);

        serde_json::from_str::<Value>(json_text).map_err(|e| {
            warn!("Reply is not valid JSON: {}", e);
            ServiceResponseError::Unparseable(e.to_string())
        })
    }

    /// Locates the JSON object in a reply that may be fenced or wrapped in prose.
    pub fn extract_json_from_text(text: &str) -> &str {
        if let Some(start) = text.find("```json") {
            let body_start = start + "```json".len();
            if let Some(len) = text[body_start..].find("```") {
                let json_str = text[body_start..body_start + len].trim();
                debug!("Found JSON in code block");
                return json_str;
            }
        }

        let mut first_balanced = None;
        for (start, _) in text.match_indices('{') {
            let Some(candidate) = Self::balanced_object_at(text, start) else {
                continue;
            };
            if matches!(serde_json::from_str::<Value>(candidate), Ok(Value::Object(_))) {
                return candidate;
            }
            first_balanced.get_or_insert(candidate);
        }

        first_balanced.unwrap_or_else(|| text.trim())
    }

    /// The balanced `{...}` span opening at byte `start`, if it closes.
    fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in text.as_bytes()[start..].iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match byte {
                b'\\' if in_string => escape_next = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => depth += 1,
                b'}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..start + i + 1]);
                    }
                }
                _ => {}
            }
        }

        None
    }
}
