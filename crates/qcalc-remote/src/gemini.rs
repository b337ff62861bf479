//! Explanations from the Gemini `generateContent` REST endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use qcalc_core::explain::{
    auto_loan_prompt, currency_prompt, explanation_schema, formula_prompt, AutoLoanDetails,
    Explainer, Explanation, FALLBACK_NARRATIVE,
};
use qcalc_core::{CalcError, CalcResult};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiExplainer {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExplainer {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn send_request(&self, body: &GenerateContentRequest) -> CalcResult<String> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let response = self
            .agent
            .post(&url)
            .query("key", &self.api_key)
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let body = resp.into_string().unwrap_or_default();
                    CalcError::Network(format!("Gemini API returned {code}: {}", error_message(&body)))
                }
                ureq::Error::Transport(t) => {
                    CalcError::Network(format!("Gemini API request failed: {t}"))
                }
            })?;
        let parsed: GenerateContentResponse = response
            .into_json()
            .map_err(|e| CalcError::Network(format!("Failed to parse Gemini response: {e}")))?;
        Ok(extract_text_response(parsed))
    }

    fn narrative(&self, prompt: String) -> String {
        match self.send_request(&GenerateContentRequest::text(prompt)) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => FALLBACK_NARRATIVE.to_string(),
            Err(e) => {
                tracing::warn!("narrative request failed: {e}");
                FALLBACK_NARRATIVE.to_string()
            }
        }
    }
}

impl Explainer for GeminiExplainer {
    fn explain_formula(&self, expression: &str) -> Option<Explanation> {
        let request = GenerateContentRequest::structured(formula_prompt(expression), explanation_schema());
        match self.send_request(&request) {
            Ok(text) => parse_explanation(&text),
            Err(e) => {
                tracing::warn!("explanation request failed: {e}");
                Some(Explanation::fallback())
            }
        }
    }

    fn currency_narrative(&self, from: &str, to: &str) -> String {
        self.narrative(currency_prompt(from, to))
    }

    fn auto_loan_narrative(&self, details: &AutoLoanDetails) -> String {
        self.narrative(auto_loan_prompt(details))
    }
}

/// `None` for an empty answer, the fallback for anything unparseable.
pub fn parse_explanation(text: &str) -> Option<Explanation> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return None;
    }
    match serde_json_lenient::from_str::<Explanation>(body) {
        Ok(e) => Some(e),
        Err(e) => {
            tracing::warn!("could not parse explanation: {e}");
            Some(Explanation::fallback())
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ----- wire types -----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn text(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: None,
        }
    }

    fn structured(prompt: String, schema: Value) -> Self {
        Self {
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            }),
            ..Self::text(prompt)
        }
    }
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenated text of the first candidate; empty when there is none.
fn extract_text_response(response: GenerateContentResponse) -> String {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status.is_empty() {
                msg
            } else {
                format!("{status}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_request_shape() {
        let req = GenerateContentRequest::structured("hi".into(), explanation_schema());
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(v["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_text_request_has_no_config() {
        let v = serde_json::to_value(GenerateContentRequest::text("hi".into())).unwrap();
        assert!(v.get("generationConfig").is_none());
    }

    #[test]
    fn test_extract_text_response() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text_response(parsed), "ab");

        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_text_response(parsed), "");
    }

    #[test]
    fn test_parse_explanation_in_code_fence() {
        let text = r#"```json
        {
            "functionName": "Square Root",
            "formula": "\\sqrt{x}",
            "description": "The number that squared gives x.",
            "example": "sqrt(16) = 4"
        }
        ```"#;
        let e = parse_explanation(text).unwrap();
        assert_eq!(e.function_name, "Square Root");
        assert!(!e.is_fallback());
    }

    #[test]
    fn test_parse_explanation_empty_and_garbage() {
        assert!(parse_explanation("   ").is_none());
        assert!(parse_explanation("not json").unwrap().is_fallback());
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "INVALID_ARGUMENT: API key not valid");
        assert_eq!(error_message("oops"), "oops");
    }

    #[test]
    fn test_unreachable_endpoint_falls_back() {
        let explainer = GeminiExplainer::new("key", Duration::from_secs(2))
            .with_base_url("http://127.0.0.1:9/models");
        assert!(explainer.explain_formula("sqrt(16)").unwrap().is_fallback());
        assert_eq!(explainer.currency_narrative("USD", "EUR"), FALLBACK_NARRATIVE);
    }
}
