use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{CheatInput, CheatOracle, CheatVerdict, OracleError};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Cheat oracle backed by the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiOracle {
    client: Client,
    url: Arc<str>,
    api_key: Arc<str>,
}

impl GeminiOracle {
    /// Build a client for `model` under the `endpoint` base URL.
    pub fn new(endpoint: &str, model: &str, api_key: String) -> Result<Self, OracleError> {
        let client = Client::builder()
            .build()
            .map_err(|source| OracleError::ClientBuilder { source })?;
        let url = format!(
            "{}/models/{}:generateContent",
            endpoint.trim_end_matches('/'),
            model
        );

        Ok(Self {
            client,
            url: Arc::from(url),
            api_key: Arc::from(api_key),
        })
    }

    async fn ask(&self, input: CheatInput) -> Result<CheatVerdict, OracleError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: build_prompt(&input),
                }],
            }],
            generation_config: json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "isCheating": {"type": "BOOLEAN"},
                        "reason": {"type": "STRING"}
                    },
                    "required": ["isCheating", "reason"]
                }
            }),
        };

        let response = self
            .client
            .post(self.url.as_ref())
            .header(API_KEY_HEADER, self.api_key.as_ref())
            .json(&body)
            .send()
            .await
            .map_err(|source| OracleError::Request { source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status { status });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|source| OracleError::Request { source })?;
        parse_reply(reply)
    }
}

impl CheatOracle for GeminiOracle {
    fn classify(&self, input: CheatInput) -> BoxFuture<'static, Result<CheatVerdict, OracleError>> {
        let oracle = self.clone();
        Box::pin(async move { oracle.ask(input).await })
    }
}

fn build_prompt(input: &CheatInput) -> String {
    format!(
        "You detect whether a quiz participant is using an AI assistant to answer questions.\n\
         Weigh the response time, the answer text and the question text.\n\n\
         Response time: {} seconds\n\
         Answer text: {}\n\
         Question text: {}\n\n\
         A very fast response paired with a very complete or complex answer suggests cheating.\n\
         A reasonable response time with a reasonable answer suggests an honest participant.\n\n\
         Reply with a JSON object holding a boolean `isCheating` and a string `reason`.",
        input.response_time, input.answer_text, input.question_text
    )
}

fn parse_reply(reply: GenerateResponse) -> Result<CheatVerdict, OracleError> {
    let text = reply
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .filter(|text| !text.trim().is_empty())
        .ok_or(OracleError::EmptyReply)?;

    serde_json::from_str(text.trim()).map_err(|source| OracleError::Malformed { source })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(text: &str) -> GenerateResponse {
        serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        }))
        .unwrap()
    }

    #[test]
    fn verdict_is_read_from_first_candidate() {
        let verdict =
            parse_reply(reply(r#"{"isCheating": true, "reason": "0.4s for an essay"}"#)).unwrap();
        assert!(verdict.is_cheating);
        assert_eq!(verdict.reason, "0.4s for an essay");
    }

    #[test]
    fn empty_and_garbled_replies_are_errors() {
        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(parse_reply(empty), Err(OracleError::EmptyReply)));
        assert!(matches!(
            parse_reply(reply("definitely cheating")),
            Err(OracleError::Malformed { .. })
        ));
    }

    #[test]
    fn endpoint_and_model_form_the_url() {
        let oracle = GeminiOracle::new(
            "https://generativelanguage.googleapis.com/v1beta/",
            "gemini-2.0-flash",
            "key".into(),
        )
        .unwrap();
        assert_eq!(
            oracle.url.as_ref(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
