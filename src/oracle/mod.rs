//! Cheat oracle: an external classifier that flags answers typed suspiciously fast.
//!
//! Callers go through [`detect_cheating`], which never fails: any error, timeout or missing
//! credential yields a "not cheating" verdict with an explanatory reason.

/// Gemini-backed oracle.
pub mod gemini;

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::AppConfig;

pub use self::gemini::GeminiOracle;

/// Reason attached to verdicts when no credentials are configured.
pub const NOT_CONFIGURED_REASON: &str = "not configured";
/// Environment variables read for the generative-language API key, in order.
pub const API_KEY_ENV: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Facts the oracle looks at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheatInput {
    /// Seconds between question display and submission.
    pub response_time: f64,
    /// Submitted answer text.
    pub answer_text: String,
    /// Prompt of the question answered.
    pub question_text: String,
}

/// Oracle verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheatVerdict {
    /// Whether the answer looks machine-assisted.
    pub is_cheating: bool,
    /// Short human-readable explanation.
    pub reason: String,
}

impl CheatVerdict {
    /// Fail-open verdict.
    pub fn innocent(reason: impl Into<String>) -> Self {
        Self {
            is_cheating: false,
            reason: reason.into(),
        }
    }
}

/// Failures of an oracle backend.
#[derive(Debug, Error)]
pub enum OracleError {
    /// No credentials were supplied.
    #[error("cheat oracle is not configured")]
    NotConfigured,
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    ClientBuilder {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The request never produced a response.
    #[error("request to the oracle failed")]
    Request {
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The oracle answered with an error status.
    #[error("oracle responded with status {status}")]
    Status {
        /// HTTP status returned.
        status: reqwest::StatusCode,
    },
    /// The reply carried no candidate text.
    #[error("oracle reply was empty")]
    EmptyReply,
    /// The candidate text was not the expected JSON verdict.
    #[error("oracle reply could not be parsed")]
    Malformed {
        /// JSON decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The call exceeded its time budget.
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
}

/// Backend able to classify an answer.
pub trait CheatOracle: Send + Sync {
    /// Classify one answer. Errors are handled by [`detect_cheating`].
    fn classify(&self, input: CheatInput) -> BoxFuture<'static, Result<CheatVerdict, OracleError>>;
}

/// Oracle used when no credentials are available; it never contacts anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredOracle;

impl CheatOracle for UnconfiguredOracle {
    fn classify(&self, _input: CheatInput) -> BoxFuture<'static, Result<CheatVerdict, OracleError>> {
        Box::pin(async { Err(OracleError::NotConfigured) })
    }
}

/// Build the oracle from the environment, falling back to [`UnconfiguredOracle`].
pub fn from_env(config: &AppConfig) -> Arc<dyn CheatOracle> {
    let key = API_KEY_ENV
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty());

    let Some(key) = key else {
        warn!("no oracle API key set; cheat detection is disabled");
        return Arc::new(UnconfiguredOracle);
    };

    match GeminiOracle::new(config.oracle_endpoint(), config.oracle_model(), key) {
        Ok(oracle) => Arc::new(oracle),
        Err(err) => {
            warn!(error = %err, "failed to initialise cheat oracle; cheat detection is disabled");
            Arc::new(UnconfiguredOracle)
        }
    }
}

/// Ask the oracle, bounded by `limit`. Never fails.
pub async fn detect_cheating(
    oracle: &dyn CheatOracle,
    input: CheatInput,
    limit: Duration,
) -> CheatVerdict {
    let outcome = match timeout(limit, oracle.classify(input)).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout(limit)),
    };

    match outcome {
        Ok(verdict) => verdict,
        Err(OracleError::NotConfigured) => {
            debug!("cheat oracle not configured; assuming honest answer");
            CheatVerdict::innocent(NOT_CONFIGURED_REASON)
        }
        Err(err) => {
            warn!(error = %err, "cheat detection failed; assuming honest answer");
            CheatVerdict::innocent(format!("cheat detection unavailable: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowOracle;

    impl CheatOracle for SlowOracle {
        fn classify(
            &self,
            _input: CheatInput,
        ) -> BoxFuture<'static, Result<CheatVerdict, OracleError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(CheatVerdict {
                    is_cheating: true,
                    reason: "too late".into(),
                })
            })
        }
    }

    fn input() -> CheatInput {
        CheatInput {
            response_time: 0.8,
            answer_text: "A comprehensive, multi-paragraph essay".into(),
            question_text: "Describe the French revolution".into(),
        }
    }

    #[tokio::test]
    async fn missing_credentials_short_circuit() {
        let verdict = detect_cheating(&UnconfiguredOracle, input(), Duration::from_secs(1)).await;
        assert_eq!(verdict, CheatVerdict::innocent(NOT_CONFIGURED_REASON));
    }

    #[tokio::test]
    async fn timeout_fails_open() {
        let verdict = detect_cheating(&SlowOracle, input(), Duration::from_millis(50)).await;
        assert!(!verdict.is_cheating);
        assert!(verdict.reason.contains("timed out"));
    }

    #[test]
    fn input_uses_camel_case_fields() {
        let value = serde_json::to_value(input()).unwrap();
        assert_eq!(value["responseTime"], 0.8);
        assert!(value.get("questionText").is_some());
    }
}
