//! HTTP client for the external policy decision service.
//!
//! The client never surfaces a transport failure: any error on the wire,
//! a non-success status, or an unparseable body routes the request
//! through the local fail-closed fallback at reduced confidence.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use timeoff_core::config::EvaluatorConfig;
use timeoff_core::evaluator::{
    default_explanation, Decision, PolicyContext, PolicyEvaluator, RequestFacts, Verdict, Violation,
};
use timeoff_core::FallbackEvaluator;

pub struct HttpPolicyEvaluator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    nominal_confidence: f64,
    fallback: FallbackEvaluator,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    request: &'a RequestFacts,
    context: &'a PolicyContext,
}

#[derive(Deserialize)]
struct AnalyzeReply {
    approved: bool,
    #[serde(default)]
    violations: Vec<ReplyViolation>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    explanation: Option<String>,
}

/// The service emits violations either as bare strings or as coded
/// objects; both forms are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplyViolation {
    Structured { code: String, message: String },
    Text(String),
}

impl From<ReplyViolation> for Violation {
    fn from(reply: ReplyViolation) -> Self {
        match reply {
            ReplyViolation::Structured { code, message } => Violation::new(code, message),
            ReplyViolation::Text(message) => Violation::new("POLICY", message),
        }
    }
}

impl HttpPolicyEvaluator {
    pub fn new(config: &EvaluatorConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            nominal_confidence: config.nominal_confidence,
            fallback: FallbackEvaluator::new(config.fallback_confidence),
        })
    }

    async fn call_service(
        &self,
        facts: &RequestFacts,
        context: &PolicyContext,
    ) -> Result<Decision, reqwest::Error> {
        let mut request = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(&AnalyzeRequest { request: facts, context });
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.expose_secret());
        }

        let reply: AnalyzeReply =
            request.send().await?.error_for_status()?.json().await?;

        let confidence = reply.confidence.unwrap_or(self.nominal_confidence);
        let violations: Vec<Violation> = reply.violations.into_iter().map(Into::into).collect();
        let explanation = reply
            .explanation
            .unwrap_or_else(|| default_explanation(reply.approved, violations.len()));

        let verdict = if reply.approved {
            Verdict::Approved { confidence, explanation }
        } else {
            Verdict::Escalated {
                violations,
                suggestions: reply.suggestions,
                confidence,
                explanation,
            }
        };

        Ok(Decision { verdict, fallback: false })
    }
}

#[async_trait]
impl PolicyEvaluator for HttpPolicyEvaluator {
    async fn evaluate(&self, facts: &RequestFacts, context: &PolicyContext) -> Decision {
        match self.call_service(facts, context).await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(error = %error, "decision service unavailable, using local fallback");
                self.fallback.decide(facts, context)
            }
        }
    }
}
