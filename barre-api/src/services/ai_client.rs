//! Anthropic Messages API client for recommendations and report analysis
//!
//! The AI layer is strictly best-effort: every public method returns a
//! usable value even when the key is missing, the request times out, or
//! the response cannot be parsed. Failures are logged and replaced with
//! rule-based fallbacks so the calling endpoint never degrades.

use barre_common::db::models::{Customer, ProgressReport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-3-5-haiku-latest";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct AiClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

/// What the recommendation prompt gets to see about a customer
#[derive(Debug, Clone)]
pub struct RecommendationInput {
    pub first_name: String,
    pub total_classes_attended: i64,
    pub credits_remaining: i64,
    /// Names of classes attended recently, most recent first
    pub recent_class_names: Vec<String>,
    /// Names of currently bookable classes
    pub available_class_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationSet {
    pub recommendations: Vec<String>,
    /// False when the rule-based fallback produced the list
    pub ai_generated: bool,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AiClient {
    /// `api_key` of None disables remote calls; everything falls back.
    pub fn new(api_key: Option<String>, timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        AiClient { http, api_key }
    }

    /// Class recommendations for a customer, rule-based when the model is
    /// unavailable.
    pub async fn generate_recommendations(&self, input: &RecommendationInput) -> RecommendationSet {
        if let Some(text) = self.complete(&recommendation_prompt(input)).await {
            let lines: Vec<String> = text
                .lines()
                .map(|line| line.trim_start_matches(['-', '*', ' ']).trim().to_string())
                .filter(|line| !line.is_empty())
                .take(3)
                .collect();
            if !lines.is_empty() {
                return RecommendationSet {
                    recommendations: lines,
                    ai_generated: true,
                };
            }
            warn!("AI recommendation response contained no usable lines");
        }

        RecommendationSet {
            recommendations: fallback_recommendations(input),
            ai_generated: false,
        }
    }

    /// Analysis blob for a freshly created progress report, or None when
    /// the model is unavailable. The report stays valid without it.
    pub async fn analyze_progress(
        &self,
        report: &ProgressReport,
        customer: &Customer,
    ) -> Option<serde_json::Value> {
        let text = self.complete(&analysis_prompt(report, customer)).await?;

        // The prompt asks for bare JSON; tolerate surrounding prose
        let trimmed = text.trim();
        let candidate = trimmed
            .find('{')
            .and_then(|start| trimmed.rfind('}').map(|end| &trimmed[start..=end]))
            .unwrap_or(trimmed);

        match serde_json::from_str::<serde_json::Value>(candidate) {
            Ok(value) => Some(value),
            Err(_) => Some(json!({ "summary": trimmed })),
        }
    }

    /// One prompt in, assistant text out. None on any failure.
    async fn complete(&self, prompt: &str) -> Option<String> {
        let api_key = self.api_key.as_ref()?;

        let request = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
        };

        let response = match self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("AI request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("AI request returned status {}", response.status());
            return None;
        }

        match response.json::<MessagesResponse>().await {
            Ok(body) => {
                let text: String = body
                    .content
                    .iter()
                    .map(|block| block.text.as_str())
                    .collect();
                debug!("AI completion: {} chars", text.len());
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                warn!("Failed to parse AI response: {}", e);
                None
            }
        }
    }
}

fn recommendation_prompt(input: &RecommendationInput) -> String {
    format!(
        "You recommend ballet classes at a boutique studio. Customer {} has attended \
         {} classes and has {} credits. Recently attended: {}. Currently bookable: {}. \
         Suggest up to three classes from the bookable list, one per line, each with a \
         short reason. Plain lines only, no numbering.",
        input.first_name,
        input.total_classes_attended,
        input.credits_remaining,
        join_or_none(&input.recent_class_names),
        join_or_none(&input.available_class_names),
    )
}

fn analysis_prompt(report: &ProgressReport, customer: &Customer) -> String {
    format!(
        "Analyze this ballet progress report and respond with JSON only, shaped as \
         {{\"summary\": string, \"strengths\": [string], \"suggestions\": [string]}}. \
         Customer has attended {} classes lifetime. Report titled {:?}: {}. Goals: {}.",
        customer.total_classes_attended, report.title, report.content, report.goals
    )
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Deterministic suggestions used whenever the model is unavailable
fn fallback_recommendations(input: &RecommendationInput) -> Vec<String> {
    let mut picks: Vec<String> = input
        .available_class_names
        .iter()
        .filter(|name| !input.recent_class_names.contains(name))
        .take(3)
        .cloned()
        .collect();

    if picks.is_empty() {
        picks = input.available_class_names.iter().take(3).cloned().collect();
    }
    if picks.is_empty() {
        picks.push("Check back soon for newly scheduled classes".to_string());
    }
    picks
}
