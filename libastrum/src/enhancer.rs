//! AI content enhancement
//!
//! Grammar fixes, tag generation and platform-specific rewrites. Each call
//! takes one unit of quota from the provider chosen by the [`QuotaRotator`]
//! and sends one request with a fixed prompt asking for JSON.
//!
//! Failures never propagate: every operation returns a result value with
//! `success: false` and an error message instead. When the model answers
//! with something other than the requested JSON, the answer is salvaged
//! (raw text for grammar and rewrites, token extraction for tags).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{join_url, Endpoints};
use crate::credentials::AiProviderKind;
use crate::error::AiError;
use crate::http::send_json;
use crate::platforms::PlatformId;
use crate::quota::QuotaRotator;

pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const GEMINI_MODEL: &str = "gemini-pro";
pub const MAX_TAGS: usize = 10;
pub const DEFAULT_TAGS: [&str; 3] = ["general", "content", "post"];

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid fenced block regex")
});
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"\n]{1,50})""#).expect("valid quoted string regex"));
static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\w-]+)").expect("valid hashtag regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarResult {
    pub success: bool,
    pub corrected_text: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagResult {
    pub success: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResult {
    pub success: bool,
    pub optimized_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrammarAnswer {
    corrected_text: String,
    #[serde(default)]
    suggestions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagAnswer {
    Object { tags: Vec<String> },
    List(Vec<String>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimizeAnswer {
    optimized_text: String,
}

fn grammar_prompt(text: &str) -> String {
    format!(
        "Fix the grammar and spelling of the text below. Respond only with JSON of the form \
{{\"correctedText\": \"...\", \"suggestions\": [\"...\"]}} where suggestions briefly \
describe each change.\n\nText:\n{}",
        text
    )
}

fn tags_prompt(content: &str, platform: Option<PlatformId>) -> String {
    let target = platform
        .map(|p| format!(" for {}", p.display_name()))
        .unwrap_or_default();
    format!(
        "Suggest up to {} short, lowercase tags{} for the content below. Respond only with \
JSON of the form {{\"tags\": [\"...\"]}}.\n\nContent:\n{}",
        MAX_TAGS, target, content
    )
}

fn optimize_prompt(content: &str, platform: PlatformId) -> String {
    format!(
        "Rewrite the content below for {}, following its length limits and conventions. \
Respond only with JSON of the form {{\"optimizedText\": \"...\"}}.\n\nContent:\n{}",
        platform.display_name(),
        content
    )
}

/// Contents of a fenced code block if present, else the trimmed text
pub fn unwrap_fenced(text: &str) -> &str {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text.trim(), |m| m.as_str().trim())
}

/// Lowercase, strip `#`, drop empties and duplicates, cap at [`MAX_TAGS`]
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.as_ref().trim().trim_start_matches('#').trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}

pub fn parse_grammar_answer(answer: &str) -> (String, Vec<String>) {
    match serde_json::from_str::<GrammarAnswer>(unwrap_fenced(answer)) {
        Ok(parsed) => (parsed.corrected_text, parsed.suggestions),
        Err(_) => (answer.trim().to_string(), Vec::new()),
    }
}

pub fn parse_tag_answer(answer: &str) -> Vec<String> {
    let body = unwrap_fenced(answer);
    let tags = match serde_json::from_str::<TagAnswer>(body) {
        Ok(TagAnswer::Object { tags }) | Ok(TagAnswer::List(tags)) => normalize_tags(tags),
        Err(_) => match serde_json::from_str::<Value>(body) {
            Ok(value) => {
                let mut leaves = Vec::new();
                collect_tag_leaves(value.get("tags").unwrap_or(&value), &mut leaves);
                normalize_tags(leaves)
            }
            Err(_) => {
                let quoted = QUOTED.captures_iter(answer).filter_map(|c| c.get(1));
                let hashtags = HASHTAG.captures_iter(answer).filter_map(|c| c.get(1));
                normalize_tags(quoted.chain(hashtags).map(|m| m.as_str()))
            }
        },
    };

    if tags.is_empty() {
        DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
    } else {
        tags
    }
}

/// String leaves of an off-shape tag answer, comma lists split apart
fn collect_tag_leaves<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.extend(text.split(',')),
        Value::Array(items) => items.iter().for_each(|item| collect_tag_leaves(item, out)),
        _ => {}
    }
}

pub fn parse_optimize_answer(answer: &str) -> String {
    match serde_json::from_str::<OptimizeAnswer>(unwrap_fenced(answer)) {
        Ok(parsed) => parsed.optimized_text,
        Err(_) => answer.trim().to_string(),
    }
}

pub struct ContentEnhancer {
    rotator: QuotaRotator,
    endpoints: Endpoints,
    http: reqwest::Client,
}

impl ContentEnhancer {
    pub fn new(rotator: QuotaRotator, endpoints: Endpoints, http: reqwest::Client) -> Self {
        Self {
            rotator,
            endpoints,
            http,
        }
    }

    pub async fn check_grammar(&self, text: &str) -> GrammarResult {
        match self.complete(&grammar_prompt(text)).await {
            Ok(answer) => {
                let (corrected_text, suggestions) = parse_grammar_answer(&answer);
                GrammarResult {
                    success: true,
                    corrected_text,
                    suggestions,
                    error: None,
                }
            }
            Err(e) => GrammarResult {
                success: false,
                corrected_text: text.to_string(),
                suggestions: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn generate_tags(&self, content: &str, platform: Option<PlatformId>) -> TagResult {
        match self.complete(&tags_prompt(content, platform)).await {
            Ok(answer) => TagResult {
                success: true,
                tags: parse_tag_answer(&answer),
                error: None,
            },
            Err(e) => TagResult {
                success: false,
                tags: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn optimize_content(&self, content: &str, platform: PlatformId) -> OptimizeResult {
        match self.complete(&optimize_prompt(content, platform)).await {
            Ok(answer) => OptimizeResult {
                success: true,
                optimized_text: parse_optimize_answer(&answer),
                error: None,
            },
            Err(e) => OptimizeResult {
                success: false,
                optimized_text: content.to_string(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Send `prompt` to the next provider with quota and return the model text
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let selection = self
            .rotator
            .select_provider()
            .map_err(|e| AiError::QuotaStore(e.to_string()))?;
        if !selection.is_available() {
            return Err(AiError::NoProviderConfigured);
        }

        tracing::debug!("Sending prompt to {}", selection.provider.display_name());
        match selection.provider {
            AiProviderKind::OpenAi => self.complete_openai(&selection.api_key, prompt).await,
            AiProviderKind::Gemini => self.complete_gemini(&selection.api_key, prompt).await,
        }
    }

    async fn complete_openai(&self, api_key: &str, prompt: &str) -> Result<String, AiError> {
        let body = json!({
            "model": OPENAI_MODEL,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.3,
        });
        let request = self
            .http
            .post(join_url(&self.endpoints.openai, "/v1/chat/completions"))
            .bearer_auth(api_key)
            .json(&body);
        let response = send_json("OpenAI", request)
            .await
            .map_err(AiError::Transport)?;

        model_text("OpenAI", &response.body, "/choices/0/message/content")
    }

    async fn complete_gemini(&self, api_key: &str, prompt: &str) -> Result<String, AiError> {
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });
        let path = format!("/v1beta/models/{}:generateContent", GEMINI_MODEL);
        let request = self
            .http
            .post(join_url(&self.endpoints.gemini, &path))
            .query(&[("key", api_key)])
            .json(&body);
        let response = send_json("Gemini", request)
            .await
            .map_err(AiError::Transport)?;

        model_text("Gemini", &response.body, "/candidates/0/content/parts/0/text")
    }
}

/// Model text at `pointer`; an answer without text is a provider failure
fn model_text(label: &str, body: &Value, pointer: &str) -> Result<String, AiError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AiError::Transport(format!("{} API error: empty response", label)))
}
