//! Candidate events from document text.
//!
//! [`ChatExtractor`] asks an OpenAI-compatible chat-completions endpoint for a
//! JSON array of events. Whatever the endpoint returns goes through
//! [`parse_candidates`], which is where malformed output turns into a
//! [`SchoolCalError::Parse`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::constants::RAW_PREVIEW_CHARS;
use crate::error::{SchoolCalError, SchoolCalResult};
use crate::event::{Category, Event};

const SYSTEM_PROMPT: &str =
    "You are a precise calendar event extractor. Return only valid JSON arrays.";

#[async_trait]
pub trait EventExtractor: Send + Sync {
    /// Candidate events found in `text`. `context` names the document.
    async fn extract(&self, text: &str, context: &str) -> SchoolCalResult<Vec<Event>>;
}

/// Extraction parameters shared by the prompt and the response parser.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub roster: Vec<String>,
    /// Year assumed when a document gives none
    pub default_year: i32,
    pub max_input_chars: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatExtractor {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    context: ExtractionContext,
}

impl ChatExtractor {
    pub fn from_settings(settings: &Settings, context: ExtractionContext) -> SchoolCalResult<Self> {
        let extraction = &settings.extraction;
        let api_key = std::env::var(&extraction.api_key_env).map_err(|_| {
            SchoolCalError::Config(format!(
                "{} is not set; the extractor needs an API key",
                extraction.api_key_env
            ))
        })?;
        let timeout = settings.extraction_timeout()?;

        let client = Client::builder()
            .user_agent(concat!("schoolcal/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| SchoolCalError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(ChatExtractor {
            client,
            endpoint: extraction.endpoint.clone(),
            model: extraction.model.clone(),
            api_key,
            temperature: extraction.temperature,
            max_tokens: extraction.max_tokens,
            timeout,
            context,
        })
    }

    async fn complete(&self, prompt: &str) -> SchoolCalResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SchoolCalError::transport(
                "extract",
                format!("{status}: {}", truncate_chars(&body, RAW_PREVIEW_CHARS)),
            ));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| self.request_error(e))?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SchoolCalError::transport("extract", "response had no message content"))
    }

    fn request_error(&self, e: reqwest::Error) -> SchoolCalError {
        if e.is_timeout() {
            SchoolCalError::Timeout("extract".into(), self.timeout.as_secs())
        } else {
            SchoolCalError::transport("extract", e)
        }
    }
}

#[async_trait]
impl EventExtractor for ChatExtractor {
    async fn extract(&self, text: &str, context: &str) -> SchoolCalResult<Vec<Event>> {
        info!(document = context, "Parsing events with the extractor");
        let prompt = build_prompt(text, context, &self.context);
        let content = self.complete(&prompt).await?;
        let events = parse_candidates(&content, context, &self.context)?;
        info!(document = context, count = events.len(), "Parsed events");
        Ok(events)
    }
}

/// The first `max` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

pub fn build_prompt(text: &str, document: &str, context: &ExtractionContext) -> String {
    let categories = Category::ALL
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");
    let children = serde_json::to_string(&context.roster).unwrap_or_default();
    let text = truncate_chars(text, context.max_input_chars);

    format!(
        r#"You are analyzing a school calendar document. Extract ALL calendar events, dates, and important school activities.

Document name: {document}
Document content:
{text}

Please extract ALL events and return them as a JSON array with this exact structure:
[
  {{
    "date": <day number>,
    "month": <month number 1-12>,
    "year": <year>,
    "title": "<event title>",
    "time": "<time or 'All Day'>",
    "description": "<detailed description>",
    "location": "<location or 'School'>",
    "type": "<one of: {categories}>",
    "children": <the subset of {children} the event applies to>
  }}
]

Important instructions:
1. Extract EVERY date mentioned
2. Include special days, awareness weeks and dress-up days
3. Include school closures, holidays and half terms
4. Include class assemblies, parent meetings and trips
5. Include term start and end dates, and staff training days
6. For date ranges (e.g. "10th-14th Anti-Bullying Week"), create events for the start and the end
7. If the year is not mentioned, assume {year}
8. Return ONLY the JSON array, no other text

Extract all events now:"#,
        year = context.default_year,
    )
}

/// Turn raw extractor output into events.
///
/// Output that isn't a JSON array fails the whole batch with a parse error
/// carrying the first 500 characters of the response. Individual items that
/// don't form a valid event are dropped with a warning. Audience names not in
/// the roster are removed; an event left with no audience applies to every
/// roster child.
pub fn parse_candidates(
    content: &str,
    source_id: &str,
    context: &ExtractionContext,
) -> SchoolCalResult<Vec<Event>> {
    let body = strip_fences(content);
    let parse_error = |message: String| SchoolCalError::Parse {
        source_id: source_id.to_string(),
        message,
        raw: truncate_chars(content, RAW_PREVIEW_CHARS).to_string(),
    };

    let items: Vec<Value> = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            return Err(parse_error(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )));
        }
        Err(e) => return Err(parse_error(e.to_string())),
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, mut item) in items.into_iter().enumerate() {
        if let Some(object) = item.as_object_mut() {
            object
                .entry("year")
                .or_insert_with(|| Value::from(context.default_year));
            if object.get("children").is_none_or(Value::is_null) {
                object.insert("children".into(), Value::from(Vec::<String>::new()));
            }
        }

        let mut event: Event = match serde_json::from_value(item) {
            Ok(event) => event,
            Err(e) => {
                warn!(document = source_id, index, error = %e, "Dropping malformed event");
                continue;
            }
        };

        event.audience.retain(|name| context.roster.contains(name));
        if event.audience.is_empty() {
            event.audience = context.roster.clone();
        }
        event.normalize_audience();

        if let Err(reason) = event.check() {
            warn!(document = source_id, index, %reason, "Dropping invalid event");
            continue;
        }
        debug!(document = source_id, event = %event.key(), "Candidate event");
        events.push(event);
    }

    Ok(events)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExtractionContext {
        ExtractionContext {
            roster: vec!["Leo".into(), "Novah".into()],
            default_year: 2025,
            max_input_chars: 8000,
        }
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_fences("```\n[]\n```\n"), "[]");
        assert_eq!(strip_fences("```json[]```"), "[]");
        assert_eq!(strip_fences("  [3]  "), "[3]");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 8000), "abc");
        assert_eq!(truncate_chars("café au lait", 4), "café");
    }

    #[test]
    fn test_prompt_truncates_document_text() {
        let mut ctx = context();
        ctx.max_input_chars = 10;
        let prompt = build_prompt("0123456789SHOULD-NOT-APPEAR", "newsletter", &ctx);
        assert!(prompt.contains("0123456789"));
        assert!(!prompt.contains("SHOULD-NOT-APPEAR"));
        assert!(prompt.contains("assume 2025"));
        assert!(prompt.contains("Special Day"));
        assert!(prompt.contains(r#"["Leo","Novah"]"#));
    }

    #[test]
    fn test_parse_fenced_response() {
        let content = r#"```json
[
  {"date": 10, "month": 11, "year": 2025, "title": "Odd Socks Day",
   "type": "Special Day", "children": ["Leo", "Novah"]},
  {"date": 14, "month": 11, "title": "Anti-Bullying Week Ends",
   "type": "Special Week", "children": ["Leo", "Mia"]}
]
```"#;
        let events = parse_candidates(content, "newsletter.pdf", &context()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, "All Day");
        assert_eq!(events[0].location, "School");
        assert_eq!(events[1].year, 2025);
        assert_eq!(events[1].audience, vec!["Leo"]);
        assert_eq!(events[1].category, Category::SpecialWeek);
    }

    #[test]
    fn test_missing_audience_means_everyone() {
        let content = r#"[{"date": 24, "month": 10, "year": 2025, "title": "Half Term", "type": "Holiday"}]"#;
        let events = parse_candidates(content, "term.pdf", &context()).unwrap();
        assert_eq!(events[0].audience, vec!["Leo", "Novah"]);
    }

    #[test]
    fn test_invalid_items_dropped() {
        let content = r#"[
            {"date": 31, "month": 11, "year": 2025, "title": "Impossible", "type": "Activity"},
            {"date": 3, "month": 12, "year": 2025, "title": "", "type": "Activity"},
            {"month": 12, "year": 2025, "title": "No Day", "type": "Activity"},
            {"date": 5, "month": 12, "year": 2025, "title": "Christmas Jumper Day", "type": "Celebration"}
        ]"#;
        let events = parse_candidates(content, "dec.pdf", &context()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Christmas Jumper Day");
    }

    #[test]
    fn test_malformed_response_is_parse_error() {
        let content = format!("Sure! Here are the events: {}", "x".repeat(1000));
        match parse_candidates(&content, "newsletter.pdf", &context()) {
            Err(SchoolCalError::Parse { source_id, raw, .. }) => {
                assert_eq!(source_id, "newsletter.pdf");
                assert_eq!(raw.chars().count(), 500);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_object_response_is_parse_error() {
        let result = parse_candidates(r#"{"events": []}"#, "a.pdf", &context());
        assert!(matches!(result, Err(SchoolCalError::Parse { .. })));
    }
}
