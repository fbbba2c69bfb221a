//! Separates display text from an embedded auth request in an agent reply.
//!
//! The agent answers in free text, but when it needs the user to connect an
//! external account it embeds a small JSON object:
//!
//! ```text
//! Sure, here's your link: {"structuredContent":{"url":"https://...","integration":"googledrive"}}
//! ```
//!
//! Older agent prompts only describe the link in prose, so a second matcher
//! looks for an auth phrase plus a URL under the known auth prefix. Matchers
//! run in priority order and the first hit wins.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;

use crate::state::StructuredPayload;

/// Key that marks an embedded payload object.
pub const STRUCTURED_MARKER: &str = "structuredContent";

/// Shown instead of an empty reply once the payload is stripped.
pub const AUTH_FALLBACK_TEXT: &str = "Authentication required to continue.";

pub const DEFAULT_AUTH_URL_PREFIX: &str = "https://app.toolhouse.ai/auth/";
pub const DEFAULT_INTEGRATION: &str = "googledrive";

static AUTH_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:please\s+(?:authenticate|authorize|connect|sign\s+in|log\s+in)|(?:authentication|authorization|auth)\s+(?:is\s+)?required|(?:click|use|open|visit|follow)\s+(?:on\s+)?(?:the|this)\s+(?:link|url)|connect\s+your\s+[\w\s]*?account|need(?:s)?\s+(?:to|you\s+to)\s+(?:authenticate|authorize|connect|sign\s+in|log\s+in)|grant\s+(?:me\s+)?access)\b",
    )
    .expect("auth phrase regex is valid")
});

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`()\[\]{}]+"#).expect("url regex is valid"));

/// Display text plus the payload found in it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub structured: Option<StructuredPayload>,
}

impl Extraction {
    fn plain(buffer: &str) -> Self {
        Self {
            text: buffer.to_string(),
            structured: None,
        }
    }

    fn stripped(remaining: &str, payload: StructuredPayload) -> Self {
        let trimmed = remaining.trim();
        let text = if trimmed.is_empty() {
            AUTH_FALLBACK_TEXT.to_string()
        } else {
            trimmed.to_string()
        };
        Self {
            text,
            structured: Some(payload),
        }
    }
}

/// One detection strategy in the extractor chain.
pub trait Matcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when this strategy doesn't apply to the buffer.
    fn try_match(&self, buffer: &str) -> Option<Extraction>;
}

/// Runs matchers in order and returns the first hit, or the buffer unchanged.
#[derive(Clone)]
pub struct Extractor {
    matchers: Arc<Vec<Box<dyn Matcher>>>,
}

impl Extractor {
    pub fn new(auth_url_prefix: &str, default_integration: &str) -> Self {
        Self::with_matchers(vec![
            Box::new(StructuredJsonMatcher),
            Box::new(AuthPhraseMatcher::new(auth_url_prefix, default_integration)),
        ])
    }

    pub fn with_matchers(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self {
            matchers: Arc::new(matchers),
        }
    }

    pub fn extract(&self, buffer: &str) -> Extraction {
        for matcher in self.matchers.iter() {
            if let Some(hit) = matcher.try_match(buffer) {
                tracing::trace!(matcher = matcher.name(), "structured payload detected");
                return hit;
            }
        }
        Extraction::plain(buffer)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_URL_PREFIX, DEFAULT_INTEGRATION)
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.matchers.iter().map(|m| m.name()).collect();
        f.debug_struct("Extractor").field("matchers", &names).finish()
    }
}

/// Extract with the built-in defaults.
pub fn extract(buffer: &str) -> Extraction {
    static DEFAULT: LazyLock<Extractor> = LazyLock::new(Extractor::default);
    DEFAULT.extract(buffer)
}

// ============================================================================
// Strategy A: embedded JSON object
// ============================================================================

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "structuredContent")]
    structured_content: RawPayload,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    integration: Option<String>,
}

/// Finds a `{"structuredContent": {...}}` object anywhere in the buffer.
pub struct StructuredJsonMatcher;

impl Matcher for StructuredJsonMatcher {
    fn name(&self) -> &'static str {
        "structured-json"
    }

    fn try_match(&self, buffer: &str) -> Option<Extraction> {
        let markers: Vec<usize> = buffer
            .match_indices(STRUCTURED_MARKER)
            .map(|(at, _)| at)
            .collect();
        if markers.is_empty() {
            return None;
        }

        let mut candidates: Vec<(usize, usize)> = balanced_objects(buffer)
            .into_iter()
            .filter(|&(start, end)| {
                let next = markers.partition_point(|&at| at < start);
                markers
                    .get(next)
                    .is_some_and(|&at| at + STRUCTURED_MARKER.len() <= end)
            })
            .collect();
        candidates.sort_unstable_by_key(|&(start, _)| start);

        candidates.into_iter().find_map(|(start, end)| {
            let payload = parse_envelope(&buffer[start..end])?;
            let remaining = format!("{}{}", &buffer[..start], &buffer[end..]);
            Some(Extraction::stripped(&remaining, payload))
        })
    }
}

struct OpenBrace {
    start: usize,
    json: bool,
}

/// Byte ranges of every balanced `{...}` in the buffer, in one pass.
///
/// Braces inside JSON strings are ignored. Quotes only open a string inside
/// an object that looks like JSON (its first non-space byte is `"` or `}`),
/// so stray quotes in prose can't swallow a payload. Unclosed braces produce
/// no range.
fn balanced_objects(buffer: &str) -> Vec<(usize, usize)> {
    let bytes = buffer.as_bytes();
    let mut stack: Vec<OpenBrace> = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (at, &byte) in bytes.iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' if stack.last().is_some_and(|open| open.json) => in_string = true,
            b'{' => stack.push(OpenBrace {
                start: at,
                json: starts_like_json(&bytes[at + 1..]),
            }),
            b'}' => {
                if let Some(open) = stack.pop() {
                    spans.push((open.start, at + 1));
                }
            }
            _ => {}
        }
    }
    spans
}

fn starts_like_json(rest: &[u8]) -> bool {
    rest.iter()
        .find(|b| !b.is_ascii_whitespace())
        .map_or(true, |&b| b == b'"' || b == b'}')
}

fn parse_envelope(span: &str) -> Option<StructuredPayload> {
    let envelope: Envelope = serde_json::from_str(span).ok()?;
    let url = envelope.structured_content.url.filter(|u| !u.trim().is_empty())?;
    let integration = envelope
        .structured_content
        .integration
        .filter(|i| !i.trim().is_empty())?;
    Some(StructuredPayload { url, integration })
}

// ============================================================================
// Strategy B: auth phrase plus known auth URL
// ============================================================================

/// Heuristic for replies that only describe the auth step in prose.
///
/// Every hit is tagged with the same default integration, since the phrase
/// alone doesn't say which service is meant.
pub struct AuthPhraseMatcher {
    url_prefix: String,
    integration: String,
}

impl AuthPhraseMatcher {
    pub fn new(url_prefix: &str, integration: &str) -> Self {
        Self {
            url_prefix: url_prefix.to_string(),
            integration: integration.to_string(),
        }
    }

    fn find_auth_url<'a>(&self, buffer: &'a str) -> Option<(usize, &'a str)> {
        URL.find_iter(buffer).find_map(|m| {
            let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
            url.starts_with(&self.url_prefix)
                .then_some((m.start(), url))
        })
    }
}

impl Matcher for AuthPhraseMatcher {
    fn name(&self) -> &'static str {
        "auth-phrase"
    }

    fn try_match(&self, buffer: &str) -> Option<Extraction> {
        if !AUTH_PHRASE.is_match(buffer) {
            return None;
        }
        let (start, url) = self.find_auth_url(buffer)?;
        let (cut_start, cut_end) = link_bounds(buffer, start, start + url.len());

        let remaining = format!("{}{}", &buffer[..cut_start], &buffer[cut_end..]);
        let payload = StructuredPayload {
            url: url.to_string(),
            integration: self.integration.clone(),
        };
        Some(Extraction::stripped(&remaining, payload))
    }
}

/// Widens a bare URL range to the whole `[label](url)` markdown link around
/// it, if there is one on the same line.
fn link_bounds(buffer: &str, start: usize, end: usize) -> (usize, usize) {
    let Some(before) = buffer[..start].strip_suffix("](") else {
        return (start, end);
    };
    if !buffer[end..].starts_with(')') {
        return (start, end);
    }
    match before.rfind('[') {
        Some(open) if !before[open..].contains('\n') => (open, end + 1),
        _ => (start, end),
    }
}
