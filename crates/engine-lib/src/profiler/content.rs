//! HTML content analysis for site profiling
//!
//! Regex-based signal extraction: script/SPA markers for JS detection,
//! structural elements for quality, keywords for relevance, and WAF
//! signatures for anti-bot detection. Best effort; a page that cannot be
//! analyzed simply scores at the base values.

use crate::models::{clamp_score, PageStructure, UpdateFrequency};
use crate::sources::{
    count_keywords, has_url_token, FINANCE_KEYWORDS, FINANCE_URL_TOKENS, FX_KEYWORDS,
    FX_URL_TOKENS,
};
use regex::Regex;
use std::sync::OnceLock;

pub const QUALITY_BASE: f64 = 50.0;
pub const QUALITY_PER_ARTICLE: f64 = 10.0;
pub const QUALITY_PER_HEADING: f64 = 5.0;
pub const QUALITY_PER_PARAGRAPH: f64 = 2.0;
pub const QUALITY_PARAGRAPH_CAP: f64 = 20.0;
pub const QUALITY_SCRIPT_HEAVY_PENALTY: f64 = 20.0;
pub const QUALITY_PER_IFRAME_PENALTY: f64 = 5.0;
pub const QUALITY_DATE_BONUS: f64 = 10.0;
pub const QUALITY_AUTHOR_BONUS: f64 = 5.0;

pub const RELEVANCE_BASE: f64 = 50.0;
pub const RELEVANCE_PER_FX_KEYWORD: f64 = 8.0;
pub const RELEVANCE_PER_FINANCE_KEYWORD: f64 = 5.0;
pub const RELEVANCE_FX_URL_BONUS: f64 = 15.0;
pub const RELEVANCE_FINANCE_URL_BONUS: f64 = 10.0;

/// More scripts than this counts as one JS signal
const JS_SCRIPT_SIGNAL: usize = 5;
/// More scripts than this is penalized as script-heavy
const SCRIPT_HEAVY: usize = 20;

const SPA_MARKERS: &[&str] = &[
    "__next_data__",
    "__nuxt__",
    "ng-version",
    "data-reactroot",
    "data-v-app",
    "window.__initial_state__",
    "data-server-rendered",
];

const APP_ROOT_MARKERS: &[&str] = &[
    "id=\"root\"",
    "id='root'",
    "id=\"app\"",
    "id='app'",
    "id=\"__next\"",
    "<app-root",
];

const LIVE_MARKERS: &[&str] = &[
    "breaking news",
    "live updates",
    "live blog",
    "real-time",
    "realtime",
];

const AUTHOR_MARKERS: &[&str] = &[
    "rel=\"author\"",
    "name=\"author\"",
    "class=\"author",
    "class=\"byline",
    "itemprop=\"author\"",
];

/// Body or header fragments that identify a WAF / bot-challenge response
const WAF_SIGNATURES: &[&str] = &[
    "attention required! | cloudflare",
    "cf-chl-",
    "checking your browser",
    "captcha",
    "access denied",
    "_incapsula_resource",
    "incapsula incident",
    "sucuri website firewall",
    "px-captcha",
    "perimeterx",
    "akamai reference",
    "ddos protection by",
];

const WAF_HEADERS: &[&str] = &["cf-mitigated", "x-sucuri-block", "x-px-block"];

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::new)
}

struct Patterns {
    heading: Regex,
    paragraph: Regex,
    strip_blocks: Regex,
    strip_tags: Regex,
    iso_date: Regex,
    long_date: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            heading: Regex::new(r"<h[1-6][\s>]").expect("valid regex"),
            paragraph: Regex::new(r"<p[\s>]").expect("valid regex"),
            strip_blocks: Regex::new(r"(?s)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
                .expect("valid regex"),
            strip_tags: Regex::new(r"(?s)<[^>]+>").expect("valid regex"),
            iso_date: Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid regex"),
            long_date: Regex::new(
                r"\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.? \d{1,2},? \d{4}\b",
            )
            .expect("valid regex"),
        }
    }
}

/// Signals extracted from one HTML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentAnalysis {
    pub script_count: usize,
    pub article_count: usize,
    pub heading_count: usize,
    pub paragraph_count: usize,
    pub iframe_count: usize,
    /// Length of the visible text after stripping markup
    pub text_length: usize,
    pub has_date: bool,
    pub has_author: bool,
    pub has_spa_markers: bool,
    pub has_app_root: bool,
    pub has_live_markers: bool,
    pub fx_keywords: usize,
    pub finance_keywords: usize,
}

impl ContentAnalysis {
    pub fn analyze(html: &str) -> Self {
        let p = patterns();
        let lower = html.to_ascii_lowercase();

        let stripped = p.strip_blocks.replace_all(&lower, " ");
        let text = p.strip_tags.replace_all(&stripped, " ");
        let text: String = text.split_whitespace().collect::<Vec<_>>().join(" ");

        Self {
            script_count: lower.matches("<script").count(),
            article_count: lower.matches("<article").count(),
            heading_count: p.heading.find_iter(&lower).count(),
            paragraph_count: p.paragraph.find_iter(&lower).count(),
            iframe_count: lower.matches("<iframe").count(),
            text_length: text.chars().count(),
            has_date: lower.contains("<time")
                || p.iso_date.is_match(&text)
                || p.long_date.is_match(&text),
            has_author: AUTHOR_MARKERS.iter().any(|m| lower.contains(m)),
            has_spa_markers: SPA_MARKERS.iter().any(|m| lower.contains(m)),
            has_app_root: APP_ROOT_MARKERS.iter().any(|m| lower.contains(m)),
            has_live_markers: LIVE_MARKERS.iter().any(|m| text.contains(m)),
            fx_keywords: count_keywords(&text, FX_KEYWORDS),
            finance_keywords: count_keywords(&text, FINANCE_KEYWORDS),
        }
    }

    /// JS rendering is required when at least two of the three signals fire
    pub fn requires_js(&self) -> bool {
        let signals = [
            self.script_count > JS_SCRIPT_SIGNAL,
            self.has_spa_markers,
            self.has_app_root,
        ];
        signals.iter().filter(|s| **s).count() >= 2
    }

    pub fn quality_score(&self) -> f64 {
        let mut score = QUALITY_BASE;
        score += self.article_count as f64 * QUALITY_PER_ARTICLE;
        score += self.heading_count as f64 * QUALITY_PER_HEADING;
        score += (self.paragraph_count as f64 * QUALITY_PER_PARAGRAPH).min(QUALITY_PARAGRAPH_CAP);
        if self.script_count > SCRIPT_HEAVY {
            score -= QUALITY_SCRIPT_HEAVY_PENALTY;
        }
        score -= self.iframe_count as f64 * QUALITY_PER_IFRAME_PENALTY;
        if self.text_length > 5000 {
            score += 15.0;
        } else if self.text_length > 2000 {
            score += 10.0;
        }
        if self.has_date {
            score += QUALITY_DATE_BONUS;
        }
        if self.has_author {
            score += QUALITY_AUTHOR_BONUS;
        }
        clamp_score(score)
    }

    pub fn relevance_score(&self, url: &str) -> f64 {
        let mut score = RELEVANCE_BASE;
        score += self.fx_keywords as f64 * RELEVANCE_PER_FX_KEYWORD;
        score += self.finance_keywords as f64 * RELEVANCE_PER_FINANCE_KEYWORD;
        if has_url_token(url, FX_URL_TOKENS) {
            score += RELEVANCE_FX_URL_BONUS;
        } else if has_url_token(url, FINANCE_URL_TOKENS) {
            score += RELEVANCE_FINANCE_URL_BONUS;
        }
        clamp_score(score)
    }

    pub fn structure(&self) -> PageStructure {
        if self.requires_js() {
            PageStructure::Dynamic
        } else if self.script_count > 10 || self.iframe_count > 2 || self.heading_count > 20 {
            PageStructure::Complex
        } else {
            PageStructure::Simple
        }
    }

    pub fn update_frequency(&self) -> UpdateFrequency {
        if self.has_live_markers {
            UpdateFrequency::High
        } else if self.has_date {
            UpdateFrequency::Medium
        } else {
            UpdateFrequency::Low
        }
    }
}

/// True if a response looks like a WAF block or bot challenge
pub fn looks_like_waf(status: u16, headers: &[(String, String)], body: &str) -> bool {
    if status == 403 {
        return true;
    }
    if headers
        .iter()
        .any(|(name, _)| WAF_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
    {
        return true;
    }
    let lower = body.to_ascii_lowercase();
    WAF_SIGNATURES.iter().any(|sig| lower.contains(sig))
}
