//! Source classification helpers shared across components
//!
//! Domain allow-lists and keyword tables used by the profiler, the selector,
//! the optimizer and the quality maximizer.

use url::Url;

/// Domains treated as high-value sources when prioritizing tasks
pub const HIGH_VALUE_DOMAINS: &[&str] = &[
    "reuters.com",
    "bloomberg.com",
    "investing.com",
    "forexfactory.com",
    "fxstreet.com",
    "federalreserve.gov",
    "ecb.europa.eu",
    "boj.or.jp",
];

/// Wider allow-list used by the quality maximizer
pub const EXTENDED_HIGH_VALUE_DOMAINS: &[&str] = &[
    "reuters.com",
    "bloomberg.com",
    "investing.com",
    "forexfactory.com",
    "fxstreet.com",
    "federalreserve.gov",
    "ecb.europa.eu",
    "boj.or.jp",
    "wsj.com",
    "ft.com",
    "cnbc.com",
    "marketwatch.com",
    "dailyfx.com",
    "bankofengland.co.uk",
];

/// Domains with a known track record, used for the reliability bonus
pub const TRUSTED_DOMAINS: &[&str] = &[
    "reuters.com",
    "bloomberg.com",
    "federalreserve.gov",
    "ecb.europa.eu",
    "boj.or.jp",
    "bankofengland.co.uk",
    "wsj.com",
    "ft.com",
];

pub const FX_KEYWORDS: &[&str] = &[
    "forex",
    "currency",
    "exchange rate",
    "usd",
    "eur",
    "jpy",
    "gbp",
    "pip",
    "fx",
];

pub const FINANCE_KEYWORDS: &[&str] = &[
    "market",
    "stock",
    "trading",
    "economy",
    "inflation",
    "interest rate",
    "central bank",
    "bond",
    "gdp",
];

/// URL tokens that mark an FX-specific source
pub const FX_URL_TOKENS: &[&str] = &["forex", "fx", "currency", "currencies"];

/// URL tokens that mark a general finance source
pub const FINANCE_URL_TOKENS: &[&str] = &["finance", "market", "markets", "economy", "news"];

/// Lower-cased host of `url`, or `None` if it does not parse
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// True if the host of `url` is one of `domains` or a subdomain of one
pub fn matches_domain(url: &str, domains: &[&str]) -> bool {
    domain_rank(url, domains).is_some()
}

/// Position of the first entry in `domains` matching the host of `url`
pub fn domain_rank(url: &str, domains: &[&str]) -> Option<usize> {
    let host = host_of(url)?;
    domains
        .iter()
        .position(|d| host == *d || host.ends_with(&format!(".{d}")))
}

/// Split the host and path of a URL into lower-case alphanumeric tokens
pub fn url_tokens(url: &str) -> Vec<String> {
    let (host, path) = match Url::parse(url) {
        Ok(u) => (u.host_str().unwrap_or_default().to_string(), u.path().to_string()),
        Err(_) => (String::new(), url.to_string()),
    };
    format!("{host} {path}")
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn has_url_token(url: &str, tokens: &[&str]) -> bool {
    url_tokens(url).iter().any(|t| tokens.contains(&t.as_str()))
}

/// Count how many distinct keywords occur in already lower-cased text.
///
/// Short keywords (three characters or fewer) must match a whole word so that
/// "eur" does not fire on "europe".
pub fn count_keywords(lower_text: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|kw| {
            if kw.len() <= 3 {
                lower_text
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .any(|w| w == **kw)
            } else {
                lower_text.contains(**kw)
            }
        })
        .count()
}
