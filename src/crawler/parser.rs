//! Landing page parser
//!
//! The platform renders its anti-forgery token into an inline script on the
//! account landing page, as `window.__csrfToken = "<token>"`.

use crate::AuthError;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("script selector is valid"));

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.__csrfToken\s*=\s*["']([^"']+)["']"#).expect("token pattern is valid")
});

/// Extracts the anti-forgery token from the landing page HTML
///
/// # Returns
///
/// * `Ok(String)` - The token
/// * `Err(AuthError::TokenNotFound)` - No inline script assigns a non-empty token
///
/// # Example
///
/// ```
/// use slotscout::crawler::extract_token;
///
/// let html = r#"<html><head><script>window.__csrfToken = "abc123";</script></head></html>"#;
/// assert_eq!(extract_token(html).unwrap(), "abc123");
/// ```
pub fn extract_token(html: &str) -> Result<String, AuthError> {
    find_token(html).ok_or(AuthError::TokenNotFound)
}

fn find_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    document.select(&SCRIPT_SELECTOR).find_map(|script| {
        let body = script.text().collect::<String>();
        TOKEN_PATTERN
            .captures(&body)
            .and_then(|captures| captures.get(1))
            .map(|token| token.as_str().trim().to_string())
            .filter(|token| !token.is_empty())
    })
}
