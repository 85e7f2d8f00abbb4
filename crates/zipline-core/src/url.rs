use regex::Regex;
use std::sync::LazyLock;

/// Accepts http/https URLs with a dotted host and an optional path.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(http|https)://[a-zA-Z0-9\-\.]+\.[a-zA-Z]{2,}(?:/[^/]*)*$")
        .expect("URL pattern must compile")
});

/// Reports whether `url` is an acceptable original URL for shortening.
pub fn is_url(url: &str) -> bool {
    URL_PATTERN.is_match(url)
}
