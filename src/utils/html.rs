// src/utils/html.rs

use regex::Regex;
use std::sync::OnceLock;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (<b>, <p>, ...) survive,
/// dangerous tags (<script>, <iframe>) and attributes (onclick) are
/// stripped. Email templates are operator-supplied data, so rendered
/// bodies pass through here before being handed to the transport.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Derives a text/plain alternative from an HTML body by dropping tags.
pub fn html_to_text(input: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
    tags.replace_all(input, "").trim().to_string()
}
